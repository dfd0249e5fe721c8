//! Output Format Module
//!
//! Strategy Patternによる出力フォーマットの抽象化を提供するモジュール。
//! 解析済みの[`WorkbookDocument`]を受け取り、Markdown（3モード）、
//! 単一HTML文書、JSONのいずれかで書き出します。

mod html;
mod markdown;

use std::io::Write;

use crate::api::OutputFormat;
use crate::builder::ConversionConfig;
use crate::error::XlsxToMdError;
use crate::types::WorkbookDocument;

use html::HtmlOptions;
use markdown::MarkdownOptions;

/// 出力フォーマッター（Strategy Pattern）
///
/// 各出力フォーマットをenumとして表現します。
#[derive(Debug, Clone, Copy)]
pub(crate) enum OutputFormatter {
    Markdown(MarkdownOptions),
    Html(HtmlOptions),
    Json,
}

impl OutputFormatter {
    /// 変換設定からフォーマッターを生成
    pub fn from_config(config: &ConversionConfig) -> Self {
        let grid = HtmlOptions {
            col_width_px: config.default_col_width_px,
            row_height_px: config.default_row_height_px,
        };
        match config.output_format {
            OutputFormat::Markdown => OutputFormatter::Markdown(MarkdownOptions {
                mode: config.output_mode,
                merge_strategy: config.merge_strategy,
                formula_mode: config.formula_mode,
                grid,
            }),
            OutputFormat::Html => OutputFormatter::Html(grid),
            OutputFormat::Json => OutputFormatter::Json,
        }
    }

    /// ドキュメントを指定されたフォーマットで出力する
    pub fn render<W: Write>(
        &self,
        doc: &WorkbookDocument,
        writer: &mut W,
    ) -> Result<(), XlsxToMdError> {
        match self {
            OutputFormatter::Markdown(options) => markdown::render_workbook(doc, *options, writer),
            OutputFormatter::Html(options) => html::render_workbook(doc, *options, writer),
            OutputFormatter::Json => {
                serde_json::to_writer_pretty(&mut *writer, doc).map_err(|e| {
                    if e.is_io() {
                        XlsxToMdError::Io(e.into())
                    } else {
                        XlsxToMdError::Config(format!("JSON serialization failed: {}", e))
                    }
                })?;
                writeln!(writer)?;
                Ok(())
            }
        }
    }
}

/// 抽出サマリーのキーと値
fn summary_rows(doc: &WorkbookDocument) -> Vec<(&'static str, String)> {
    let s = &doc.summary;
    vec![
        ("sheet_count", s.sheet_count.to_string()),
        ("defined_name_count", s.defined_name_count.to_string()),
        ("cell_count", s.cell_count.to_string()),
        ("merge_count", s.merge_count.to_string()),
        ("formula_count", s.formula_count.to_string()),
        ("drawing_object_count", s.drawing_object_count.to_string()),
        ("connector_count", s.connector_count.to_string()),
        ("embedded_image_count", s.embedded_image_count.to_string()),
        ("region_count", s.region_count.to_string()),
        ("unsupported_count", s.unsupported_count.to_string()),
        ("warning_count", s.warning_count.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceMetadata, Summary};
    use std::collections::BTreeMap;

    fn empty_doc() -> WorkbookDocument {
        WorkbookDocument {
            source_metadata: SourceMetadata::default(),
            date1904: true,
            styles_xml_equivalent: None,
            style_css_map: BTreeMap::new(),
            style_numfmt_map: BTreeMap::new(),
            defined_names: Vec::new(),
            sheets: Vec::new(),
            warnings: vec!["w1".to_string()],
            summary: Summary::compute(&[], 0, 1),
        }
    }

    #[test]
    fn test_json_output() {
        let config = ConversionConfig {
            output_format: OutputFormat::Json,
            ..ConversionConfig::default()
        };
        let mut out = Vec::new();
        OutputFormatter::from_config(&config)
            .render(&empty_doc(), &mut out)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["date1904"], true);
        assert_eq!(value["summary"]["warning_count"], 1);
        assert_eq!(value["warnings"][0], "w1");
    }

    #[test]
    fn test_summary_rows_order() {
        let rows = summary_rows(&empty_doc());
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0], ("sheet_count", "0".to_string()));
        assert_eq!(rows[10], ("warning_count", "1".to_string()));
    }
}
