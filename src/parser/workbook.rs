//! Workbook Parser Module
//!
//! パッケージ全体を読み込み、`WorkbookDocument`を組み立てるオーケストレーター。
//! ワークブックレベルのパーツを依存順に読み込んだ後、シートごとの解析を
//! rayonで並列に実行し、結果をシート順にマージします。

use std::collections::HashMap;

use rayon::prelude::*;

use crate::api::{ImageMode, SheetSelector};
use crate::builder::ConversionConfig;
use crate::connector::{build_mermaid, infer_connectors};
use crate::error::XlsxToMdError;
use crate::format::DateContext;
use crate::formatter::CellFormatter;
use crate::reference::parse_sheet_scoped_range;
use crate::region::build_regions;
use crate::types::{DefinedName, SheetDocument, SheetState, Summary, WorkbookDocument};
use crate::xml::XmlNode;

use super::drawing::{parse_drawing, DrawingContext, Geometry};
use super::package::{Package, Relationship};
use super::shared_strings::parse_shared_strings;
use super::styles::StyleTables;
use super::theme::ThemePalette;
use super::worksheet::parse_worksheet;

const DEFAULT_WORKBOOK_PATH: &str = "xl/workbook.xml";
const DEFAULT_SHARED_STRINGS_PATH: &str = "xl/sharedStrings.xml";
const DEFAULT_STYLES_PATH: &str = "xl/styles.xml";
const DEFAULT_THEME_PATH: &str = "xl/theme/theme1.xml";

/// `<sheets>`の1エントリ
#[derive(Debug, Clone)]
struct SheetRef {
    index: usize,
    name: String,
    state: SheetState,
    path: String,
}

/// シートごとの解析結果
struct SheetOutcome {
    sheet: SheetDocument,
    warnings: Vec<String>,
}

/// ワークブックレベルの共有データ（全シートから参照される読み取り専用の状態）
struct WorkbookContext<'a> {
    package: &'a Package,
    shared_strings: Vec<String>,
    theme: ThemePalette,
    styles: StyleTables,
    date1904: bool,
    config: &'a ConversionConfig,
}

/// ワークブック解析器
///
/// 変換設定を保持し、バイト列から`WorkbookDocument`を構築します。
pub(crate) struct WorkbookParser<'c> {
    config: &'c ConversionConfig,
}

impl<'c> WorkbookParser<'c> {
    pub fn new(config: &'c ConversionConfig) -> Self {
        Self { config }
    }

    /// パッケージのバイト列を解析する
    ///
    /// # 引数
    ///
    /// * `bytes` - `.xlsx`パッケージ全体
    /// * `file_name` - 来歴情報に記録するファイル名
    ///
    /// # エラー
    ///
    /// * `UnsupportedFormat` - ZIPパッケージではない
    /// * `MissingPart` - ワークブックパーツが存在しない
    /// * `Config` - シート選択が存在しないシートを指している
    /// * `StrictUnsupportedElements` - strictモードで未対応要素を検出した
    pub fn parse_bytes(
        &self,
        bytes: &[u8],
        file_name: Option<String>,
    ) -> Result<WorkbookDocument, XlsxToMdError> {
        let package = Package::from_bytes(bytes, file_name, &self.config.security)?;
        let mut warnings = Vec::new();

        // 1. ワークブックパーツ
        let workbook_path = package
            .relationships("")?
            .into_iter()
            .find(|rel| rel.is_type("officeDocument") && !rel.external)
            .map(|rel| rel.target)
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PATH.to_string());
        let workbook = package
            .parse_part(&workbook_path)?
            .ok_or_else(|| XlsxToMdError::MissingPart(workbook_path.clone()))?;
        let workbook_rels = package.relationships(&workbook_path)?;

        // 2. 共有文字列、テーマ、スタイル
        let shared_strings_path =
            part_by_type(&workbook_rels, "sharedStrings", DEFAULT_SHARED_STRINGS_PATH);
        let shared_strings = match package.part(&shared_strings_path) {
            Some(xml) => parse_shared_strings(xml)?,
            None => Vec::new(),
        };

        let theme_path = part_by_type(&workbook_rels, "theme", DEFAULT_THEME_PATH);
        let theme = package
            .parse_part(&theme_path)?
            .map(|root| ThemePalette::from_xml(&root))
            .unwrap_or_default();

        let styles_path = part_by_type(&workbook_rels, "styles", DEFAULT_STYLES_PATH);
        let styles_xml = package.parse_part(&styles_path)?;
        let styles = styles_xml
            .as_ref()
            .map(|root| StyleTables::from_xml(root, &theme))
            .unwrap_or_default();

        let date1904 = workbook
            .child("workbookPr")
            .is_some_and(|pr| pr.attr_flag("date1904"));
        log::debug!(
            "workbook {}: {} shared strings, {} styles, date1904={}",
            workbook_path,
            shared_strings.len(),
            styles.numfmt_map.len(),
            date1904
        );

        // 3. シート一覧と定義名
        let sheet_refs = collect_sheet_refs(&workbook, &workbook_rels, &mut warnings);
        let defined_names = collect_defined_names(&workbook);
        let selected = self.select_sheets(&sheet_refs)?;

        // 4. シートごとの解析（並列）
        let ctx = WorkbookContext {
            package: &package,
            shared_strings,
            theme,
            styles,
            date1904,
            config: self.config,
        };
        let mut outcomes = selected
            .par_iter()
            .map(|sheet_ref| parse_sheet(&ctx, sheet_ref, &defined_names))
            .collect::<Result<Vec<_>, _>>()?;
        outcomes.sort_by_key(|o| o.sheet.index);

        let mut sheets = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            warnings.extend(outcome.warnings);
            sheets.push(outcome.sheet);
        }

        // 5. サマリーとstrictチェック
        let summary = Summary::compute(&sheets, defined_names.len(), warnings.len());
        if self.config.strict_unsupported && summary.unsupported_count > 0 {
            return Err(XlsxToMdError::StrictUnsupportedElements {
                count: summary.unsupported_count,
            });
        }

        let WorkbookContext { styles, .. } = ctx;
        Ok(WorkbookDocument {
            source_metadata: package.metadata().clone(),
            date1904,
            styles_xml_equivalent: styles_xml,
            style_css_map: styles.css_map,
            style_numfmt_map: styles.numfmt_map,
            defined_names,
            sheets,
            warnings,
            summary,
        })
    }

    /// シート選択と非表示シートの除外を適用する
    fn select_sheets(&self, refs: &[SheetRef]) -> Result<Vec<SheetRef>, XlsxToMdError> {
        let by_index = |index: usize| -> Result<SheetRef, XlsxToMdError> {
            refs.iter()
                .find(|r| r.index == index)
                .cloned()
                .ok_or_else(|| {
                    XlsxToMdError::Config(format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        refs.len()
                    ))
                })
        };
        let by_name = |name: &str| -> Result<SheetRef, XlsxToMdError> {
            refs.iter()
                .find(|r| r.name == name)
                .cloned()
                .ok_or_else(|| XlsxToMdError::Config(format!("Sheet '{}' not found", name)))
        };

        let mut selected = match &self.config.sheet_selector {
            SheetSelector::All => refs.to_vec(),
            SheetSelector::Index(index) => vec![by_index(*index)?],
            SheetSelector::Name(name) => vec![by_name(name)?],
            SheetSelector::Indices(indices) => indices
                .iter()
                .map(|&i| by_index(i))
                .collect::<Result<Vec<_>, _>>()?,
            SheetSelector::Names(names) => names
                .iter()
                .map(|n| by_name(n))
                .collect::<Result<Vec<_>, _>>()?,
        };

        selected.sort_by_key(|r| r.index);
        selected.dedup_by_key(|r| r.index);
        if !self.config.include_hidden_sheets {
            selected.retain(|r| r.state == SheetState::Visible);
        }
        Ok(selected)
    }
}

/// リレーションシップ型の末尾で対象パーツを探し、なければ既定パスを返す
fn part_by_type(rels: &[Relationship], type_suffix: &str, default: &str) -> String {
    rels.iter()
        .find(|rel| rel.is_type(type_suffix) && !rel.external)
        .map(|rel| rel.target.clone())
        .unwrap_or_else(|| default.to_string())
}

fn collect_sheet_refs(
    workbook: &XmlNode,
    rels: &[Relationship],
    warnings: &mut Vec<String>,
) -> Vec<SheetRef> {
    let targets: HashMap<&str, &str> = rels
        .iter()
        .filter(|rel| !rel.external)
        .map(|rel| (rel.id.as_str(), rel.target.as_str()))
        .collect();

    let Some(sheets) = workbook.child("sheets") else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    for (index, node) in sheets.children_named("sheet").enumerate() {
        let name = node
            .attr("name")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sheet{}", index + 1));
        let target = node.attr("r:id").and_then(|id| targets.get(id));
        let Some(path) = target else {
            let warning = format!("Unresolved sheet relationship: {}", name);
            log::warn!("{}", warning);
            warnings.push(warning);
            continue;
        };
        refs.push(SheetRef {
            index,
            name,
            state: SheetState::from_attr(node.attr("state")),
            path: path.to_string(),
        });
    }
    refs
}

fn collect_defined_names(workbook: &XmlNode) -> Vec<DefinedName> {
    let Some(names) = workbook.child("definedNames") else {
        return Vec::new();
    };
    names
        .children_named("definedName")
        .filter_map(|node| {
            Some(DefinedName {
                name: node.attr("name")?.to_string(),
                value: node.text_or_empty().trim().to_string(),
                local_sheet_id: node.attr_parse("localSheetId"),
            })
        })
        .collect()
}

fn parse_sheet(
    ctx: &WorkbookContext<'_>,
    sheet_ref: &SheetRef,
    defined_names: &[DefinedName],
) -> Result<SheetOutcome, XlsxToMdError> {
    let mut sheet = SheetDocument::new(
        sheet_ref.index,
        sheet_ref.name.clone(),
        sheet_ref.state,
        sheet_ref.path.clone(),
    );
    let mut warnings = Vec::new();

    for name in defined_names {
        if name.local_sheet_id.map(|id| id as usize) != Some(sheet_ref.index) {
            continue;
        }
        match name.name.as_str() {
            "_xlnm.Print_Area" => sheet
                .print
                .print_areas
                .extend(parse_sheet_scoped_range(&name.value)),
            "_xlnm.Print_Titles" => sheet.print.print_titles.push(name.value.clone()),
            _ => {}
        }
    }

    let Some(xml) = ctx.package.part(&sheet_ref.path) else {
        let warning = format!("Missing worksheet part: {}", sheet_ref.path);
        log::warn!("{}", warning);
        warnings.push(warning);
        return Ok(SheetOutcome { sheet, warnings });
    };

    let date_ctx = DateContext {
        date1904: ctx.date1904,
        date_format: &ctx.config.date_format,
    };
    let mut formatter = CellFormatter::new(&ctx.shared_strings, &ctx.styles, date_ctx);
    parse_worksheet(xml, &mut sheet, &mut formatter)?;
    log::debug!(
        "sheet '{}': {} cells, {} merges",
        sheet.name,
        sheet.cells.len(),
        sheet.merges.len()
    );

    sheet.regions = build_regions(&sheet);

    let drawing_ctx = DrawingContext {
        package: ctx.package,
        theme: &ctx.theme,
        geometry: Geometry {
            col_width_px: ctx.config.default_col_width_px,
            row_height_px: ctx.config.default_row_height_px,
        },
        embed_images: matches!(ctx.config.image_mode, ImageMode::DataUri),
    };
    let mut diagrams = Vec::new();
    for rel in ctx.package.relationships(&sheet_ref.path)? {
        if rel.external || !rel.is_type("drawing") {
            continue;
        }
        let Some(drawing_xml) = ctx.package.part(&rel.target) else {
            let warning = format!("Missing drawing part: {}", rel.target);
            log::warn!("{}", warning);
            warnings.push(warning);
            continue;
        };

        let mut part = parse_drawing(&drawing_ctx, &rel.target, drawing_xml)?;
        warnings.append(&mut part.warnings);
        warnings.extend(infer_connectors(
            &part.objects,
            &mut part.connectors,
            &drawing_ctx.geometry,
            ctx.config.connector_threshold_px,
            ctx.config.connector_endpoints,
        ));
        if let Some(diagram) = build_mermaid(&part.objects, &part.connectors) {
            diagrams.push(diagram);
        }
        sheet.drawings.append(&mut part.objects);
        sheet.connectors.append(&mut part.connectors);
        sheet.unsupported.append(&mut part.unsupported);
    }
    if !diagrams.is_empty() {
        sheet.mermaid = Some(diagrams.join("\n\n"));
    }

    Ok(SheetOutcome { sheet, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellType;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, body) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr date1904="0"/>
<sheets>
<sheet name="First" sheetId="1" r:id="rId1"/>
<sheet name="Secret" sheetId="2" state="hidden" r:id="rId2"/>
<sheet name="Lost" sheetId="3" r:id="rId9"/>
</sheets>
<definedNames>
<definedName name="_xlnm.Print_Area" localSheetId="0">First!$A$1:$B$2</definedName>
<definedName name="Total">First!$B$2</definedName>
</definedNames>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

    const SHEET1: &str = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1"><v>42</v></c></row>
<row r="2"><c r="B2"><f>B1*2</f><v>84</v></c></row>
</sheetData></worksheet>"#;

    const SHEET2: &str = r#"<worksheet><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>hidden</t></is></c></row></sheetData></worksheet>"#;

    const SST: &str = r#"<sst><si><t>Hello</t></si></sst>"#;

    fn package() -> Vec<u8> {
        build(&[
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
            ("xl/sharedStrings.xml", SST),
        ])
    }

    #[test]
    fn test_parse_minimal_workbook() {
        let config = ConversionConfig::default();
        let doc = WorkbookParser::new(&config)
            .parse_bytes(&package(), Some("book.xlsx".to_string()))
            .unwrap();

        assert_eq!(doc.sheets.len(), 2);
        let first = &doc.sheets[0];
        assert_eq!(first.name, "First");
        assert_eq!(first.cell("A1").unwrap().value, "Hello");
        assert_eq!(first.cell("A1").unwrap().cell_type, CellType::SharedString);
        assert_eq!(first.cell("B2").unwrap().formula.as_deref(), Some("B1*2"));
        assert_eq!(first.print.print_areas[0].reference, "A1:B2");
        assert_eq!(doc.sheets[1].state, SheetState::Hidden);

        assert_eq!(doc.defined_names.len(), 2);
        assert_eq!(doc.warnings, vec!["Unresolved sheet relationship: Lost"]);
        assert_eq!(doc.summary.sheet_count, 2);
        assert_eq!(doc.summary.cell_count, 4);
        assert_eq!(doc.summary.formula_count, 1);
        assert_eq!(doc.summary.warning_count, 1);
        assert_eq!(doc.source_metadata.file_name.as_deref(), Some("book.xlsx"));
        assert_eq!(doc.source_metadata.zip_entries, 6);
    }

    #[test]
    fn test_hidden_sheets_can_be_excluded() {
        let config = ConversionConfig {
            include_hidden_sheets: false,
            ..ConversionConfig::default()
        };
        let doc = WorkbookParser::new(&config)
            .parse_bytes(&package(), None)
            .unwrap();
        let names: Vec<&str> = doc.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["First"]);
    }

    #[test]
    fn test_sheet_selector() {
        let config = ConversionConfig {
            sheet_selector: SheetSelector::Name("Secret".to_string()),
            ..ConversionConfig::default()
        };
        let doc = WorkbookParser::new(&config)
            .parse_bytes(&package(), None)
            .unwrap();
        assert_eq!(doc.sheets.len(), 1);
        assert_eq!(doc.sheets[0].index, 1);

        let config = ConversionConfig {
            sheet_selector: SheetSelector::Index(7),
            ..ConversionConfig::default()
        };
        let err = WorkbookParser::new(&config)
            .parse_bytes(&package(), None)
            .unwrap_err();
        assert!(matches!(err, XlsxToMdError::Config(_)));
    }

    #[test]
    fn test_workbook_falls_back_to_default_path() {
        let bytes = build(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let config = ConversionConfig::default();
        let doc = WorkbookParser::new(&config).parse_bytes(&bytes, None).unwrap();
        // sharedStrings.xmlがないので空文字列になる
        assert_eq!(doc.sheets[0].cell("A1").unwrap().value, "");
        assert!(doc.styles_xml_equivalent.is_none());
    }

    #[test]
    fn test_missing_workbook_part() {
        let bytes = build(&[("_rels/.rels", ROOT_RELS), ("docProps/app.xml", "<Properties/>")]);
        let config = ConversionConfig::default();
        let err = WorkbookParser::new(&config).parse_bytes(&bytes, None).unwrap_err();
        match err {
            XlsxToMdError::MissingPart(path) => assert_eq!(path, "xl/workbook.xml"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_strict_mode_counts_unsupported() {
        let sheet = r#"<worksheet><sheetData/><mysteryElement foo="1"/><anotherOne/></worksheet>"#;
        let bytes = build(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let lenient = ConversionConfig::default();
        let doc = WorkbookParser::new(&lenient).parse_bytes(&bytes, None).unwrap();
        assert_eq!(doc.summary.unsupported_count, 2);

        let strict = ConversionConfig {
            strict_unsupported: true,
            ..ConversionConfig::default()
        };
        let err = WorkbookParser::new(&strict).parse_bytes(&bytes, None).unwrap_err();
        assert!(matches!(
            err,
            XlsxToMdError::StrictUnsupportedElements { count: 2 }
        ));
    }

    #[test]
    fn test_missing_drawing_part_is_a_warning() {
        let sheet_rels = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing1.xml"/>
</Relationships>"#;
        let bytes = build(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/_rels/sheet1.xml.rels", sheet_rels),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let config = ConversionConfig::default();
        let doc = WorkbookParser::new(&config).parse_bytes(&bytes, None).unwrap();
        assert!(doc
            .warnings
            .contains(&"Missing drawing part: xl/drawings/drawing1.xml".to_string()));
        assert!(doc.sheets[0].mermaid.is_none());
    }
}
