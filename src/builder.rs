//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。

use crate::api::{
    ConnectorEndpoints, DateFormat, FormulaMode, ImageMode, MergeStrategy, OutputFormat,
    OutputMode, SheetSelector,
};
use crate::error::XlsxToMdError;
use crate::output::OutputFormatter;
use crate::parser::WorkbookParser;
use crate::security::SecurityConfig;
use crate::types::WorkbookDocument;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// 領域テーブルのセル結合戦略
    pub merge_strategy: MergeStrategy,

    /// 日付形式
    pub date_format: DateFormat,

    /// 数式出力モード
    pub formula_mode: FormulaMode,

    /// 非表示シートを含めるか
    pub include_hidden_sheets: bool,

    /// 出力フォーマット
    pub output_format: OutputFormat,

    /// Markdown出力のモード
    pub output_mode: OutputMode,

    /// 画像の埋め込み方法
    pub image_mode: ImageMode,

    /// 未対応要素をエラーとして扱うか
    pub strict_unsupported: bool,

    /// コネクタ端点からノードまでの最大距離（px）
    pub connector_threshold_px: f64,

    /// コネクタ端点の求め方
    pub connector_endpoints: ConnectorEndpoints,

    /// 既定の列幅（px）
    pub default_col_width_px: f64,

    /// 既定の行高（px）
    pub default_row_height_px: f64,

    /// パッケージ読み込み時のセキュリティ制限
    pub security: SecurityConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            sheet_selector: SheetSelector::All,
            merge_strategy: MergeStrategy::DataDuplication,
            date_format: DateFormat::Iso8601,
            formula_mode: FormulaMode::CachedValue,
            include_hidden_sheets: true,
            output_format: OutputFormat::Markdown,
            output_mode: OutputMode::Work,
            image_mode: ImageMode::DataUri,
            strict_unsupported: false,
            connector_threshold_px: 220.0,
            connector_endpoints: ConnectorEndpoints::Anchor,
            default_col_width_px: 64.0,
            default_row_height_px: 20.0,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxsight::{ConverterBuilder, OutputMode, SheetSelector};
///
/// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
/// let converter = ConverterBuilder::new()
///     .with_sheet_selector(SheetSelector::Index(0))
///     .with_output_mode(OutputMode::Full)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート選択: すべてのシート
    /// - 非表示シート: 含める
    /// - 出力: Markdown（作業用モード）
    /// - 画像: data URIとして埋め込む
    /// - 未対応要素: 記録のみ（エラーにしない）
    /// - セル結合戦略: データ重複フィル
    /// - 日付形式: ISO 8601 (YYYY-MM-DD)
    /// - 数式モード: キャッシュ値を出力
    /// - コネクタ推論の閾値: 220px、既定の列幅: 64px、既定の行高: 20px
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// 変換対象のシートを選択する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::{ConverterBuilder, SheetSelector};
    ///
    /// // 単一シートを名前で指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Name("Sheet1".to_string()));
    ///
    /// // 複数シートを指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Indices(vec![0, 2]));
    /// ```
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// 領域テーブルでのセル結合の処理戦略を指定する
    pub fn with_merge_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.config.merge_strategy = strategy;
        self
    }

    /// 日付の出力形式を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::{ConverterBuilder, DateFormat};
    ///
    /// let builder = ConverterBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()));
    /// ```
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.config.date_format = format;
        self
    }

    /// 数式セルの出力モードを指定する
    pub fn with_formula_mode(mut self, mode: FormulaMode) -> Self {
        self.config.formula_mode = mode;
        self
    }

    /// 非表示シート（`hidden`、`veryHidden`）を含めるかを指定する
    ///
    /// 非表示の行と列は常にモデルに記録されます。
    pub fn include_hidden_sheets(mut self, include: bool) -> Self {
        self.config.include_hidden_sheets = include;
        self
    }

    /// 未対応要素を検出したときに変換を失敗させるかを指定する
    ///
    /// `true`の場合、全シートの未対応要素が1つでもあれば
    /// `XlsxToMdError::StrictUnsupportedElements`を返します。
    pub fn strict_unsupported(mut self, strict: bool) -> Self {
        self.config.strict_unsupported = strict;
        self
    }

    /// 出力フォーマットを指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::{ConverterBuilder, OutputFormat};
    ///
    /// let builder = ConverterBuilder::new()
    ///     .with_output_format(OutputFormat::Html);
    /// ```
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Markdown出力のモードを指定する
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.config.output_mode = mode;
        self
    }

    /// 画像の埋め込み方法を指定する
    pub fn with_image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    /// コネクタ端点からノードまでの最大距離（px）を指定する
    pub fn with_connector_threshold(mut self, px: f64) -> Self {
        self.config.connector_threshold_px = px;
        self
    }

    /// コネクタ端点の求め方を指定する
    pub fn with_connector_endpoints(mut self, mode: ConnectorEndpoints) -> Self {
        self.config.connector_endpoints = mode;
        self
    }

    /// アンカー座標の変換に使う既定の列幅と行高（px）を指定する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::ConverterBuilder;
    ///
    /// let builder = ConverterBuilder::new()
    ///     .with_default_cell_size(72.0, 24.0)
    ///     .with_connector_threshold(300.0);
    /// ```
    pub fn with_default_cell_size(mut self, col_width_px: f64, row_height_px: f64) -> Self {
        self.config.default_col_width_px = col_width_px;
        self.config.default_row_height_px = row_height_px;
        self
    }

    /// 設定を検証し、`Converter`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `XlsxToMdError::Config(String)`: 設定の検証に失敗した場合
    ///   * コネクタ閾値、列幅、行高が正の有限値ではない
    ///   * カスタム日付形式が空、または不正な書式文字列
    pub fn build(self) -> Result<Converter, XlsxToMdError> {
        // 1. 数値設定の検証
        let sizes = [
            ("connector threshold", self.config.connector_threshold_px),
            ("default column width", self.config.default_col_width_px),
            ("default row height", self.config.default_row_height_px),
        ];
        for (label, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(XlsxToMdError::Config(format!(
                    "Invalid {}: {} (must be a positive number)",
                    label, value
                )));
            }
        }

        // 2. カスタム日付形式の検証
        if let DateFormat::Custom(ref format_str) = self.config.date_format {
            let test_date = NaiveDate::from_ymd_opt(2025, 1, 1)
                .ok_or_else(|| XlsxToMdError::Config("Failed to create test date".to_string()))?;
            // 不正な指定子はDisplay時にエラーになるため、write!で検出する
            let mut formatted = String::new();
            let ok = std::fmt::Write::write_fmt(
                &mut formatted,
                format_args!("{}", test_date.format(format_str)),
            )
            .is_ok();
            if !ok || formatted.is_empty() {
                return Err(XlsxToMdError::Config(format!(
                    "Invalid date format string: '{}'",
                    format_str
                )));
            }
        }

        Ok(Converter::new(self.config))
    }
}

/// 変換処理のファサード
///
/// `.xlsx`パッケージを解析して`WorkbookDocument`を構築し、
/// 設定された形式（Markdown、HTML、JSON）で出力します。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxsight::ConverterBuilder;
/// use std::fs::File;
///
/// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
/// let converter = ConverterBuilder::new().build()?;
/// let input = File::open("example.xlsx")?;
/// let mut output = Vec::new();
/// converter.convert(input, &mut output)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// パッケージを解析してドキュメントモデルを返す
    ///
    /// # エラー
    ///
    /// * `UnsupportedFormat` - ZIPパッケージではない
    /// * `MissingPart` - ワークブックパーツが存在しない
    /// * `StrictUnsupportedElements` - strictモードで未対応要素を検出した
    /// * `SecurityViolation` - セキュリティ制限に違反した
    pub fn parse<R: Read + Seek>(&self, input: R) -> Result<WorkbookDocument, XlsxToMdError> {
        self.parse_reader(input, None)
    }

    /// `.xlsx`ファイルを解析してドキュメントモデルを返す
    ///
    /// 拡張子が`.xlsx`（大文字小文字を区別しない）でない場合、
    /// ファイルを開かずに`UnsupportedFormat`を返します。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::ConverterBuilder;
    ///
    /// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let doc = converter.parse_path("report.xlsx")?;
    /// for sheet in &doc.sheets {
    ///     println!("{}: {} cells", sheet.name, sheet.cells.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse_path<P: AsRef<Path>>(&self, path: P) -> Result<WorkbookDocument, XlsxToMdError> {
        let path = path.as_ref();
        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx"));
        if !is_xlsx {
            return Err(XlsxToMdError::UnsupportedFormat(
                path.display().to_string(),
            ));
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let file = File::open(path)?;
        self.parse_reader(file, file_name)
    }

    fn parse_reader<R: Read>(
        &self,
        mut input: R,
        file_name: Option<String>,
    ) -> Result<WorkbookDocument, XlsxToMdError> {
        // 入力データをメモリに読み込む（シートの並列処理のため）
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer)?;
        WorkbookParser::new(&self.config).parse_bytes(&buffer, file_name)
    }

    /// 解析済みのドキュメントを設定された形式で出力する
    pub fn render<W: Write>(
        &self,
        doc: &WorkbookDocument,
        output: W,
    ) -> Result<(), XlsxToMdError> {
        let mut writer = BufWriter::new(output);
        OutputFormatter::from_config(&self.config).render(doc, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// パッケージを変換して`output`に書き込む
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::ConverterBuilder;
    /// use std::io::Cursor;
    ///
    /// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let excel_data: Vec<u8> = vec![]; // .xlsxのバイト列
    /// let mut markdown_output = Vec::new();
    /// converter.convert(Cursor::new(excel_data), &mut markdown_output)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert<R: Read + Seek, W: Write>(
        &self,
        input: R,
        output: W,
    ) -> Result<(), XlsxToMdError> {
        let doc = self.parse(input)?;
        self.render(&doc, output)
    }

    /// `.xlsx`ファイルを変換して`output`に書き込む
    pub fn convert_path<P: AsRef<Path>, W: Write>(
        &self,
        path: P,
        output: W,
    ) -> Result<(), XlsxToMdError> {
        let doc = self.parse_path(path)?;
        self.render(&doc, output)
    }

    /// パッケージを変換して文字列で返す
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::fs::File;
    /// use xlsxsight::ConverterBuilder;
    ///
    /// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let input = File::open("example.xlsx")?;
    /// let markdown = converter.convert_to_string(input)?;
    /// println!("{}", markdown);
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert_to_string<R: Read + Seek>(&self, input: R) -> Result<String, XlsxToMdError> {
        let mut buffer = Vec::new();
        self.convert(input, &mut buffer)?;

        let result = String::from_utf8(buffer).map_err(|e| {
            XlsxToMdError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converter_builder_new() {
        let builder = ConverterBuilder::new();
        assert_eq!(builder.config.sheet_selector, SheetSelector::All);
        assert_eq!(
            builder.config.merge_strategy,
            MergeStrategy::DataDuplication
        );
        assert_eq!(builder.config.date_format, DateFormat::Iso8601);
        assert_eq!(builder.config.formula_mode, FormulaMode::CachedValue);
        assert_eq!(builder.config.output_mode, OutputMode::Work);
        assert_eq!(builder.config.image_mode, ImageMode::DataUri);
        assert!(builder.config.include_hidden_sheets);
        assert!(!builder.config.strict_unsupported);
        assert_eq!(builder.config.connector_threshold_px, 220.0);
        assert_eq!(builder.config.connector_endpoints, ConnectorEndpoints::Anchor);
        assert_eq!(builder.config.default_col_width_px, 64.0);
        assert_eq!(builder.config.default_row_height_px, 20.0);
    }

    #[test]
    fn test_with_sheet_selector() {
        let builder =
            ConverterBuilder::new().with_sheet_selector(SheetSelector::Name("Sheet1".to_string()));
        assert!(matches!(
            builder.config.sheet_selector,
            SheetSelector::Name(ref name) if name == "Sheet1"
        ));
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = ConverterBuilder::new()
            .with_merge_strategy(MergeStrategy::HtmlFallback)
            .with_formula_mode(FormulaMode::Formula)
            .with_output_format(OutputFormat::Html)
            .with_output_mode(OutputMode::SheetView)
            .include_hidden_sheets(false)
            .strict_unsupported(true)
            .with_connector_threshold(150.0)
            .with_connector_endpoints(ConnectorEndpoints::FlipAware)
            .with_default_cell_size(80.0, 18.0)
            .with_image_mode(ImageMode::DataUri);

        assert_eq!(builder.config.merge_strategy, MergeStrategy::HtmlFallback);
        assert_eq!(builder.config.formula_mode, FormulaMode::Formula);
        assert_eq!(builder.config.output_format, OutputFormat::Html);
        assert_eq!(builder.config.output_mode, OutputMode::SheetView);
        assert!(!builder.config.include_hidden_sheets);
        assert!(builder.config.strict_unsupported);
        assert_eq!(builder.config.connector_threshold_px, 150.0);
        assert_eq!(builder.config.connector_endpoints, ConnectorEndpoints::FlipAware);
        assert_eq!(builder.config.default_col_width_px, 80.0);
        assert_eq!(builder.config.default_row_height_px, 18.0);
    }

    #[test]
    fn test_build_success() {
        assert!(ConverterBuilder::new().build().is_ok());
    }

    #[test]
    fn test_build_rejects_non_positive_sizes() {
        for builder in [
            ConverterBuilder::new().with_connector_threshold(0.0),
            ConverterBuilder::new().with_connector_threshold(f64::NAN),
            ConverterBuilder::new().with_default_cell_size(-1.0, 20.0),
            ConverterBuilder::new().with_default_cell_size(64.0, 0.0),
        ] {
            match builder.build() {
                Err(XlsxToMdError::Config(msg)) => assert!(msg.contains("positive")),
                other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_build_with_valid_custom_date_format() {
        let result = ConverterBuilder::new()
            .with_date_format(DateFormat::Custom("%Y/%m/%d".to_string()))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_with_invalid_custom_date_format() {
        // 空のフォーマット文字列は無効
        let result = ConverterBuilder::new()
            .with_date_format(DateFormat::Custom("".to_string()))
            .build();
        match result {
            Err(XlsxToMdError::Config(msg)) => {
                assert!(msg.contains("Invalid date format"));
            }
            _ => panic!("Expected Config error"),
        }

        let result = ConverterBuilder::new()
            .with_date_format(DateFormat::Custom("%Q".to_string()))
            .build();
        assert!(matches!(result, Err(XlsxToMdError::Config(_))));
    }

    #[test]
    fn test_parse_path_rejects_other_extensions() {
        let converter = ConverterBuilder::new().build().unwrap();
        let result = converter.parse_path("report.csv");
        assert!(matches!(result, Err(XlsxToMdError::UnsupportedFormat(_))));
        // 拡張子の判定はファイルを開く前に行う
        let result = converter.parse_path("does-not-exist.xls");
        assert!(matches!(result, Err(XlsxToMdError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_converter_convert_to_string_with_invalid_input() {
        let converter = ConverterBuilder::new().build().unwrap();
        let invalid_input: Vec<u8> = b"not a zip".to_vec();
        let result = converter.convert_to_string(std::io::Cursor::new(invalid_input));
        assert!(matches!(result, Err(XlsxToMdError::UnsupportedFormat(_))));
    }
}
