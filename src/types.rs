//! Types Module
//!
//! 解析結果のドキュメントモデル（ワークブック、シート、セル、描画オブジェクト、
//! コネクタ、領域）を定義するモジュール。
//!
//! すべての型は解析中に一度だけ構築され、以後は変更されません。
//! 例外はコネクタの推論フィールドで、推論パスが一度だけ書き込みます。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Serialize, Serializer};

use crate::reference::RangeRef;
use crate::xml::XmlNode;

/// セルの型タグ（`c@t`）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellType {
    /// `s`: 共有文字列インデックス
    SharedString,
    /// `n`: 数値（既定）
    Number,
    /// `b`: 論理値
    Boolean,
    /// `str`: 数式の文字列結果
    FormulaString,
    /// `inlineStr`: インライン文字列
    InlineString,
    /// `e`: エラー値
    Error,
    /// `d`: ISO 8601日付
    Date,
    /// 結合・入力規則の範囲から合成された、実体のないセル
    Virtual,
    /// 未知の型タグ（数値として扱う）
    Other(String),
}

impl CellType {
    /// `t`属性から型を決定する（省略時は`n`）
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.unwrap_or("n") {
            "s" => CellType::SharedString,
            "n" => CellType::Number,
            "b" => CellType::Boolean,
            "str" => CellType::FormulaString,
            "inlineStr" => CellType::InlineString,
            "e" => CellType::Error,
            "d" => CellType::Date,
            other => CellType::Other(other.to_string()),
        }
    }

    /// 生の型タグ
    pub fn as_str(&self) -> &str {
        match self {
            CellType::SharedString => "s",
            CellType::Number => "n",
            CellType::Boolean => "b",
            CellType::FormulaString => "str",
            CellType::InlineString => "inlineStr",
            CellType::Error => "e",
            CellType::Date => "d",
            CellType::Virtual => "virtual",
            CellType::Other(tag) => tag,
        }
    }
}

impl Serialize for CellType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// セル
#[derive(Debug, Clone, Serialize)]
pub struct Cell {
    /// A1形式の座標
    pub coord: String,
    /// 行番号（1始まり）
    pub row: u32,
    /// 列番号（1始まり）
    pub col: u32,
    pub cell_type: CellType,
    /// 表示値（表示書式適用後）
    pub value: String,
    /// 数式のソーステキスト
    pub formula: Option<String>,
    /// `<v>`の生の値
    pub cached_value: Option<String>,
    /// スタイルインデックス（`cellXfs`の位置）
    pub style_id: Option<u32>,
}

/// 定義された名前
#[derive(Debug, Clone, Serialize)]
pub struct DefinedName {
    pub name: String,
    pub value: String,
    /// シートローカルの名前の場合、`<sheets>`内の位置
    pub local_sheet_id: Option<u32>,
}

/// データの入力規則
#[derive(Debug, Clone, Serialize)]
pub struct DataValidation {
    #[serde(rename = "type")]
    pub validation_type: Option<String>,
    /// 生の`sqref`属性
    pub sqref: String,
    /// `sqref`を解析した範囲（解析できない要素は除外）
    pub ranges: Vec<RangeRef>,
    pub allow_blank: bool,
    pub show_error_message: bool,
    pub operator: Option<String>,
    pub formula1: Option<String>,
    pub formula2: Option<String>,
}

/// ウィンドウ枠の固定情報（`sheetView/pane`）
#[derive(Debug, Clone, Default, Serialize)]
pub struct Pane {
    pub x_split: Option<f64>,
    pub y_split: Option<f64>,
    pub top_left_cell: Option<String>,
    pub active_pane: Option<String>,
    pub state: Option<String>,
}

/// ヘッダー/フッターの左・中央・右セクション
///
/// `&P`などの制御コードは`{page}`のようなトークンに置き換えられます。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderFooterSections {
    pub left: String,
    pub center: String,
    pub right: String,
}

/// ヘッダー/フッターの1項目（`oddHeader`など）
#[derive(Debug, Clone, Serialize)]
pub struct HeaderFooterEntry {
    /// 要素名（`oddHeader`, `oddFooter`, `evenHeader`, ...）
    pub kind: String,
    /// 生の文字列
    pub raw: String,
    pub sections: HeaderFooterSections,
}

/// ヘッダー/フッター
#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaderFooter {
    pub attrs: BTreeMap<String, String>,
    pub entries: Vec<HeaderFooterEntry>,
}

/// 改ページ位置
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageBreaks {
    pub rows: Vec<u32>,
    pub cols: Vec<u32>,
}

/// 印刷関連のメタデータ
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrintMetadata {
    /// `_xlnm.Print_Area`
    pub print_areas: Vec<RangeRef>,
    /// `_xlnm.Print_Titles`（生の値）
    pub print_titles: Vec<String>,
    pub print_options: BTreeMap<String, String>,
    pub page_margins: BTreeMap<String, String>,
    pub page_setup: BTreeMap<String, String>,
    pub header_footer: Option<HeaderFooter>,
    pub page_breaks: PageBreaks,
}

impl PrintMetadata {
    /// 印刷メタデータが1つでも設定されているか
    pub fn is_empty(&self) -> bool {
        self.print_areas.is_empty()
            && self.print_titles.is_empty()
            && self.print_options.is_empty()
            && self.page_margins.is_empty()
            && self.page_setup.is_empty()
            && self.header_footer.is_none()
            && self.page_breaks.rows.is_empty()
            && self.page_breaks.cols.is_empty()
    }
}

/// アンカーの格子点（列・行は0始まり、オフセットはEMU）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnchorPoint {
    pub col: i64,
    pub row: i64,
    pub col_off: i64,
    pub row_off: i64,
}

/// ピクセル空間の外接矩形
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BoundingBox {
    /// 点から矩形までのユークリッド距離（内部なら0）
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = if x < self.x {
            self.x - x
        } else if x > self.x + self.w {
            x - (self.x + self.w)
        } else {
            0.0
        };
        let dy = if y < self.y {
            self.y - y
        } else if y > self.y + self.h {
            y - (self.y + self.h)
        } else {
            0.0
        };
        dx.hypot(dy)
    }
}

/// アンカーの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnchorKind {
    #[serde(rename = "twoCellAnchor")]
    TwoCell,
    #[serde(rename = "oneCellAnchor")]
    OneCell,
    #[serde(rename = "absoluteAnchor")]
    Absolute,
}

/// 描画オブジェクトの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrawingKind {
    #[serde(rename = "sp")]
    Shape,
    #[serde(rename = "cxnSp")]
    Connector,
    #[serde(rename = "pic")]
    Picture,
    #[serde(rename = "grpSp")]
    Group,
    #[serde(rename = "graphicFrame")]
    GraphicFrame,
}

impl DrawingKind {
    /// 要素のローカル名から種類を決定する
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sp" => Some(DrawingKind::Shape),
            "cxnSp" => Some(DrawingKind::Connector),
            "pic" => Some(DrawingKind::Picture),
            "grpSp" => Some(DrawingKind::Group),
            "graphicFrame" => Some(DrawingKind::GraphicFrame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrawingKind::Shape => "sp",
            DrawingKind::Connector => "cxnSp",
            DrawingKind::Picture => "pic",
            DrawingKind::Group => "grpSp",
            DrawingKind::GraphicFrame => "graphicFrame",
        }
    }
}

/// 図形の線・塗りつぶしスタイル
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShapeStyle {
    pub line_width_px: Option<f64>,
    pub line_color: Option<String>,
    pub line_dash: Option<String>,
    pub fill_color: Option<String>,
}

/// 描画パーツから抽出されたオブジェクト
#[derive(Debug, Clone, Serialize)]
pub struct DrawingObject {
    /// ドキュメント内で一意なID（`<drawingPath>:<id>`、重複時は`#2`以降を付与）
    pub object_uid: String,
    /// `cNvPr@id`
    pub object_id: String,
    pub drawing_path: String,
    pub kind: DrawingKind,
    pub name: Option<String>,
    pub text: Option<String>,
    pub anchor_type: AnchorKind,
    pub anchor_from: Option<AnchorPoint>,
    pub anchor_to: Option<AnchorPoint>,
    pub bbox: BoundingBox,
    /// グループの子の場合、親グループの`object_uid`
    pub parent_uid: Option<String>,
    pub image_target: Option<String>,
    pub image_content_type: Option<String>,
    pub image_data_uri: Option<String>,
    pub style: ShapeStyle,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_xml: String,
}

impl DrawingObject {
    /// 図の表示ラベル（テキスト > 名前 > ID）
    pub fn label(&self) -> &str {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.name.as_deref().filter(|n| !n.is_empty()))
            .unwrap_or(&self.object_id)
    }
}

/// コネクタの向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorDirection {
    /// 始点から終点へ（tailEndのみ矢印）
    Forward,
    /// 終点から始点へ（headEndのみ矢印）
    Reverse,
    /// 双方向
    Bidirectional,
    /// 矢印なし
    Undirected,
}

impl ConnectorDirection {
    /// 矢印の有無から向きを分類する
    pub fn classify(head: bool, tail: bool) -> Self {
        match (head, tail) {
            (true, true) => ConnectorDirection::Bidirectional,
            (false, true) => ConnectorDirection::Forward,
            (true, false) => ConnectorDirection::Reverse,
            (false, false) => ConnectorDirection::Undirected,
        }
    }
}

/// グラフの辺として再解釈されたコネクタ
#[derive(Debug, Clone, Serialize)]
pub struct ConnectorInfo {
    #[serde(flatten)]
    pub object: DrawingObject,
    /// `a:headEnd@type`
    pub arrow_head: Option<String>,
    /// `a:tailEnd@type`
    pub arrow_tail: Option<String>,
    /// `a:stCxn@id`（ファイルに記録された接続先ID）
    pub start_connection: Option<String>,
    /// `a:endCxn@id`
    pub end_connection: Option<String>,
    pub flip_h: bool,
    pub flip_v: bool,
    pub direction: ConnectorDirection,
    pub source_uid: Option<String>,
    pub target_uid: Option<String>,
    pub distance_source: Option<f64>,
    pub distance_target: Option<f64>,
    pub resolved: bool,
}

/// 未対応要素のスコープ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedScope {
    Worksheet,
    Drawing,
}

impl UnsupportedScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnsupportedScope::Worksheet => "worksheet",
            UnsupportedScope::Drawing => "drawing",
        }
    }
}

/// 未対応要素の記録
#[derive(Debug, Clone, Serialize)]
pub struct UnsupportedElement {
    pub scope: UnsupportedScope,
    /// パーツのパス
    pub location: String,
    /// ローカル名
    pub tag: String,
    pub raw_xml: String,
}

/// 領域内のセル行に付くフラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionFlag {
    Merged,
    DataValidation,
    HasValue,
    HasFormula,
    HasCached,
    NonDefaultStyle,
    Virtual,
}

/// 領域内の1セル
#[derive(Debug, Clone, Serialize)]
pub struct RegionCellRow {
    pub coord: String,
    pub row: u32,
    pub col: u32,
    pub value: String,
    pub formula: Option<String>,
    pub cached_value: Option<String>,
    pub cell_type: CellType,
    pub style_id: Option<u32>,
    pub merge_ref: Option<String>,
    pub flags: Vec<RegionFlag>,
}

/// 意味のあるセルの4連結成分
#[derive(Debug, Clone, Serialize)]
pub struct CellRegion {
    /// 1始まりの通し番号
    pub region_id: u32,
    pub bounds: RangeRef,
    pub rows: Vec<RegionCellRow>,
}

/// シートの表示状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetState {
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetState {
    /// `sheet@state`から決定する（省略時・未知の値は`visible`）
    pub fn from_attr(value: Option<&str>) -> Self {
        match value {
            Some("hidden") => SheetState::Hidden,
            Some("veryHidden") => SheetState::VeryHidden,
            _ => SheetState::Visible,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetState::Visible => "visible",
            SheetState::Hidden => "hidden",
            SheetState::VeryHidden => "veryHidden",
        }
    }
}

/// ワークシート1枚分のドキュメント
#[derive(Debug, Clone, Serialize)]
pub struct SheetDocument {
    /// `<sheets>`内の位置（0始まり）
    pub index: usize,
    pub name: String,
    pub state: SheetState,
    /// ワークシートパーツのパス
    pub path: String,
    pub dimension_ref: Option<String>,
    /// 文書順のセル（同一座標の重複を含む）
    pub cells: Vec<Cell>,
    /// 座標 -> `cells`内の位置（後の重複が上書き）
    #[serde(skip)]
    pub cell_map: HashMap<String, usize>,
    pub merges: Vec<RangeRef>,
    /// 結合範囲に覆われた座標（左上セルを除く） -> 結合範囲の参照文字列
    pub merge_map: BTreeMap<String, String>,
    pub row_heights: BTreeMap<u32, f64>,
    pub col_widths: BTreeMap<u32, f64>,
    pub hidden_rows: BTreeSet<u32>,
    pub hidden_cols: BTreeSet<u32>,
    pub pane: Option<Pane>,
    pub data_validations: Vec<DataValidation>,
    pub print: PrintMetadata,
    pub drawings: Vec<DrawingObject>,
    pub connectors: Vec<ConnectorInfo>,
    /// 解決済みコネクタから生成したフローチャート記述
    pub mermaid: Option<String>,
    pub regions: Vec<CellRegion>,
    pub unsupported: Vec<UnsupportedElement>,
}

impl SheetDocument {
    /// 空のシートドキュメント
    pub fn new(index: usize, name: String, state: SheetState, path: String) -> Self {
        Self {
            index,
            name,
            state,
            path,
            dimension_ref: None,
            cells: Vec::new(),
            cell_map: HashMap::new(),
            merges: Vec::new(),
            merge_map: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            hidden_rows: BTreeSet::new(),
            hidden_cols: BTreeSet::new(),
            pane: None,
            data_validations: Vec::new(),
            print: PrintMetadata::default(),
            drawings: Vec::new(),
            connectors: Vec::new(),
            mermaid: None,
            regions: Vec::new(),
            unsupported: Vec::new(),
        }
    }

    /// 座標でセルを引く
    pub fn cell(&self, coord: &str) -> Option<&Cell> {
        self.cell_map.get(coord).and_then(|&i| self.cells.get(i))
    }

    /// セルを追加する（同一座標は後勝ち）
    pub(crate) fn push_cell(&mut self, cell: Cell) {
        self.cell_map.insert(cell.coord.clone(), self.cells.len());
        self.cells.push(cell);
    }

    /// 座標が結合範囲の左上セルなら、その結合範囲を返す
    pub fn merge_anchored_at(&self, row: u32, col: u32) -> Option<&RangeRef> {
        self.merges
            .iter()
            .find(|m| m.start_row == row && m.start_col == col)
    }
}

/// 入力パッケージの来歴情報
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceMetadata {
    pub file_name: Option<String>,
    pub file_size_bytes: u64,
    /// パッケージ全体のSHA-256（16進小文字）
    pub sha256: String,
    pub zip_entries: usize,
}

/// ワークブック全体の集計値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub sheet_count: usize,
    pub defined_name_count: usize,
    pub cell_count: usize,
    pub merge_count: usize,
    pub formula_count: usize,
    pub drawing_object_count: usize,
    pub connector_count: usize,
    pub embedded_image_count: usize,
    pub region_count: usize,
    pub unsupported_count: usize,
    pub warning_count: usize,
}

impl Summary {
    /// シートと警告から集計する
    pub fn compute(sheets: &[SheetDocument], defined_names: usize, warnings: usize) -> Self {
        let mut summary = Summary {
            sheet_count: sheets.len(),
            defined_name_count: defined_names,
            warning_count: warnings,
            ..Summary::default()
        };
        for sheet in sheets {
            summary.cell_count += sheet.cells.len();
            summary.merge_count += sheet.merges.len();
            summary.formula_count += sheet.cells.iter().filter(|c| c.formula.is_some()).count();
            summary.drawing_object_count += sheet.drawings.len();
            summary.connector_count += sheet.connectors.len();
            summary.embedded_image_count += sheet
                .drawings
                .iter()
                .filter(|d| d.image_data_uri.is_some())
                .count();
            summary.region_count += sheet.regions.len();
            summary.unsupported_count += sheet.unsupported.len();
        }
        summary
    }
}

/// ワークブック全体のドキュメント
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookDocument {
    pub source_metadata: SourceMetadata,
    /// 1904年エポックを使用するか
    pub date1904: bool,
    /// スタイルパーツのツリー表現
    pub styles_xml_equivalent: Option<XmlNode>,
    /// スタイルインデックス -> CSS宣言
    pub style_css_map: BTreeMap<u32, String>,
    /// スタイルインデックス -> 表示書式文字列
    pub style_numfmt_map: BTreeMap<u32, String>,
    pub defined_names: Vec<DefinedName>,
    pub sheets: Vec<SheetDocument>,
    pub warnings: Vec<String>,
    pub summary: Summary,
}
