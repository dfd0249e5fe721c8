//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// セル結合の処理戦略
///
/// `OutputMode::Work`の領域テーブルで、結合セルをどう表現するかを指定します。
/// JSON出力とドキュメントモデルには影響しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MergeStrategy {
    /// 結合範囲に覆われたセルへアンカーの値を複製（デフォルト）
    ///
    /// 領域はパイプ形式のMarkdownテーブルになります。`A1:C1`が結合されている場合、
    /// B1とC1にもA1の表示値が入ります。
    ///
    /// ```markdown
    /// | 見出し | 見出し | 見出し |
    /// | ------ | ------ | ------ |
    /// | 1      | 2      | 3      |
    /// ```
    DataDuplication,

    /// 結合を含む領域だけをHTMLの`<table>`として出力
    ///
    /// アンカーセルに`rowspan`/`colspan`を付け、覆われたセルは省略します。
    /// 結合のない領域は引き続きMarkdownテーブルです。
    ///
    /// ```html
    /// <table>
    ///   <tr><td colspan="3">見出し</td></tr>
    ///   <tr><td>1</td><td>2</td><td>3</td></tr>
    /// </table>
    /// ```
    HtmlFallback,
}

/// 日付の出力形式
///
/// 日付書式が適用されたセルのうち、日付のみのセルの出力形式を指定します。
/// 時刻を含むセルは常に`YYYY-MM-DD HH:MM:SS`または`HH:MM:SS`になります。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DateFormat {
    /// ISO 8601形式（YYYY-MM-DD）
    ///
    /// 例: `2025-11-20`
    Iso8601,

    /// カスタム形式（chrono互換フォーマット文字列）
    ///
    /// chrono互換のフォーマット文字列を使用して、カスタム日付形式を指定します。
    ///
    /// # フォーマット指定子（主要なもの）
    ///
    /// - `%Y`: 4桁の年（例: 2025）
    /// - `%y`: 2桁の年（例: 25）
    /// - `%m`: 2桁の月（01-12）
    /// - `%d`: 2桁の日（01-31）
    /// - `%H`: 24時間形式の時（00-23）
    /// - `%M`: 分（00-59）
    /// - `%S`: 秒（00-59）
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxsight::{ConverterBuilder, DateFormat};
    ///
    /// # fn main() -> Result<(), xlsxsight::XlsxToMdError> {
    /// let converter = ConverterBuilder::new()
    ///     .with_date_format(DateFormat::Custom("%Y年%m月%d日".to_string()))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    Custom(String),
}

/// 数式セルの出力モード
///
/// 数式セルを表示する際に、キャッシュ値と数式のどちらを使うかを指定します。
/// ドキュメントモデルには常に両方が保持されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FormulaMode {
    /// キャッシュされた結果値を出力（デフォルト）
    ///
    /// 数式セルの計算結果（キャッシュされた値）を出力します。
    /// 例: `=SUM(A1:A10)` → `100`
    CachedValue,

    /// 数式文字列を出力
    ///
    /// 数式そのものを`=`付きの文字列として出力します。
    /// 例: `=SUM(A1:A10)` → `=SUM(A1:A10)`
    Formula,
}

/// シート選択方式
///
/// 解析対象のシートを選択する方法を指定します。
/// インデックスは`<sheets>`内の位置です。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetSelector {
    /// すべてのシートを変換（デフォルト）
    All,

    /// インデックス指定（0始まり）
    ///
    /// 例: `SheetSelector::Index(0)` は最初のシートを選択
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Sheet1".to_string())`
    Name(String),

    /// 複数のインデックス指定
    ///
    /// 例: `SheetSelector::Indices(vec![0, 2, 4])`
    Indices(Vec<usize>),

    /// 複数のシート名指定
    ///
    /// 例: `SheetSelector::Names(vec!["Sheet1".to_string(), "Sheet2".to_string()])`
    Names(Vec<String>),
}

/// 出力フォーマット
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputFormat {
    /// Markdown形式（デフォルト）
    ///
    /// 内容は`OutputMode`によって変わります。
    Markdown,

    /// 単独で表示可能なHTML文書
    ///
    /// シートごとにグリッド（列幅、結合、セルスタイル）を描画し、
    /// 描画オブジェクトとコネクタを重ねて表示します。スクリプトは含みません。
    Html,

    /// ドキュメントモデル全体のJSON
    ///
    /// `WorkbookDocument`をそのままシリアライズします。
    Json,
}

/// Markdown出力のモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputMode {
    /// 作業用の要約（デフォルト）
    ///
    /// シートごとに領域テーブル、計算セルの一覧、図（フローチャートと画像）を出力します。
    Work,

    /// 全情報のダンプ
    ///
    /// メタデータ、セル一覧、結合、入力規則、印刷設定、描画、コネクタ、
    /// 未対応要素、警告、要約のすべてを出力します。
    Full,

    /// シートの見た目を再現するHTMLグリッドを埋め込んだMarkdown
    SheetView,
}

/// 画像の埋め込み方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageMode {
    /// `data:<content-type>;base64,...`形式のURIとして埋め込む
    DataUri,
}

/// コネクタ端点の求め方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectorEndpoints {
    /// アンカーの開始点を始点、終了点を終点とする（デフォルト）
    ///
    /// アンカーがなければ外接矩形の左上と右下を使います。
    Anchor,

    /// `Anchor`に加え、`a:xfrm`の`flipH`/`flipV`でx・y座標を入れ替える
    FlipAware,
}
