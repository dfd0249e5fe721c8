//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// xlsxsightクレート全体で使用するエラー型
///
/// パッケージの読み込み、XML解析、参照解決、変換処理中に発生する
/// すべてのエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - `UnsupportedFormat`: 入力が`.xlsx`（ZIPパッケージ）ではない
/// - `MissingPart`: 必須パーツ（ワークブック）が存在しない
/// - `InvalidCoordinate` / `InvalidRange`: 不正なセル参照
/// - `StrictUnsupportedElements`: strictモードで未対応要素を検出した
/// - その他: I/O、ZIP、XML、設定、セキュリティ制限
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxsight::{ConverterBuilder, XlsxToMdError};
///
/// let converter = ConverterBuilder::new().strict_unsupported(true).build()?;
/// match converter.parse_path("report.xlsx") {
///     Err(XlsxToMdError::StrictUnsupportedElements { count }) => {
///         eprintln!("{} unsupported elements", count);
///     }
///     Err(e) => return Err(e),
///     Ok(doc) => println!("{} sheets", doc.summary.sheet_count),
/// }
/// # Ok::<(), XlsxToMdError>(())
/// ```
#[derive(Error, Debug)]
pub enum XlsxToMdError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8文字列の変換エラー
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLパーツの解析エラー
    ///
    /// 整形式でないXML、不正な属性、エスケープ失敗などで発生します。
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 数値の解析エラー
    #[error("Number parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// 設定の検証に失敗したエラー
    ///
    /// `ConverterBuilder::build()`時に無効な設定が検出された場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 入力が`.xlsx`パッケージではない
    ///
    /// 拡張子が`.xlsx`でないパス、またはZIPシグネチャを持たないバイト列で発生します。
    /// 解析は一切行われません。
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// 必須パーツがパッケージ内に存在しない
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// 不正なセル座標（例: `1A`, `A0`, 空文字列）
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// 不正な範囲参照（例: `A1:`, `A1:B2:C3`）
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// strictモードで未対応要素が検出された
    ///
    /// `count`はすべてのシートで検出された未対応要素の総数です。
    #[error("Strict mode: {count} unsupported element(s) found")]
    StrictUnsupportedElements {
        /// 未対応要素の総数
        count: usize,
    },

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、パストラバーサル攻撃、ファイルサイズ制限などの
    /// セキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),
}

impl From<quick_xml::Error> for XlsxToMdError {
    fn from(e: quick_xml::Error) -> Self {
        XlsxToMdError::Xml(e.to_string())
    }
}

impl From<zip::result::ZipError> for XlsxToMdError {
    fn from(e: zip::result::ZipError) -> Self {
        XlsxToMdError::Zip(e.to_string())
    }
}
