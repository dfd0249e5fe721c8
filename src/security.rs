//! Security Module
//!
//! パッケージ読み込み時のセキュリティ制限を実装するモジュール。
//! ZIP bomb、パストラバーサルを含むエントリ名などを拒否します。
//! XML外部実体はquick-xmlが展開しないため、ここでは扱いません。

use crate::error::XlsxToMdError;

/// セキュリティ設定
///
/// パッケージ処理時の上限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 展開後の合計最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大エントリ数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一エントリの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力パッケージの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// 入力サイズを検証する
    pub fn check_input_size(&self, len: u64) -> Result<(), XlsxToMdError> {
        if len > self.max_input_file_size {
            return Err(XlsxToMdError::SecurityViolation(format!(
                "Input size {} exceeds limit {}",
                len, self.max_input_file_size
            )));
        }
        Ok(())
    }

    /// エントリ数を検証する
    pub fn check_entry_count(&self, count: usize) -> Result<(), XlsxToMdError> {
        if count > self.max_file_count {
            return Err(XlsxToMdError::SecurityViolation(format!(
                "Too many entries in package: {} (limit {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    /// 単一エントリのサイズと、それを加えた合計サイズを検証する
    ///
    /// # 戻り値
    ///
    /// 加算後の合計サイズ
    pub fn check_entry_size(
        &self,
        name: &str,
        size: u64,
        total_so_far: u64,
    ) -> Result<u64, XlsxToMdError> {
        if size > self.max_file_size {
            return Err(XlsxToMdError::SecurityViolation(format!(
                "Entry {} is too large: {} bytes (limit {})",
                name, size, self.max_file_size
            )));
        }
        let total = total_so_far.saturating_add(size);
        if total > self.max_decompressed_size {
            return Err(XlsxToMdError::SecurityViolation(format!(
                "Total decompressed size exceeds limit {}",
                self.max_decompressed_size
            )));
        }
        Ok(total)
    }
}

/// ZIPエントリ名の検証
///
/// パストラバーサルを防ぐため、エントリ名を検証します。
///
/// # 引数
///
/// * `path` - 検証するエントリ名
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(XlsxToMdError::SecurityViolation)` - 空、絶対パス、`..`セグメント、バックスラッシュを含む場合
pub(crate) fn validate_zip_path(path: &str) -> Result<(), XlsxToMdError> {
    let reject = |reason: &str| {
        Err(XlsxToMdError::SecurityViolation(format!(
            "{}: {}",
            reason, path
        )))
    };

    if path.is_empty() {
        return reject("Empty path is not allowed");
    }

    // Unix形式の`/`、Windows形式の`C:`で始まるパス
    let bytes = path.as_bytes();
    if path.starts_with('/') || (bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic())
    {
        return reject("Absolute path is not allowed");
    }

    if path.contains('\\') {
        return reject("Backslash in path is not allowed");
    }

    if path.split('/').any(|segment| segment == "..") {
        return reject("Path traversal detected");
    }

    Ok(())
}
