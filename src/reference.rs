//! Cell Reference Module
//!
//! 列記号と列番号の相互変換、A1形式のセル参照・範囲参照の解析、
//! リレーションシップのターゲットパス解決を提供するモジュール。
//!
//! すべての行番号・列番号は1始まり（`A1` = (1, 1)）です。

use serde::Serialize;

use crate::error::XlsxToMdError;

/// 正規化済みの矩形範囲参照
///
/// 結合セル、印刷範囲、入力規則の対象範囲、領域の境界はすべてこの型で表します。
/// `start_row <= end_row` かつ `start_col <= end_col` が常に成り立ちます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RangeRef {
    /// `$`を除去した参照文字列（例: `A1:C3`）
    #[serde(rename = "ref")]
    pub reference: String,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeRef {
    /// 境界から範囲参照を生成する（参照文字列は常に`A1:B2`形式）
    pub fn from_bounds(
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Result<Self, XlsxToMdError> {
        let (start_row, end_row) = (start_row.min(end_row), start_row.max(end_row));
        let (start_col, end_col) = (start_col.min(end_col), start_col.max(end_col));
        let reference = format!(
            "{}:{}",
            row_col_to_coord(start_row, start_col)?,
            row_col_to_coord(end_row, end_col)?
        );
        Ok(Self {
            reference,
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    /// 座標が範囲内にあるかを判定
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    /// 他の範囲との共通部分を`(start_row, start_col, end_row, end_col)`で返す
    pub fn intersection(&self, other: &RangeRef) -> Option<(u32, u32, u32, u32)> {
        let start_row = self.start_row.max(other.start_row);
        let start_col = self.start_col.max(other.start_col);
        let end_row = self.end_row.min(other.end_row);
        let end_col = self.end_col.min(other.end_col);
        if start_row <= end_row && start_col <= end_col {
            Some((start_row, start_col, end_row, end_col))
        } else {
            None
        }
    }

    /// 範囲内の全座標を行優先で列挙する
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start_row..=self.end_row)
            .flat_map(move |row| (self.start_col..=self.end_col).map(move |col| (row, col)))
    }

    /// 行数
    pub fn row_span(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    /// 列数
    pub fn col_span(&self) -> u32 {
        self.end_col - self.start_col + 1
    }
}

/// 列記号を列番号に変換する（`A` -> 1, `Z` -> 26, `AA` -> 27）
///
/// # エラー
///
/// 空文字列、英字以外の文字、`u32`に収まらない列記号は
/// `XlsxToMdError::InvalidCoordinate`を返します。
pub fn col_to_index(col: &str) -> Result<u32, XlsxToMdError> {
    if col.is_empty() {
        return Err(XlsxToMdError::InvalidCoordinate(col.to_string()));
    }

    let mut index: u32 = 0;
    for ch in col.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(XlsxToMdError::InvalidCoordinate(col.to_string()));
        }
        let digit = (ch.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        index = index
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| XlsxToMdError::InvalidCoordinate(col.to_string()))?;
    }
    Ok(index)
}

/// 列番号を列記号に変換する（1 -> `A`, 27 -> `AA`）
///
/// 0は列記号を持たないため`XlsxToMdError::InvalidCoordinate`を返します。
pub fn index_to_col(index: u32) -> Result<String, XlsxToMdError> {
    if index == 0 {
        return Err(XlsxToMdError::InvalidCoordinate(
            "column index must be >= 1".to_string(),
        ));
    }

    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    Ok(letters.iter().rev().collect())
}

/// A1形式の座標を`(row, col)`に変換する
///
/// # 例
///
/// ```rust
/// use xlsxsight::reference::coord_to_row_col;
///
/// assert_eq!(coord_to_row_col("B3").unwrap(), (3, 2));
/// assert!(coord_to_row_col("3B").is_err());
/// ```
pub fn coord_to_row_col(coord: &str) -> Result<(u32, u32), XlsxToMdError> {
    let invalid = || XlsxToMdError::InvalidCoordinate(coord.to_string());

    let split = coord
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = coord.split_at(split);
    if letters.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let col = col_to_index(letters).map_err(|_| invalid())?;
    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }
    Ok((row, col))
}

/// `(row, col)`をA1形式の座標に変換する
pub fn row_col_to_coord(row: u32, col: u32) -> Result<String, XlsxToMdError> {
    if row == 0 {
        return Err(XlsxToMdError::InvalidCoordinate(format!(
            "row index must be >= 1 (col {})",
            col
        )));
    }
    Ok(format!("{}{}", index_to_col(col)?, row))
}

/// 範囲参照を解析する
///
/// 単一セル（`A1`）と範囲（`A1:C3`）の両方を受け付け、`$`を除去し、
/// 両軸で開始 <= 終了となるよう正規化します。
///
/// # 例
///
/// ```rust
/// use xlsxsight::reference::parse_range_ref;
///
/// let r = parse_range_ref("$D$4:$B$2").unwrap();
/// assert_eq!((r.start_row, r.start_col, r.end_row, r.end_col), (2, 2, 4, 4));
/// ```
pub fn parse_range_ref(text: &str) -> Result<RangeRef, XlsxToMdError> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '$').collect();
    let invalid = || XlsxToMdError::InvalidRange(text.to_string());

    let parts: Vec<&str> = cleaned.split(':').collect();
    let (first, second) = match parts.as_slice() {
        [single] => (*single, *single),
        [start, end] => (*start, *end),
        _ => return Err(invalid()),
    };

    let (r1, c1) = coord_to_row_col(first).map_err(|_| invalid())?;
    let (r2, c2) = coord_to_row_col(second).map_err(|_| invalid())?;

    Ok(RangeRef {
        reference: cleaned,
        start_row: r1.min(r2),
        start_col: c1.min(c2),
        end_row: r1.max(r2),
        end_col: c1.max(c2),
    })
}

/// シート名付きの範囲リストを解析する（例: `'Sheet 1'!$A$1:$C$3,$D$5`）
///
/// 各要素の`'Sheet Name'!` / `SheetName!`接頭辞を除去し、カンマで分割して
/// それぞれを範囲として解析します。解析できない要素は黙ってスキップします。
pub fn parse_sheet_scoped_range(text: &str) -> Vec<RangeRef> {
    split_outside_quotes(text, ',')
        .into_iter()
        .filter_map(|token| {
            let token = token.trim();
            let payload = match token.rfind('!') {
                Some(pos) => &token[pos + 1..],
                None => token,
            };
            match parse_range_ref(payload) {
                Ok(range) => Some(range),
                Err(_) => {
                    log::warn!("Skipping unparsable range fragment: {}", token);
                    None
                }
            }
        })
        .collect()
}

/// 空白区切りの`sqref`属性を解析する（例: `A1:A10 C3`）
pub fn parse_sqref(text: &str) -> Vec<RangeRef> {
    text.split_whitespace()
        .filter_map(|token| parse_range_ref(token).ok())
        .collect()
}

/// リレーションシップのターゲットを参照元パーツのディレクトリ基準で解決する
///
/// POSIX形式で`.`と`..`を正規化し、先頭の`/`を除去します。
/// `/`で始まるターゲットはパッケージルートからの絶対パスとして扱います。
///
/// # 例
///
/// ```rust
/// use xlsxsight::reference::resolve_target;
///
/// assert_eq!(
///     resolve_target("xl/drawings/drawing1.xml", "../media/image1.png"),
///     "xl/media/image1.png"
/// );
/// ```
pub fn resolve_target(base_part: &str, target: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        if let Some(pos) = base_part.rfind('/') {
            segments.extend(base_part[..pos].split('/').filter(|s| !s.is_empty()));
        }
    }

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !target.starts_with('/') {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// パーツに対応するリレーションシップパーツのパスを返す
///
/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    match part.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part[..pos], &part[pos + 1..]),
        None => format!("_rels/{}.rels", part),
    }
}

/// 引用符（`'`）の外側にある区切り文字で分割する
fn split_outside_quotes(text: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        if ch == '\'' {
            in_quote = !in_quote;
        } else if ch == delimiter && !in_quote {
            parts.push(&text[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}
