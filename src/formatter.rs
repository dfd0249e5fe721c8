//! Formatter Module
//!
//! セルの型タグに応じた値のデコードと、Markdown出力用のエスケープを提供するモジュール。

use std::collections::HashMap;

use crate::format::{DateContext, NumberFormat};
use crate::parser::StyleTables;
use crate::types::CellType;

/// セルフォーマッター
///
/// 共有文字列表とスタイル表を参照し、セルの生の値から表示値を導出します。
/// 表示書式の解析結果はスタイルインデックスごとにキャッシュします。
pub(crate) struct CellFormatter<'a> {
    shared_strings: &'a [String],
    styles: &'a StyleTables,
    date_ctx: DateContext<'a>,
    cache: HashMap<Option<u32>, NumberFormat>,
}

impl<'a> CellFormatter<'a> {
    pub fn new(
        shared_strings: &'a [String],
        styles: &'a StyleTables,
        date_ctx: DateContext<'a>,
    ) -> Self {
        Self {
            shared_strings,
            styles,
            date_ctx,
            cache: HashMap::new(),
        }
    }

    /// セルの表示値を導出する
    ///
    /// # 引数
    ///
    /// * `cell_type` - `t`属性の型タグ
    /// * `cached` - `<v>`のテキスト
    /// * `inline_text` - `<is>`内のテキストを連結したもの
    /// * `style_id` - `s`属性
    ///
    /// # 戻り値
    ///
    /// 表示値（値がなければ空文字列）
    pub fn decode(
        &mut self,
        cell_type: &CellType,
        cached: Option<&str>,
        inline_text: Option<&str>,
        style_id: Option<u32>,
    ) -> String {
        match cell_type {
            CellType::SharedString => cached
                .and_then(|v| v.trim().parse::<usize>().ok())
                .and_then(|idx| self.shared_strings.get(idx))
                .cloned()
                .unwrap_or_default(),
            CellType::InlineString => inline_text.or(cached).unwrap_or("").to_string(),
            CellType::FormulaString => cached.unwrap_or("").to_string(),
            CellType::Boolean => {
                if cached.map(str::trim) == Some("1") {
                    "TRUE".to_string()
                } else {
                    "FALSE".to_string()
                }
            }
            CellType::Error | CellType::Date => cached.unwrap_or("").to_string(),
            CellType::Number | CellType::Virtual | CellType::Other(_) => match cached {
                None => String::new(),
                Some(raw) => {
                    let ctx = self.date_ctx;
                    self.number_format(style_id).apply(raw, ctx)
                }
            },
        }
    }

    fn number_format(&mut self, style_id: Option<u32>) -> &NumberFormat {
        let styles = self.styles;
        self.cache
            .entry(style_id)
            .or_insert_with(|| NumberFormat::parse(styles.number_format(style_id)))
    }
}

/// Markdownテーブル用に特殊文字をエスケープ
///
/// パイプ記号（`|`）、バックスラッシュ（`\`）をエスケープし、
/// 改行を`<br>`に置き換えます。
pub(crate) fn escape_markdown(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}

/// HTML特殊文字をエスケープ
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DateFormat;
    use crate::xml::XmlNode;

    static ISO: DateFormat = DateFormat::Iso8601;

    fn styles() -> StyleTables {
        let xml = br#"<styleSheet>
<numFmts><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
<cellXfs><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="10"/></cellXfs>
</styleSheet>"#;
        StyleTables::from_xml(
            &XmlNode::parse(xml).unwrap(),
            &crate::parser::ThemePalette::default(),
        )
    }

    fn ctx() -> DateContext<'static> {
        DateContext {
            date1904: false,
            date_format: &ISO,
        }
    }

    #[test]
    fn test_shared_string_lookup() {
        let strings = vec!["Hello".to_string()];
        let styles = styles();
        let mut f = CellFormatter::new(&strings, &styles, ctx());
        assert_eq!(f.decode(&CellType::SharedString, Some("0"), None, None), "Hello");
        assert_eq!(f.decode(&CellType::SharedString, Some("5"), None, None), "");
        assert_eq!(f.decode(&CellType::SharedString, None, None, None), "");
    }

    #[test]
    fn test_type_directed_decoding() {
        let styles = styles();
        let mut f = CellFormatter::new(&[], &styles, ctx());
        assert_eq!(f.decode(&CellType::Boolean, Some("1"), None, None), "TRUE");
        assert_eq!(f.decode(&CellType::Boolean, Some("0"), None, None), "FALSE");
        assert_eq!(f.decode(&CellType::Boolean, None, None, None), "FALSE");
        assert_eq!(f.decode(&CellType::Error, Some("#DIV/0!"), None, None), "#DIV/0!");
        assert_eq!(f.decode(&CellType::FormulaString, Some("abc"), None, None), "abc");
        assert_eq!(
            f.decode(&CellType::InlineString, None, Some("inline"), None),
            "inline"
        );
        assert_eq!(f.decode(&CellType::Number, None, None, None), "");
    }

    #[test]
    fn test_number_formats_by_style() {
        let styles = styles();
        let mut f = CellFormatter::new(&[], &styles, ctx());
        assert_eq!(f.decode(&CellType::Number, Some("3.0"), None, Some(0)), "3");
        assert_eq!(
            f.decode(&CellType::Number, Some("44200"), None, Some(1)),
            "2021-01-05"
        );
        assert_eq!(f.decode(&CellType::Number, Some("0.25"), None, Some(2)), "25.00%");
        assert_eq!(
            f.decode(&CellType::Other("x".to_string()), Some("2.0"), None, None),
            "2"
        );
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a|b"), "a\\|b");
        assert_eq!(escape_markdown("line1\nline2"), "line1<br>line2");
        assert_eq!(escape_markdown("back\\slash"), "back\\\\slash");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
