//! テーマパーツ（`xl/theme/theme1.xml`）のカラーパレット解析

use crate::xml::XmlNode;

/// `clrScheme`の要素名（文書内の定義順）
const SCHEME_ORDER: [&str; 12] = [
    "dk1", "lt1", "dk2", "lt2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

/// SpreadsheetMLの`theme`属性インデックス -> スキーム名
///
/// 0と1、2と3は`clrScheme`の定義順と入れ替わっている。
const THEME_INDEX_ORDER: [&str; 12] = [
    "lt1", "dk1", "lt2", "dk2", "accent1", "accent2", "accent3", "accent4", "accent5", "accent6",
    "hlink", "folHlink",
];

/// テーマのカラーパレット
#[derive(Debug, Clone, Default)]
pub(crate) struct ThemePalette {
    /// (スキーム名, `#RRGGBB`)
    colors: Vec<(String, String)>,
}

impl ThemePalette {
    /// テーマパーツを解析する
    ///
    /// `srgbClr@val`または`sysClr@lastClr`を持つスキーム色のみを採用します。
    pub fn from_xml(root: &XmlNode) -> Self {
        let mut colors = Vec::new();
        let Some(scheme) = root.find("clrScheme") else {
            return Self::default();
        };

        for name in SCHEME_ORDER {
            let Some(entry) = scheme.child(name) else {
                continue;
            };
            let value = entry
                .child("srgbClr")
                .and_then(|c| c.attr("val"))
                .or_else(|| entry.child("sysClr").and_then(|c| c.attr("lastClr")));
            if let Some(hex) = value.and_then(normalize_hex) {
                colors.push((name.to_string(), hex));
            }
        }

        Self { colors }
    }

    /// スタイルパーツの`theme`インデックスで色を引く
    pub fn by_index(&self, index: usize) -> Option<&str> {
        THEME_INDEX_ORDER
            .get(index)
            .and_then(|name| self.by_scheme_name(name))
    }

    /// DrawingMLの`schemeClr@val`で色を引く（`tx1`/`bg1`などの別名も解決する）
    pub fn by_scheme_name(&self, name: &str) -> Option<&str> {
        let name = match name {
            "tx1" => "dk1",
            "bg1" => "lt1",
            "tx2" => "dk2",
            "bg2" => "lt2",
            other => other,
        };
        self.colors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, hex)| hex.as_str())
    }
}

/// `RRGGBB` / `AARRGGBB` を`#RRGGBB`（大文字）に正規化する
pub(crate) fn normalize_hex(raw: &str) -> Option<String> {
    let raw = raw.trim().trim_start_matches('#');
    if !raw.is_ascii() {
        return None;
    }
    let hex = match raw.len() {
        6 => raw,
        8 => &raw[2..],
        _ => return None,
    };
    if hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", hex.to_ascii_uppercase()))
    } else {
        None
    }
}
