//! スタイルパーツ（`xl/styles.xml`）の解析
//!
//! `cellXfs`の位置（セルの`s`属性）をキーとして、CSS相当の視覚スタイル表と
//! 表示書式文字列表の2つを構築します。

use std::collections::{BTreeMap, HashMap};

use super::theme::{normalize_hex, ThemePalette};
use crate::xml::XmlNode;

/// 旧来のインデックスカラーパレット（先頭10色）
const INDEXED_PALETTE: [&str; 10] = [
    "#000000", "#FFFFFF", "#FF0000", "#00FF00", "#0000FF", "#FFFF00", "#FF00FF", "#00FFFF",
    "#000000", "#FFFFFF",
];

/// 罫線スタイル -> (幅px, 線種)
fn border_style(style: &str) -> Option<(u32, &'static str)> {
    match style {
        "thin" => Some((1, "solid")),
        "hair" => Some((1, "dotted")),
        "dotted" => Some((1, "dotted")),
        "dashed" => Some((1, "dashed")),
        "dashDot" => Some((1, "dashed")),
        "dashDotDot" => Some((1, "dotted")),
        "medium" => Some((2, "solid")),
        "mediumDashed" => Some((2, "dashed")),
        "mediumDashDot" => Some((2, "dashed")),
        "mediumDashDotDot" => Some((2, "dotted")),
        "slantDashDot" => Some((2, "dashed")),
        "thick" => Some((3, "solid")),
        "double" => Some((3, "double")),
        _ => None,
    }
}

/// ビルトイン表示書式ID -> 書式文字列
///
/// 5-8はロケール依存の通貨書式、30-35はja-JPの日付・時刻書式。
pub(crate) fn builtin_format(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("General"),
        1 => Some("0"),
        2 => Some("0.00"),
        3 => Some("#,##0"),
        4 => Some("#,##0.00"),
        5 => Some("$#,##0_);($#,##0)"),
        6 => Some("$#,##0_);[Red]($#,##0)"),
        7 => Some("$#,##0.00_);($#,##0.00)"),
        8 => Some("$#,##0.00_);[Red]($#,##0.00)"),
        9 => Some("0%"),
        10 => Some("0.00%"),
        11 => Some("0.00E+00"),
        12 => Some("# ?/?"),
        13 => Some("# ??/??"),
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("h:mm"),
        21 => Some("h:mm:ss"),
        22 => Some("m/d/yy h:mm"),
        // 23-26は日本語ロケールで未定義（Excelは標準として表示する）
        23..=26 => Some("General"),
        27 | 36 => Some("[$-411]ge.m.d"),
        28 | 29 => Some("[$-411]ggge\"年\"m\"月\"d\"日\""),
        30 => Some("m/d/yy"),
        31 => Some("yyyy\"年\"m\"月\"d\"日\""),
        32 => Some("h\"時\"mm\"分\""),
        33 => Some("h\"時\"mm\"分\"ss\"秒\""),
        34 => Some("yyyy\"年\"m\"月\""),
        35 => Some("m\"月\"d\"日\""),
        37 => Some("#,##0_);(#,##0)"),
        38 => Some("#,##0_);[Red](#,##0)"),
        39 => Some("#,##0.00_);(#,##0.00)"),
        40 => Some("#,##0.00_);[Red](#,##0.00)"),
        41 => Some("_(* #,##0_);_(* (#,##0);_(* \"-\"_);_(@_)"),
        42 => Some("_($* #,##0_);_($* (#,##0);_($* \"-\"_);_(@_)"),
        43 => Some("_(* #,##0.00_);_(* (#,##0.00);_(* \"-\"??_);_(@_)"),
        44 => Some("_($* #,##0.00_);_($* (#,##0.00);_($* \"-\"??_);_(@_)"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        47 => Some("mm:ss.0"),
        48 => Some("##0.0E+0"),
        49 => Some("@"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
struct Font {
    name: Option<String>,
    size: Option<String>,
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    color: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct BorderSide {
    width: u32,
    dash: &'static str,
    color: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Border {
    top: Option<BorderSide>,
    right: Option<BorderSide>,
    bottom: Option<BorderSide>,
    left: Option<BorderSide>,
}

/// セルスタイル情報（cellXfs要素）
#[derive(Debug, Clone, Default)]
struct CellXf {
    num_fmt_id: u32,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    horizontal: Option<String>,
    vertical: Option<String>,
    wrap_text: bool,
}

/// スタイルインデックスごとの解決済みテーブル
#[derive(Debug, Clone, Default)]
pub(crate) struct StyleTables {
    /// スタイルインデックス -> CSS宣言（`;`区切り）
    pub css_map: BTreeMap<u32, String>,
    /// スタイルインデックス -> 表示書式文字列
    pub numfmt_map: BTreeMap<u32, String>,
}

impl StyleTables {
    /// スタイルパーツとテーマパレットからテーブルを構築する
    pub fn from_xml(root: &XmlNode, theme: &ThemePalette) -> Self {
        // 1. カスタム表示書式
        let mut custom_formats: HashMap<u32, String> = HashMap::new();
        if let Some(num_fmts) = root.child("numFmts") {
            for num_fmt in num_fmts.children_named("numFmt") {
                if let (Some(id), Some(code)) =
                    (num_fmt.attr_parse::<u32>("numFmtId"), num_fmt.attr("formatCode"))
                {
                    custom_formats.insert(id, code.to_string());
                }
            }
        }

        // 2. フォント・塗りつぶし・罫線
        let fonts: Vec<Font> = root
            .child("fonts")
            .map(|f| f.children_named("font").map(|n| parse_font(n, theme)).collect())
            .unwrap_or_default();
        let fills: Vec<Option<String>> = root
            .child("fills")
            .map(|f| f.children_named("fill").map(|n| parse_fill(n, theme)).collect())
            .unwrap_or_default();
        let borders: Vec<Border> = root
            .child("borders")
            .map(|b| {
                b.children_named("border")
                    .map(|n| parse_border(n, theme))
                    .collect()
            })
            .unwrap_or_default();

        // 3. cellXfs
        let xfs: Vec<CellXf> = root
            .child("cellXfs")
            .map(|x| x.children_named("xf").map(parse_xf).collect())
            .unwrap_or_default();

        let mut tables = StyleTables::default();
        for (index, xf) in xfs.iter().enumerate() {
            let index = index as u32;
            let format = custom_formats
                .get(&xf.num_fmt_id)
                .map(String::as_str)
                .or_else(|| builtin_format(xf.num_fmt_id))
                .unwrap_or("General");
            tables.numfmt_map.insert(index, format.to_string());

            let css = build_css(
                xf,
                xf.font_id.and_then(|i| fonts.get(i)),
                xf.fill_id.and_then(|i| fills.get(i)).and_then(|f| f.as_deref()),
                xf.border_id.and_then(|i| borders.get(i)),
            );
            tables.css_map.insert(index, css);
        }

        log::debug!(
            "Resolved {} cell styles ({} custom number formats)",
            xfs.len(),
            custom_formats.len()
        );
        tables
    }

    /// スタイルインデックスの表示書式（未定義は`General`）
    pub fn number_format(&self, style_id: Option<u32>) -> &str {
        style_id
            .and_then(|id| self.numfmt_map.get(&id))
            .map(String::as_str)
            .unwrap_or("General")
    }
}

/// 色要素（`color`, `fgColor`, `bgColor`）を`#RRGGBB`に解決する
///
/// 優先順位: `rgb` > `theme`(+`tint`) > `auto` > `indexed`
pub(crate) fn resolve_color(node: &XmlNode, theme: &ThemePalette) -> Option<String> {
    node.attr("rgb")
        .and_then(normalize_hex)
        .or_else(|| {
            let index = node.attr_parse::<usize>("theme")?;
            let base = theme.by_index(index)?;
            let tint = node.attr_parse::<f64>("tint").unwrap_or(0.0);
            Some(apply_tint(base, tint))
        })
        .or_else(|| node.attr_flag("auto").then(|| "#000000".to_string()))
        .or_else(|| {
            let index = node.attr_parse::<usize>("indexed")?;
            INDEXED_PALETTE.get(index).map(|c| c.to_string())
        })
}

/// tintを適用する
///
/// 負のtintは`v*(1+tint)`で暗く、正のtintは`v*(1-tint)+255*tint`で明るくする。
pub(crate) fn apply_tint(hex: &str, tint: f64) -> String {
    if tint == 0.0 {
        return hex.to_string();
    }
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2).unwrap_or("00"), 16).unwrap_or(0);
    let adjust = |v: u8| -> u8 {
        let v = v as f64;
        let out = if tint < 0.0 {
            v * (1.0 + tint)
        } else {
            v * (1.0 - tint) + 255.0 * tint
        };
        out.round().clamp(0.0, 255.0) as u8
    };
    format!(
        "#{:02X}{:02X}{:02X}",
        adjust(channel(0)),
        adjust(channel(2)),
        adjust(channel(4))
    )
}

fn parse_font(node: &XmlNode, theme: &ThemePalette) -> Font {
    let toggle = |tag: &str| {
        node.child(tag)
            .map(|n| !matches!(n.attr("val"), Some("0") | Some("false")))
            .unwrap_or(false)
    };
    Font {
        name: node.child("name").and_then(|n| n.attr("val")).map(str::to_string),
        size: node.child("sz").and_then(|n| n.attr("val")).map(str::to_string),
        bold: toggle("b"),
        italic: toggle("i"),
        underline: node
            .child("u")
            .map(|n| n.attr("val") != Some("none"))
            .unwrap_or(false),
        strike: toggle("strike"),
        color: node.child("color").and_then(|c| resolve_color(c, theme)),
    }
}

fn parse_fill(node: &XmlNode, theme: &ThemePalette) -> Option<String> {
    let pattern = node.child("patternFill")?;
    match pattern.attr("patternType") {
        None | Some("none") => None,
        Some(_) => pattern
            .child("fgColor")
            .and_then(|c| resolve_color(c, theme))
            .or_else(|| pattern.child("bgColor").and_then(|c| resolve_color(c, theme))),
    }
}

fn parse_border(node: &XmlNode, theme: &ThemePalette) -> Border {
    let side = |names: &[&str]| -> Option<BorderSide> {
        let edge = names.iter().find_map(|name| node.child(name))?;
        let (width, dash) = border_style(edge.attr("style")?)?;
        Some(BorderSide {
            width,
            dash,
            color: edge.child("color").and_then(|c| resolve_color(c, theme)),
        })
    };
    Border {
        top: side(&["top"]),
        right: side(&["right", "end"]),
        bottom: side(&["bottom"]),
        left: side(&["left", "start"]),
    }
}

fn parse_xf(node: &XmlNode) -> CellXf {
    let alignment = node.child("alignment");
    CellXf {
        num_fmt_id: node.attr_parse("numFmtId").unwrap_or(0),
        font_id: node.attr_parse("fontId"),
        fill_id: node.attr_parse("fillId"),
        border_id: node.attr_parse("borderId"),
        horizontal: alignment
            .and_then(|a| a.attr("horizontal"))
            .map(str::to_string),
        vertical: alignment.and_then(|a| a.attr("vertical")).map(str::to_string),
        wrap_text: alignment.map(|a| a.attr_flag("wrapText")).unwrap_or(false),
    }
}

fn build_css(
    xf: &CellXf,
    font: Option<&Font>,
    fill: Option<&str>,
    border: Option<&Border>,
) -> String {
    let mut decls: Vec<String> = Vec::new();

    if let Some(font) = font {
        if let Some(name) = &font.name {
            decls.push(format!("font-family:'{}'", name.replace('\'', "")));
        }
        if let Some(size) = &font.size {
            decls.push(format!("font-size:{}pt", size));
        }
        if font.bold {
            decls.push("font-weight:bold".to_string());
        }
        if font.italic {
            decls.push("font-style:italic".to_string());
        }
        match (font.underline, font.strike) {
            (true, true) => decls.push("text-decoration:underline line-through".to_string()),
            (true, false) => decls.push("text-decoration:underline".to_string()),
            (false, true) => decls.push("text-decoration:line-through".to_string()),
            (false, false) => {}
        }
        if let Some(color) = &font.color {
            decls.push(format!("color:{}", color));
        }
    }

    if let Some(fill) = fill {
        decls.push(format!("background-color:{}", fill));
    }

    if let Some(border) = border {
        for (name, side) in [
            ("top", &border.top),
            ("right", &border.right),
            ("bottom", &border.bottom),
            ("left", &border.left),
        ] {
            if let Some(side) = side {
                decls.push(format!(
                    "border-{}:{}px {} {}",
                    name,
                    side.width,
                    side.dash,
                    side.color.as_deref().unwrap_or("#000000")
                ));
            }
        }
    }

    match xf.horizontal.as_deref() {
        Some("left") => decls.push("text-align:left".to_string()),
        Some("center") | Some("centerContinuous") => decls.push("text-align:center".to_string()),
        Some("right") => decls.push("text-align:right".to_string()),
        Some("justify") | Some("distributed") => decls.push("text-align:justify".to_string()),
        _ => {}
    }
    match xf.vertical.as_deref() {
        Some("top") => decls.push("vertical-align:top".to_string()),
        Some("center") => decls.push("vertical-align:middle".to_string()),
        Some("bottom") => decls.push("vertical-align:bottom".to_string()),
        _ => {}
    }

    if xf.wrap_text {
        decls.push("white-space:pre-wrap".to_string());
    } else {
        decls.push("white-space:nowrap".to_string());
    }

    decls.join(";")
}
