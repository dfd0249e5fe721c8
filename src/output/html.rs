//! HTML Renderer
//!
//! ワークブックを単独で表示可能なHTML文書として出力します。
//! シートごとに列幅・行高・結合・セルスタイルを反映したグリッドを描画し、
//! その上に図形と画像（絶対配置）、コネクタ（SVGの線）を重ねます。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use crate::error::XlsxToMdError;
use crate::formatter::escape_html;
use crate::parser::drawing::EMU_PER_PIXEL;
use crate::reference::{index_to_col, parse_range_ref, row_col_to_coord, RangeRef};
use crate::types::{
    AnchorPoint, BoundingBox, DrawingKind, DrawingObject, SheetDocument, ShapeStyle,
    WorkbookDocument,
};

const ROW_HEADER_WIDTH: f64 = 56.0;
const MIN_SHAPE_SIZE: f64 = 8.0;

/// グリッド描画の既定寸法
#[derive(Debug, Clone, Copy)]
pub(crate) struct HtmlOptions {
    pub col_width_px: f64,
    pub row_height_px: f64,
}

/// ワークブック全体をHTML文書として出力する
pub(crate) fn render_workbook<W: Write>(
    doc: &WorkbookDocument,
    options: HtmlOptions,
    w: &mut W,
) -> Result<(), XlsxToMdError> {
    let title = doc
        .source_metadata
        .file_name
        .as_deref()
        .unwrap_or("workbook");

    writeln!(w, "<!doctype html>")?;
    writeln!(w, "<html lang=\"ja\">")?;
    writeln!(w, "<head>")?;
    writeln!(w, "<meta charset=\"utf-8\">")?;
    writeln!(w, "<title>{} - Sheet View</title>", escape_html(title))?;
    writeln!(w, "<style>\n{}</style>", STYLESHEET)?;
    writeln!(w, "</head>")?;
    writeln!(w, "<body>")?;
    writeln!(w, "<main class=\"page\">")?;
    writeln!(w, "<h1>Workbook: {}</h1>", escape_html(title))?;

    writeln!(w, "<section>\n<h2>Source Metadata</h2>")?;
    write_kv_table(
        w,
        &[
            ("file_name", title.to_string()),
            (
                "file_size_bytes",
                doc.source_metadata.file_size_bytes.to_string(),
            ),
            ("sha256", doc.source_metadata.sha256.clone()),
            ("zip_entries", doc.source_metadata.zip_entries.to_string()),
        ],
    )?;
    writeln!(w, "</section>")?;

    writeln!(w, "<section>\n<h2>Extraction Summary</h2>")?;
    write_kv_table(w, &super::summary_rows(doc))?;
    writeln!(w, "</section>")?;

    for sheet in &doc.sheets {
        writeln!(w, "<section class=\"sheet\">")?;
        writeln!(
            w,
            "<h2>Sheet: {} [{}]</h2>",
            escape_html(&sheet.name),
            sheet.state.as_str()
        )?;
        let print_areas = if sheet.print.print_areas.is_empty() {
            "(none)".to_string()
        } else {
            join_refs(&sheet.print.print_areas)
        };
        writeln!(
            w,
            "<p class=\"meta\">used_range=<code>{}</code> / print_areas=<code>{}</code> / hidden_rows=<code>{}</code> / hidden_cols=<code>{}</code></p>",
            escape_html(sheet.dimension_ref.as_deref().unwrap_or("")),
            escape_html(&print_areas),
            sheet.hidden_rows.len(),
            sheet.hidden_cols.len()
        )?;

        let ranges = sheetview_ranges(sheet);
        if ranges.is_empty() {
            writeln!(w, "<p class=\"empty\">No renderable range.</p>")?;
        }
        for (idx, range) in ranges.iter().enumerate() {
            writeln!(
                w,
                "<h3>Range {}: {}</h3>",
                idx + 1,
                escape_html(&range.reference)
            )?;
            write_sheet_range(w, sheet, range, &doc.style_css_map, options, true)?;
        }

        if !sheet.unsupported.is_empty() {
            writeln!(w, "<details>")?;
            writeln!(
                w,
                "<summary>Unsupported Elements ({})</summary>",
                sheet.unsupported.len()
            )?;
            writeln!(w, "<table class=\"simple\">")?;
            writeln!(
                w,
                "<thead><tr><th>scope</th><th>location</th><th>tag</th></tr></thead><tbody>"
            )?;
            for item in &sheet.unsupported {
                writeln!(
                    w,
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    item.scope.as_str(),
                    escape_html(&item.location),
                    escape_html(&item.tag)
                )?;
            }
            writeln!(w, "</tbody></table>\n</details>")?;
        }
        writeln!(w, "</section>")?;
    }

    writeln!(w, "<section>\n<h2>Warnings</h2>")?;
    if doc.warnings.is_empty() {
        writeln!(w, "<p>(none)</p>")?;
    } else {
        writeln!(w, "<ul>")?;
        for warning in &doc.warnings {
            writeln!(w, "<li>{}</li>", escape_html(warning))?;
        }
        writeln!(w, "</ul>")?;
    }
    writeln!(w, "</section>")?;

    writeln!(w, "</main>\n</body>\n</html>")?;
    Ok(())
}

/// シートビューとして描画する範囲
///
/// 印刷範囲、`dimension`、セルの外接矩形の順に採用します。
pub(crate) fn sheetview_ranges(sheet: &SheetDocument) -> Vec<RangeRef> {
    if !sheet.print.print_areas.is_empty() {
        return sheet.print.print_areas.clone();
    }
    if let Some(range) = sheet
        .dimension_ref
        .as_deref()
        .and_then(|d| parse_range_ref(d).ok())
    {
        return vec![range];
    }
    let r1 = sheet.cells.iter().map(|c| c.row).min();
    let r2 = sheet.cells.iter().map(|c| c.row).max();
    let c1 = sheet.cells.iter().map(|c| c.col).min();
    let c2 = sheet.cells.iter().map(|c| c.col).max();
    match (r1, c1, r2, c2) {
        (Some(r1), Some(c1), Some(r2), Some(c2)) => {
            RangeRef::from_bounds(r1, c1, r2, c2).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// 列幅（文字数単位）をピクセルに変換する
fn col_width_to_px(width: Option<f64>, default: f64) -> f64 {
    match width {
        Some(width) => (((256.0 * width + (128.0f64 / 7.0).floor()) / 256.0) * 7.0)
            .floor()
            .max(20.0),
        None => default,
    }
}

/// 行高（ポイント）をピクセルに変換する
fn row_height_to_px(height: Option<f64>, default: f64) -> f64 {
    match height {
        Some(height) => (height * 96.0 / 72.0).max(12.0),
        None => default,
    }
}

/// 描画範囲のピクセル座標系
///
/// 非表示の行と列は幅0として扱います。
struct SheetGeometry<'a> {
    sheet: &'a SheetDocument,
    options: HtmlOptions,
    start_row: u32,
    start_col: u32,
    visible_rows: Vec<u32>,
    visible_cols: Vec<u32>,
    total_width: f64,
    total_height: f64,
}

impl<'a> SheetGeometry<'a> {
    fn new(sheet: &'a SheetDocument, range: &RangeRef, options: HtmlOptions) -> Self {
        let visible_rows: Vec<u32> = (range.start_row..=range.end_row)
            .filter(|r| !sheet.hidden_rows.contains(r))
            .collect();
        let visible_cols: Vec<u32> = (range.start_col..=range.end_col)
            .filter(|c| !sheet.hidden_cols.contains(c))
            .collect();
        let mut geometry = Self {
            sheet,
            options,
            start_row: range.start_row,
            start_col: range.start_col,
            visible_rows,
            visible_cols,
            total_width: 0.0,
            total_height: 0.0,
        };
        geometry.total_width = geometry
            .visible_cols
            .iter()
            .map(|&c| geometry.col_width(c))
            .sum();
        geometry.total_height = geometry
            .visible_rows
            .iter()
            .map(|&r| geometry.row_height(r))
            .sum();
        geometry
    }

    fn col_width(&self, col: u32) -> f64 {
        col_width_to_px(
            self.sheet.col_widths.get(&col).copied(),
            self.options.col_width_px,
        )
    }

    fn row_height(&self, row: u32) -> f64 {
        row_height_to_px(
            self.sheet.row_heights.get(&row).copied(),
            self.options.row_height_px,
        )
    }

    /// 列番号（1始まり）の左端のx座標
    fn x_at_col(&self, col: i64, col_off: i64) -> f64 {
        let start = i64::from(self.start_col);
        let width = |c: i64| -> f64 {
            match u32::try_from(c) {
                Ok(c) if !self.sheet.hidden_cols.contains(&c) => self.col_width(c),
                Ok(_) => 0.0,
                Err(_) => self.options.col_width_px,
            }
        };
        let x: f64 = if col >= start {
            (start..col).map(width).sum()
        } else {
            -(col..start).map(width).sum::<f64>()
        };
        x + col_off as f64 / EMU_PER_PIXEL
    }

    /// 行番号（1始まり）の上端のy座標
    fn y_at_row(&self, row: i64, row_off: i64) -> f64 {
        let start = i64::from(self.start_row);
        let height = |r: i64| -> f64 {
            match u32::try_from(r) {
                Ok(r) if !self.sheet.hidden_rows.contains(&r) => self.row_height(r),
                Ok(_) => 0.0,
                Err(_) => self.options.row_height_px,
            }
        };
        let y: f64 = if row >= start {
            (start..row).map(height).sum()
        } else {
            -(row..start).map(height).sum::<f64>()
        };
        y + row_off as f64 / EMU_PER_PIXEL
    }

    /// アンカーの格子点（0始まり）をピクセル座標に変換する
    fn point(&self, anchor: &AnchorPoint) -> (f64, f64) {
        (
            self.x_at_col(anchor.col + 1, anchor.col_off),
            self.y_at_row(anchor.row + 1, anchor.row_off),
        )
    }

    /// ウィンドウ枠の固定位置
    fn freeze_lines(&self) -> (Option<f64>, Option<f64>) {
        let Some(pane) = &self.sheet.pane else {
            return (None, None);
        };
        let split = |value: Option<f64>| value.map(|v| v.trunc() as i64).filter(|v| *v > 0);
        let x = split(pane.x_split).map(|n| self.x_at_col(i64::from(self.start_col) + n, 0));
        let y = split(pane.y_split).map(|n| self.y_at_row(i64::from(self.start_row) + n, 0));
        (x, y)
    }

    fn shape_rect(&self, obj: &DrawingObject) -> BoundingBox {
        match (&obj.anchor_from, &obj.anchor_to) {
            (Some(from), Some(to)) => {
                let (x1, y1) = self.point(from);
                let (x2, y2) = self.point(to);
                BoundingBox {
                    x: x1.min(x2),
                    y: y1.min(y2),
                    w: (x2 - x1).abs().max(MIN_SHAPE_SIZE),
                    h: (y2 - y1).abs().max(MIN_SHAPE_SIZE),
                }
            }
            _ => BoundingBox {
                w: obj.bbox.w.max(MIN_SHAPE_SIZE),
                h: obj.bbox.h.max(MIN_SHAPE_SIZE),
                ..obj.bbox
            },
        }
    }

    fn connector_points(&self, obj: &DrawingObject) -> ((f64, f64), (f64, f64)) {
        let start = obj
            .anchor_from
            .as_ref()
            .map(|a| self.point(a))
            .unwrap_or((obj.bbox.x, obj.bbox.y));
        let end = obj
            .anchor_to
            .as_ref()
            .map(|a| self.point(a))
            .unwrap_or((obj.bbox.x + obj.bbox.w, obj.bbox.y + obj.bbox.h));
        (start, end)
    }
}

/// 1つの範囲をシートビューのグリッドとして出力する
///
/// `overlay`が`true`の場合、図形・画像・コネクタ・ウィンドウ枠の固定線を重ねます。
pub(crate) fn write_sheet_range<W: Write>(
    w: &mut W,
    sheet: &SheetDocument,
    range: &RangeRef,
    style_css_map: &BTreeMap<u32, String>,
    options: HtmlOptions,
    overlay: bool,
) -> Result<(), XlsxToMdError> {
    let geometry = SheetGeometry::new(sheet, range, options);
    if geometry.visible_rows.is_empty() || geometry.visible_cols.is_empty() {
        writeln!(
            w,
            "<p class=\"empty\">All rows/cols in this range are hidden.</p>"
        )?;
        return Ok(());
    }

    // 範囲と重なる結合を、表示されている行・列に絞って配置する
    let mut anchors: HashMap<String, (usize, usize, &str)> = HashMap::new();
    let mut covered: HashSet<String> = HashSet::new();
    for merge in &sheet.merges {
        if merge.intersection(range).is_none() {
            continue;
        }
        let rows: Vec<u32> = geometry
            .visible_rows
            .iter()
            .copied()
            .filter(|r| (merge.start_row..=merge.end_row).contains(r))
            .collect();
        let cols: Vec<u32> = geometry
            .visible_cols
            .iter()
            .copied()
            .filter(|c| (merge.start_col..=merge.end_col).contains(c))
            .collect();
        let (Some(&top), Some(&left)) = (rows.first(), cols.first()) else {
            continue;
        };
        let anchor = row_col_to_coord(top, left)?;
        for &r in &rows {
            for &c in &cols {
                let coord = row_col_to_coord(r, c)?;
                if coord != anchor {
                    covered.insert(coord);
                }
            }
        }
        anchors.insert(anchor, (rows.len(), cols.len(), merge.reference.as_str()));
    }

    writeln!(w, "<div class=\"sv-wrap\">")?;
    writeln!(w, "<div class=\"sv-canvas\">")?;
    writeln!(w, "<table class=\"sv-grid\">")?;
    writeln!(w, "<colgroup>")?;
    writeln!(w, "<col style=\"width:{:.1}px\">", ROW_HEADER_WIDTH)?;
    for &col in &geometry.visible_cols {
        writeln!(w, "<col style=\"width:{:.1}px\">", geometry.col_width(col))?;
    }
    writeln!(w, "</colgroup>")?;
    write!(w, "<thead><tr><th class=\"sv-corner\"></th>")?;
    for &col in &geometry.visible_cols {
        write!(w, "<th class=\"sv-col-head\">{}</th>", index_to_col(col)?)?;
    }
    writeln!(w, "</tr></thead>")?;
    writeln!(w, "<tbody>")?;

    for &row in &geometry.visible_rows {
        write!(
            w,
            "<tr style=\"height:{:.1}px\"><th class=\"sv-row-head\">{}</th>",
            geometry.row_height(row),
            row
        )?;
        for &col in &geometry.visible_cols {
            let coord = row_col_to_coord(row, col)?;
            if covered.contains(&coord) {
                continue;
            }
            let cell = sheet.cell(&coord);
            let style_id = cell.and_then(|c| c.style_id).unwrap_or(0);
            let mut css = style_css_map.get(&style_id).cloned().unwrap_or_default();
            if !css.is_empty() && !css.trim_end().ends_with(';') {
                css.push(';');
            }
            let text = escape_html(cell.map(|c| c.value.as_str()).unwrap_or(""));

            write!(w, "<td")?;
            if let Some((rowspan, colspan, reference)) = anchors.get(&coord) {
                write!(
                    w,
                    " rowspan=\"{}\" colspan=\"{}\" data-merge=\"{}\"",
                    rowspan, colspan, reference
                )?;
            }
            let class = if text.trim().is_empty() {
                "sv-cell sv-empty"
            } else {
                "sv-cell"
            };
            write!(w, " class=\"{}\" data-coord=\"{}\"", class, coord)?;
            if !css.is_empty() {
                write!(w, " style=\"{}\"", escape_html(&css))?;
            }
            write!(w, ">{}</td>", text)?;
        }
        writeln!(w, "</tr>")?;
    }
    writeln!(w, "</tbody>\n</table>")?;

    if overlay {
        write_overlay(w, sheet, &geometry)?;
    }
    writeln!(w, "</div>\n</div>")?;
    Ok(())
}

fn write_overlay<W: Write>(
    w: &mut W,
    sheet: &SheetDocument,
    geometry: &SheetGeometry<'_>,
) -> Result<(), XlsxToMdError> {
    writeln!(w, "<div class=\"sv-overlay\">")?;

    let mut z_index = 10;
    for obj in &sheet.drawings {
        if obj.kind == DrawingKind::Connector {
            continue;
        }
        let rect = geometry.shape_rect(obj);
        if rect.x + rect.w < 0.0 || rect.y + rect.h < 0.0 {
            continue;
        }
        if rect.x > geometry.total_width || rect.y > geometry.total_height {
            continue;
        }

        let label = escape_html(obj.label().trim());
        let class = if obj.kind == DrawingKind::Picture {
            "sv-shape pic"
        } else {
            "sv-shape"
        };
        let body = match (&obj.kind, &obj.image_data_uri) {
            (DrawingKind::Picture, Some(uri)) => format!(
                "<img src=\"{}\" alt=\"{}\" style=\"width:100%;height:100%;object-fit:contain;\">",
                uri, label
            ),
            _ if label.is_empty() => "&nbsp;".to_string(),
            _ => label,
        };
        writeln!(
            w,
            "<div class=\"{}\" data-uid=\"{}\" style=\"left:{:.1}px;top:{:.1}px;width:{:.1}px;height:{:.1}px;{}\">{}</div>",
            class,
            escape_html(&obj.object_uid),
            rect.x,
            rect.y,
            rect.w,
            rect.h,
            shape_css(&obj.style, z_index),
            body
        )?;
        z_index += 1;
    }

    writeln!(
        w,
        "<svg class=\"sv-lines\" width=\"{0:.1}\" height=\"{1:.1}\" viewBox=\"0 0 {0:.1} {1:.1}\">",
        geometry.total_width, geometry.total_height
    )?;
    writeln!(
        w,
        "<defs><marker id=\"arrow-triangle\" viewBox=\"0 0 10 10\" refX=\"8\" refY=\"5\" markerWidth=\"7\" markerHeight=\"7\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"context-stroke\" /></marker></defs>"
    )?;

    for conn in &sheet.connectors {
        let ((x1, y1), (x2, y2)) = geometry.connector_points(&conn.object);
        if x1.max(x2) < 0.0
            || y1.max(y2) < 0.0
            || x1.min(x2) > geometry.total_width
            || y1.min(y2) > geometry.total_height
        {
            continue;
        }

        let style = &conn.object.style;
        let stroke = style.line_color.as_deref().unwrap_or("#ef4444");
        let stroke_width = style.line_width_px.unwrap_or(1.2);
        write!(
            w,
            "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{}\" stroke-opacity=\"0.92\"",
            x1, y1, x2, y2, stroke, stroke_width
        )?;
        if let Some(dash) = style.line_dash.as_deref().and_then(dasharray_for) {
            write!(w, " stroke-dasharray=\"{}\"", dash)?;
        }
        if has_arrow(conn.arrow_head.as_deref()) {
            write!(w, " marker-start=\"url(#arrow-triangle)\"")?;
        }
        if has_arrow(conn.arrow_tail.as_deref()) {
            write!(w, " marker-end=\"url(#arrow-triangle)\"")?;
        }
        writeln!(w, " />")?;

        if let Some(text) = conn.object.text.as_deref().filter(|t| !t.trim().is_empty()) {
            writeln!(
                w,
                "<text x=\"{:.1}\" y=\"{:.1}\" class=\"sv-line-label\">{}</text>",
                (x1 + x2) / 2.0,
                (y1 + y2) / 2.0 - 2.0,
                escape_html(text.trim())
            )?;
        }
    }

    let (freeze_x, freeze_y) = geometry.freeze_lines();
    if let Some(x) = freeze_x {
        writeln!(
            w,
            "<line class=\"sv-freeze\" x1=\"{0:.1}\" y1=\"0\" x2=\"{0:.1}\" y2=\"{1:.1}\" />",
            x, geometry.total_height
        )?;
    }
    if let Some(y) = freeze_y {
        writeln!(
            w,
            "<line class=\"sv-freeze\" x1=\"0\" y1=\"{0:.1}\" x2=\"{1:.1}\" y2=\"{0:.1}\" />",
            y, geometry.total_width
        )?;
    }

    writeln!(w, "</svg>\n</div>")?;
    Ok(())
}

fn shape_css(style: &ShapeStyle, z_index: u32) -> String {
    let line = style.line_color.as_deref().unwrap_or("#fb7185");
    let fill = style
        .fill_color
        .as_deref()
        .map(|c| to_alpha(c, 0.12))
        .unwrap_or_else(|| "rgba(251,113,133,0.08)".to_string());
    let mut css = format!(
        "z-index:{};border-color:{};border-width:{}px;background:{};",
        z_index,
        line,
        style.line_width_px.unwrap_or(1.0),
        fill
    );
    if let Some(dash) = style.line_dash.as_deref() {
        let border = match dash {
            "dash" | "dashDot" | "lgDash" | "sysDash" => "dashed",
            "dot" | "sysDot" => "dotted",
            _ => "solid",
        };
        css.push_str(&format!("border-style:{};", border));
    }
    css
}

/// `#RRGGBB`を指定の不透明度の`rgba()`に変換する（それ以外はそのまま）
fn to_alpha(color: &str, alpha: f64) -> String {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() == 6 {
        if let (Ok(r), Ok(g), Ok(b)) = (
            u8::from_str_radix(&hex[0..2], 16),
            u8::from_str_radix(&hex[2..4], 16),
            u8::from_str_radix(&hex[4..6], 16),
        ) {
            return format!("rgba({},{},{},{:.2})", r, g, b, alpha);
        }
    }
    color.to_string()
}

fn dasharray_for(dash: &str) -> Option<&'static str> {
    match dash {
        "dash" | "sysDash" => Some("6 4"),
        "dot" | "sysDot" => Some("2 3"),
        "dashDot" => Some("8 3 2 3"),
        "lgDash" => Some("10 4"),
        _ => None,
    }
}

fn has_arrow(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.eq_ignore_ascii_case("none"))
}

fn join_refs(ranges: &[RangeRef]) -> String {
    ranges
        .iter()
        .map(|r| r.reference.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_kv_table<W: Write>(w: &mut W, rows: &[(&str, String)]) -> Result<(), XlsxToMdError> {
    writeln!(w, "<table class=\"simple\">")?;
    writeln!(w, "<thead><tr><th>key</th><th>value</th></tr></thead><tbody>")?;
    for (key, value) in rows {
        writeln!(
            w,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(key),
            escape_html(value)
        )?;
    }
    writeln!(w, "</tbody></table>")?;
    Ok(())
}

const STYLESHEET: &str = r#"* { box-sizing: border-box; }
body { margin: 0; background: #fff; color: #111827; font: 14px/1.5 -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; }
.page { max-width: 99vw; margin: 0 auto; padding: 18px 14px 80px; }
h1 { margin: 0 0 12px; font-size: 24px; }
h2 { margin: 28px 0 10px; font-size: 18px; }
h3 { margin: 22px 0 8px; font-size: 14px; }
.meta { margin: 0 0 10px; color: #4b5563; }
.empty { color: #6b7280; font-style: italic; }
.simple { border-collapse: collapse; width: 100%; max-width: 1400px; }
.simple th, .simple td { border: 1px solid #d0d7de; padding: 6px 8px; font-size: 12px; vertical-align: top; }
.simple th { background: #f6f8fa; text-align: left; }
.sv-wrap { border: 1px solid #d0d7de; border-radius: 8px; overflow: auto; padding: 8px; margin: 8px 0 22px; }
.sv-canvas { position: relative; display: inline-block; }
.sv-grid { border-collapse: collapse; font: 11px/1.25 'Yu Gothic UI', 'Meiryo', sans-serif; table-layout: fixed; }
.sv-grid th, .sv-grid td { border: 1px solid #d0d7de; }
.sv-grid .sv-corner, .sv-grid .sv-col-head, .sv-grid .sv-row-head { background: #edf2f7; color: #374151; font: 11px/1.2 'SF Mono', Menlo, Consolas, monospace; text-align: center; }
.sv-grid .sv-col-head { height: 24px; }
.sv-grid td { padding: 2px 4px; overflow: hidden; vertical-align: top; white-space: pre-wrap; }
.sv-overlay { position: absolute; left: 56px; top: 24px; right: 0; bottom: 0; pointer-events: none; }
.sv-shape { position: absolute; border: 1px solid #fb7185; color: #111827; font: 10px/1.2 sans-serif; padding: 2px; overflow: hidden; }
.sv-shape.pic { border-color: #3b82f6; background: rgba(59, 130, 246, 0.06); }
.sv-lines { position: absolute; inset: 0; overflow: visible; }
.sv-line-label { font: 10px/1.1 sans-serif; fill: #1f2937; paint-order: stroke; stroke: #fff; stroke-width: 2px; }
.sv-freeze { stroke: #2563eb; stroke-width: 1.3; stroke-dasharray: 5 3; opacity: 0.9; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnchorKind, Cell, CellType, SheetState};

    const OPTIONS: HtmlOptions = HtmlOptions {
        col_width_px: 64.0,
        row_height_px: 20.0,
    };

    fn sheet() -> SheetDocument {
        let mut sheet = SheetDocument::new(
            0,
            "Data".to_string(),
            SheetState::Visible,
            "xl/worksheets/sheet1.xml".to_string(),
        );
        for (coord, row, col, value, style) in [
            ("A1", 1, 1, "Title", Some(1)),
            ("A2", 2, 1, "a&b", None),
            ("C2", 2, 3, "x", None),
        ] {
            sheet.push_cell(Cell {
                coord: coord.to_string(),
                row,
                col,
                cell_type: CellType::InlineString,
                value: value.to_string(),
                formula: None,
                cached_value: None,
                style_id: style,
            });
        }
        sheet.merges.push(parse_range_ref("A1:C1").unwrap());
        sheet.dimension_ref = Some("A1:C2".to_string());
        sheet
    }

    fn render(sheet: &SheetDocument, overlay: bool) -> String {
        let mut css = BTreeMap::new();
        css.insert(1, "font-weight:bold".to_string());
        let range = sheetview_ranges(sheet).remove(0);
        let mut out = Vec::new();
        write_sheet_range(&mut out, sheet, &range, &css, OPTIONS, overlay).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_grid_merges_and_styles() {
        let html = render(&sheet(), false);
        assert!(html.contains(
            "<td rowspan=\"1\" colspan=\"3\" data-merge=\"A1:C1\" class=\"sv-cell\" data-coord=\"A1\" style=\"font-weight:bold;\">Title</td>"
        ));
        assert!(!html.contains("data-coord=\"B1\""));
        assert!(html.contains(">a&amp;b</td>"));
        assert!(html.contains("class=\"sv-cell sv-empty\" data-coord=\"B2\""));
        assert!(html.contains("<th class=\"sv-col-head\">C</th>"));
        assert!(!html.contains("sv-overlay"));
    }

    #[test]
    fn test_hidden_columns_are_skipped() {
        let mut s = sheet();
        s.hidden_cols.insert(2);
        s.col_widths.insert(3, 10.0);
        let html = render(&s, false);
        assert!(!html.contains("<th class=\"sv-col-head\">B</th>"));
        // 結合は表示されている列だけにまたがる
        assert!(html.contains("colspan=\"2\""));
        assert!(html.contains("<col style=\"width:70.0px\">"));
    }

    #[test]
    fn test_overlay_shapes_and_connectors() {
        let mut s = sheet();
        let shape = DrawingObject {
            object_uid: "xl/drawings/drawing1.xml:2".to_string(),
            object_id: "2".to_string(),
            drawing_path: "xl/drawings/drawing1.xml".to_string(),
            kind: DrawingKind::Shape,
            name: Some("Box".to_string()),
            text: Some("Start".to_string()),
            anchor_type: AnchorKind::TwoCell,
            anchor_from: Some(AnchorPoint {
                col: 1,
                row: 0,
                col_off: 0,
                row_off: 0,
            }),
            anchor_to: Some(AnchorPoint {
                col: 2,
                row: 1,
                col_off: 0,
                row_off: 0,
            }),
            bbox: BoundingBox::default(),
            parent_uid: None,
            image_target: None,
            image_content_type: None,
            image_data_uri: None,
            style: ShapeStyle {
                fill_color: Some("#FF0000".to_string()),
                ..ShapeStyle::default()
            },
            raw_xml: String::new(),
        };
        s.drawings.push(shape);
        let html = render(&s, true);
        assert!(html.contains("left:64.0px;top:0.0px;width:64.0px;height:20.0px;"));
        assert!(html.contains("background:rgba(255,0,0,0.12);"));
        assert!(html.contains(">Start</div>"));
        assert!(html.contains("<svg class=\"sv-lines\" width=\"192.0\" height=\"40.0\""));
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(col_width_to_px(None, 64.0), 64.0);
        assert_eq!(col_width_to_px(Some(8.43), 64.0), 59.0);
        assert_eq!(col_width_to_px(Some(0.5), 64.0), 20.0);
        assert_eq!(row_height_to_px(Some(15.0), 20.0), 20.0);
        assert_eq!(row_height_to_px(Some(3.0), 20.0), 12.0);
        assert_eq!(to_alpha("#00FF00", 0.5), "rgba(0,255,0,0.50)");
        assert_eq!(to_alpha("red", 0.5), "red");
        assert!(has_arrow(Some("triangle")));
        assert!(!has_arrow(Some("none")));
        assert!(!has_arrow(None));
    }
}
