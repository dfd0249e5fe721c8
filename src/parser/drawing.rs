//! Drawing Module
//!
//! 描画パーツ（`xl/drawings/drawingN.xml`）から図形、コネクタ、画像、グループを抽出し、
//! アンカーをピクセル空間の外接矩形に正規化するモジュール。

use std::collections::HashMap;

use base64::Engine;

use crate::error::XlsxToMdError;
use crate::parser::package::Package;
use crate::parser::theme::ThemePalette;
use crate::types::{
    AnchorKind, AnchorPoint, BoundingBox, ConnectorDirection, ConnectorInfo, DrawingKind,
    DrawingObject, ShapeStyle, UnsupportedElement, UnsupportedScope,
};
use crate::xml::XmlNode;

/// 1ピクセルあたりのEMU（96 DPI）
pub(crate) const EMU_PER_PIXEL: f64 = 9525.0;

/// アンカーの格子点をピクセルに換算するための既定のセルサイズ
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Geometry {
    pub col_width_px: f64,
    pub row_height_px: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            col_width_px: 64.0,
            row_height_px: 20.0,
        }
    }
}

impl Geometry {
    /// 格子点をピクセル座標に変換する
    pub fn point_to_xy(&self, point: &AnchorPoint) -> (f64, f64) {
        (
            point.col as f64 * self.col_width_px + point.col_off as f64 / EMU_PER_PIXEL,
            point.row as f64 * self.row_height_px + point.row_off as f64 / EMU_PER_PIXEL,
        )
    }

    /// 2つの格子点を囲む矩形
    fn bbox_between(&self, from: &AnchorPoint, to: &AnchorPoint) -> BoundingBox {
        let (x1, y1) = self.point_to_xy(from);
        let (x2, y2) = self.point_to_xy(to);
        BoundingBox {
            x: x1.min(x2),
            y: y1.min(y2),
            w: (x2 - x1).abs(),
            h: (y2 - y1).abs(),
        }
    }
}

/// 描画パーツの解析設定
pub(crate) struct DrawingContext<'a> {
    pub package: &'a Package,
    pub theme: &'a ThemePalette,
    pub geometry: Geometry,
    /// 画像をdata URIとして埋め込むか
    pub embed_images: bool,
}

/// 描画パーツ1つ分の解析結果
#[derive(Debug, Default)]
pub(crate) struct DrawingPart {
    pub objects: Vec<DrawingObject>,
    pub connectors: Vec<ConnectorInfo>,
    pub unsupported: Vec<UnsupportedElement>,
    pub warnings: Vec<String>,
}

/// アンカー1つ分の位置情報
#[derive(Debug, Clone, Copy)]
struct Placement {
    kind: AnchorKind,
    from: Option<AnchorPoint>,
    to: Option<AnchorPoint>,
    bbox: BoundingBox,
}

/// 描画パーツを解析する
///
/// コネクタの接続先推論はここでは行いません（`connector`モジュールを参照）。
pub(crate) fn parse_drawing(
    ctx: &DrawingContext<'_>,
    drawing_path: &str,
    xml: &[u8],
) -> Result<DrawingPart, XlsxToMdError> {
    let root = XmlNode::parse(xml)?;
    let rel_targets: HashMap<String, String> = ctx
        .package
        .relationships(drawing_path)?
        .into_iter()
        .map(|rel| (rel.id, rel.target))
        .collect();

    let mut walker = Walker {
        ctx,
        drawing_path,
        rel_targets,
        uid_counter: HashMap::new(),
        part: DrawingPart::default(),
    };

    for anchor in &root.children {
        let kind = match anchor.tag.as_str() {
            "twoCellAnchor" => AnchorKind::TwoCell,
            "oneCellAnchor" => AnchorKind::OneCell,
            "absoluteAnchor" => AnchorKind::Absolute,
            _ => {
                walker.unsupported(anchor);
                continue;
            }
        };
        let placement = ctx.geometry.place(kind, anchor);

        for child in &anchor.children {
            match child.tag.as_str() {
                "from" | "to" | "clientData" | "pos" | "ext" => {}
                tag => match DrawingKind::from_tag(tag) {
                    Some(kind) => walker.walk(child, kind, &placement, None),
                    None => walker.unsupported(child),
                },
            }
        }
    }

    log::debug!(
        "parsed drawing {}: {} objects, {} connectors",
        drawing_path,
        walker.part.objects.len(),
        walker.part.connectors.len()
    );
    Ok(walker.part)
}

impl Geometry {
    fn place(&self, kind: AnchorKind, anchor: &XmlNode) -> Placement {
        let mut placement = Placement {
            kind,
            from: None,
            to: None,
            bbox: BoundingBox::default(),
        };
        match kind {
            AnchorKind::TwoCell => {
                placement.from = anchor.child("from").map(parse_anchor_point);
                placement.to = anchor.child("to").map(parse_anchor_point);
                if let (Some(from), Some(to)) = (&placement.from, &placement.to) {
                    placement.bbox = self.bbox_between(from, to);
                }
            }
            AnchorKind::OneCell => {
                let Some(from) = anchor.child("from").map(parse_anchor_point) else {
                    return placement;
                };
                let (cx, cy) = extent(anchor.child("ext"));
                let add_cols = ((cx / EMU_PER_PIXEL / self.col_width_px).round() as i64).max(1);
                let add_rows = ((cy / EMU_PER_PIXEL / self.row_height_px).round() as i64).max(1);
                let to = AnchorPoint {
                    col: from.col + add_cols,
                    row: from.row + add_rows,
                    col_off: from.col_off,
                    row_off: from.row_off,
                };
                placement.bbox = self.bbox_between(&from, &to);
                placement.from = Some(from);
                placement.to = Some(to);
            }
            AnchorKind::Absolute => {
                let pos = anchor.child("pos");
                let x = pos.and_then(|p| p.attr_parse::<f64>("x")).unwrap_or(0.0);
                let y = pos.and_then(|p| p.attr_parse::<f64>("y")).unwrap_or(0.0);
                let (cx, cy) = extent(anchor.child("ext"));
                placement.bbox = BoundingBox {
                    x: x / EMU_PER_PIXEL,
                    y: y / EMU_PER_PIXEL,
                    w: cx / EMU_PER_PIXEL,
                    h: cy / EMU_PER_PIXEL,
                };
            }
        }
        placement
    }
}

fn extent(ext: Option<&XmlNode>) -> (f64, f64) {
    match ext {
        Some(ext) => (
            ext.attr_parse::<f64>("cx").unwrap_or(0.0),
            ext.attr_parse::<f64>("cy").unwrap_or(0.0),
        ),
        None => (0.0, 0.0),
    }
}

fn parse_anchor_point(node: &XmlNode) -> AnchorPoint {
    let value = |tag: &str| {
        node.child(tag)
            .and_then(|c| c.text_or_empty().trim().parse::<i64>().ok())
            .unwrap_or(0)
    };
    AnchorPoint {
        col: value("col"),
        row: value("row"),
        col_off: value("colOff"),
        row_off: value("rowOff"),
    }
}

struct Walker<'c, 'a> {
    ctx: &'c DrawingContext<'a>,
    drawing_path: &'c str,
    rel_targets: HashMap<String, String>,
    uid_counter: HashMap<String, usize>,
    part: DrawingPart,
}

impl Walker<'_, '_> {
    fn unsupported(&mut self, node: &XmlNode) {
        log::warn!(
            "{}: unsupported drawing element <{}>",
            self.drawing_path,
            node.tag
        );
        self.part.unsupported.push(UnsupportedElement {
            scope: UnsupportedScope::Drawing,
            location: self.drawing_path.to_string(),
            tag: node.tag.clone(),
            raw_xml: node.to_xml(),
        });
    }

    /// オブジェクトを登録し、グループであれば子を再帰的に登録する
    fn walk(
        &mut self,
        element: &XmlNode,
        kind: DrawingKind,
        placement: &Placement,
        parent_uid: Option<&str>,
    ) {
        let c_nv_pr = element
            .child(non_visual_tag(kind))
            .and_then(|nv| nv.child("cNvPr"));
        let object_id = c_nv_pr
            .and_then(|c| c.attr("id"))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("auto-{}", self.part.objects.len() + 1));
        let name = c_nv_pr
            .and_then(|c| c.attr("name"))
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let raw_uid = format!("{}:{}", self.drawing_path, object_id);
        let seen = self.uid_counter.entry(raw_uid.clone()).or_insert(0);
        *seen += 1;
        let object_uid = if *seen == 1 {
            raw_uid
        } else {
            format!("{}#{}", raw_uid, seen)
        };

        let mut runs = Vec::new();
        element.descendants("t", &mut runs);
        let text = runs
            .iter()
            .map(|t| t.text_or_empty())
            .collect::<String>()
            .trim()
            .to_string();

        let mut object = DrawingObject {
            object_uid: object_uid.clone(),
            object_id,
            drawing_path: self.drawing_path.to_string(),
            kind,
            name,
            text: Some(text).filter(|t| !t.is_empty()),
            anchor_type: placement.kind,
            anchor_from: placement.from,
            anchor_to: placement.to,
            bbox: placement.bbox,
            parent_uid: parent_uid.map(str::to_string),
            image_target: None,
            image_content_type: None,
            image_data_uri: None,
            style: shape_style(element, self.ctx.theme),
            raw_xml: element.to_xml(),
        };

        if kind == DrawingKind::Picture {
            self.attach_picture(element, &mut object);
        }
        if kind == DrawingKind::Connector {
            self.part.connectors.push(connector_info(element, &object));
        }
        self.part.objects.push(object);

        if kind == DrawingKind::Group {
            for child in &element.children {
                if matches!(child.tag.as_str(), "nvGrpSpPr" | "grpSpPr") {
                    continue;
                }
                if let Some(child_kind) = DrawingKind::from_tag(&child.tag) {
                    self.walk(child, child_kind, placement, Some(&object_uid));
                }
            }
        }
    }

    fn attach_picture(&mut self, element: &XmlNode, object: &mut DrawingObject) {
        let Some(rel_id) = element.find("blip").and_then(|b| b.attr("r:embed")) else {
            return;
        };
        let Some(target) = self.rel_targets.get(rel_id) else {
            return;
        };
        object.image_target = Some(target.clone());

        let Some(payload) = self.ctx.package.part(target) else {
            let warning = format!("Missing image part: {}", target);
            log::warn!("{}", warning);
            self.part.warnings.push(warning);
            return;
        };
        let content_type = self.ctx.package.content_type(target);
        if self.ctx.embed_images {
            object.image_data_uri = Some(format!(
                "data:{};base64,{}",
                content_type,
                base64::engine::general_purpose::STANDARD.encode(payload)
            ));
        }
        object.image_content_type = Some(content_type);
    }
}

fn non_visual_tag(kind: DrawingKind) -> &'static str {
    match kind {
        DrawingKind::Shape => "nvSpPr",
        DrawingKind::Connector => "nvCxnSpPr",
        DrawingKind::Picture => "nvPicPr",
        DrawingKind::Group => "nvGrpSpPr",
        DrawingKind::GraphicFrame => "nvGraphicFramePr",
    }
}

fn connector_info(element: &XmlNode, object: &DrawingObject) -> ConnectorInfo {
    let line = element.find("ln");
    let end_type = |tag: &str| {
        line.and_then(|ln| ln.child(tag))
            .and_then(|end| end.attr("type"))
            .map(str::to_string)
    };
    let connection = element
        .child("nvCxnSpPr")
        .and_then(|nv| nv.child("cNvCxnSpPr"));
    let connection_id = |tag: &str| {
        connection
            .and_then(|c| c.child(tag))
            .and_then(|c| c.attr("id"))
            .map(str::to_string)
    };
    let xfrm = element.child("spPr").and_then(|sp| sp.child("xfrm"));

    ConnectorInfo {
        object: object.clone(),
        arrow_head: end_type("headEnd"),
        arrow_tail: end_type("tailEnd"),
        start_connection: connection_id("stCxn"),
        end_connection: connection_id("endCxn"),
        flip_h: xfrm.is_some_and(|x| x.attr_flag("flipH")),
        flip_v: xfrm.is_some_and(|x| x.attr_flag("flipV")),
        direction: ConnectorDirection::Undirected,
        source_uid: None,
        target_uid: None,
        distance_source: None,
        distance_target: None,
        resolved: false,
    }
}

/// `spPr`から線と塗りつぶしのスタイルを読む
fn shape_style(element: &XmlNode, theme: &ThemePalette) -> ShapeStyle {
    let mut style = ShapeStyle::default();
    let Some(sp_pr) = element.child("spPr") else {
        return style;
    };

    if let Some(line) = sp_pr.child("ln") {
        style.line_width_px = line
            .attr_parse::<f64>("w")
            .map(|w| (w / EMU_PER_PIXEL).max(1.0));
        style.line_color = drawing_color(line, theme);
        style.line_dash = line
            .child("prstDash")
            .and_then(|d| d.attr("val"))
            .filter(|v| !v.is_empty())
            .map(str::to_string);
    }

    style.fill_color = sp_pr
        .child("solidFill")
        .and_then(|fill| drawing_color(fill, theme))
        .or_else(|| {
            sp_pr
                .child("gradFill")
                .and_then(|grad| grad.find("gs"))
                .and_then(|stop| drawing_color(stop, theme))
        });
    style
}

/// DrawingMLの色指定を`#RRGGBB`に解決する
pub(crate) fn drawing_color(node: &XmlNode, theme: &ThemePalette) -> Option<String> {
    if let Some(val) = node.find("srgbClr").and_then(|c| c.attr("val")) {
        return Some(format!("#{}", val.to_ascii_uppercase()));
    }
    if let Some(last) = node.find("sysClr").and_then(|c| c.attr("lastClr")) {
        return Some(format!("#{}", last.to_ascii_uppercase()));
    }
    if let Some(val) = node.find("schemeClr").and_then(|c| c.attr("val")) {
        return Some(
            theme
                .by_scheme_name(val)
                .map(str::to_string)
                .unwrap_or_else(|| scheme_fallback(val).to_string()),
        );
    }
    if let Some(val) = node.find("prstClr").and_then(|c| c.attr("val")) {
        return Some(preset_color(val).to_string());
    }
    None
}

fn scheme_fallback(name: &str) -> &'static str {
    match name {
        "dk1" | "tx1" => "#000000",
        "lt1" | "bg1" => "#FFFFFF",
        "dk2" | "tx2" => "#1F2937",
        "lt2" | "bg2" => "#F3F4F6",
        "accent1" => "#4F46E5",
        "accent2" => "#16A34A",
        "accent3" => "#F59E0B",
        "accent4" => "#0EA5E9",
        "accent5" => "#EC4899",
        "accent6" => "#A855F7",
        _ => "#6B7280",
    }
}

fn preset_color(name: &str) -> &'static str {
    match name {
        "black" => "#000000",
        "white" => "#FFFFFF",
        "red" => "#FF0000",
        "green" => "#008000",
        "lime" => "#00FF00",
        "blue" => "#0000FF",
        "yellow" => "#FFFF00",
        "orange" => "#FFA500",
        "purple" => "#800080",
        "gray" | "grey" => "#808080",
        "navy" => "#000080",
        "cyan" | "aqua" => "#00FFFF",
        "magenta" | "fuchsia" => "#FF00FF",
        _ => "#6B7280",
    }
}
