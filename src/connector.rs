//! Connector Module
//!
//! コネクタ図形の両端を最寄りの図形に結び付け、解決済みのコネクタから
//! Mermaidのフローチャート記述を生成するモジュール。

use std::collections::{HashMap, HashSet};

use crate::api::ConnectorEndpoints;
use crate::parser::drawing::Geometry;
use crate::types::{ConnectorDirection, ConnectorInfo, DrawingKind, DrawingObject};

/// 矢印指定が有効か（`none`以外）
fn has_arrow(marker: Option<&str>) -> bool {
    marker.is_some_and(|m| !m.eq_ignore_ascii_case("none"))
}

/// コネクタの始点と終点（ピクセル座標）
///
/// アンカーの開始点・終了点を、なければ外接矩形の左上・右下を使います。
/// `FlipAware`では`flipH`/`flipV`に応じてx・y座標を入れ替えます。
pub(crate) fn endpoints(
    connector: &ConnectorInfo,
    geometry: &Geometry,
    mode: ConnectorEndpoints,
) -> ((f64, f64), (f64, f64)) {
    let object = &connector.object;
    let bbox = &object.bbox;
    let mut start = object
        .anchor_from
        .as_ref()
        .map(|p| geometry.point_to_xy(p))
        .unwrap_or((bbox.x, bbox.y));
    let mut end = object
        .anchor_to
        .as_ref()
        .map(|p| geometry.point_to_xy(p))
        .unwrap_or((bbox.x + bbox.w, bbox.y + bbox.h));

    if mode == ConnectorEndpoints::FlipAware {
        if connector.flip_h {
            std::mem::swap(&mut start.0, &mut end.0);
        }
        if connector.flip_v {
            std::mem::swap(&mut start.1, &mut end.1);
        }
    }
    (start, end)
}

/// 点に最も近いノードと距離
///
/// 距離が等しい場合は先に現れたノードを採用します。
fn nearest_node<'a>(point: (f64, f64), nodes: &[&'a DrawingObject]) -> (Option<&'a str>, Option<f64>) {
    let mut best: Option<(&str, f64)> = None;
    for node in nodes {
        let dist = node.bbox.distance_to(point.0, point.1);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((node.object_uid.as_str(), dist));
        }
    }
    match best {
        Some((uid, dist)) => (Some(uid), Some(dist)),
        None => (None, None),
    }
}

/// コネクタの接続先を推論する
///
/// 同じ描画パーツのコネクタ以外のオブジェクトをノード候補とし、
/// 各端点から`threshold_px`以内で最も近いノードを接続先とします。
/// 閾値を超えた場合、接続先は設定せず距離のみを記録します。
///
/// # 戻り値
///
/// 解決できなかったコネクタごとの警告
pub(crate) fn infer_connectors(
    objects: &[DrawingObject],
    connectors: &mut [ConnectorInfo],
    geometry: &Geometry,
    threshold_px: f64,
    mode: ConnectorEndpoints,
) -> Vec<String> {
    let nodes: Vec<&DrawingObject> = objects
        .iter()
        .filter(|o| o.kind != DrawingKind::Connector)
        .collect();
    let node_uids: HashSet<&str> = nodes.iter().map(|n| n.object_uid.as_str()).collect();
    let mut warnings = Vec::new();

    for connector in connectors.iter_mut() {
        let (start, end) = endpoints(connector, geometry, mode);
        let head = has_arrow(connector.arrow_head.as_deref());
        let tail = has_arrow(connector.arrow_tail.as_deref());
        connector.direction = ConnectorDirection::classify(head, tail);

        let (source_point, target_point) = match connector.direction {
            ConnectorDirection::Reverse => (end, start),
            _ => (start, end),
        };

        let (mut source, d_src) = nearest_node(source_point, &nodes);
        let (mut target, d_tgt) = nearest_node(target_point, &nodes);
        if d_src.is_some_and(|d| d > threshold_px) {
            source = None;
        }
        if d_tgt.is_some_and(|d| d > threshold_px) {
            target = None;
        }

        connector.resolved = match (source, target) {
            (Some(s), Some(t)) => s != t && node_uids.contains(s) && node_uids.contains(t),
            _ => false,
        };
        connector.source_uid = source.map(str::to_string);
        connector.target_uid = target.map(str::to_string);
        connector.distance_source = d_src;
        connector.distance_target = d_tgt;

        if !connector.resolved {
            let warning = format!("Unresolved connector: {}", connector.object.object_uid);
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }

    warnings
}

/// Mermaidのラベル用にエスケープする
fn mermaid_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("\r\n", " ")
        .replace('\n', " ")
        .trim()
        .to_string()
}

/// 解決済みのコネクタからフローチャートを生成する
///
/// ノードは接続に使われたオブジェクトのみを、描画オブジェクトの順に`N1`, `N2`, ...と命名します。
/// 解決済みのコネクタがなければ`None`を返します。
pub(crate) fn build_mermaid(objects: &[DrawingObject], connectors: &[ConnectorInfo]) -> Option<String> {
    let resolved: Vec<(&ConnectorInfo, &str, &str)> = connectors
        .iter()
        .filter(|c| c.resolved)
        .filter_map(|c| Some((c, c.source_uid.as_deref()?, c.target_uid.as_deref()?)))
        .collect();
    if resolved.is_empty() {
        return None;
    }

    let used: HashSet<&str> = resolved.iter().flat_map(|(_, s, t)| [*s, *t]).collect();
    let mut ids: HashMap<&str, String> = HashMap::new();
    let mut lines = vec!["flowchart TD".to_string()];

    for node in objects.iter().filter(|o| used.contains(o.object_uid.as_str())) {
        let id = format!("N{}", ids.len() + 1);
        lines.push(format!("    {}[\"{}\"]", id, mermaid_escape(node.label())));
        ids.insert(node.object_uid.as_str(), id);
    }

    for (connector, source, target) in resolved {
        let (Some(from), Some(to)) = (ids.get(source), ids.get(target)) else {
            continue;
        };
        let label = connector
            .object
            .text
            .as_deref()
            .map(mermaid_escape)
            .filter(|l| !l.is_empty());
        let edge = match (connector.direction, label) {
            (ConnectorDirection::Bidirectional, Some(l)) => format!("{} <-->|\"{}\"| {}", from, l, to),
            (ConnectorDirection::Bidirectional, None) => format!("{} <--> {}", from, to),
            (ConnectorDirection::Undirected, Some(l)) => format!("{} ---|\"{}\"| {}", from, l, to),
            (ConnectorDirection::Undirected, None) => format!("{} --- {}", from, to),
            (_, Some(l)) => format!("{} -- \"{}\" --> {}", from, l, to),
            (_, None) => format!("{} --> {}", from, to),
        };
        lines.push(format!("    {}", edge));
    }

    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnchorKind, AnchorPoint, BoundingBox, ShapeStyle};

    fn object(id: &str, kind: DrawingKind, bbox: BoundingBox, text: Option<&str>) -> DrawingObject {
        DrawingObject {
            object_uid: format!("d.xml:{}", id),
            object_id: id.to_string(),
            drawing_path: "d.xml".to_string(),
            kind,
            name: Some(format!("Shape {}", id)),
            text: text.map(str::to_string),
            anchor_type: AnchorKind::TwoCell,
            anchor_from: None,
            anchor_to: None,
            bbox,
            parent_uid: None,
            image_target: None,
            image_content_type: None,
            image_data_uri: None,
            style: ShapeStyle::default(),
            raw_xml: String::new(),
        }
    }

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox { x, y, w, h }
    }

    fn connector(
        id: &str,
        from: (i64, i64),
        to: (i64, i64),
        head: Option<&str>,
        tail: Option<&str>,
    ) -> ConnectorInfo {
        let mut obj = object(id, DrawingKind::Connector, BoundingBox::default(), None);
        obj.anchor_from = Some(AnchorPoint {
            col: from.0,
            row: from.1,
            col_off: 0,
            row_off: 0,
        });
        obj.anchor_to = Some(AnchorPoint {
            col: to.0,
            row: to.1,
            col_off: 0,
            row_off: 0,
        });
        ConnectorInfo {
            object: obj,
            arrow_head: head.map(str::to_string),
            arrow_tail: tail.map(str::to_string),
            start_connection: None,
            end_connection: None,
            flip_h: false,
            flip_v: false,
            direction: ConnectorDirection::Undirected,
            source_uid: None,
            target_uid: None,
            distance_source: None,
            distance_target: None,
            resolved: false,
        }
    }

    fn infer(objects: &[DrawingObject], connectors: &mut [ConnectorInfo]) -> Vec<String> {
        infer_connectors(
            objects,
            connectors,
            &Geometry::default(),
            220.0,
            ConnectorEndpoints::Anchor,
        )
    }

    /// A(0..64, 0..20) と B(256..320, 0..20)
    fn two_nodes() -> Vec<DrawingObject> {
        vec![
            object("1", DrawingKind::Shape, bbox(0.0, 0.0, 64.0, 20.0), Some("Start")),
            object("2", DrawingKind::Shape, bbox(256.0, 0.0, 64.0, 20.0), Some("End")),
        ]
    }

    #[test]
    fn test_forward_connector_resolves() {
        let objects = two_nodes();
        let mut connectors = vec![connector("3", (1, 0), (4, 0), None, Some("triangle"))];
        let warnings = infer(&objects, &mut connectors);
        assert!(warnings.is_empty());
        let c = &connectors[0];
        assert_eq!(c.direction, ConnectorDirection::Forward);
        assert_eq!(c.source_uid.as_deref(), Some("d.xml:1"));
        assert_eq!(c.target_uid.as_deref(), Some("d.xml:2"));
        assert_eq!(c.distance_source, Some(0.0));
        assert!(c.resolved);

        let mermaid = build_mermaid(&objects, &connectors).unwrap();
        assert_eq!(
            mermaid,
            "flowchart TD\n    N1[\"Start\"]\n    N2[\"End\"]\n    N1 --> N2"
        );
    }

    #[test]
    fn test_reverse_swaps_endpoints() {
        let objects = two_nodes();
        let mut connectors = vec![connector("3", (1, 0), (4, 0), Some("arrow"), Some("none"))];
        infer(&objects, &mut connectors);
        let c = &connectors[0];
        assert_eq!(c.direction, ConnectorDirection::Reverse);
        assert_eq!(c.source_uid.as_deref(), Some("d.xml:2"));
        assert_eq!(c.target_uid.as_deref(), Some("d.xml:1"));
    }

    #[test]
    fn test_threshold_keeps_distance() {
        let objects = two_nodes();
        // 終点 (64*10, 0) はBから320px
        let mut connectors = vec![connector("3", (1, 0), (10, 0), None, None)];
        let warnings = infer(&objects, &mut connectors);
        let c = &connectors[0];
        assert_eq!(c.direction, ConnectorDirection::Undirected);
        assert!(c.target_uid.is_none());
        assert_eq!(c.distance_target, Some(320.0));
        assert!(!c.resolved);
        assert_eq!(warnings, vec!["Unresolved connector: d.xml:3"]);
        assert!(build_mermaid(&objects, &connectors).is_none());
    }

    #[test]
    fn test_same_node_is_unresolved() {
        let objects = two_nodes();
        let mut connectors = vec![connector("3", (0, 0), (1, 0), None, Some("arrow"))];
        infer(&objects, &mut connectors);
        assert_eq!(connectors[0].source_uid, connectors[0].target_uid);
        assert!(!connectors[0].resolved);
    }

    #[test]
    fn test_ties_keep_first_node() {
        let objects = vec![
            object("1", DrawingKind::Shape, bbox(0.0, 0.0, 10.0, 10.0), None),
            object("2", DrawingKind::Shape, bbox(0.0, 0.0, 10.0, 10.0), None),
        ];
        let (uid, dist) = nearest_node((5.0, 5.0), &objects.iter().collect::<Vec<_>>());
        assert_eq!(uid, Some("d.xml:1"));
        assert_eq!(dist, Some(0.0));
    }

    #[test]
    fn test_flip_is_ignored_by_default() {
        let mut c = connector("3", (1, 0), (4, 2), None, None);
        c.flip_h = true;
        c.flip_v = true;
        let (start, end) = endpoints(&c, &Geometry::default(), ConnectorEndpoints::Anchor);
        assert_eq!(start, (64.0, 0.0));
        assert_eq!(end, (256.0, 40.0));
    }

    #[test]
    fn test_flip_aware_swaps_endpoints() {
        let mut c = connector("3", (1, 0), (4, 2), None, None);
        c.flip_h = true;
        let (start, end) = endpoints(&c, &Geometry::default(), ConnectorEndpoints::FlipAware);
        assert_eq!(start, (256.0, 0.0));
        assert_eq!(end, (64.0, 40.0));
    }

    #[test]
    fn test_edge_styles_and_escaping() {
        let mut objects = two_nodes();
        objects[0].text = Some("say \"hi\"\nnow".to_string());
        objects[1].text = None;
        let mut both = connector("3", (1, 0), (4, 0), Some("arrow"), Some("arrow"));
        both.object.text = Some("sync".to_string());
        let plain = connector("4", (1, 0), (4, 0), None, None);
        let mut labeled = connector("5", (1, 0), (4, 0), None, Some("arrow"));
        labeled.object.text = Some("next".to_string());
        let mut connectors = vec![both, plain, labeled];
        infer(&objects, &mut connectors);

        let mermaid = build_mermaid(&objects, &connectors).unwrap();
        let lines: Vec<&str> = mermaid.lines().collect();
        assert_eq!(lines[1], "    N1[\"say \\\"hi\\\" now\"]");
        assert_eq!(lines[2], "    N2[\"Shape 2\"]");
        assert_eq!(lines[3], "    N1 <-->|\"sync\"| N2");
        assert_eq!(lines[4], "    N1 --- N2");
        assert_eq!(lines[5], "    N1 -- \"next\" --> N2");
    }

    #[test]
    fn test_no_nodes() {
        let mut connectors = vec![connector("3", (0, 0), (1, 0), None, None)];
        let warnings = infer(&[], &mut connectors);
        assert_eq!(warnings.len(), 1);
        assert!(connectors[0].distance_source.is_none());
    }
}
