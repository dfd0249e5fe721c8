//! Markdown Renderer
//!
//! 3つのモードでワークブックをMarkdownとして出力します。
//!
//! - `Work`: 領域テーブル、計算セル、図（フローチャートと画像）の要約
//! - `Full`: ドキュメントモデルのすべての情報
//! - `SheetView`: シートの見た目を再現するHTMLグリッドを埋め込んだもの

use std::io::Write;

use crate::api::{FormulaMode, MergeStrategy, OutputMode};
use crate::error::XlsxToMdError;
use crate::formatter::escape_markdown as esc;
use crate::grid::LogicalGrid;
use crate::types::{AnchorPoint, DrawingObject, RegionFlag, SheetDocument, WorkbookDocument};

use super::html::{sheetview_ranges, write_sheet_range, HtmlOptions};

/// Markdown出力の設定
#[derive(Debug, Clone, Copy)]
pub(crate) struct MarkdownOptions {
    pub mode: OutputMode,
    pub merge_strategy: MergeStrategy,
    pub formula_mode: FormulaMode,
    pub grid: HtmlOptions,
}

/// ワークブック全体をMarkdownとして出力する
pub(crate) fn render_workbook<W: Write>(
    doc: &WorkbookDocument,
    options: MarkdownOptions,
    w: &mut W,
) -> Result<(), XlsxToMdError> {
    let title = doc
        .source_metadata
        .file_name
        .as_deref()
        .unwrap_or("workbook");
    writeln!(w, "# Workbook: {}", title)?;

    match options.mode {
        OutputMode::Work => render_work(doc, options, w)?,
        OutputMode::Full => render_full(doc, w)?,
        OutputMode::SheetView => render_sheetview(doc, options, w)?,
    }
    Ok(())
}

fn sheet_heading<W: Write>(w: &mut W, sheet: &SheetDocument) -> Result<(), XlsxToMdError> {
    writeln!(w)?;
    writeln!(w, "## Sheet: {} [{}]", sheet.name, sheet.state.as_str())?;
    Ok(())
}

fn render_work<W: Write>(
    doc: &WorkbookDocument,
    options: MarkdownOptions,
    w: &mut W,
) -> Result<(), XlsxToMdError> {
    for sheet in &doc.sheets {
        sheet_heading(w, sheet)?;

        if sheet.regions.is_empty() {
            writeln!(w, "\n(empty sheet)")?;
        }
        for region in &sheet.regions {
            writeln!(
                w,
                "\n### Region {}: {}\n",
                region.region_id, region.bounds.reference
            )?;
            let grid = LogicalGrid::from_region(
                region,
                sheet,
                options.formula_mode,
                options.merge_strategy,
            );
            if options.merge_strategy == MergeStrategy::HtmlFallback && grid.has_merges() {
                grid.render_html(w)?;
            } else {
                grid.render_markdown(w)?;
            }
        }

        let calculated: Vec<_> = sheet.cells.iter().filter(|c| c.formula.is_some()).collect();
        if !calculated.is_empty() {
            writeln!(w, "\n### Calculated Cells (Displayed Results)\n")?;
            writeln!(w, "| coord | formula | displayed |")?;
            writeln!(w, "|---|---|---|")?;
            for cell in calculated {
                writeln!(
                    w,
                    "| {} | `{}` | {} |",
                    cell.coord,
                    esc(cell.formula.as_deref().unwrap_or("")),
                    esc(&cell.value)
                )?;
            }
        }

        if !sheet.drawings.is_empty() || !sheet.unsupported.is_empty() {
            writeln!(w, "\n### Diagram Workspace")?;
            if let Some(mermaid) = &sheet.mermaid {
                writeln!(w, "\n```mermaid\n{}\n```", mermaid)?;
            }
            let shapes: Vec<&DrawingObject> = sheet
                .drawings
                .iter()
                .filter(|d| d.text.as_deref().is_some_and(|t| !t.is_empty()))
                .collect();
            if !shapes.is_empty() {
                writeln!(w, "\n#### Shape Texts\n")?;
                for shape in shapes {
                    writeln!(
                        w,
                        "- `{}`: {}",
                        shape.object_uid,
                        esc(shape.text.as_deref().unwrap_or(""))
                    )?;
                }
            }
            write_images(w, sheet)?;
            if !sheet.unsupported.is_empty() {
                writeln!(w, "\n#### Unsupported Elements\n")?;
                for item in &sheet.unsupported {
                    writeln!(
                        w,
                        "- `{}` in `{}` ({})",
                        item.tag,
                        item.location,
                        item.scope.as_str()
                    )?;
                }
            }
        }
    }

    if !doc.warnings.is_empty() {
        writeln!(w, "\n## Warnings\n")?;
        for warning in &doc.warnings {
            writeln!(w, "- {}", warning)?;
        }
    }
    Ok(())
}

fn write_images<W: Write>(w: &mut W, sheet: &SheetDocument) -> Result<bool, XlsxToMdError> {
    let images: Vec<&DrawingObject> = sheet
        .drawings
        .iter()
        .filter(|d| d.image_data_uri.is_some())
        .collect();
    for (idx, image) in images.iter().enumerate() {
        writeln!(w, "\n#### Image {}: {}\n", idx + 1, image.object_uid)?;
        writeln!(
            w,
            "- target: `{}`",
            image.image_target.as_deref().unwrap_or("")
        )?;
        writeln!(
            w,
            "- content_type: `{}`",
            image.image_content_type.as_deref().unwrap_or("")
        )?;
        let alt = image
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&image.object_uid);
        writeln!(
            w,
            "![{}]({})",
            esc(alt),
            image.image_data_uri.as_deref().unwrap_or("")
        )?;
    }
    Ok(!images.is_empty())
}

fn render_sheetview<W: Write>(
    doc: &WorkbookDocument,
    options: MarkdownOptions,
    w: &mut W,
) -> Result<(), XlsxToMdError> {
    for sheet in &doc.sheets {
        sheet_heading(w, sheet)?;
        let ranges = sheetview_ranges(sheet);
        if ranges.is_empty() {
            writeln!(w, "\n(no renderable range)")?;
        }
        for (idx, range) in ranges.iter().enumerate() {
            writeln!(w, "\n### Range {}: {}\n", idx + 1, range.reference)?;
            write_sheet_range(w, sheet, range, &doc.style_css_map, options.grid, false)?;
        }
        if let Some(mermaid) = &sheet.mermaid {
            writeln!(w, "\n### Mermaid\n\n```mermaid\n{}\n```", mermaid)?;
        }
        write_images(w, sheet)?;
    }
    Ok(())
}

fn kv_table<W: Write>(w: &mut W, rows: &[(&str, String)]) -> Result<(), XlsxToMdError> {
    writeln!(w, "| key | value |")?;
    writeln!(w, "|---|---|")?;
    for (key, value) in rows {
        writeln!(w, "| {} | {} |", esc(key), esc(value))?;
    }
    Ok(())
}

fn anchor_repr(anchor: Option<&AnchorPoint>) -> String {
    anchor
        .map(|a| format!("({},{},{},{})", a.col, a.row, a.col_off, a.row_off))
        .unwrap_or_default()
}

fn opt(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

fn json<T: serde::Serialize>(value: &T) -> Result<String, XlsxToMdError> {
    serde_json::to_string(value).map_err(|e| XlsxToMdError::Config(e.to_string()))
}

fn render_full<W: Write>(doc: &WorkbookDocument, w: &mut W) -> Result<(), XlsxToMdError> {
    writeln!(w, "\n## Source Metadata\n")?;
    kv_table(
        w,
        &[
            (
                "file_name",
                doc.source_metadata.file_name.clone().unwrap_or_default(),
            ),
            (
                "file_size_bytes",
                doc.source_metadata.file_size_bytes.to_string(),
            ),
            ("sha256", doc.source_metadata.sha256.clone()),
            ("zip_entries", doc.source_metadata.zip_entries.to_string()),
            ("date1904", doc.date1904.to_string()),
        ],
    )?;

    writeln!(w, "\n## Styles (XML-equivalent)\n")?;
    let styles = serde_json::to_string_pretty(&doc.styles_xml_equivalent)
        .map_err(|e| XlsxToMdError::Config(e.to_string()))?;
    writeln!(w, "```json\n{}\n```", styles)?;

    writeln!(w, "\n## Defined Names\n")?;
    if doc.defined_names.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        writeln!(w, "| name | local_sheet_id | value |")?;
        writeln!(w, "|---|---:|---|")?;
        for name in &doc.defined_names {
            writeln!(
                w,
                "| {} | {} | {} |",
                esc(&name.name),
                name.local_sheet_id.map(|id| id.to_string()).unwrap_or_default(),
                esc(&name.value)
            )?;
        }
    }

    for sheet in &doc.sheets {
        sheet_heading(w, sheet)?;
        render_full_sheet(sheet, w)?;
    }

    writeln!(w, "\n## Extraction Summary\n")?;
    kv_table(w, &super::summary_rows(doc))?;

    writeln!(w, "\n## Warnings\n")?;
    if doc.warnings.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        for warning in &doc.warnings {
            writeln!(w, "- {}", warning)?;
        }
    }
    Ok(())
}

fn render_full_sheet<W: Write>(sheet: &SheetDocument, w: &mut W) -> Result<(), XlsxToMdError> {
    writeln!(w, "\n### Sheet Metadata\n")?;
    kv_table(
        w,
        &[
            ("sheet_index", sheet.index.to_string()),
            ("path", sheet.path.clone()),
            (
                "dimension_ref",
                sheet.dimension_ref.clone().unwrap_or_default(),
            ),
            ("cell_count", sheet.cells.len().to_string()),
            ("merge_count", sheet.merges.len().to_string()),
            (
                "data_validation_count",
                sheet.data_validations.len().to_string(),
            ),
            ("drawing_object_count", sheet.drawings.len().to_string()),
            ("connector_count", sheet.connectors.len().to_string()),
            ("region_count", sheet.regions.len().to_string()),
            ("unsupported_count", sheet.unsupported.len().to_string()),
            ("hidden_rows", json(&sheet.hidden_rows)?),
            ("hidden_cols", json(&sheet.hidden_cols)?),
            ("pane", json(&sheet.pane)?),
        ],
    )?;

    let print = &sheet.print;
    let joined = |items: Vec<&str>| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };
    writeln!(w, "\n### Print Metadata\n")?;
    writeln!(
        w,
        "- print_areas: {}",
        joined(print.print_areas.iter().map(|r| r.reference.as_str()).collect())
    )?;
    writeln!(
        w,
        "- print_titles: {}",
        joined(print.print_titles.iter().map(String::as_str).collect())
    )?;
    writeln!(w, "- page_setup: `{}`", json(&print.page_setup)?)?;
    writeln!(w, "- page_margins: `{}`", json(&print.page_margins)?)?;
    writeln!(w, "- print_options: `{}`", json(&print.print_options)?)?;
    writeln!(w, "- header_footer: `{}`", json(&print.header_footer)?)?;
    writeln!(w, "- page_breaks: `{}`", json(&print.page_breaks)?)?;

    writeln!(w, "\n### Data Validations\n")?;
    if sheet.data_validations.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        writeln!(
            w,
            "| type | sqref | formula1 | formula2 | allow_blank | show_error_message | operator |"
        )?;
        writeln!(w, "|---|---|---|---|---|---|---|")?;
        for dv in &sheet.data_validations {
            writeln!(
                w,
                "| {} | {} | {} | {} | {} | {} | {} |",
                esc(opt(dv.validation_type.as_deref())),
                esc(&dv.sqref),
                esc(opt(dv.formula1.as_deref())),
                esc(opt(dv.formula2.as_deref())),
                dv.allow_blank,
                dv.show_error_message,
                esc(opt(dv.operator.as_deref()))
            )?;
        }
    }

    writeln!(w, "\n### Cell Regions\n")?;
    if sheet.regions.is_empty() {
        writeln!(w, "(none)")?;
    }
    for region in &sheet.regions {
        writeln!(
            w,
            "#### Region {}: {}\n",
            region.region_id, region.bounds.reference
        )?;
        writeln!(
            w,
            "| coord | value | formula | cached_value | type | style_id | merge_ref | flags |"
        )?;
        writeln!(w, "|---|---|---|---|---|---|---|---|")?;
        for row in &region.rows {
            let flags: Vec<&str> = row.flags.iter().map(flag_name).collect();
            writeln!(
                w,
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                row.coord,
                esc(&row.value),
                esc(opt(row.formula.as_deref())),
                esc(opt(row.cached_value.as_deref())),
                row.cell_type.as_str(),
                row.style_id.map(|s| s.to_string()).unwrap_or_default(),
                opt(row.merge_ref.as_deref()),
                flags.join(",")
            )?;
        }
        writeln!(w)?;
    }

    writeln!(w, "\n### Drawings Raw Objects\n")?;
    if sheet.drawings.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        writeln!(
            w,
            "| object_uid | kind | name | text | anchor_from | anchor_to | bbox | parent_uid | image_target |"
        )?;
        writeln!(w, "|---|---|---|---|---|---|---|---|---|")?;
        for obj in &sheet.drawings {
            writeln!(
                w,
                "| {} | {} | {} | {} | {} | {} | {:.2},{:.2},{:.2},{:.2} | {} | {} |",
                esc(&obj.object_uid),
                obj.kind.as_str(),
                esc(opt(obj.name.as_deref())),
                esc(opt(obj.text.as_deref())),
                anchor_repr(obj.anchor_from.as_ref()),
                anchor_repr(obj.anchor_to.as_ref()),
                obj.bbox.x,
                obj.bbox.y,
                obj.bbox.x + obj.bbox.w,
                obj.bbox.y + obj.bbox.h,
                esc(opt(obj.parent_uid.as_deref())),
                esc(opt(obj.image_target.as_deref()))
            )?;
        }
    }

    writeln!(w, "\n### Connectors (Raw + Inferred)\n")?;
    if sheet.connectors.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        writeln!(
            w,
            "| object_uid | name | direction | source_uid | target_uid | resolved | distance_source | distance_target | arrow_head | arrow_tail | text |"
        )?;
        writeln!(w, "|---|---|---|---|---|---|---:|---:|---|---|---|")?;
        let distance = |d: Option<f64>| d.map(|d| format!("{:.2}", d)).unwrap_or_default();
        for conn in &sheet.connectors {
            writeln!(
                w,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                esc(&conn.object.object_uid),
                esc(opt(conn.object.name.as_deref())),
                json(&conn.direction)?.trim_matches('"'),
                esc(opt(conn.source_uid.as_deref())),
                esc(opt(conn.target_uid.as_deref())),
                conn.resolved,
                distance(conn.distance_source),
                distance(conn.distance_target),
                esc(opt(conn.arrow_head.as_deref())),
                esc(opt(conn.arrow_tail.as_deref())),
                esc(opt(conn.object.text.as_deref()))
            )?;
        }
    }

    writeln!(w, "\n### Mermaid\n")?;
    match &sheet.mermaid {
        Some(mermaid) => writeln!(w, "```mermaid\n{}\n```", mermaid)?,
        None => writeln!(w, "(no resolved edges)")?,
    }

    writeln!(w, "\n### Embedded Images")?;
    if !write_images(w, sheet)? {
        writeln!(w, "\n(none)")?;
    }

    writeln!(w, "\n### Unsupported Elements\n")?;
    if sheet.unsupported.is_empty() {
        writeln!(w, "(none)")?;
    } else {
        writeln!(w, "| scope | location | tag |")?;
        writeln!(w, "|---|---|---|")?;
        for item in &sheet.unsupported {
            writeln!(
                w,
                "| {} | {} | {} |",
                item.scope.as_str(),
                esc(&item.location),
                esc(&item.tag)
            )?;
        }
        for (idx, item) in sheet.unsupported.iter().enumerate() {
            writeln!(w, "\n#### Unsupported {}: {}\n", idx + 1, item.tag)?;
            writeln!(w, "- scope: `{}`", item.scope.as_str())?;
            writeln!(w, "- location: `{}`", item.location)?;
            writeln!(w, "```xml\n{}\n```", item.raw_xml)?;
        }
    }
    Ok(())
}

fn flag_name(flag: &RegionFlag) -> &'static str {
    match flag {
        RegionFlag::Merged => "merged",
        RegionFlag::DataValidation => "data_validation",
        RegionFlag::HasValue => "has_value",
        RegionFlag::HasFormula => "has_formula",
        RegionFlag::HasCached => "has_cached",
        RegionFlag::NonDefaultStyle => "non_default_style",
        RegionFlag::Virtual => "virtual",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse_range_ref;
    use crate::region::build_regions;
    use crate::types::{
        Cell, CellType, SheetState, SourceMetadata, Summary, UnsupportedElement, UnsupportedScope,
    };
    use std::collections::BTreeMap;

    fn options(mode: OutputMode) -> MarkdownOptions {
        MarkdownOptions {
            mode,
            merge_strategy: MergeStrategy::DataDuplication,
            formula_mode: FormulaMode::CachedValue,
            grid: HtmlOptions {
                col_width_px: 64.0,
                row_height_px: 20.0,
            },
        }
    }

    fn workbook() -> WorkbookDocument {
        let mut sheet = SheetDocument::new(
            0,
            "Sales".to_string(),
            SheetState::Visible,
            "xl/worksheets/sheet1.xml".to_string(),
        );
        for (coord, row, col, value, formula) in [
            ("A1", 1, 1, "Item", None),
            ("B1", 1, 2, "Qty", None),
            ("A2", 2, 1, "Apple", None),
            ("B2", 2, 2, "3", None),
            ("B3", 3, 2, "6", Some("B2*2")),
        ] {
            sheet.push_cell(Cell {
                coord: coord.to_string(),
                row,
                col,
                cell_type: CellType::Number,
                value: value.to_string(),
                formula: formula.map(str::to_string),
                cached_value: Some(value.to_string()),
                style_id: None,
            });
        }
        sheet.dimension_ref = Some("A1:B3".to_string());
        sheet.regions = build_regions(&sheet);
        sheet.unsupported.push(UnsupportedElement {
            scope: UnsupportedScope::Worksheet,
            location: "xl/worksheets/sheet1.xml".to_string(),
            tag: "mystery".to_string(),
            raw_xml: "<mystery/>".to_string(),
        });
        let sheets = vec![sheet];
        let summary = Summary::compute(&sheets, 0, 1);
        WorkbookDocument {
            source_metadata: SourceMetadata {
                file_name: Some("sales.xlsx".to_string()),
                ..SourceMetadata::default()
            },
            date1904: false,
            styles_xml_equivalent: None,
            style_css_map: BTreeMap::new(),
            style_numfmt_map: BTreeMap::new(),
            defined_names: Vec::new(),
            sheets,
            warnings: vec!["Missing image part: xl/media/image9.png".to_string()],
            summary,
        }
    }

    fn render(doc: &WorkbookDocument, opts: MarkdownOptions) -> String {
        let mut out = Vec::new();
        render_workbook(doc, opts, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_work_mode() {
        let md = render(&workbook(), options(OutputMode::Work));
        assert!(md.starts_with("# Workbook: sales.xlsx\n"));
        assert!(md.contains("## Sheet: Sales [visible]"));
        assert!(md.contains("### Region 1: A1:B3"));
        assert!(md.contains("| Item  | Qty |"));
        assert!(md.contains("### Calculated Cells (Displayed Results)"));
        assert!(md.contains("| B3 | `B2*2` | 6 |"));
        assert!(md.contains("### Diagram Workspace"));
        assert!(md.contains("- `mystery` in `xl/worksheets/sheet1.xml` (worksheet)"));
        assert!(md.contains("## Warnings\n\n- Missing image part: xl/media/image9.png"));
    }

    #[test]
    fn test_full_mode_sections() {
        let md = render(&workbook(), options(OutputMode::Full));
        for heading in [
            "## Source Metadata",
            "## Styles (XML-equivalent)",
            "## Defined Names",
            "### Sheet Metadata",
            "### Print Metadata",
            "### Data Validations",
            "### Cell Regions",
            "### Drawings Raw Objects",
            "### Connectors (Raw + Inferred)",
            "### Mermaid",
            "### Embedded Images",
            "### Unsupported Elements",
            "## Extraction Summary",
            "## Warnings",
        ] {
            assert!(md.contains(heading), "missing {heading}");
        }
        assert!(md.contains("| B3 | 6 | B2*2 | 6 | n |  |  | has_value,has_formula,has_cached |"));
        assert!(md.contains("(no resolved edges)"));
        assert!(md.contains("```xml\n<mystery/>\n```"));
        assert!(md.contains("| cell_count | 5 |"));
    }

    #[test]
    fn test_sheetview_mode_embeds_grid() {
        let mut doc = workbook();
        doc.sheets[0].print.print_areas = vec![parse_range_ref("A1:B2").unwrap()];
        let md = render(&doc, options(OutputMode::SheetView));
        assert!(md.contains("### Range 1: A1:B2"));
        assert!(md.contains("<table class=\"sv-grid\">"));
        assert!(md.contains("data-coord=\"B2\""));
        assert!(!md.contains("data-coord=\"B3\""));
    }

    #[test]
    fn test_html_fallback_for_merged_regions() {
        let mut doc = workbook();
        doc.sheets[0].merges.push(parse_range_ref("A1:B1").unwrap());
        let opts = MarkdownOptions {
            merge_strategy: MergeStrategy::HtmlFallback,
            ..options(OutputMode::Work)
        };
        let md = render(&doc, opts);
        assert!(md.contains("<td rowspan=\"1\" colspan=\"2\">Item</td>"));
    }
}
