//! Worksheet Module
//!
//! ワークシートパーツをストリーミングで解析し、`SheetDocument`にセル、行・列情報、
//! 結合、入力規則、印刷設定、未対応要素を書き込むモジュール。
//!
//! `sheetData`はイベント単位で読み、それ以外のトップレベル要素は
//! 部分木（`XmlNode`）として読み込んでから処理します。

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XlsxToMdError;
use crate::formatter::CellFormatter;
use crate::reference::{coord_to_row_col, parse_range_ref, parse_sqref, row_col_to_coord};
use crate::types::{
    Cell, CellType, DataValidation, HeaderFooter, HeaderFooterEntry, HeaderFooterSections, Pane,
    SheetDocument, UnsupportedElement, UnsupportedScope,
};
use crate::xml::{read_element, XmlNode};

/// 未対応として記録しないワークシート直下の要素
const ALLOWED_TAGS: &[&str] = &[
    "dimension",
    "sheetViews",
    "sheetFormatPr",
    "cols",
    "sheetData",
    "sheetCalcPr",
    "sheetProtection",
    "protectedRanges",
    "scenarios",
    "autoFilter",
    "sortState",
    "dataConsolidate",
    "customSheetViews",
    "mergeCells",
    "phoneticPr",
    "conditionalFormatting",
    "dataValidations",
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
    "sheetPr",
];

/// ワークシートパーツを解析して`sheet`に書き込む
pub(crate) fn parse_worksheet(
    xml: &[u8],
    sheet: &mut SheetDocument,
    formatter: &mut CellFormatter<'_>,
) -> Result<(), XlsxToMdError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if depth == 0 {
                    depth = 1;
                    continue;
                }
                let start = e.into_owned();
                if start.local_name().as_ref() == b"sheetData" {
                    read_sheet_data(&mut reader, &mut buf, sheet, formatter)?;
                } else {
                    let node = read_element(&mut reader, &start, &mut buf)?;
                    apply_element(node, sheet);
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    continue;
                }
                let node = XmlNode::from_start(&e)?;
                apply_element(node, sheet);
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    log::debug!(
        "parsed worksheet {}: {} cells, {} merges",
        sheet.path,
        sheet.cells.len(),
        sheet.merges.len()
    );
    Ok(())
}

/// `sheetData`の終了タグまでを読み、行とセルを取り込む
fn read_sheet_data<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    sheet: &mut SheetDocument,
    formatter: &mut CellFormatter<'_>,
) -> Result<(), XlsxToMdError> {
    let mut cursor = RowCursor::default();

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let tag = e.local_name();
                if tag.as_ref() == b"row" {
                    cursor.enter_row(&XmlNode::from_start(&e)?, sheet);
                } else if tag.as_ref() == b"c" {
                    let start = e.into_owned();
                    let node = read_element(reader, &start, buf)?;
                    push_cell(&node, &mut cursor, sheet, formatter)?;
                }
            }
            Event::Empty(e) => {
                let tag = e.local_name();
                if tag.as_ref() == b"row" {
                    cursor.enter_row(&XmlNode::from_start(&e)?, sheet);
                } else if tag.as_ref() == b"c" {
                    push_cell(&XmlNode::from_start(&e)?, &mut cursor, sheet, formatter)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(()),
            Event::Eof => {
                return Err(XlsxToMdError::Xml(
                    "unexpected end of worksheet inside <sheetData>".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// `r`属性を省略した行・セルの位置を補うためのカーソル
#[derive(Debug, Default)]
struct RowCursor {
    row: u32,
    col: u32,
}

impl RowCursor {
    fn enter_row(&mut self, row: &XmlNode, sheet: &mut SheetDocument) {
        self.row = row.attr_parse::<u32>("r").unwrap_or(self.row + 1);
        self.col = 0;

        if let Some(ht) = row.attr_parse::<f64>("ht") {
            sheet.row_heights.insert(self.row, ht);
        }
        if row.attr_flag("hidden") {
            sheet.hidden_rows.insert(self.row);
        }
    }
}

fn push_cell(
    node: &XmlNode,
    cursor: &mut RowCursor,
    sheet: &mut SheetDocument,
    formatter: &mut CellFormatter<'_>,
) -> Result<(), XlsxToMdError> {
    let (row, col) = match node.attr("r") {
        Some(r) => match coord_to_row_col(r) {
            Ok(pos) => pos,
            Err(e) => {
                log::warn!("{}: skipping cell with malformed reference: {}", sheet.path, e);
                return Ok(());
            }
        },
        None => (cursor.row.max(1), cursor.col + 1),
    };
    cursor.row = row;
    cursor.col = col;

    let cell_type = CellType::from_tag(node.attr("t"));
    let style_id = node.attr_parse::<u32>("s");
    let formula = node.child("f").and_then(formula_text);
    let cached_value = node.child("v").map(|v| v.text_or_empty().to_string());
    let inline_text = node.child("is").map(|is| {
        let mut runs = Vec::new();
        collect_text_runs(is, &mut runs);
        runs.concat()
    });

    let value = formatter.decode(
        &cell_type,
        cached_value.as_deref(),
        inline_text.as_deref(),
        style_id,
    );

    sheet.push_cell(Cell {
        coord: row_col_to_coord(row, col)?,
        row,
        col,
        cell_type,
        value,
        formula,
        cached_value,
        style_id,
    });
    Ok(())
}

/// `f`要素のテキスト
///
/// 共有数式の従属セルのようにテキストが空の場合は、属性を`<formula:k=v ...>`として残す。
/// テキストも属性もない`<f/>`は数式なしとして扱う。
fn formula_text(f: &XmlNode) -> Option<String> {
    let text = f.text_or_empty().trim();
    if !text.is_empty() {
        return Some(text.to_string());
    }
    if f.attrs.is_empty() {
        return None;
    }
    let attrs: Vec<String> = f.attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    Some(format!("<formula:{}>", attrs.join(" ")))
}

/// `t`要素のテキストを文書順に集める（ふりがなは除く）
fn collect_text_runs<'a>(node: &'a XmlNode, out: &mut Vec<&'a str>) {
    for child in &node.children {
        match child.tag.as_str() {
            "t" => out.push(child.text_or_empty()),
            "rPh" => {}
            _ => collect_text_runs(child, out),
        }
    }
}

/// `sheetData`以外のトップレベル要素を処理する
fn apply_element(node: XmlNode, sheet: &mut SheetDocument) {
    match node.tag.as_str() {
        "dimension" => {
            sheet.dimension_ref = node.attr("ref").map(str::to_string);
        }
        "sheetViews" => {
            if let Some(pane) = node.find("pane") {
                sheet.pane = Some(Pane {
                    x_split: pane.attr_parse("xSplit"),
                    y_split: pane.attr_parse("ySplit"),
                    top_left_cell: pane.attr("topLeftCell").map(str::to_string),
                    active_pane: pane.attr("activePane").map(str::to_string),
                    state: pane.attr("state").map(str::to_string),
                });
            }
        }
        "cols" => apply_cols(&node, sheet),
        "mergeCells" => apply_merges(&node, sheet),
        "dataValidations" => apply_data_validations(&node, sheet),
        "printOptions" => sheet.print.print_options = attr_map(&node),
        "pageMargins" => sheet.print.page_margins = attr_map(&node),
        "pageSetup" => sheet.print.page_setup = attr_map(&node),
        "headerFooter" => sheet.print.header_footer = Some(parse_header_footer(&node)),
        "rowBreaks" => sheet.print.page_breaks.rows = break_ids(&node),
        "colBreaks" => sheet.print.page_breaks.cols = break_ids(&node),
        tag if ALLOWED_TAGS.contains(&tag) => {}
        tag => {
            log::warn!("{}: unsupported worksheet element <{}>", sheet.path, tag);
            sheet.unsupported.push(UnsupportedElement {
                scope: UnsupportedScope::Worksheet,
                location: sheet.path.clone(),
                tag: tag.to_string(),
                raw_xml: node.to_xml(),
            });
        }
    }
}

fn apply_cols(node: &XmlNode, sheet: &mut SheetDocument) {
    for col in node.children_named("col") {
        let (Some(min), Some(max)) = (col.attr_parse::<u32>("min"), col.attr_parse::<u32>("max"))
        else {
            continue;
        };
        let width = col.attr_parse::<f64>("width");
        let hidden = col.attr_flag("hidden");
        for index in min..=max {
            if let Some(width) = width {
                sheet.col_widths.insert(index, width);
            }
            if hidden {
                sheet.hidden_cols.insert(index);
            }
        }
    }
}

fn apply_merges(node: &XmlNode, sheet: &mut SheetDocument) {
    for merge in node.children_named("mergeCell") {
        let Some(reference) = merge.attr("ref") else {
            continue;
        };
        let range = match parse_range_ref(reference) {
            Ok(range) => range,
            Err(e) => {
                log::warn!("{}: skipping malformed merge: {}", sheet.path, e);
                continue;
            }
        };
        for (row, col) in range.cells() {
            if row == range.start_row && col == range.start_col {
                continue;
            }
            if let Ok(coord) = row_col_to_coord(row, col) {
                sheet.merge_map.insert(coord, range.reference.clone());
            }
        }
        sheet.merges.push(range);
    }
}

fn apply_data_validations(node: &XmlNode, sheet: &mut SheetDocument) {
    for dv in node.children_named("dataValidation") {
        let sqref = dv.attr("sqref").unwrap_or_default();
        if sqref.is_empty() {
            continue;
        }
        let child_text = |tag: &str| {
            dv.child(tag)
                .map(|c| c.text_or_empty().to_string())
                .filter(|t| !t.is_empty())
        };
        sheet.data_validations.push(DataValidation {
            validation_type: dv.attr("type").map(str::to_string),
            sqref: sqref.to_string(),
            ranges: parse_sqref(sqref),
            allow_blank: dv.attr_flag("allowBlank"),
            show_error_message: dv.attr_flag("showErrorMessage"),
            operator: dv.attr("operator").map(str::to_string),
            formula1: child_text("formula1"),
            formula2: child_text("formula2"),
        });
    }
}

fn attr_map(node: &XmlNode) -> std::collections::BTreeMap<String, String> {
    node.attrs.iter().cloned().collect()
}

fn break_ids(node: &XmlNode) -> Vec<u32> {
    node.children_named("brk")
        .filter_map(|brk| brk.attr_parse::<u32>("id"))
        .collect()
}

fn parse_header_footer(node: &XmlNode) -> HeaderFooter {
    HeaderFooter {
        attrs: attr_map(node),
        entries: node
            .children
            .iter()
            .map(|child| {
                let raw = child.text_or_empty().to_string();
                HeaderFooterEntry {
                    kind: child.tag.clone(),
                    sections: decode_header_footer(&raw),
                    raw,
                }
            })
            .collect(),
    }
}

/// ヘッダー/フッター文字列を左・中央・右のセクションに分解する
///
/// `&L`/`&C`/`&R`でセクションを切り替え、フィールドコードは`{page}`などのトークンに、
/// 書式コード（フォント、サイズ、色、装飾）は除去します。
/// セクション指定より前のテキストは中央に入ります。
pub(crate) fn decode_header_footer(raw: &str) -> HeaderFooterSections {
    let mut sections = HeaderFooterSections::default();
    let mut target = &mut sections.center;
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '&' {
            target.push(ch);
            continue;
        }
        let Some(code) = chars.next() else {
            break;
        };
        match code {
            'L' => target = &mut sections.left,
            'C' => target = &mut sections.center,
            'R' => target = &mut sections.right,
            '&' => target.push('&'),
            'P' => target.push_str("{page}"),
            'N' => target.push_str("{pages}"),
            'D' => target.push_str("{date}"),
            'T' => target.push_str("{time}"),
            'F' => target.push_str("{file}"),
            'A' => target.push_str("{sheet}"),
            'Z' => target.push_str("{path}"),
            'G' => target.push_str("{picture}"),
            // &"フォント名,スタイル"
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            // &K色指定（6桁の16進）
            'K' => {
                for _ in 0..6 {
                    if chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '-').is_none() {
                        break;
                    }
                }
            }
            // &数字（フォントサイズ）
            c if c.is_ascii_digit() => {
                while chars.next_if(char::is_ascii_digit).is_some() {}
            }
            // &B &I &U &E &S &X &Y などの書式切り替え
            _ => {}
        }
    }

    sections
}
