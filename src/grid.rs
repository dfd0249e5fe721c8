//! Grid Module
//!
//! セル領域（`CellRegion`）から稠密なグリッド構造への変換を提供するモジュール。
//! セル結合の処理戦略（DataDuplication / HtmlFallback）を実装します。

use std::io::Write;

use unicode_width::UnicodeWidthStr;

use crate::api::{FormulaMode, MergeStrategy};
use crate::error::XlsxToMdError;
use crate::formatter::{escape_html, escape_markdown};
use crate::reference::row_col_to_coord;
use crate::types::{CellRegion, SheetDocument};

/// グリッド内の結合範囲（グリッド内の相対座標、領域の境界でクリップ済み）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridMerge {
    row: usize,
    col: usize,
    row_span: usize,
    col_span: usize,
}

/// フォーマット済みセル
#[derive(Debug, Clone, Default)]
pub(crate) struct Cell {
    /// 表示文字列
    pub content: String,

    /// 結合セルの親座標（グリッド内の相対座標、結合の子セルの場合）
    pub merge_parent: Option<(usize, usize)>,
}

impl Cell {
    /// 新しい通常セルを生成
    pub fn new(content: String) -> Self {
        Self {
            content,
            merge_parent: None,
        }
    }

    /// 新しい結合セル（子）を生成
    pub fn new_merged(content: String, parent: (usize, usize)) -> Self {
        Self {
            content,
            merge_parent: Some(parent),
        }
    }
}

/// 論理的なグリッド構造
pub(crate) struct LogicalGrid {
    /// グリッドデータ（行 × 列）
    cells: Vec<Vec<Cell>>,

    /// 結合範囲
    merges: Vec<GridMerge>,

    /// 行数
    rows: usize,

    /// 列数
    cols: usize,
}

impl LogicalGrid {
    /// 領域の境界を1つのグリッドとして構築する
    ///
    /// 領域に属さない境界内のセルは空セルになります。
    ///
    /// # 引数
    ///
    /// * `region` - 対象の領域
    /// * `sheet` - 結合情報の参照元シート
    /// * `formula_mode` - 数式セルに数式とキャッシュ値のどちらを表示するか
    /// * `merge_strategy` - セル結合の処理戦略
    pub fn from_region(
        region: &CellRegion,
        sheet: &SheetDocument,
        formula_mode: FormulaMode,
        merge_strategy: MergeStrategy,
    ) -> Self {
        let bounds = &region.bounds;
        let rows = bounds.row_span() as usize;
        let cols = bounds.col_span() as usize;
        let mut cells = vec![vec![Cell::default(); cols]; rows];

        // 1. 領域内のセルを配置
        for row in &region.rows {
            let content = match (&row.formula, formula_mode) {
                (Some(formula), FormulaMode::Formula) if !formula.is_empty() => {
                    format!("={}", formula)
                }
                _ => row.value.clone(),
            };
            let r = (row.row - bounds.start_row) as usize;
            let c = (row.col - bounds.start_col) as usize;
            if let Some(cell) = cells.get_mut(r).and_then(|line| line.get_mut(c)) {
                *cell = Cell::new(content);
            }
        }

        // 2. 境界と重なる結合範囲を収集（親セルの値は結合の左上から取る）
        let mut merges = Vec::new();
        for merge in &sheet.merges {
            let Some((r1, c1, r2, c2)) = merge.intersection(bounds) else {
                continue;
            };
            let anchor_value = row_col_to_coord(merge.start_row, merge.start_col)
                .ok()
                .and_then(|coord| sheet.cell(&coord))
                .map(|cell| cell.value.clone())
                .unwrap_or_default();
            let row = (r1 - bounds.start_row) as usize;
            let col = (c1 - bounds.start_col) as usize;
            if cells[row][col].content.is_empty() {
                cells[row][col].content = anchor_value;
            }
            merges.push(GridMerge {
                row,
                col,
                row_span: (r2 - r1 + 1) as usize,
                col_span: (c2 - c1 + 1) as usize,
            });
        }

        let mut grid = LogicalGrid {
            cells,
            merges,
            rows,
            cols,
        };

        match merge_strategy {
            MergeStrategy::DataDuplication => grid.apply_data_duplication(),
            MergeStrategy::HtmlFallback => grid.mark_merge_children(),
        }

        grid
    }

    /// データ重複フィル戦略を適用（内部メソッド）
    ///
    /// 結合範囲内のすべてのセルに親セルの値を複製します。
    fn apply_data_duplication(&mut self) {
        for merge in &self.merges {
            let parent = (merge.row, merge.col);
            let content = self.cells[merge.row][merge.col].content.clone();
            for (r, c) in merge_cells(merge) {
                if (r, c) != parent {
                    self.cells[r][c] = Cell::new_merged(content.clone(), parent);
                }
            }
        }
    }

    /// 結合範囲の子セルに親座標を記録する（HTMLでは出力をスキップする）
    fn mark_merge_children(&mut self) {
        for merge in &self.merges {
            let parent = (merge.row, merge.col);
            for (r, c) in merge_cells(merge) {
                if (r, c) != parent {
                    self.cells[r][c].merge_parent = Some(parent);
                }
            }
        }
    }

    /// 結合セルを含むか
    pub fn has_merges(&self) -> bool {
        !self.merges.is_empty()
    }

    /// Markdownテーブルとして出力
    ///
    /// 先頭行をヘッダー行として扱います。
    pub fn render_markdown<W: Write>(&self, writer: &mut W) -> Result<(), XlsxToMdError> {
        if self.rows == 0 || self.cols == 0 {
            return Ok(());
        }

        let contents: Vec<Vec<String>> = self
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| escape_markdown(cell.content.trim()))
                    .collect()
            })
            .collect();

        // 1. 列幅の計算
        let col_widths = calculate_column_widths(&contents, self.cols);

        // 2. ヘッダー区切り行
        let separator = generate_separator(&col_widths);

        // 3. 各行の出力
        for (row_idx, row) in contents.iter().enumerate() {
            write!(writer, "|")?;
            for (col_idx, content) in row.iter().enumerate() {
                // 表示幅で埋める（全角文字は2、半角文字は1）
                let padding = col_widths[col_idx].saturating_sub(content.width());
                write!(writer, " {}{} |", content, " ".repeat(padding))?;
            }
            writeln!(writer)?;

            if row_idx == 0 {
                writeln!(writer, "{}", separator)?;
            }
        }

        Ok(())
    }

    /// HTMLテーブルとして出力
    ///
    /// 結合範囲は`rowspan`/`colspan`で表現し、子セルは出力しません。
    pub fn render_html<W: Write>(&self, writer: &mut W) -> Result<(), XlsxToMdError> {
        writeln!(writer, "<table>")?;

        for (row_idx, row) in self.cells.iter().enumerate() {
            writeln!(writer, "  <tr>")?;

            for (col_idx, cell) in row.iter().enumerate() {
                if cell.merge_parent.is_some() {
                    continue;
                }

                let span = self
                    .merges
                    .iter()
                    .find(|m| m.row == row_idx && m.col == col_idx)
                    .map(|m| (m.row_span, m.col_span))
                    .unwrap_or((1, 1));

                if span.0 > 1 || span.1 > 1 {
                    write!(
                        writer,
                        "    <td rowspan=\"{}\" colspan=\"{}\">",
                        span.0, span.1
                    )?;
                } else {
                    write!(writer, "    <td>")?;
                }
                writeln!(writer, "{}</td>", escape_html(&cell.content))?;
            }

            writeln!(writer, "  </tr>")?;
        }

        writeln!(writer, "</table>")?;
        Ok(())
    }
}

fn merge_cells(merge: &GridMerge) -> impl Iterator<Item = (usize, usize)> + '_ {
    (merge.row..merge.row + merge.row_span)
        .flat_map(move |r| (merge.col..merge.col + merge.col_span).map(move |c| (r, c)))
}

/// 列幅を計算する
///
/// 各列の表示幅の最大値を返します。最小幅は3文字（区切り行の最小幅）です。
fn calculate_column_widths(contents: &[Vec<String>], cols: usize) -> Vec<usize> {
    let mut widths = vec![3; cols];
    for row in contents {
        for (col_idx, content) in row.iter().enumerate() {
            widths[col_idx] = widths[col_idx].max(content.width());
        }
    }
    widths
}

/// ヘッダー区切り行を生成する（セルの前後のスペース各1文字を含む）
fn generate_separator(col_widths: &[usize]) -> String {
    let mut separator = String::from("|");
    for &width in col_widths {
        separator.push_str(&"-".repeat(width + 2));
        separator.push('|');
    }
    separator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{coord_to_row_col, parse_range_ref};
    use crate::region::build_regions;
    use crate::types::{Cell as SheetCell, CellType, SheetState};

    fn sheet(cells: &[(&str, &str, Option<&str>)], merges: &[&str]) -> SheetDocument {
        let mut sheet = SheetDocument::new(
            0,
            "S".to_string(),
            SheetState::Visible,
            "xl/worksheets/sheet1.xml".to_string(),
        );
        for (coord, value, formula) in cells {
            let (row, col) = coord_to_row_col(coord).unwrap();
            sheet.push_cell(SheetCell {
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
        for merge in merges {
            sheet.merges.push(parse_range_ref(merge).unwrap());
        }
        sheet
    }

    fn render_md(grid: &LogicalGrid) -> String {
        let mut out = Vec::new();
        grid.render_markdown(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_markdown() {
        let s = sheet(&[("A1", "Name", None), ("B1", "Qty", None), ("A2", "x", None), ("B2", "10", None)], &[]);
        let regions = build_regions(&s);
        let grid = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::CachedValue,
            MergeStrategy::DataDuplication,
        );
        assert_eq!(
            render_md(&grid),
            "| Name | Qty |\n|------|-----|\n| x    | 10  |\n"
        );
    }

    #[test]
    fn test_data_duplication_fills_merge() {
        let s = sheet(&[("A1", "Title", None), ("A2", "a", None), ("B2", "b", None)], &["A1:B1"]);
        let regions = build_regions(&s);
        let grid = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::CachedValue,
            MergeStrategy::DataDuplication,
        );
        assert!(grid.has_merges());
        assert!(render_md(&grid).starts_with("| Title | Title |"));
    }

    #[test]
    fn test_html_fallback_uses_spans() {
        let s = sheet(&[("A1", "Title", None), ("A2", "a<b", None), ("B2", "b", None)], &["A1:B1"]);
        let regions = build_regions(&s);
        let grid = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::CachedValue,
            MergeStrategy::HtmlFallback,
        );
        let mut out = Vec::new();
        grid.render_html(&mut out).unwrap();
        let html = String::from_utf8(out).unwrap();
        assert!(html.contains("<td rowspan=\"1\" colspan=\"2\">Title</td>"));
        assert!(html.contains("<td>a&lt;b</td>"));
        assert_eq!(html.matches("<td").count(), 3);
    }

    #[test]
    fn test_formula_mode() {
        let s = sheet(&[("A1", "1", None), ("A2", "2", Some("A1*2"))], &[]);
        let regions = build_regions(&s);
        let cached = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::CachedValue,
            MergeStrategy::DataDuplication,
        );
        assert!(render_md(&cached).contains("| 2   |"));
        let formula = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::Formula,
            MergeStrategy::DataDuplication,
        );
        assert!(render_md(&formula).contains("| =A1*2 |"));
    }

    #[test]
    fn test_pipes_are_escaped_and_width_is_display_width() {
        let s = sheet(&[("A1", "日本語", None), ("A2", "a|b", None)], &[]);
        let regions = build_regions(&s);
        let grid = LogicalGrid::from_region(
            &regions[0],
            &s,
            FormulaMode::CachedValue,
            MergeStrategy::DataDuplication,
        );
        let md = render_md(&grid);
        assert_eq!(md, "| 日本語 |\n|--------|\n| a\\|b   |\n");
    }
}
