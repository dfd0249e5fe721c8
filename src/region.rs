//! Region Module
//!
//! シートの使用範囲を、意味のあるセル（値、数式、書式、結合、入力規則）の
//! 4連結成分に分割するモジュール。

use std::collections::{BTreeSet, VecDeque};

use crate::reference::{parse_range_ref, row_col_to_coord, RangeRef};
use crate::types::{CellRegion, CellType, RegionCellRow, RegionFlag, SheetDocument};

/// 領域の基準範囲
///
/// 印刷範囲、`dimension`、全セルの外接矩形の順に採用します。
fn base_ranges(sheet: &SheetDocument) -> Vec<RangeRef> {
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

    let rows = sheet.cells.iter().map(|c| c.row);
    let cols = sheet.cells.iter().map(|c| c.col);
    match (
        rows.clone().min(),
        rows.max(),
        cols.clone().min(),
        cols.max(),
    ) {
        (Some(r1), Some(r2), Some(c1), Some(c2)) => {
            RangeRef::from_bounds(r1, c1, r2, c2).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// 範囲と基準範囲の重なりに含まれる座標を`out`に追加する
fn insert_clipped(range: &RangeRef, bases: &[RangeRef], out: &mut BTreeSet<(u32, u32)>) {
    for base in bases {
        if let Some((r1, c1, r2, c2)) = range.intersection(base) {
            for row in r1..=r2 {
                for col in c1..=c2 {
                    out.insert((row, col));
                }
            }
        }
    }
}

/// シートの領域を構築する
///
/// 領域は左上（最小行、最小列）の順に並べ、1から番号を振ります。
/// 基準範囲がない、または占有セルがない場合は空のリストを返します。
pub(crate) fn build_regions(sheet: &SheetDocument) -> Vec<CellRegion> {
    let bases = base_ranges(sheet);
    if bases.is_empty() {
        return Vec::new();
    }
    let in_base = |row: u32, col: u32| bases.iter().any(|b| b.contains(row, col));

    let mut occupied = BTreeSet::new();
    for cell in &sheet.cells {
        let meaningful =
            !cell.value.is_empty() || cell.formula.is_some() || cell.style_id.is_some_and(|s| s != 0);
        if meaningful && in_base(cell.row, cell.col) {
            occupied.insert((cell.row, cell.col));
        }
    }
    for merge in &sheet.merges {
        insert_clipped(merge, &bases, &mut occupied);
    }
    let mut validated = BTreeSet::new();
    for dv in &sheet.data_validations {
        for range in &dv.ranges {
            insert_clipped(range, &bases, &mut validated);
        }
    }
    occupied.extend(validated.iter().copied());

    if occupied.is_empty() {
        return Vec::new();
    }

    let mut components = connected_components(&occupied);
    components.sort_by_key(|comp| {
        let min_row = comp.iter().map(|(r, _)| *r).min().unwrap_or(0);
        let min_col = comp.iter().map(|(_, c)| *c).min().unwrap_or(0);
        (min_row, min_col, comp.first().copied())
    });

    components
        .into_iter()
        .zip(1u32..)
        .filter_map(|(component, region_id)| {
            let r1 = component.iter().map(|(r, _)| *r).min()?;
            let r2 = component.iter().map(|(r, _)| *r).max()?;
            let c1 = component.iter().map(|(_, c)| *c).min()?;
            let c2 = component.iter().map(|(_, c)| *c).max()?;
            let bounds = RangeRef::from_bounds(r1, c1, r2, c2).ok()?;
            let rows = component
                .iter()
                .filter_map(|&(row, col)| region_row(sheet, row, col, validated.contains(&(row, col))))
                .collect();
            Some(CellRegion {
                region_id,
                bounds,
                rows,
            })
        })
        .collect()
}

fn region_row(sheet: &SheetDocument, row: u32, col: u32, validated: bool) -> Option<RegionCellRow> {
    let coord = row_col_to_coord(row, col).ok()?;
    let merge_ref = sheet.merge_map.get(&coord).cloned().or_else(|| {
        sheet
            .merge_anchored_at(row, col)
            .map(|m| m.reference.clone())
    });

    let mut flags = Vec::new();
    if merge_ref.is_some() {
        flags.push(RegionFlag::Merged);
    }
    if validated {
        flags.push(RegionFlag::DataValidation);
    }

    let Some(cell) = sheet.cell(&coord) else {
        flags.push(RegionFlag::Virtual);
        return Some(RegionCellRow {
            coord,
            row,
            col,
            value: String::new(),
            formula: None,
            cached_value: None,
            cell_type: CellType::Virtual,
            style_id: None,
            merge_ref,
            flags,
        });
    };

    if !cell.value.is_empty() {
        flags.push(RegionFlag::HasValue);
    }
    if cell.formula.is_some() {
        flags.push(RegionFlag::HasFormula);
    }
    if cell.cached_value.as_deref().is_some_and(|v| !v.is_empty()) {
        flags.push(RegionFlag::HasCached);
    }
    if cell.style_id.is_some_and(|s| s != 0) {
        flags.push(RegionFlag::NonDefaultStyle);
    }

    Some(RegionCellRow {
        coord,
        row,
        col,
        value: cell.value.clone(),
        formula: cell.formula.clone(),
        cached_value: cell.cached_value.clone(),
        cell_type: cell.cell_type.clone(),
        style_id: cell.style_id,
        merge_ref,
        flags,
    })
}

/// 4連結成分をBFSで求める
///
/// 各成分の座標は(行, 列)順に並びます。
fn connected_components(points: &BTreeSet<(u32, u32)>) -> Vec<Vec<(u32, u32)>> {
    let mut remaining = points.clone();
    let mut components = Vec::new();

    while let Some(start) = remaining.pop_first() {
        let mut queue = VecDeque::from([start]);
        let mut component = BTreeSet::from([start]);

        while let Some((row, col)) = queue.pop_front() {
            let neighbors = [
                row.checked_sub(1).map(|r| (r, col)),
                Some((row + 1, col)),
                col.checked_sub(1).map(|c| (row, c)),
                Some((row, col + 1)),
            ];
            for neighbor in neighbors.into_iter().flatten() {
                if remaining.remove(&neighbor) {
                    component.insert(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        components.push(component.into_iter().collect());
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse_sqref;
    use crate::types::{Cell, DataValidation, SheetState};

    fn sheet(cells: &[(&str, &str)]) -> SheetDocument {
        let mut sheet = SheetDocument::new(
            0,
            "S".to_string(),
            SheetState::Visible,
            "xl/worksheets/sheet1.xml".to_string(),
        );
        for (coord, value) in cells {
            let (row, col) = crate::reference::coord_to_row_col(coord).unwrap();
            sheet.push_cell(Cell {
                coord: coord.to_string(),
                row,
                col,
                cell_type: CellType::InlineString,
                value: value.to_string(),
                formula: None,
                cached_value: None,
                style_id: None,
            });
        }
        sheet
    }

    fn add_merge(sheet: &mut SheetDocument, reference: &str) {
        let range = parse_range_ref(reference).unwrap();
        for (row, col) in range.cells() {
            if (row, col) != (range.start_row, range.start_col) {
                sheet
                    .merge_map
                    .insert(row_col_to_coord(row, col).unwrap(), range.reference.clone());
            }
        }
        sheet.merges.push(range);
    }

    #[test]
    fn test_two_components_are_ordered() {
        let sheet = sheet(&[("D5", "x"), ("A1", "a"), ("B1", "b"), ("A2", "c")]);
        let regions = build_regions(&sheet);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region_id, 1);
        assert_eq!(regions[0].bounds.reference, "A1:B2");
        let coords: Vec<&str> = regions[0].rows.iter().map(|r| r.coord.as_str()).collect();
        assert_eq!(coords, vec!["A1", "B1", "A2"]);
        assert_eq!(regions[1].bounds.reference, "D5:D5");
        assert_eq!(regions[1].rows[0].flags, vec![RegionFlag::HasValue]);
    }

    #[test]
    fn test_merge_and_validation_create_virtual_cells() {
        let mut s = sheet(&[("A1", "Title")]);
        add_merge(&mut s, "A1:C1");
        s.data_validations.push(DataValidation {
            validation_type: Some("list".to_string()),
            sqref: "C2".to_string(),
            ranges: parse_sqref("C2"),
            allow_blank: true,
            show_error_message: false,
            operator: None,
            formula1: None,
            formula2: None,
        });
        s.dimension_ref = Some("A1:C2".to_string());

        let regions = build_regions(&s);
        assert_eq!(regions.len(), 1);
        let rows = &regions[0].rows;
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].flags, vec![RegionFlag::Merged, RegionFlag::HasValue]);
        assert_eq!(rows[1].coord, "B1");
        assert_eq!(rows[1].cell_type, CellType::Virtual);
        assert_eq!(rows[1].merge_ref.as_deref(), Some("A1:C1"));
        assert_eq!(rows[1].flags, vec![RegionFlag::Merged, RegionFlag::Virtual]);
        assert_eq!(rows[3].coord, "C2");
        assert_eq!(
            rows[3].flags,
            vec![RegionFlag::DataValidation, RegionFlag::Virtual]
        );
    }

    #[test]
    fn test_print_area_clips_occupancy() {
        let mut s = sheet(&[("A1", "in"), ("E5", "out")]);
        s.print.print_areas = vec![parse_range_ref("A1:B2").unwrap()];
        add_merge(&mut s, "B2:D4");
        let regions = build_regions(&s);
        let coords: Vec<&str> = regions
            .iter()
            .flat_map(|r| r.rows.iter().map(|row| row.coord.as_str()))
            .collect();
        assert_eq!(coords, vec!["A1", "B2"]);
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_empty_values_with_styles() {
        let mut s = sheet(&[("A1", ""), ("A2", "")]);
        s.cells[1].style_id = Some(3);
        s.cells[0].style_id = Some(0);
        let regions = build_regions(&s);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].rows[0].coord, "A2");
        assert_eq!(regions[0].rows[0].flags, vec![RegionFlag::NonDefaultStyle]);
    }

    #[test]
    fn test_no_cells_no_regions() {
        assert!(build_regions(&sheet(&[])).is_empty());
        assert!(build_regions(&sheet(&[("A1", "")])).is_empty());
    }

    #[test]
    fn test_partition_covers_occupied_once() {
        let s = sheet(&[("A1", "1"), ("C1", "2"), ("C2", "3"), ("B3", "4"), ("A3", "5")]);
        let regions = build_regions(&s);
        let mut all: Vec<&str> = regions
            .iter()
            .flat_map(|r| r.rows.iter().map(|row| row.coord.as_str()))
            .collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(total, all.len());
        assert_eq!(total, 5);
        assert_eq!(regions.len(), 3);
    }
}
