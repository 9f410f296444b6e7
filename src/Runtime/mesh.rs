use crate::Wire::Structs::{Cell, Rect};
use std::collections::HashSet;

/// Tiles a set of same-valued cells with disjoint rectangles.
///
/// Greedy and deterministic, not a minimum rectangle cover:
/// 1. Sort cells row-major.
/// 2. From each unvisited cell, grow right while the next cell in the row is
///    present and unvisited, then grow down while the whole column span of
///    the next row is present and unvisited. Width is always settled before
///    height, so `{(1,1),(1,2),(2,1)}` yields `(1,1)-(1,2)` then `(2,1)-(2,1)`.
/// 3. Mark the covered cells visited and emit the rectangle.
///
/// Runs in O(n log n + n·w) where w is the widest rectangle. The union of the
/// output is exactly the input and no two rectangles overlap.
pub fn greedy_mesh(cells: &[Cell]) -> Vec<Rect> {
    if cells.is_empty() {
        return Vec::new();
    }

    let mut sorted = cells.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let present: HashSet<Cell> = sorted.iter().copied().collect();
    let mut visited: HashSet<Cell> = HashSet::with_capacity(sorted.len());
    let available = |c: Cell, visited: &HashSet<Cell>| present.contains(&c) && !visited.contains(&c);

    let mut rects = Vec::new();

    for &seed in &sorted {
        if visited.contains(&seed) {
            continue;
        }

        let (row_first, col_first) = (seed.row, seed.col);
        let mut row_last = row_first;
        let mut col_last = col_first;

        // Expand width
        while let Some(next_col) = col_last.checked_add(1) {
            if !available(Cell::new(row_first, next_col), &visited) {
                break;
            }
            col_last = next_col;
        }

        // Expand height
        while let Some(next_row) = row_last.checked_add(1) {
            let full_span =
                (col_first..=col_last).all(|col| available(Cell::new(next_row, col), &visited));
            if !full_span {
                break;
            }
            row_last = next_row;
        }

        let rect = Rect::new(row_first, row_last, col_first, col_last);
        visited.extend(rect.cells());
        rects.push(rect);
    }

    rects
}
