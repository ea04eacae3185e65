//! Resource field of the map.

use crate::game::Position;

/// Non-negative resource amount of every cell, stored in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl Grid {
    /// Create a grid from row-major cells.
    ///
    /// Returns `None` if `cells.len() != width * height` or a side is zero.
    pub fn from_cells(width: usize, height: usize, cells: Vec<u32>) -> Option<Self> {
        if width == 0 || height == 0 || cells.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    /// A grid where every cell holds `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// Width of the grid.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the grid.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        debug_assert!(pos.x < self.width && pos.y < self.height);
        pos.y * self.width + pos.x
    }

    /// Resource on a cell.
    #[must_use]
    #[inline]
    pub fn get(&self, pos: Position) -> u32 {
        self.cells[self.index(pos)]
    }

    /// Overwrite the resource on a cell.
    #[inline]
    pub fn set(&mut self, pos: Position, value: u32) {
        let i = self.index(pos);
        self.cells[i] = value;
    }

    /// Add resource to a cell.
    #[inline]
    pub fn add(&mut self, pos: Position, amount: u32) {
        let i = self.index(pos);
        self.cells[i] = self.cells[i].saturating_add(amount);
    }

    /// Remove at most `amount` from a cell and return what was actually taken.
    #[inline]
    pub fn take(&mut self, pos: Position, amount: u32) -> u32 {
        let i = self.index(pos);
        let taken = amount.min(self.cells[i]);
        self.cells[i] -= taken;
        taken
    }

    /// Empty a cell and return what it held.
    #[inline]
    pub fn clear(&mut self, pos: Position) -> u32 {
        let i = self.index(pos);
        std::mem::take(&mut self.cells[i])
    }

    /// Sum of all cells.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| u64::from(c)).sum()
    }

    /// Row `y`, left to right.
    pub fn row(&self, y: usize) -> &[u32] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Cells whose value differs from `old`, listed column by column (x-major, then y), with
    /// their new value.
    pub fn changes_since(&self, old: &Grid) -> Vec<(Position, u32)> {
        let mut changes = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                let pos = Position::new(x, y);
                let value = self.get(pos);
                if value != old.get(pos) {
                    changes.push((pos, value));
                }
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_cell_count() {
        assert!(Grid::from_cells(3, 2, vec![0; 5]).is_none());
        assert!(Grid::from_cells(0, 2, vec![]).is_none());
        assert!(Grid::from_cells(3, 2, vec![0; 6]).is_some());
    }

    #[test]
    fn take_never_goes_negative() {
        let mut grid = Grid::filled(2, 2, 10);
        let p = Position::new(1, 1);
        assert_eq!(grid.take(p, 4), 4);
        assert_eq!(grid.take(p, 40), 6);
        assert_eq!(grid.get(p), 0);
        assert_eq!(grid.total(), 30);
    }

    #[test]
    fn changes_are_listed_x_major() {
        let old = Grid::filled(3, 3, 5);
        let mut new = old.clone();
        new.set(Position::new(2, 0), 1);
        new.set(Position::new(0, 2), 2);
        new.set(Position::new(0, 1), 3);
        assert_eq!(
            new.changes_since(&old),
            vec![
                (Position::new(0, 1), 3),
                (Position::new(0, 2), 2),
                (Position::new(2, 0), 1),
            ]
        );
    }

    #[test]
    fn rows_are_read_left_to_right() {
        let grid = Grid::from_cells(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(grid.row(1), &[4, 5, 6]);
        assert_eq!(grid.get(Position::new(2, 0)), 3);
    }
}
