//! Cells and directions on the toroidal map.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell of the map. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Cell reached by moving one step in `direction`, wrapping around the map edges.
    #[must_use]
    pub fn step(self, direction: Direction, width: usize, height: usize) -> Self {
        let (dx, dy) = direction.offset();
        self.offset(dx, dy, width, height)
    }

    /// Cell at `(x + dx, y + dy)` modulo the map size.
    #[must_use]
    pub fn offset(self, dx: i64, dy: i64, width: usize, height: usize) -> Self {
        let x = (self.x as i64 + dx).rem_euclid(width as i64);
        let y = (self.y as i64 + dy).rem_euclid(height as i64);
        Self::new(x as usize, y as usize)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Direction token of a move command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `n`, towards smaller `y`.
    North,
    /// `s`, towards larger `y`.
    South,
    /// `e`, towards larger `x`.
    East,
    /// `w`, towards smaller `x`.
    West,
    /// `o`, stay on the cell.
    Still,
}

impl Direction {
    /// All five tokens, in wire order.
    pub const ALL: [Direction; 5] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Still,
    ];

    /// Parse a direction token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "n" => Some(Direction::North),
            "s" => Some(Direction::South),
            "e" => Some(Direction::East),
            "w" => Some(Direction::West),
            "o" => Some(Direction::Still),
            _ => None,
        }
    }

    /// Wire character of the direction.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::South => 's',
            Direction::East => 'e',
            Direction::West => 'w',
            Direction::Still => 'o',
        }
    }

    /// `(dx, dy)` of one step.
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::Still => (0, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for Direction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_wrap_on_every_edge() {
        let (w, h) = (8, 5);
        assert_eq!(
            Position::new(0, 0).step(Direction::West, w, h),
            Position::new(7, 0)
        );
        assert_eq!(
            Position::new(0, 0).step(Direction::North, w, h),
            Position::new(0, 4)
        );
        assert_eq!(
            Position::new(7, 4).step(Direction::East, w, h),
            Position::new(0, 4)
        );
        assert_eq!(
            Position::new(7, 4).step(Direction::South, w, h),
            Position::new(7, 0)
        );
        assert_eq!(
            Position::new(3, 2).step(Direction::Still, w, h),
            Position::new(3, 2)
        );
    }

    #[test]
    fn tokens_round_trip_through_chars() {
        for direction in Direction::ALL {
            let token = direction.as_char().to_string();
            assert_eq!(Direction::from_token(&token), Some(direction));
        }
        assert_eq!(Direction::from_token("z"), None);
        assert_eq!(Direction::from_token("c"), None);
        assert_eq!(Direction::from_token(""), None);
    }

    #[test]
    fn large_offsets_stay_in_bounds() {
        let p = Position::new(1, 1).offset(-17, 23, 4, 6);
        assert!(p.x < 4 && p.y < 6);
        assert_eq!(p, Position::new(0, 0));
    }
}
