//! Text the bots read on stdin.
//!
//! Both messages are returned without a final newline; the bot process appends one.

use std::fmt::Write;

use crate::constants::Constants;
use crate::game::{Frame, PlayerId};

/// Init message of player `pid`:
///
/// ```text
/// <constants as one JSON line>
/// <players> <pid>
/// <player> <factory x> <factory y>      (one line per player)
/// <width> <height>
/// <row 0 values separated by spaces>    (one line per row)
/// ```
pub fn init_message(constants: &Constants, frame: &Frame, pid: PlayerId) -> String {
    let mut lines = Vec::with_capacity(frame.players() + frame.height() + 3);
    lines.push(constants.to_json_line());
    lines.push(format!("{} {}", frame.players(), pid));
    for p in 0..frame.players() {
        let factory = frame.factory(p).position;
        lines.push(format!("{} {} {}", p, factory.x, factory.y));
    }
    lines.push(format!("{} {}", frame.width(), frame.height()));
    for y in 0..frame.height() {
        let row = frame
            .grid()
            .row(y)
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(row);
    }
    lines.join("\n")
}

/// Turn input describing `current`, with the cells that changed since `old`:
///
/// ```text
/// <turn>
/// <player> <ships> <dropoffs> <budget>  (then one line per ship and per dropoff of the player)
/// <ship id> <x> <y> <cargo>
/// <dropoff id> <x> <y>
/// <changed cell count>
/// <x> <y> <value>                       (one line per changed cell)
/// ```
pub fn turn_update(old: &Frame, current: &Frame) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(out, "{}", current.turn());

    for pid in 0..current.players() {
        let ships: Vec<_> = current.ships().iter().filter(|s| s.owner == pid).collect();
        let dropoffs: Vec<_> = current
            .structures()
            .iter()
            .filter(|s| s.owner == pid && !s.is_factory())
            .collect();

        let _ = write!(
            out,
            "\n{} {} {} {}",
            pid,
            ships.len(),
            dropoffs.len(),
            current.budget(pid)
        );
        for ship in ships {
            let _ = write!(
                out,
                "\n{} {} {} {}",
                ship.id, ship.position.x, ship.position.y, ship.cargo
            );
        }
        for dropoff in dropoffs {
            let id = dropoff.id.unwrap_or_default();
            let _ = write!(out, "\n{} {} {}", id, dropoff.position.x, dropoff.position.y);
        }
    }

    let changes = current.grid().changes_since(old.grid());
    let _ = write!(out, "\n{}", changes.len());
    for (pos, value) in changes {
        let _ = write!(out, "\n{} {} {}", pos.x, pos.y, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Grid, Position};

    fn frame() -> Frame {
        let grid = Grid::from_cells(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        Frame::new(grid, &[Position::new(0, 0), Position::new(2, 1)], 5000)
    }

    #[test]
    fn init_message_lists_factories_then_rows() {
        let frame = frame();
        let constants = Constants::new(2, 3, 2, 10, 1);
        let message = init_message(&constants, &frame, 1);
        let lines: Vec<_> = message.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with('{'));
        assert_eq!(&lines[1..], &["2 1", "0 0 0", "1 2 1", "3 2", "0 2 3", "4 5 0"]);
        assert!(!message.ends_with('\n'));
    }

    #[test]
    fn turn_update_lists_entities_and_changed_cells() {
        let old = frame();
        let mut current = old.clone();
        current.turn = 1;
        current.ships.spawn(0, Position::new(1, 0));
        current.ships.get_mut(0).unwrap().cargo = 7;
        current.structures.push(crate::game::Structure {
            id: Some(9),
            owner: 1,
            position: Position::new(1, 1),
            gathered: 0,
        });
        current.budgets[0] = 4000;
        current.grid.set(Position::new(1, 1), 0);

        assert_eq!(
            turn_update(&old, &current),
            "1\n0 1 0 4000\n0 1 0 7\n1 0 1 5000\n9 1 1\n1\n1 1 0"
        );
    }
}
