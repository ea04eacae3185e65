//! Parsing of the untrusted command line a bot submits each turn.
//!
//! A command line is a sequence of tokens:
//!
//! ```text
//! g            generate a ship at the factory
//! m <id> <d>   move ship <id> in direction <d> (n, s, e, w or o)
//! c <id>       convert ship <id> into a dropoff
//! ```
//!
//! Separators are optional between a letter and an adjacent number, so `"gm12nc7"` and
//! `"g m 12 n c 7"` are the same line. The first illegal token rejects the whole line.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::game::{Direction, Frame, PlayerId, ShipId};

/// Letters that always form a token on their own.
const MARKERS: [char; 8] = ['g', 'm', 'c', 'n', 's', 'e', 'w', 'o'];

/// Why a player failed this turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A token that is not `g`, `m` or `c` where a command was expected.
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),
    /// More than one `g` in the same line.
    #[error("sent 2 or more generate commands")]
    DoubleGenerate,
    /// A ship id that is not a number.
    #[error("invalid ship id \"{0}\"")]
    InvalidShipId(String),
    /// A ship id that was never allocated or whose ship is destroyed.
    #[error("sent command for non-existent ship {0}")]
    NoSuchShip(ShipId),
    /// A ship of another player.
    #[error("sent command for ship {ship} owned by player {owner}")]
    ForeignShip {
        /// Ship id named in the command.
        ship: ShipId,
        /// Its actual owner.
        owner: PlayerId,
    },
    /// Two commands for the same ship.
    #[error("sent 2 or more commands for ship {0}")]
    DoubleCommand(ShipId),
    /// A direction token outside `n s e w o`.
    #[error("sent unknown direction \"{0}\"")]
    UnknownDirection(String),
    /// `c` for a ship that stands on a factory or dropoff.
    #[error("sent construct command from ship {0} over a structure")]
    ConstructOnStructure(ShipId),
    /// The budget would be negative after paying for the turn's commands.
    #[error("went over budget ({0})")]
    Overspent(i64),
}

/// What a single ship was told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Move one cell (or stay, for [`Direction::Still`]).
    Move(Direction),
    /// Become a dropoff.
    Construct,
}

/// Validated commands of one player for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerOrders {
    /// A ship is requested at the factory.
    pub generate: bool,
    /// At most one order per ship, by ship id.
    pub ships: BTreeMap<ShipId, Order>,
}

impl PlayerOrders {
    /// Ids of ships told to construct.
    pub fn constructs(&self) -> impl Iterator<Item = ShipId> + '_ {
        self.ships
            .iter()
            .filter(|(_, order)| **order == Order::Construct)
            .map(|(&id, _)| id)
    }
}

/// Split a command line into tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() || MARKERS.contains(&c) {
            if let Some(s) = start.take() {
                tokens.push(&text[s..i]);
            }
            if !c.is_whitespace() {
                tokens.push(&text[i..i + c.len_utf8()]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&text[s..]);
    }
    tokens
}

enum Expect {
    Command,
    MoveShip,
    ConstructShip,
    Direction(ShipId),
}

/// Validate the command line of player `pid` against `frame`.
///
/// A trailing incomplete command (`"m"`, `"m 3"`, `"c"`) is ignored.
pub fn parse_orders(pid: PlayerId, text: &str, frame: &Frame) -> Result<PlayerOrders, CommandError> {
    let mut orders = PlayerOrders::default();
    let mut expect = Expect::Command;

    for token in tokenize(text) {
        expect = match expect {
            Expect::Command => match token {
                "g" if orders.generate => return Err(CommandError::DoubleGenerate),
                "g" => {
                    orders.generate = true;
                    Expect::Command
                }
                "m" => Expect::MoveShip,
                "c" => Expect::ConstructShip,
                other => return Err(CommandError::UnknownCommand(other.to_string())),
            },
            Expect::MoveShip => Expect::Direction(owned_ship(pid, token, frame, &orders)?),
            Expect::ConstructShip => {
                let id = owned_ship(pid, token, frame, &orders)?;
                let on_structure = frame
                    .ships()
                    .get(id)
                    .is_some_and(|ship| frame.structure_at(ship.position).is_some());
                if on_structure {
                    return Err(CommandError::ConstructOnStructure(id));
                }
                orders.ships.insert(id, Order::Construct);
                Expect::Command
            }
            Expect::Direction(id) => {
                let direction = Direction::from_token(token)
                    .ok_or_else(|| CommandError::UnknownDirection(token.to_string()))?;
                orders.ships.insert(id, Order::Move(direction));
                Expect::Command
            }
        };
    }

    Ok(orders)
}

fn owned_ship(
    pid: PlayerId,
    token: &str,
    frame: &Frame,
    orders: &PlayerOrders,
) -> Result<ShipId, CommandError> {
    let id: ShipId = token
        .parse()
        .map_err(|_| CommandError::InvalidShipId(token.to_string()))?;
    let ship = frame.ships().get(id).ok_or(CommandError::NoSuchShip(id))?;
    if ship.owner != pid {
        return Err(CommandError::ForeignShip {
            ship: id,
            owner: ship.owner,
        });
    }
    if orders.ships.contains_key(&id) {
        return Err(CommandError::DoubleCommand(id));
    }
    Ok(id)
}
