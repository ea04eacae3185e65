//! Game state and the state-transition function.

mod command;
mod encoding;
mod engine;
mod frame;
mod grid;
mod position;

pub use command::{parse_orders, tokenize, CommandError, Order, PlayerOrders};
pub use encoding::{init_message, turn_update};
pub use engine::{Game, TurnOutcome};
pub use frame::{Frame, PlayerId, PlayerStatus, Ship, ShipArena, ShipId, Structure};
pub use grid::Grid;
pub use position::{Direction, Position};
