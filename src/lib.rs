//! # Dubnium
//!
//! A deterministic match engine for a turn-based resource-collection contest on a toroidal grid.
//! Independently written bot programs harvest a depletable resource with ships, spend it on
//! new ships and dropoffs, and finish ranked by their budget.
//!
//! It provides:
//! - Supervision of the bot processes over line-oriented pipes with hard deadlines
//!   ([`MatchRunner`](crate::match_runner::MatchRunner), [`BotProcess`](crate::bot_process::BotProcess))
//! - The simultaneous state-transition function ([`Game`](crate::game::Game))
//! - A serializable match record and final statistics ([`replay`])
//!
//! A match always runs to its configured length: a bot that crashes, hangs, sends garbage or
//! overspends only kills its own player.
//!
//! # Documentation Overview
//!
//! - For the rules of a turn, see [`Game::update`](crate::game::Game::update).
//! - For the bot wire protocol, see [`init_message`](crate::game::init_message) and
//!   [`turn_update`](crate::game::turn_update).
//! - For deadlines and logging, see [`Configuration`](crate::configuration::Configuration).
//! - For the starting position, see [`InitialMap`](crate::map::InitialMap).
//!
//! # Usage Example
//!
//! ```no_run
//! use std::fs::File;
//! use dubnium::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let map = InitialMap::from_match_record(File::open("previous_match.json")?)?;
//!     let constants = Constants::for_map(map.players(), map.width, map.height, map.seed);
//!     let bots = ["./my_bot", "python3 other_bot.py"]
//!         .iter()
//!         .map(|line| BotCommand::parse(line))
//!         .collect::<anyhow::Result<Vec<_>>>()?;
//!
//!     let runner = MatchRunner::new(Configuration::from_env(), constants, &map, bots)?;
//!     let outcome = runner.run(&mut ());
//!
//!     outcome.replay.write_to(File::create("replay.json")?)?;
//!     println!("{:?}", outcome.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Bot Requirements
//!
//! - Read the init message, then answer with one line: the bot's name
//! - Then, for every turn input, answer with exactly one line of commands
//! - Anything written to stderr is ignored (or logged, see
//!   [`Configuration::with_debug_bot_stderr`](crate::configuration::Configuration::with_debug_bot_stderr))
#![warn(missing_docs)]

pub use anyhow;
pub mod bot_process;
pub mod configuration;
pub mod constants;
pub mod game;
mod logger;
pub mod map;
pub mod match_runner;
pub mod replay;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use dubnium::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bot_process::BotCommand;
    pub use crate::configuration::Configuration;
    pub use crate::constants::Constants;
    pub use crate::game::{Direction, Game, Position, TurnOutcome};
    pub use crate::map::InitialMap;
    pub use crate::match_runner::{ChannelObserver, MatchOutcome, MatchRunner, TurnObserver};
    pub use crate::replay::{MatchStats, Replay};
}
