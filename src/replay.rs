//! Match record: one diagnostic record per state transition plus final statistics.
//!
//! Everything here serializes (serde) to the JSON layout of the reference replay format, so a
//! front end only has to pick where the bytes go. The engine never touches the filesystem.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::Constants;
use crate::game::{Direction, Frame, Game, PlayerId, PlayerStatus, Position, ShipId};

/// Engine name written in the record header.
pub const ENGINE_VERSION: &str = "Dubnium Engine";

/// Record layout version.
pub const REPLAY_FILE_VERSION: u32 = 3;

/// New resource value of a cell that changed during the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellUpdate {
    /// Value after the turn.
    pub production: u32,
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

/// A ship as it stood at the start of the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShipSnapshot {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Carried resource.
    pub energy: u32,
    /// Inspiration flag.
    pub is_inspired: bool,
}

/// A structure as it stood at the start of the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructureSnapshot {
    /// Id of the ship that built it, `None` for the factory.
    pub id: Option<ShipId>,
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Resource delivered so far.
    pub gathered: u64,
}

/// Something that happened during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    /// A ship was created at a factory.
    Spawn {
        /// New ship id.
        id: ShipId,
        /// Factory cell.
        location: Position,
        /// Owner of the new ship.
        owner_id: PlayerId,
        /// Always 0.
        energy: u32,
    },
    /// A ship became a dropoff.
    Construct {
        /// Id of the converted ship, kept as the dropoff id.
        id: ShipId,
        /// Cell of the new dropoff.
        location: Position,
        /// Owner of the dropoff.
        owner_id: PlayerId,
    },
    /// Ships destroyed by a collision.
    Shipwreck {
        /// Cell of the collision.
        location: Position,
        /// Destroyed ship ids, ascending.
        ships: Vec<ShipId>,
    },
}

/// One accepted command, as logged for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum MoveRecord {
    /// `g`
    #[serde(rename = "g")]
    Generate,
    /// `m <id> <direction>`, also logged as `o` for ships that received no command.
    #[serde(rename = "m")]
    Move {
        /// Ship id.
        id: ShipId,
        /// Requested direction.
        direction: Direction,
    },
    /// `c <id>`
    #[serde(rename = "c")]
    Construct {
        /// Ship id.
        id: ShipId,
    },
}

/// Diagnostic record of one state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnRecord {
    /// Cells whose resource changed, x-major.
    pub cells: Vec<CellUpdate>,
    /// Lifetime deposited resource per player, after the turn.
    pub deposited: BTreeMap<PlayerId, i64>,
    /// Budget per player, after the turn.
    pub energy: BTreeMap<PlayerId, i64>,
    /// Ships per player at the start of the turn.
    pub entities: BTreeMap<PlayerId, BTreeMap<ShipId, ShipSnapshot>>,
    /// Structures per player at the start of the turn.
    pub structures: BTreeMap<PlayerId, Vec<StructureSnapshot>>,
    /// Constructs, shipwrecks and spawns, in that order.
    pub events: Vec<Event>,
    /// Accepted commands per player.
    pub moves: BTreeMap<PlayerId, Vec<MoveRecord>>,
}

impl TurnRecord {
    /// Empty record whose snapshots describe `frame`.
    pub(crate) fn starting_from(frame: &Frame) -> Self {
        let mut entities: BTreeMap<PlayerId, BTreeMap<ShipId, ShipSnapshot>> =
            (0..frame.players()).map(|pid| (pid, BTreeMap::new())).collect();
        for ship in frame.ships().iter() {
            entities.entry(ship.owner).or_default().insert(
                ship.id,
                ShipSnapshot {
                    x: ship.position.x,
                    y: ship.position.y,
                    energy: ship.cargo,
                    is_inspired: ship.inspired,
                },
            );
        }

        let mut structures: BTreeMap<PlayerId, Vec<StructureSnapshot>> =
            (0..frame.players()).map(|pid| (pid, Vec::new())).collect();
        for s in frame.structures() {
            structures.entry(s.owner).or_default().push(StructureSnapshot {
                id: s.id,
                x: s.position.x,
                y: s.position.y,
                gathered: s.gathered,
            });
        }

        Self {
            cells: Vec::new(),
            deposited: BTreeMap::new(),
            energy: BTreeMap::new(),
            entities,
            structures,
            events: Vec::new(),
            moves: (0..frame.players()).map(|pid| (pid, Vec::new())).collect(),
        }
    }
}

/// Header entry of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayPlayer {
    /// Starting budget.
    pub energy: u32,
    /// Home factory cell.
    pub factory_location: Position,
    /// Name the bot reported, or a placeholder.
    pub name: String,
    /// Player index.
    pub player_id: PlayerId,
}

/// Resource of one cell in the production map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyHolder {
    /// Resource amount.
    pub energy: u32,
}

/// Starting resource field, indexed `[y][x]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionMap {
    /// Rows of cells.
    pub grid: Vec<Vec<EnergyHolder>>,
    /// Map width.
    pub width: usize,
    /// Map height.
    pub height: usize,
}

impl ProductionMap {
    fn from_frame(frame: &Frame) -> Self {
        let grid = (0..frame.height())
            .map(|y| {
                frame
                    .grid()
                    .row(y)
                    .iter()
                    .map(|&energy| EnergyHolder { energy })
                    .collect()
            })
            .collect();
        Self {
            grid,
            width: frame.width(),
            height: frame.height(),
        }
    }
}

/// Resource delivered to one structure, serialized as `[{"x":..,"y":..}, gathered]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructureTotal(pub Position, pub u64);

/// End-of-match statistics of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    /// Player index.
    pub player_id: PlayerId,
    /// 1 + number of players with a strictly greater final budget.
    pub rank: usize,
    /// `max_turns + 1` for survivors, else the death turn.
    pub last_turn_alive: usize,
    /// Final budget.
    pub final_production: i64,
    /// Resource delivered to all of the player's structures.
    pub total_production: u64,
    /// Part of `total_production` delivered to the factory.
    pub factory_production: u64,
    /// Part of `total_production` delivered to built dropoffs.
    pub dropoff_production: u64,
    /// Dropoffs built.
    pub number_dropoffs: usize,
    /// Per-structure totals, factory first.
    pub halite_per_dropoff: Vec<StructureTotal>,
}

/// Final statistics of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    /// Number of turns played, `max_turns + 1`.
    pub number_turns: usize,
    /// One entry per player, in player order.
    pub player_statistics: Vec<PlayerStats>,
}

impl MatchStats {
    /// Score the terminal frame of `game`.
    pub fn compute(game: &Game) -> Self {
        let frame = game.frame();
        let turns = game.constants().max_turns;

        let player_statistics = (0..frame.players())
            .map(|pid| {
                let mut stats = PlayerStats {
                    player_id: pid,
                    rank: game.rank(pid),
                    last_turn_alive: match frame.status(pid) {
                        PlayerStatus::Alive => turns + 1,
                        PlayerStatus::Dead { turn } => turn,
                    },
                    final_production: frame.budget(pid),
                    total_production: 0,
                    factory_production: 0,
                    dropoff_production: 0,
                    number_dropoffs: 0,
                    halite_per_dropoff: Vec::new(),
                };
                for s in frame.structures().iter().filter(|s| s.owner == pid) {
                    stats.total_production += s.gathered;
                    if s.is_factory() {
                        stats.factory_production += s.gathered;
                    } else {
                        stats.dropoff_production += s.gathered;
                        stats.number_dropoffs += 1;
                    }
                    stats.halite_per_dropoff.push(StructureTotal(s.position, s.gathered));
                }
                stats
            })
            .collect();

        Self {
            number_turns: turns + 1,
            player_statistics,
        }
    }
}

/// Complete match record.
#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    /// Engine name.
    #[serde(rename = "ENGINE_VERSION")]
    pub engine_version: String,
    /// Ruleset.
    #[serde(rename = "GAME_CONSTANTS")]
    pub constants: Constants,
    /// Layout version.
    #[serde(rename = "REPLAY_FILE_VERSION")]
    pub file_version: u32,
    /// One record per state transition.
    pub full_frames: Vec<TurnRecord>,
    /// Filled once the match is over.
    pub game_statistics: Option<MatchStats>,
    /// Seed of the map generator.
    pub map_generator_seed: i32,
    /// Player count.
    pub number_of_players: usize,
    /// Names and factories.
    pub players: Vec<ReplayPlayer>,
    /// Starting resource field.
    pub production_map: ProductionMap,
}

impl Replay {
    /// Header for a match about to start from `game`'s current frame.
    pub fn new(names: &[String], game: &Game) -> Self {
        let frame = game.frame();
        let constants = game.constants();
        let players = (0..frame.players())
            .map(|pid| ReplayPlayer {
                energy: constants.initial_energy,
                factory_location: frame.factory(pid).position,
                name: names.get(pid).cloned().unwrap_or_default(),
                player_id: pid,
            })
            .collect();

        Self {
            engine_version: ENGINE_VERSION.to_string(),
            constants: constants.clone(),
            file_version: REPLAY_FILE_VERSION,
            full_frames: Vec::new(),
            game_statistics: None,
            map_generator_seed: constants.game_seed,
            number_of_players: frame.players(),
            players,
            production_map: ProductionMap::from_frame(frame),
        }
    }

    /// Append the record of one transition.
    pub fn push(&mut self, record: TurnRecord) {
        self.full_frames.push(record);
    }

    /// Serialize the whole record as compact JSON into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        serde_json::to_writer(writer, self).context("could not serialize match record")
    }
}

/// Rank and score of a player in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankScore {
    /// Final rank.
    pub rank: usize,
    /// Final budget.
    pub score: i64,
}

/// Compact result of a match, for printing by a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Map width.
    pub map_width: usize,
    /// Map height.
    pub map_height: usize,
    /// Seed of the map generator.
    pub map_seed: i32,
    /// Rank and score by player.
    pub stats: BTreeMap<PlayerId, RankScore>,
    /// Wall-clock duration of the match.
    pub time: String,
}

impl MatchSummary {
    pub(crate) fn new(replay: &Replay, stats: &MatchStats, elapsed: std::time::Duration) -> Self {
        Self {
            map_width: replay.production_map.width,
            map_height: replay.production_map.height,
            map_seed: replay.map_generator_seed,
            stats: stats
                .player_statistics
                .iter()
                .map(|p| {
                    (
                        p.player_id,
                        RankScore {
                            rank: p.rank,
                            score: p.final_production,
                        },
                    )
                })
                .collect(),
            time: format!("{}ms", elapsed.as_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::InitialMap;

    fn two_player_game() -> Game {
        let map = InitialMap::new(
            8,
            8,
            vec![10; 64],
            vec![Position::new(1, 1), Position::new(5, 5)],
            42,
        )
        .unwrap();
        Game::new(Constants::new(2, 8, 8, 10, 42), &map).unwrap()
    }

    #[test]
    fn events_serialize_with_type_tags() {
        let wreck = Event::Shipwreck {
            location: Position::new(3, 4),
            ships: vec![1, 5],
        };
        assert_eq!(
            serde_json::to_string(&wreck).unwrap(),
            r#"{"type":"shipwreck","location":{"x":3,"y":4},"ships":[1,5]}"#
        );
        let mv = MoveRecord::Move {
            id: 2,
            direction: Direction::West,
        };
        assert_eq!(
            serde_json::to_string(&mv).unwrap(),
            r#"{"type":"m","id":2,"direction":"w"}"#
        );
        assert_eq!(
            serde_json::to_string(&MoveRecord::Generate).unwrap(),
            r#"{"type":"g"}"#
        );
    }

    #[test]
    fn structure_totals_serialize_as_pairs() {
        let total = StructureTotal(Position::new(1, 2), 300);
        assert_eq!(
            serde_json::to_string(&total).unwrap(),
            r#"[{"x":1,"y":2},300]"#
        );
    }

    #[test]
    fn header_describes_the_starting_frame() {
        let game = two_player_game();
        let names = vec!["a".to_string(), "b".to_string()];
        let replay = Replay::new(&names, &game);
        assert_eq!(replay.number_of_players, 2);
        assert_eq!(replay.players[1].factory_location, Position::new(5, 5));
        assert_eq!(replay.production_map.grid.len(), 8);
        assert_eq!(replay.production_map.grid[1][1].energy, 0);
        assert_eq!(replay.production_map.grid[1][2].energy, 10);

        let mut bytes = Vec::new();
        replay.write_to(&mut bytes).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["ENGINE_VERSION"], ENGINE_VERSION);
        assert_eq!(json["GAME_CONSTANTS"]["MAX_TURNS"], 10);
        assert_eq!(json["map_generator_seed"], 42);
    }

    #[test]
    fn untouched_match_ranks_everyone_first() {
        let game = two_player_game();
        let stats = MatchStats::compute(&game);
        assert_eq!(stats.number_turns, 11);
        for p in &stats.player_statistics {
            assert_eq!(p.rank, 1);
            assert_eq!(p.last_turn_alive, 11);
            assert_eq!(p.final_production, 5000);
            assert_eq!(p.halite_per_dropoff.len(), 1);
            assert_eq!(p.number_dropoffs, 0);
        }
    }
}
