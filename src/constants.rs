//! Ruleset of a match.
//!
//! [`Constants`] is fixed when the match starts and sent verbatim to every bot as the first line
//! of its init message, serialized as a single-line JSON object whose keys follow the reference
//! engine (`DROPOFF_COST`, `MAX_ENERGY`, ..., `game_seed`).

use serde::{Deserialize, Serialize};

/// Immutable per-match ruleset.
///
/// Fields are public so that tests and front ends can tweak a ruleset before the match starts;
/// the engine never mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Constants {
    /// Ship capture rule of the reference game. Informational, never enabled here.
    pub capture_enabled: bool,
    /// Informational.
    pub capture_radius: u32,
    /// Map height.
    pub default_map_height: usize,
    /// Map width.
    pub default_map_width: usize,
    /// Cost of converting a ship into a dropoff.
    pub dropoff_cost: u32,
    /// Informational.
    pub dropoff_penalty_ratio: u32,
    /// A still ship mines `ceil(cell / extract_ratio)`.
    pub extract_ratio: u32,
    /// Map generator parameter.
    pub factor_exp_1: f64,
    /// Map generator parameter.
    pub factor_exp_2: f64,
    /// Starting budget of every player.
    pub initial_energy: u32,
    /// When false no ship is ever inspired.
    pub inspiration_enabled: bool,
    /// Radius of the diamond searched for enemy ships.
    pub inspiration_radius: u32,
    /// Number of enemy ships needed to inspire a ship.
    pub inspiration_ship_count: u32,
    /// Extra resource granted to an inspired ship, as a multiple of what it mined.
    pub inspired_bonus_multiplier: f64,
    /// Extract ratio used by inspired ships.
    pub inspired_extract_ratio: u32,
    /// Move cost ratio used by inspired ships.
    pub inspired_move_cost_ratio: u32,
    /// Map generator parameter.
    pub max_cell_production: u32,
    /// Maximum resource a ship can carry.
    pub max_energy: u32,
    /// Maximum player count of the reference game.
    pub max_players: usize,
    /// Number of turns bots are asked to play.
    pub max_turns: usize,
    /// Informational.
    pub max_turn_threshold: u32,
    /// Map generator parameter.
    pub min_cell_production: u32,
    /// Informational.
    pub min_turns: usize,
    /// Informational.
    pub min_turn_threshold: u32,
    /// Moving costs `cell / move_cost_ratio`.
    pub move_cost_ratio: u32,
    /// Cost of a new ship.
    pub new_entity_energy_cost: u32,
    /// Map generator parameter.
    pub persistence: f64,
    /// Informational.
    pub ships_above_for_capture: u32,
    /// Informational.
    pub strict_errors: bool,
    /// Seed of the map generator, sent to bots.
    #[serde(rename = "game_seed")]
    pub game_seed: i32,
}

impl Constants {
    /// Reference ruleset for a map of the given size and an explicit turn count.
    ///
    /// The player count does not change the ruleset; it is accepted for symmetry with
    /// [`Constants::for_map`].
    pub fn new(_players: usize, width: usize, height: usize, turns: usize, seed: i32) -> Self {
        Self {
            capture_enabled: false,
            capture_radius: 3,
            default_map_height: height,
            default_map_width: width,
            dropoff_cost: 4000,
            dropoff_penalty_ratio: 4,
            extract_ratio: 4,
            factor_exp_1: 2.0,
            factor_exp_2: 2.0,
            initial_energy: 5000,
            inspiration_enabled: true,
            inspiration_radius: 4,
            inspiration_ship_count: 2,
            inspired_bonus_multiplier: 2.0,
            inspired_extract_ratio: 4,
            inspired_move_cost_ratio: 10,
            max_cell_production: 1000,
            max_energy: 1000,
            max_players: 16,
            max_turns: turns,
            max_turn_threshold: 64,
            min_cell_production: 900,
            min_turns: 400,
            min_turn_threshold: 32,
            move_cost_ratio: 10,
            new_entity_energy_cost: 1000,
            persistence: 0.7,
            ships_above_for_capture: 3,
            strict_errors: false,
            game_seed: seed,
        }
    }

    /// Reference ruleset whose turn count is derived from the map size.
    pub fn for_map(players: usize, width: usize, height: usize, seed: i32) -> Self {
        Self::new(players, width, height, turns_from_size(width, height), seed)
    }

    /// Single-line JSON sent to the bots.
    pub fn to_json_line(&self) -> String {
        // Serializing plain numbers and booleans cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Inspired bonus multiplier as the integer the engine applies.
    pub(crate) fn bonus_multiplier(&self) -> u32 {
        self.inspired_bonus_multiplier.max(0.0) as u32
    }
}

/// Match length used by the reference engine: 300 turns plus 25/8 per cell of the longest side.
pub fn turns_from_size(width: usize, height: usize) -> usize {
    width.max(height) * 25 / 8 + 300
}
