//! Starting position of a match.
//!
//! Map generation is not part of this crate: a generator (or a previous match record) hands
//! over an [`InitialMap`], which is validated once and then turned into the first frame.

use std::collections::HashSet;
use std::io::Read;

use anyhow::{bail, ensure, Context};
use serde::Deserialize;

use crate::game::{Frame, Grid, Position};
use crate::replay::{ProductionMap, ReplayPlayer};

/// Largest number of players a map may hold.
pub const MAX_PLAYERS: usize = 16;

/// Validated starting position: resource field, one factory per player and the generator seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialMap {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Resource of every cell, row-major.
    pub cells: Vec<u32>,
    /// Factory cell of every player, in player order.
    pub factories: Vec<Position>,
    /// Seed the generator used.
    pub seed: i32,
}

impl InitialMap {
    /// Validate a starting position.
    ///
    /// # Errors
    /// Returned when a side is smaller than 2, the cell count does not match the size, there is
    /// no factory or more than [`MAX_PLAYERS`], or factories are outside the map or share a cell.
    pub fn new(
        width: usize,
        height: usize,
        cells: Vec<u32>,
        factories: Vec<Position>,
        seed: i32,
    ) -> anyhow::Result<Self> {
        ensure!(
            width >= 2 && height >= 2,
            "map must be at least 2x2, got {width}x{height}"
        );
        ensure!(
            cells.len() == width * height,
            "a {width}x{height} map needs {} cells, got {}",
            width * height,
            cells.len()
        );
        ensure!(
            (1..=MAX_PLAYERS).contains(&factories.len()),
            "a map holds 1 to {MAX_PLAYERS} factories, got {}",
            factories.len()
        );

        let mut seen = HashSet::new();
        for (pid, &pos) in factories.iter().enumerate() {
            if pos.x >= width || pos.y >= height {
                bail!("factory of player {pid} at {pos} is outside the map");
            }
            if !seen.insert(pos) {
                bail!("factory of player {pid} at {pos} shares its cell");
            }
        }

        Ok(Self {
            width,
            height,
            cells,
            factories,
            seed,
        })
    }

    /// Reload the starting position stored in the header of a match record.
    ///
    /// # Errors
    /// Returned when the input is not a match record or describes an invalid map.
    pub fn from_match_record<R: Read>(reader: R) -> anyhow::Result<Self> {
        #[derive(Deserialize)]
        struct Header {
            map_generator_seed: i32,
            players: Vec<ReplayPlayer>,
            production_map: ProductionMap,
        }

        let header: Header =
            serde_json::from_reader(reader).context("could not read match record")?;
        let map = header.production_map;

        ensure!(
            map.grid.len() == map.height && map.grid.iter().all(|row| row.len() == map.width),
            "production map rows do not match its {}x{} size",
            map.width,
            map.height
        );
        let cells = map.grid.iter().flatten().map(|cell| cell.energy).collect();

        let mut players = header.players;
        players.sort_by_key(|p| p.player_id);
        for (expected, player) in players.iter().enumerate() {
            ensure!(
                player.player_id == expected,
                "player ids of the match record are not 0..{}",
                players.len()
            );
        }
        let factories = players.iter().map(|p| p.factory_location).collect();

        Self::new(map.width, map.height, cells, factories, header.map_generator_seed)
            .context("match record holds an invalid map")
    }

    /// Number of players, one per factory.
    pub fn players(&self) -> usize {
        self.factories.len()
    }

    /// First frame: turn 0, `initial_energy` for everyone and no resource under factories.
    pub fn to_frame(&self, initial_energy: u32) -> Frame {
        let grid = Grid::from_cells(self.width, self.height, self.cells.clone())
            .unwrap_or_else(|| Grid::filled(self.width, self.height, 0));
        Frame::new(grid, &self.factories, initial_energy)
    }
}
