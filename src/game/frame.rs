//! Complete game state of one turn.

use std::collections::HashMap;

use crate::game::{Grid, Position};

/// Index of a player, `0..players`.
pub type PlayerId = usize;

/// Stable id of a ship. Ids are allocated in increasing order and never reused.
pub type ShipId = usize;

/// A ship on the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ship {
    /// Stable id.
    pub id: ShipId,
    /// Owning player.
    pub owner: PlayerId,
    /// Current cell.
    pub position: Position,
    /// Carried resource.
    pub cargo: u32,
    /// Inspiration computed at the end of the previous turn.
    pub inspired: bool,
}

/// A factory or a player-built dropoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    /// Id of the ship that built it; `None` for a home factory.
    pub id: Option<ShipId>,
    /// Owning player.
    pub owner: PlayerId,
    /// Cell of the structure.
    pub position: Position,
    /// Total resource delivered here, including what was absorbed on construction.
    pub gathered: u64,
}

impl Structure {
    /// Home factory of `owner`.
    #[must_use]
    pub fn factory(owner: PlayerId, position: Position) -> Self {
        Self {
            id: None,
            owner,
            position,
            gathered: 0,
        }
    }

    /// True for the immutable home factories.
    #[must_use]
    pub fn is_factory(&self) -> bool {
        self.id.is_none()
    }
}

/// Ships indexed by their stable id. A destroyed ship leaves a tombstone so that ids are never
/// reused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipArena {
    slots: Vec<Option<Ship>>,
}

impl ShipArena {
    /// Number of ids ever allocated. The next ship gets this id.
    #[must_use]
    pub fn next_id(&self) -> ShipId {
        self.slots.len()
    }

    /// Living ship with this id.
    #[must_use]
    pub fn get(&self, id: ShipId) -> Option<&Ship> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Mutable access to a living ship.
    pub fn get_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Create a ship with a fresh id and return the id.
    pub fn spawn(&mut self, owner: PlayerId, position: Position) -> ShipId {
        let id = self.slots.len();
        self.slots.push(Some(Ship {
            id,
            owner,
            position,
            cargo: 0,
            inspired: false,
        }));
        id
    }

    /// Destroy a ship and return it. The id stays allocated.
    pub fn remove(&mut self, id: ShipId) -> Option<Ship> {
        self.slots.get_mut(id).and_then(Option::take)
    }

    /// Living ships in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Ship> {
        self.slots.iter().flatten()
    }

    /// Living ships in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ship> {
        self.slots.iter_mut().flatten()
    }

    /// Number of living ships.
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Ids of living ships owned by `owner`.
    pub fn ids_of(&self, owner: PlayerId) -> Vec<ShipId> {
        self.iter()
            .filter(|s| s.owner == owner)
            .map(|s| s.id)
            .collect()
    }
}

/// Whether a player still takes part in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Receives turn input and submits commands.
    Alive,
    /// Permanently out since `turn`.
    Dead {
        /// Turn of the first failure or timeout.
        turn: usize,
    },
}

/// Full mutable state at one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub(crate) turn: usize,
    pub(crate) budgets: Vec<i64>,
    pub(crate) deposited: Vec<i64>,
    pub(crate) status: Vec<PlayerStatus>,
    pub(crate) grid: Grid,
    pub(crate) ships: ShipArena,
    /// The first `players` entries are the factories, in player order.
    pub(crate) structures: Vec<Structure>,
}

impl Frame {
    /// Starting frame: turn 0, every player alive with `budget`, no ship.
    ///
    /// The resource under each factory is removed.
    pub fn new(mut grid: Grid, factories: &[Position], budget: u32) -> Self {
        let players = factories.len();
        let structures = factories
            .iter()
            .enumerate()
            .map(|(pid, &pos)| {
                grid.set(pos, 0);
                Structure::factory(pid, pos)
            })
            .collect();

        Self {
            turn: 0,
            budgets: vec![i64::from(budget); players],
            deposited: vec![0; players],
            status: vec![PlayerStatus::Alive; players],
            grid,
            ships: ShipArena::default(),
            structures,
        }
    }

    /// Turn number of this frame.
    #[must_use]
    pub fn turn(&self) -> usize {
        self.turn
    }

    /// Number of players.
    #[must_use]
    pub fn players(&self) -> usize {
        self.budgets.len()
    }

    /// Map width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    /// Map height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Spendable budget of a player.
    #[must_use]
    pub fn budget(&self, pid: PlayerId) -> i64 {
        self.budgets[pid]
    }

    /// Resource a player delivered over the whole match.
    #[must_use]
    pub fn deposited(&self, pid: PlayerId) -> i64 {
        self.deposited[pid]
    }

    /// Status of a player.
    #[must_use]
    pub fn status(&self, pid: PlayerId) -> PlayerStatus {
        self.status[pid]
    }

    /// True unless the player died.
    #[must_use]
    pub fn is_alive(&self, pid: PlayerId) -> bool {
        self.status[pid] == PlayerStatus::Alive
    }

    /// Resource field.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Ships, living and destroyed.
    #[must_use]
    pub fn ships(&self) -> &ShipArena {
        &self.ships
    }

    /// All structures, factories first.
    #[must_use]
    pub fn structures(&self) -> &[Structure] {
        &self.structures
    }

    /// Home factory of a player.
    #[must_use]
    pub fn factory(&self, pid: PlayerId) -> &Structure {
        &self.structures[pid]
    }

    /// Structure standing on `pos`, if any.
    #[must_use]
    pub fn structure_at(&self, pos: Position) -> Option<&Structure> {
        self.structures.iter().find(|s| s.position == pos)
    }

    /// Mark a player dead at `turn`. A player that is already dead keeps its death turn.
    ///
    /// Returns true if the player was alive.
    pub(crate) fn kill(&mut self, pid: PlayerId, turn: usize) -> bool {
        if self.is_alive(pid) {
            self.status[pid] = PlayerStatus::Dead { turn };
            true
        } else {
            false
        }
    }

    /// Recompute every ship's inspiration from the current positions.
    ///
    /// A ship is inspired when at least `threshold` enemy ships stand within a Manhattan distance
    /// of `radius` on the torus.
    pub(crate) fn update_inspiration(&mut self, enabled: bool, radius: u32, threshold: u32) {
        if !enabled {
            self.ships.iter_mut().for_each(|s| s.inspired = false);
            return;
        }

        let (width, height) = (self.width(), self.height());
        let owners: HashMap<Position, PlayerId> = self
            .ships
            .iter()
            .map(|s| (s.position, s.owner))
            .collect();

        let radius = i64::from(radius);
        let mut inspired = Vec::new();
        for ship in self.ships.iter() {
            let mut hits = 0;
            for dy in 0..=radius {
                for dx in (dy - radius)..=(radius - dy) {
                    let offsets: &[i64] = if dy == 0 { &[0] } else { &[1, -1] };
                    for sign in offsets {
                        let cell = ship.position.offset(dx, sign * dy, width, height);
                        if owners.get(&cell).is_some_and(|&o| o != ship.owner) {
                            hits += 1;
                        }
                    }
                }
            }
            inspired.push((ship.id, hits >= threshold));
        }

        for (id, flag) in inspired {
            if let Some(ship) = self.ships.get_mut(id) {
                ship.inspired = flag;
            }
        }
    }
}
