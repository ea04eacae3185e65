//! The state-transition function.
//!
//! [`Game::update`] takes one untrusted command line per player and applies all of them
//! simultaneously:
//!
//! 1. parse and validate every line (a bad line fails that player only)
//! 2. charge ships and dropoffs; a negative budget fails the player too
//! 3. failed players lose their ships and budget and die
//! 4. build dropoffs
//! 5. move ships that can pay for it
//! 6. destroy ships sharing a cell, or standing on a factory that spawns
//! 7. deliver resource lying on, or carried onto, structures
//! 8. spawn ships
//! 9. mine with ships that did not move
//! 10. recompute inspiration for the next turn

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, ensure};
use tracing::{debug, trace, warn};

use crate::constants::Constants;
use crate::game::command::{parse_orders, CommandError, Order, PlayerOrders};
use crate::game::encoding;
use crate::game::{Direction, Frame, PlayerId, Position, ShipId, Structure};
use crate::map::InitialMap;
use crate::replay::{CellUpdate, Event, MoveRecord, TurnRecord};

/// What one transition produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Turn input for the bots, describing the new frame.
    pub bot_update: String,
    /// Diagnostic record of the transition.
    pub record: TurnRecord,
    /// Players that failed during this transition, with the reason.
    pub failures: BTreeMap<PlayerId, CommandError>,
}

/// Ruleset plus the current frame.
#[derive(Debug, Clone)]
pub struct Game {
    constants: Constants,
    frame: Frame,
}

impl Game {
    /// Start a game on `map`.
    ///
    /// # Errors
    /// Returned when the map size disagrees with the constants or a ratio of the ruleset is 0.
    pub fn new(constants: Constants, map: &InitialMap) -> anyhow::Result<Self> {
        if map.width != constants.default_map_width || map.height != constants.default_map_height
        {
            bail!(
                "map is {}x{} but the constants describe {}x{}",
                map.width,
                map.height,
                constants.default_map_width,
                constants.default_map_height
            );
        }
        ensure!(
            map.cells.len() == map.width * map.height,
            "map cells do not match its size"
        );
        let frame = map.to_frame(constants.initial_energy);
        Self::from_frame(constants, frame)
    }

    /// Resume from an arbitrary frame.
    ///
    /// # Errors
    /// Returned when a ratio of the ruleset is 0.
    pub fn from_frame(constants: Constants, frame: Frame) -> anyhow::Result<Self> {
        let ratios = [
            ("EXTRACT_RATIO", constants.extract_ratio),
            ("INSPIRED_EXTRACT_RATIO", constants.inspired_extract_ratio),
            ("MOVE_COST_RATIO", constants.move_cost_ratio),
            ("INSPIRED_MOVE_COST_RATIO", constants.inspired_move_cost_ratio),
        ];
        for (name, value) in ratios {
            if value == 0 {
                bail!("{name} must be positive");
            }
        }
        Ok(Self { constants, frame })
    }

    /// Ruleset.
    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    /// Current frame.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Number of players.
    pub fn players(&self) -> usize {
        self.frame.players()
    }

    /// True unless the player died.
    pub fn is_alive(&self, pid: PlayerId) -> bool {
        self.frame.is_alive(pid)
    }

    /// Init message for player `pid`.
    pub fn init_message(&self, pid: PlayerId) -> String {
        encoding::init_message(&self.constants, &self.frame, pid)
    }

    /// 1 + number of players whose budget is strictly greater.
    pub fn rank(&self, pid: PlayerId) -> usize {
        let budget = self.frame.budget(pid);
        1 + (0..self.players())
            .filter(|&other| self.frame.budget(other) > budget)
            .count()
    }

    /// Kill a player at the current turn: its ships are removed and its budget zeroed.
    ///
    /// Killing a dead player does nothing. Returns true if the player was alive.
    pub fn kill(&mut self, pid: PlayerId) -> bool {
        let turn = self.frame.turn;
        eliminate(&mut self.frame, pid, turn)
    }

    /// Apply one command line per player and advance to the next frame.
    ///
    /// Missing lines count as empty. Lines of dead players are ignored.
    pub fn update<S: AsRef<str>>(&mut self, commands: &[S]) -> TurnOutcome {
        let c = &self.constants;
        let old = &self.frame;
        let players = old.players();

        let mut new = old.clone();
        new.turn += 1;
        let mut record = TurnRecord::starting_from(old);

        // Parse.
        let mut orders = vec![PlayerOrders::default(); players];
        let mut failures = BTreeMap::new();
        for pid in (0..players).filter(|&p| old.is_alive(p)) {
            let text = commands.get(pid).map_or("", |s| s.as_ref());
            match parse_orders(pid, text, old) {
                Ok(o) => orders[pid] = o,
                Err(e) => {
                    failures.insert(pid, e);
                }
            }
        }

        // Tentative economics.
        for (pid, o) in orders.iter().enumerate() {
            if o.generate {
                new.budgets[pid] -= i64::from(c.new_entity_energy_cost);
            }
            for id in o.constructs() {
                if let Some(ship) = old.ships.get(id) {
                    new.budgets[pid] -= i64::from(c.dropoff_cost);
                    new.budgets[pid] += i64::from(ship.cargo) + i64::from(old.grid.get(ship.position));
                }
            }
        }
        for pid in (0..players).filter(|&p| old.is_alive(p)) {
            if new.budgets[pid] < 0 {
                failures.insert(pid, CommandError::Overspent(new.budgets[pid]));
            }
        }

        // Failed players contribute nothing from here on.
        for (&pid, reason) in &failures {
            warn!(player = pid, turn = old.turn, "player failed: {reason}");
            orders[pid] = PlayerOrders::default();
            eliminate(&mut new, pid, old.turn);
        }

        // Constructs.
        let mut constructs: Vec<ShipId> = orders.iter().flat_map(PlayerOrders::constructs).collect();
        constructs.sort_unstable();
        for id in constructs {
            let Some(ship) = new.ships.remove(id) else {
                continue;
            };
            let absorbed = u64::from(ship.cargo) + u64::from(new.grid.clear(ship.position));
            new.deposited[ship.owner] += absorbed as i64;
            new.structures.push(Structure {
                id: Some(id),
                owner: ship.owner,
                position: ship.position,
                gathered: absorbed,
            });
            trace!(player = ship.owner, ship = id, "dropoff built at {}", ship.position);
            record.events.push(Event::Construct {
                id,
                location: ship.position,
                owner_id: ship.owner,
            });
        }

        // Movement.
        let (width, height) = (new.width(), new.height());
        let mut occupants: BTreeMap<Position, Vec<(ShipId, PlayerId)>> = BTreeMap::new();
        for ship in new.ships.iter_mut() {
            let ratio = if ship.inspired {
                c.inspired_move_cost_ratio
            } else {
                c.move_cost_ratio
            };
            let cost = new.grid.get(ship.position) / ratio;
            if let Some(Order::Move(direction)) = orders[ship.owner].ships.get(&ship.id) {
                if *direction != Direction::Still && ship.cargo >= cost {
                    ship.cargo -= cost;
                    ship.position = ship.position.step(*direction, width, height);
                }
            }
            occupants
                .entry(ship.position)
                .or_default()
                .push((ship.id, ship.owner));
        }

        // Collisions.
        let spawn_points: HashSet<Position> = (0..players)
            .filter(|&pid| orders[pid].generate)
            .map(|pid| new.structures[pid].position)
            .collect();
        let mut collisions = HashSet::new();
        for (&pos, here) in &occupants {
            if here.len() == 1 && !spawn_points.contains(&pos) {
                continue;
            }
            collisions.insert(pos);
            let mut wrecked = Vec::with_capacity(here.len());
            for &(id, _) in here {
                if let Some(ship) = new.ships.remove(id) {
                    new.grid.add(pos, ship.cargo);
                    wrecked.push(id);
                }
            }
            debug!(turn = new.turn, ships = ?wrecked, "shipwreck at {pos}");
            record.events.push(Event::Shipwreck {
                location: pos,
                ships: wrecked,
            });
        }

        // Deliveries.
        for structure in &mut new.structures {
            let pos = structure.position;
            let owner = structure.owner;

            let ground = new.grid.clear(pos);
            if ground > 0 {
                structure.gathered += u64::from(ground);
                new.budgets[owner] += i64::from(ground);
                new.deposited[owner] += i64::from(ground);
            }

            if collisions.contains(&pos) {
                continue;
            }
            if let Some([(id, ship_owner)]) = occupants.get(&pos).map(Vec::as_slice) {
                if *ship_owner != owner {
                    continue;
                }
                if let Some(ship) = new.ships.get_mut(*id) {
                    let cargo = std::mem::take(&mut ship.cargo);
                    structure.gathered += u64::from(cargo);
                    new.budgets[owner] += i64::from(cargo);
                    new.deposited[owner] += i64::from(cargo);
                }
            }
        }

        // Spawning. A lone enemy on the factory cancels the spawn; two or more ships destroy
        // each other and the spawn goes ahead.
        for pid in (0..players).filter(|&p| orders[p].generate) {
            let pos = new.structures[pid].position;
            if let Some([(_, blocker)]) = occupants.get(&pos).map(Vec::as_slice) {
                if *blocker != pid {
                    debug!(player = pid, turn = new.turn, "spawn blocked by player {blocker}");
                    continue;
                }
            }
            let id = new.ships.spawn(pid, pos);
            record.events.push(Event::Spawn {
                id,
                location: pos,
                owner_id: pid,
                energy: 0,
            });
        }

        // Mining, by ships whose cell did not change.
        let multiplier = c.bonus_multiplier();
        for ship in new.ships.iter_mut() {
            let stayed = old
                .ships
                .get(ship.id)
                .is_some_and(|before| before.position == ship.position);
            if !stayed {
                continue;
            }
            let ratio = if ship.inspired {
                c.inspired_extract_ratio
            } else {
                c.extract_ratio
            };
            let mut amount = new.grid.get(ship.position).div_ceil(ratio);
            if amount + ship.cargo >= c.max_energy {
                amount = c.max_energy.saturating_sub(ship.cargo);
            }
            let mined = new.grid.take(ship.position, amount);
            ship.cargo += mined;

            if ship.inspired {
                let mut bonus = mined * multiplier;
                if bonus + ship.cargo >= c.max_energy {
                    bonus = c.max_energy.saturating_sub(ship.cargo);
                }
                ship.cargo += bonus;
            }
        }

        // Must come after mining, which uses last turn's flags.
        new.update_inspiration(
            c.inspiration_enabled,
            c.inspiration_radius,
            c.inspiration_ship_count,
        );

        // Record.
        for pid in (0..players).filter(|&p| old.is_alive(p) && !failures.contains_key(&p)) {
            let log = record.moves.entry(pid).or_default();
            if orders[pid].generate {
                log.push(MoveRecord::Generate);
            }
            for ship in old.ships.iter().filter(|s| s.owner == pid) {
                log.push(match orders[pid].ships.get(&ship.id) {
                    Some(Order::Construct) => MoveRecord::Construct { id: ship.id },
                    Some(Order::Move(direction)) => MoveRecord::Move {
                        id: ship.id,
                        direction: *direction,
                    },
                    None => MoveRecord::Move {
                        id: ship.id,
                        direction: Direction::Still,
                    },
                });
            }
        }
        record.cells = new
            .grid
            .changes_since(&old.grid)
            .into_iter()
            .map(|(pos, production)| CellUpdate {
                production,
                x: pos.x,
                y: pos.y,
            })
            .collect();
        record.energy = new.budgets.iter().copied().enumerate().collect();
        record.deposited = new.deposited.iter().copied().enumerate().collect();

        let bot_update = encoding::turn_update(old, &new);
        self.frame = new;

        TurnOutcome {
            bot_update,
            record,
            failures,
        }
    }
}

/// Mark `pid` dead at `turn`, remove its ships and zero its budget. Dead players are untouched.
fn eliminate(frame: &mut Frame, pid: PlayerId, turn: usize) -> bool {
    if !frame.kill(pid, turn) {
        return false;
    }
    frame.budgets[pid] = 0;
    for id in frame.ships.ids_of(pid) {
        frame.ships.remove(id);
    }
    true
}
