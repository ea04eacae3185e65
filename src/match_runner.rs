//! Running a complete match against external bots.
//!
//! [`MatchRunner::run`] drives the whole lifecycle:
//!
//! 1. start one [`BotProcess`] per player and collect the names against the name deadline
//! 2. for turns `0..=max_turns`, apply the previous answers, send the resulting turn input to
//!    living bots (except on the last turn) and collect their answers against the turn deadline
//! 3. apply one last, empty set of commands and score the terminal frame
//!
//! Every fault of a bot (launch failure, closed output, timeout, illegal command) kills its
//! player. Once started, a match always runs to the end.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::{ensure, Context};
use tracing::{debug, info, instrument, trace, warn};

use crate::bot_process::{BotCommand, BotFault, BotMessage, BotProcess, Reply};
use crate::configuration::Configuration;
use crate::constants::Constants;
use crate::game::{Game, PlayerId};
use crate::logger::init_logger;
use crate::map::InitialMap;
use crate::replay::{MatchStats, MatchSummary, Replay, TurnRecord};

/// Name of a bot that could not be launched.
pub const NON_STARTER_EXEC: &str = "Non-starter (exec)";
/// Name of a bot that closed its output before sending a name.
pub const NON_STARTER_EOF: &str = "Non-starter (EOF)";
/// Name of a bot that sent no name before the deadline.
pub const NON_STARTER_TIME: &str = "Non-starter (time)";
/// Name of a bot that sent an empty line as its name.
pub const BLANK_NAME: &str = "(blank)";

/// Passive consumer of a running match, e.g. a replay writer or a live viewer.
///
/// Callbacks run on the scheduler thread between turns and must return quickly.
pub trait TurnObserver {
    /// Init message of the last player, sent once before the name phase.
    ///
    /// It carries the constants and the full starting grid, so a viewer can rebuild the map.
    fn on_init(&mut self, _init: &str) {}

    /// Names of the players, once the name phase is over.
    fn on_names(&mut self, _names: &[String]) {}

    /// Result of the transition run at loop iteration `turn`.
    fn on_turn(&mut self, _turn: usize, _bot_update: &str, _record: &TurnRecord) {}

    /// Final statistics.
    fn on_finish(&mut self, _stats: &MatchStats) {}
}

impl TurnObserver for () {}

/// Forwards the init message, then the turn input of every transition, over a channel, for a
/// live viewer.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<String>,
}

impl ChannelObserver {
    /// Observer and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<String>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl TurnObserver for ChannelObserver {
    fn on_init(&mut self, init: &str) {
        let _ = self.tx.send(init.to_string());
    }

    fn on_turn(&mut self, _turn: usize, bot_update: &str, _record: &TurnRecord) {
        // A viewer that went away must not stop the match.
        let _ = self.tx.send(bot_update.to_string());
    }
}

/// Everything a finished match produced.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Player names, by player id.
    pub names: Vec<String>,
    /// Complete match record, statistics included.
    pub replay: Replay,
    /// Final statistics.
    pub stats: MatchStats,
    /// Compact result.
    pub summary: MatchSummary,
}

/// A match ready to run.
#[derive(Debug)]
pub struct MatchRunner {
    config: Configuration,
    game: Game,
    bots: Vec<BotCommand>,
}

impl MatchRunner {
    /// Prepare a match on `map` with one bot per factory.
    ///
    /// Installs the file logger if the configuration asks for it; failing to do so is only
    /// reported.
    ///
    /// # Errors
    /// Returned when the bot count does not match the map or the ruleset does not fit the map.
    #[instrument(skip_all)]
    pub fn new(
        config: Configuration,
        constants: Constants,
        map: &InitialMap,
        bots: Vec<BotCommand>,
    ) -> anyhow::Result<Self> {
        if config.log {
            if let Err(e) = init_logger() {
                warn!("file logging disabled: {e:#}");
            }
        }
        trace!(?config);

        ensure!(
            bots.len() == map.players(),
            "the map has {} factories but {} bots were given",
            map.players(),
            bots.len()
        );
        let game = Game::new(constants, map).context("could not set up the game")?;
        Ok(Self { config, game, bots })
    }

    /// Run the match to completion. Never fails once started.
    pub fn run(self, observer: &mut impl TurnObserver) -> MatchOutcome {
        let Self {
            config,
            mut game,
            bots: commands,
        } = self;
        let started = Instant::now();
        let players = game.players();

        let (tx, rx) = mpsc::channel();
        let mut bots: Vec<BotProcess> = commands
            .iter()
            .enumerate()
            .map(|(pid, command)| {
                let init = game.init_message(pid);
                BotProcess::start(pid, command, &init, tx.clone(), config.debug_bot_stderr)
            })
            .collect();
        drop(tx);
        observer.on_init(&game.init_message(players - 1));

        let names = collect_names(&mut game, &mut bots, &rx, config.name_timeout);
        info!(?names, "name phase over");
        observer.on_names(&names);
        let mut replay = Replay::new(&names, &game);

        let turns = game.constants().max_turns;
        let mut answers = vec![String::new(); players];
        for turn in 0..=turns {
            let turn_started = Instant::now();
            let outcome = game.update(&answers);
            observer.on_turn(turn, &outcome.bot_update, &outcome.record);
            replay.push(outcome.record);
            answers = vec![String::new(); players];

            if turn < turns {
                let mut waiting = BTreeSet::new();
                let alive: Vec<PlayerId> =
                    (0..players).filter(|&p| game.is_alive(p)).collect();
                for pid in alive {
                    match bots[pid].send(&outcome.bot_update) {
                        Ok(()) => {
                            waiting.insert(pid);
                        }
                        Err(e) => {
                            warn!(player = pid, turn, "{e:#}");
                            game.kill(pid);
                        }
                    }
                }
                collect_answers(
                    &mut game,
                    &mut bots,
                    &rx,
                    waiting,
                    &mut answers,
                    config.turn_timeout,
                );
            }

            let elapsed = turn_started.elapsed();
            if elapsed < config.min_turn_duration {
                std::thread::sleep(config.min_turn_duration - elapsed);
            }
        }

        let last = game.update(&answers);
        observer.on_turn(turns + 1, &last.bot_update, &last.record);
        replay.push(last.record);

        let stats = MatchStats::compute(&game);
        replay.game_statistics = Some(stats.clone());
        let summary = MatchSummary::new(&replay, &stats, started.elapsed());
        for p in &stats.player_statistics {
            info!(
                player = p.player_id,
                rank = p.rank,
                score = p.final_production,
                "{}",
                names[p.player_id]
            );
        }
        observer.on_finish(&stats);

        MatchOutcome {
            names,
            replay,
            stats,
            summary,
        }
    }
}

/// Wait for one message until `deadline`, or forever without one.
fn receive(rx: &Receiver<BotMessage>, deadline: Option<Instant>) -> Option<BotMessage> {
    match deadline {
        None => rx.recv().ok(),
        Some(deadline) => rx
            .recv_timeout(deadline.saturating_duration_since(Instant::now()))
            .ok(),
    }
}

fn collect_names(
    game: &mut Game,
    bots: &mut [BotProcess],
    rx: &Receiver<BotMessage>,
    timeout: Option<Duration>,
) -> Vec<String> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut names: Vec<Option<String>> = vec![None; bots.len()];
    let mut pending = bots.len();

    while pending > 0 {
        let Some(BotMessage { player, reply }) = receive(rx, deadline) else {
            break;
        };
        if names[player].is_some() {
            continue;
        }
        bots[player].accept();
        pending -= 1;

        let name = match reply {
            Reply::Line(line) if line.is_empty() => BLANK_NAME.to_string(),
            Reply::Line(line) => line,
            Reply::Closed(fault) => {
                warn!(player, "non-starter: {fault}");
                game.kill(player);
                let placeholder = match fault {
                    BotFault::SpawnFailed(_) => NON_STARTER_EXEC,
                    BotFault::EndOfStream | BotFault::LineTooLong => NON_STARTER_EOF,
                };
                placeholder.to_string()
            }
        };
        debug!(player, "name: {name}");
        names[player] = Some(name);
    }

    names
        .into_iter()
        .enumerate()
        .map(|(pid, name)| {
            name.unwrap_or_else(|| {
                warn!(player = pid, "non-starter: no name before the deadline");
                game.kill(pid);
                NON_STARTER_TIME.to_string()
            })
        })
        .collect()
}

fn collect_answers(
    game: &mut Game,
    bots: &mut [BotProcess],
    rx: &Receiver<BotMessage>,
    mut waiting: BTreeSet<PlayerId>,
    answers: &mut [String],
    timeout: Option<Duration>,
) {
    let deadline = timeout.map(|t| Instant::now() + t);
    while !waiting.is_empty() {
        let Some(BotMessage { player, reply }) = receive(rx, deadline) else {
            break;
        };
        if !waiting.remove(&player) {
            trace!(player, "discarding late answer");
            continue;
        }
        bots[player].accept();
        match reply {
            Reply::Line(line) => answers[player] = line,
            Reply::Closed(fault) => {
                warn!(player, turn = game.frame().turn(), "{fault}");
                game.kill(player);
            }
        }
    }

    for player in waiting {
        warn!(player, turn = game.frame().turn(), "timed out");
        game.kill(player);
    }
}
