//! End-to-end matches against the shell bots of `tests/bots`.
#![cfg(unix)]

use std::time::{Duration, Instant};

use dubnium::match_runner::{NON_STARTER_EOF, NON_STARTER_EXEC, NON_STARTER_TIME};
use dubnium::prelude::*;
use dubnium::replay::Event;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_ansi(true)
        .with_test_writer()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn bot(script: &str) -> BotCommand {
    BotCommand::new("sh", [format!("tests/bots/{script}")])
}

fn map(players: usize) -> InitialMap {
    let factories = [
        Position::new(1, 1),
        Position::new(5, 5),
        Position::new(1, 5),
        Position::new(5, 1),
    ];
    InitialMap::new(8, 8, vec![10; 64], factories[..players].to_vec(), 9).unwrap()
}

fn config() -> Configuration {
    Configuration::new()
        .with_name_timeout(Duration::from_secs(5))
        .with_turn_timeout(Duration::from_secs(2))
        .with_debug_bot_stderr(true)
}

#[test]
fn well_behaved_bots_play_to_the_end() {
    init_test_logger();
    let turns = 4;
    let runner = MatchRunner::new(
        config(),
        Constants::new(2, 8, 8, turns, 9),
        &map(2),
        vec![bot("still_bot.sh"), bot("still_bot.sh")],
    )
    .unwrap();
    let (mut viewer, feed) = ChannelObserver::new();
    let outcome = runner.run(&mut viewer);

    assert_eq!(outcome.names, vec!["still-bot", "still-bot"]);
    assert_eq!(outcome.replay.full_frames.len(), turns + 2);
    assert_eq!(feed.try_iter().count(), turns + 3);

    let spawns = outcome
        .replay
        .full_frames
        .iter()
        .flat_map(|f| &f.events)
        .filter(|e| matches!(e, Event::Spawn { .. }))
        .count();
    assert_eq!(spawns, 2);

    for p in &outcome.stats.player_statistics {
        assert_eq!(p.rank, 1);
        assert_eq!(p.last_turn_alive, turns + 1);
        assert_eq!(p.final_production, 4000);
    }
    assert_eq!(outcome.summary.stats.len(), 2);
}

#[test]
fn silent_bot_dies_at_the_turn_it_missed() {
    init_test_logger();
    let runner = MatchRunner::new(
        config().with_turn_timeout(Duration::from_millis(300)),
        Constants::new(2, 8, 8, 5, 9),
        &map(2),
        vec![bot("still_bot.sh"), bot("sleeper.sh")],
    )
    .unwrap();
    let outcome = runner.run(&mut ());

    assert_eq!(outcome.names, vec!["still-bot", "sleeper"]);
    let still = &outcome.stats.player_statistics[0];
    let sleeper = &outcome.stats.player_statistics[1];
    assert_eq!((still.rank, still.last_turn_alive), (1, 6));
    assert_eq!(sleeper.last_turn_alive, 1);
    assert_eq!(sleeper.final_production, 0);
    assert_eq!(sleeper.rank, 2);
}

#[test]
fn illegal_command_kills_only_its_sender() {
    init_test_logger();
    let runner = MatchRunner::new(
        config(),
        Constants::new(2, 8, 8, 5, 9),
        &map(2),
        vec![bot("garbage.sh"), bot("still_bot.sh")],
    )
    .unwrap();
    let outcome = runner.run(&mut ());

    let garbage = &outcome.stats.player_statistics[0];
    let still = &outcome.stats.player_statistics[1];
    assert_eq!(garbage.last_turn_alive, 1);
    assert_eq!(garbage.final_production, 0);
    assert_eq!(still.last_turn_alive, 6);
    assert_eq!(still.final_production, 4000);
}

#[test]
fn non_starters_get_placeholder_names() {
    init_test_logger();
    let runner = MatchRunner::new(
        config().with_name_timeout(Duration::from_millis(500)),
        Constants::new(4, 8, 8, 3, 9),
        &map(4),
        vec![
            bot("still_bot.sh"),
            BotCommand::new("true", Vec::<String>::new()),
            BotCommand::new("/nonexistent/dubnium-bot", Vec::<String>::new()),
            BotCommand::new("sleep", ["30"]),
        ],
    )
    .unwrap();
    let outcome = runner.run(&mut ());

    assert_eq!(
        outcome.names,
        vec!["still-bot", NON_STARTER_EOF, NON_STARTER_EXEC, NON_STARTER_TIME]
    );
    let stats = &outcome.stats.player_statistics;
    assert_eq!(stats[0].last_turn_alive, 4);
    for p in &stats[1..] {
        assert_eq!(p.last_turn_alive, 0);
        assert_eq!(p.final_production, 0);
        assert_eq!(p.rank, 2);
    }
}

#[test]
fn pacing_adds_idle_time_after_each_turn() {
    init_test_logger();
    let turns = 3;
    let runner = MatchRunner::new(
        config().with_min_turn_duration(Duration::from_millis(60)),
        Constants::new(1, 8, 8, turns, 9),
        &map(1),
        vec![bot("still_bot.sh")],
    )
    .unwrap();
    let started = Instant::now();
    let outcome = runner.run(&mut ());

    assert!(started.elapsed() >= Duration::from_millis(60 * (turns as u64 + 1)));
    assert_eq!(outcome.stats.player_statistics[0].last_turn_alive, turns + 1);
}
