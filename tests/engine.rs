use dubnium::game::{CommandError, PlayerStatus};
use dubnium::prelude::*;
use dubnium::replay::Event;

fn game(width: usize, height: usize, cell: u32, factories: &[Position]) -> Game {
    let map = InitialMap::new(
        width,
        height,
        vec![cell; width * height],
        factories.to_vec(),
        7,
    )
    .unwrap();
    Game::new(Constants::new(factories.len(), width, height, 50, 7), &map).unwrap()
}

/// Every turn, player 0 generates and moves all its ships one cell east.
fn build_fleet(game: &mut Game, ships: usize, others: &[&str]) {
    for _ in 0..ships {
        let mut line = String::from("g");
        for id in game.frame().ships().ids_of(0) {
            line.push_str(&format!(" m {id} e"));
        }
        let mut commands = vec![line];
        commands.extend(others.iter().map(|s| s.to_string()));
        let out = game.update(&commands);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
    }
}

#[test]
fn generate_on_an_empty_grid() {
    let mut game = game(8, 8, 0, &[Position::new(3, 2)]);
    let first = game.update(&[""]);
    assert_eq!(first.bot_update, "1\n0 0 0 5000\n0");

    let out = game.update(&["g"]);
    assert_eq!(game.frame().budget(0), 4000);
    assert_eq!(out.bot_update, "2\n0 1 0 4000\n0 3 2 0\n0");
    assert_eq!(game.rank(0), 1);
}

#[test]
fn invalid_direction_clears_the_whole_fleet() {
    let mut game = game(16, 16, 0, &[Position::new(2, 2), Position::new(10, 10)]);
    build_fleet(&mut game, 4, &[""]);
    assert_eq!(game.frame().ships().ids_of(0), vec![0, 1, 2, 3]);
    let answered = game.frame().turn();

    let out = game.update(&["m 3 z", ""]);
    assert_eq!(
        out.failures.get(&0),
        Some(&CommandError::UnknownDirection("z".into()))
    );
    assert!(game.frame().ships().ids_of(0).is_empty());
    assert_eq!(game.frame().budget(0), 0);
    assert_eq!(
        game.frame().status(0),
        PlayerStatus::Dead { turn: answered }
    );
    assert!(game.is_alive(1));
}

#[test]
fn killed_player_stays_dead_and_silent() {
    let mut game = game(16, 16, 0, &[Position::new(2, 2), Position::new(10, 10)]);
    build_fleet(&mut game, 2, &["g"]);
    let turn = game.frame().turn();

    assert!(game.kill(1));
    assert!(game.frame().ships().ids_of(1).is_empty());
    assert_eq!(game.frame().budget(1), 0);

    for _ in 0..3 {
        let out = game.update(&["", "g"]);
        assert!(out.failures.is_empty());
        assert!(out.record.moves[&1].is_empty());
        assert_eq!(game.frame().status(1), PlayerStatus::Dead { turn });
    }
    assert!(!game.kill(1));
    assert_eq!(game.frame().status(1), PlayerStatus::Dead { turn });
    assert_eq!((game.rank(0), game.rank(1)), (1, 2));
}

#[test]
fn head_on_collision_sums_cargo_on_the_cell() {
    let mut game = game(8, 8, 100, &[Position::new(1, 1), Position::new(5, 1)]);
    game.update(&["g", "g"]);
    game.update(&["m 0 e", "m 1 w"]);
    game.update(&["", ""]);
    assert_eq!(game.frame().ships().get(0).unwrap().cargo, 25);

    let out = game.update(&["m 0 e", "m 1 w"]);
    assert_eq!(game.frame().ships().count(), 0);
    assert_eq!(
        out.record.events,
        vec![Event::Shipwreck {
            location: Position::new(3, 1),
            ships: vec![0, 1],
        }]
    );
    assert_eq!(game.frame().grid().get(Position::new(3, 1)), 136);
    assert!(out
        .record
        .cells
        .iter()
        .any(|c| (c.x, c.y, c.production) == (3, 1, 136)));
}

#[test]
fn resource_is_conserved_apart_from_costs() {
    let mut constants = Constants::new(2, 12, 12, 50, 1);
    constants.inspiration_enabled = false;
    let cells = (0..144).map(|i| (i * 37 % 500) as u32).collect();
    let map = InitialMap::new(12, 12, cells, vec![Position::new(2, 2), Position::new(8, 8)], 1)
        .unwrap();
    let mut game = Game::new(constants, &map).unwrap();

    let total = |game: &Game| -> i64 {
        let frame = game.frame();
        let cargo: i64 = frame.ships().iter().map(|s| i64::from(s.cargo)).sum();
        let budgets: i64 = (0..frame.players()).map(|p| frame.budget(p)).sum();
        frame.grid().total() as i64 + cargo + budgets
    };

    let script = [
        ["g", "g"],
        ["m 0 n", "m 1 s"],
        ["", "g"],
        ["m 0 e", "m 1 s m 2 w"],
        ["", ""],
        ["c 0", ""],
        ["", "m 1 e m 2 n"],
        ["", "g m 2 n"],
    ];
    for commands in script {
        let before = total(&game);
        let frame = game.frame().clone();
        let mut spent = 0i64;
        for (pid, line) in commands.iter().enumerate() {
            let orders = dubnium::game::parse_orders(pid, line, &frame).unwrap();
            if orders.generate {
                spent += 1000;
            }
            for (id, order) in &orders.ships {
                let ship = frame.ships().get(*id).unwrap();
                let cost = i64::from(frame.grid().get(ship.position) / 10);
                match order {
                    dubnium::game::Order::Construct => spent += 4000,
                    dubnium::game::Order::Move(Direction::Still) => {}
                    dubnium::game::Order::Move(_) if i64::from(ship.cargo) >= cost => spent += cost,
                    dubnium::game::Order::Move(_) => {}
                }
            }
        }
        let out = game.update(&commands);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(total(&game) + spent, before, "after {commands:?}");
    }
}

#[test]
fn identical_inputs_give_identical_records() {
    let play = || {
        let mut game = game(16, 16, 60, &[Position::new(3, 3), Position::new(12, 12)]);
        let script = [
            ["g", "g"],
            ["m 0 e", "m 1 n"],
            ["g", "m 1 o"],
            ["m0s m2w", "m1n"],
            ["", "m 1 z"],
            ["c 0", ""],
        ];
        script
            .iter()
            .map(|commands| serde_json::to_string(&game.update(commands).record).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(play(), play());
}
