use gridworld_rs::{EnvironmentRecord, GridEnvironment, GridError, Position, SpecialCell, BLOCKED_MOVE_LIMIT};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn classic_at(col: i32, row: i32) -> GridEnvironment {
    let rec = EnvironmentRecord::new(5, 5)
        .with_player(Position::new(col, row))
        .with_actions(["up", "down", "left", "right"])
        .with_specials(vec![SpecialCell::new(4, 1, "red", -1.0), SpecialCell::new(4, 0, "green", 1.0)])
        .with_walls([(1, 1), (1, 2), (2, 1), (2, 2)])
        .with_walk_reward(-0.04)
        .with_initial_score(1.0);
    GridEnvironment::new(rec, StdRng::seed_from_u64(5)).expect("valid layout")
}

fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

#[test]
fn ten_blocked_moves_schedule_a_restart() {
    let rec = EnvironmentRecord::new(3, 3).with_player(Position::new(0, 0)).with_walk_reward(-1.0);
    let mut env = GridEnvironment::new(rec, StdRng::seed_from_u64(1)).unwrap();

    for i in 1..BLOCKED_MOVE_LIMIT {
        let out = env.try_move(-1, 0).unwrap();
        assert!(!out.pending_restart, "restart scheduled early at move {i}");
    }
    let out = env.try_move(-1, 0).unwrap();
    assert!(out.pending_restart);
    assert_eq!(env.blocked_moves(), 0);
    assert_eq!(env.score(), -10.0);

    // The 11th call restarts first, then processes its own move on the fresh state.
    let out = env.try_move(0, 1).unwrap();
    assert!(out.restarted);
    assert!(!env.has_pending_restart());
    assert_eq!(env.score(), -1.0);
    assert_eq!(env.high_water_score(), 0.0);
    assert!(env.is_free(env.current_position()));
}

#[test]
fn restart_is_deferred_until_the_next_move() {
    let mut env = classic_at(4, 2);
    env.try_move(0, -1).unwrap(); // onto red
    assert!(env.has_pending_restart());
    assert_eq!(env.current_position(), Position::new(4, 1));
    assert!(approx(env.score(), 0.0));

    // Off-grid on purpose so the fresh start cell cannot be scored.
    let out = env.try_move(-10, 0).unwrap();
    assert!(out.restarted);
    assert!(!out.moved);
    assert!(approx(env.score(), 0.96), "restart resets to the initial score before charging");
}

#[test]
fn restart_moves_only_the_current_position() {
    let mut env = classic_at(0, 0);
    env.reposition_agent(Some(Position::new(4, 2))).unwrap();
    assert_eq!(env.original_position(), Position::new(4, 2));
    assert_eq!(env.current_position(), Position::new(4, 2));

    env.try_move(0, -1).unwrap();
    let fresh = env.restart_episode().unwrap();
    assert_eq!(env.current_position(), fresh);
    assert_eq!(env.original_position(), Position::new(4, 2));
    assert!(!env.walls().contains(&fresh));
}

#[test]
fn random_reposition_updates_both_slots() {
    let mut env = classic_at(0, 0);
    for _ in 0..50 {
        let p = env.reposition_agent(None).unwrap();
        assert!(env.is_free(p));
        assert_eq!(env.current_position(), p);
        assert_eq!(env.original_position(), p);
    }
}

#[test]
fn explicit_reposition_is_not_validated() {
    let mut env = classic_at(0, 0);
    let p = env.reposition_agent(Some(Position::new(1, 1))).unwrap();
    assert_eq!(p, Position::new(1, 1));
    assert_eq!(env.current_position(), Position::new(1, 1));
}

#[test]
fn reposition_leaves_score_and_flags_alone() {
    let mut env = classic_at(4, 2);
    env.try_move(0, -1).unwrap();
    let score = env.score();
    env.reposition_agent(Some(Position::new(0, 0))).unwrap();
    assert!(env.has_pending_restart());
    assert_eq!(env.score(), score);
}

#[test]
fn high_water_mark_only_grows() {
    let mut env = classic_at(3, 0);
    env.try_move(1, 0).unwrap(); // green: 1 - 0.04 + 0.04 + 1
    assert!(approx(env.score(), 2.0));
    assert!(approx(env.high_water_score(), 1.0), "updated only at restart");

    env.restart_episode().unwrap();
    assert!(approx(env.high_water_score(), 2.0));
    assert!(approx(env.score(), 1.0));

    env.reposition_agent(Some(Position::new(4, 2))).unwrap();
    env.try_move(0, -1).unwrap(); // red
    env.restart_episode().unwrap();
    assert!(approx(env.high_water_score(), 2.0));

    let mut last = env.high_water_score();
    for step in 0..500 {
        let (dc, dr) = [(0, 1), (1, 0), (0, -1), (-1, 0)][step % 4];
        env.try_move(dc, dr).unwrap();
        assert!(env.high_water_score() >= last);
        last = env.high_water_score();
    }
}

#[test]
fn placement_fails_cleanly_without_free_cells() {
    let walls = [(0, 0), (1, 0)];
    let rec = EnvironmentRecord::new(2, 1).with_walls(walls);
    let err = GridEnvironment::new(rec, StdRng::seed_from_u64(0)).unwrap_err();
    assert_eq!(err, GridError::NoFreeCell { width: 2, height: 1 });
}
