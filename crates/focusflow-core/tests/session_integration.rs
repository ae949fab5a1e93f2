//! Integration tests for the session coordinator driven by a manual clock.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use focusflow_core::{
    Event, GameEntry, ManualClock, MemorySnapshots, Phase, PhaseSettings, RewardEconomy,
    RewardRules, SessionCoordinator, SessionSettings, SnapshotPhase, TimerStatus,
};

fn minute_cycle() -> SessionSettings {
    SessionSettings {
        phases: PhaseSettings::from_minutes(1, 1, 2, 2),
        ..SessionSettings::default()
    }
}

fn coordinator(clock: &ManualClock, balance: u64) -> SessionCoordinator {
    SessionCoordinator::new(
        minute_cycle(),
        Arc::new(clock.clone()),
        RewardEconomy::new(RewardRules::Flat, balance),
    )
    .unwrap()
}

fn gains(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::EnergyGained { .. }))
        .count()
}

#[test]
fn test_full_cycle_reaches_long_break() {
    let clock = ManualClock::default();
    let mut session = coordinator(&clock, 0);

    // First focus phase completes naturally.
    session.start_focus().unwrap();
    clock.advance_secs(60);
    let events = session.tick();
    assert_eq!(gains(&events), 1);
    assert_eq!(session.scheduler().completed_focus_count(), 1);
    assert_eq!(session.scheduler().phase(), Phase::ShortBreak);
    assert_eq!(session.economy().balance(), 1);

    // Later ticks see nothing new.
    clock.advance_secs(30);
    assert!(session.tick().is_empty());

    // Break completes, back to focus, no energy for breaks.
    session.start_focus().unwrap();
    clock.advance_secs(60);
    let events = session.tick();
    assert_eq!(gains(&events), 0);
    assert_eq!(session.scheduler().phase(), Phase::Focus);

    // Second focus lands on the long break.
    session.start_focus().unwrap();
    clock.advance_secs(60);
    session.tick();
    assert_eq!(session.scheduler().completed_focus_count(), 2);
    assert_eq!(session.scheduler().phase(), Phase::LongBreak);
    assert_eq!(session.focus_remaining().as_secs(), 120);
    assert_eq!(session.economy().balance(), 2);
}

#[test]
fn test_fifty_nine_second_run_earns_nothing() {
    let clock = ManualClock::default();
    let mut session = coordinator(&clock, 0);

    session.start_run().unwrap();
    clock.advance_secs(59);
    let events = session.stop_run();

    assert_eq!(gains(&events), 0);
    assert_eq!(session.economy().balance(), 0);
    assert_eq!(session.run_timer().status(), TimerStatus::Idle);
}

#[test]
fn test_two_immediate_spends_with_single_point() {
    let clock = ManualClock::default();
    let mut session = coordinator(&clock, 1);
    let first = session.spend_energy(1);
    let second = session.spend_energy(1);
    assert!(first ^ second);
    assert_eq!(session.economy().balance(), 0);
}

#[test]
fn test_game_entry_locked_after_balance_spent() {
    let clock = ManualClock::default();
    let mut session = coordinator(&clock, 1);
    assert!(matches!(session.enter_game(), GameEntry::Granted { .. }));
    session.finish_game(100, 30);
    assert_eq!(
        session.enter_game(),
        GameEntry::Locked {
            cost: 1,
            balance: 0
        }
    );
}

#[test]
fn test_snapshots_agree_with_state_after_every_call() {
    let clock = ManualClock::default();
    let snapshots = MemorySnapshots::new();
    let mut session = coordinator(&clock, 0).with_snapshots(Box::new(snapshots.clone()));

    let check = |session: &SessionCoordinator| {
        let snap = snapshots.session().expect("snapshot written");
        let scheduler = session.scheduler();
        assert_eq!(snap.is_running, scheduler.is_running());
        assert_eq!(snap.end_instant, scheduler.end_instant().filter(|_| scheduler.is_running()));
        assert_eq!(snap.completed_focus_count, scheduler.completed_focus_count());
        assert_eq!(snap.phase, SnapshotPhase::from(scheduler.phase()));

        let running = snapshots.running().expect("running snapshot written");
        let now = session.now();
        assert_eq!(
            running.elapsed_at(now).round() as u64,
            session.run_elapsed().as_secs()
        );
    };

    session.start_focus();
    check(&session);
    clock.advance_secs(20);
    session.start_run();
    check(&session);
    clock.advance_secs(15);
    session.pause_focus();
    check(&session);
    session.pause_run();
    check(&session);
    session.resume_focus();
    session.resume_run();
    check(&session);
    clock.advance_secs(60);
    session.tick();
    check(&session);
    session.skip_phase();
    check(&session);
    session.reset_run();
    check(&session);
}

#[test]
fn test_subscriber_sees_one_event_per_change() {
    let clock = ManualClock::default();
    let snapshots = MemorySnapshots::new();
    let mut session = coordinator(&clock, 0).with_snapshots(Box::new(snapshots.clone()));
    let count = Rc::new(RefCell::new(0usize));
    let seen = Rc::clone(&count);
    session.subscribe(move |_| *seen.borrow_mut() += 1);

    session.start_focus();
    session.pause_focus();
    session.pause_focus(); // ignored
    session.resume_focus();
    assert_eq!(*count.borrow(), 3);
    assert_eq!(snapshots.writes(), 3);
}

#[test]
fn test_commands_after_unobserved_crossing_keep_the_credit() {
    let clock = ManualClock::default();
    let mut session = coordinator(&clock, 0);

    // Nobody ticks while the first focus runs out.
    session.start_focus();
    clock.advance_secs(90);
    let events = session.skip_phase();
    assert_eq!(gains(&events), 1);
    assert_eq!(session.scheduler().phase(), Phase::ShortBreak);

    // Take the break, then pause a focus phase well after its end.
    session.start_focus();
    clock.advance_secs(60);
    session.tick();
    session.start_focus();
    clock.advance_secs(300);
    let events = session.pause_focus();
    assert_eq!(gains(&events), 1);
    assert_eq!(session.scheduler().completed_focus_count(), 2);
    assert_eq!(session.scheduler().phase(), Phase::LongBreak);
    assert_eq!(session.scheduler().status(), TimerStatus::Idle);
    assert_eq!(session.economy().balance(), 2);
}
