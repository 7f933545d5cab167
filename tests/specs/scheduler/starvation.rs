//! Starvation-freedom: a low-priority task waiting 120 s outranks a freshly
//! arrived medium-priority task.

use hive_core::test_support::TaskBuilder;
use hive_core::{ManualClock, Priority};
use hive_engine::{Scheduler, SchedulerConfig};

const EPOCH: u64 = ManualClock::ORIGIN_EPOCH_MS;

#[test]
fn low_priority_task_overtakes_after_two_minutes() {
    let scheduler = Scheduler::new(SchedulerConfig::default(), ManualClock::new());

    let starved_low = TaskBuilder::new("a:b")
        .id("starved")
        .priority(Priority::Low)
        .created_at_epoch_ms(EPOCH - 120_000)
        .build();
    let fresh_medium = TaskBuilder::new("a:b")
        .id("fresh")
        .priority(Priority::Medium)
        .created_at_epoch_ms(EPOCH)
        .build();

    let low_score = scheduler.score(&starved_low, EPOCH);
    let medium_score = scheduler.score(&fresh_medium, EPOCH);
    assert!(
        low_score > medium_score,
        "after 120s the low task ({low_score}) must outrank fresh medium ({medium_score})"
    );

    let ordered = scheduler.prioritize(vec![fresh_medium, starved_low]);
    assert_eq!(ordered[0].id, "starved");
}

#[test]
fn score_grows_without_bound_while_waiting() {
    // Every low-priority task eventually overtakes any fixed fresh score.
    let clock = ManualClock::new();
    let scheduler = Scheduler::new(SchedulerConfig::default(), clock.clone());
    let task = TaskBuilder::new("a:b")
        .priority(Priority::Low)
        .created_at_epoch_ms(EPOCH)
        .build();

    let mut previous = scheduler.score(&task, EPOCH);
    for minutes in 1..=10 {
        let now = EPOCH + minutes * 60_000;
        let score = scheduler.score(&task, now);
        assert!(score > previous, "score must strictly increase with age");
        previous = score;
    }
}
