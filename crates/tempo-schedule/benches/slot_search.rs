//! Benchmarks for candidate enumeration and ranking.
//!
//! A two-week window with a busy calendar of three attendees is the
//! common case behind "when can we meet" and auto-reschedule lookups.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempo_core::time::TimeContext;
use tempo_core::types::{Meeting, NewMeeting};
use tempo_schedule::conflict::BusySnapshot;
use tempo_schedule::slots::{enumerate_feasible, rank, BusinessWindow, SlotQuery};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// Every other hour booked on weekdays for two weeks.
fn busy_calendar() -> Vec<Meeting> {
    let base = at("2024-06-10T09:00:00Z");
    let created = at("2024-06-01T00:00:00Z");
    (0..14)
        .flat_map(|day| (0..4).map(move |slot| (day, slot)))
        .map(|(day, slot)| {
            let start = base + chrono::Duration::days(day) + chrono::Duration::hours(slot * 2);
            NewMeeting::new("alice", format!("Busy {}-{}", day, slot), start, 60).into_meeting(created)
        })
        .collect()
}

fn bench_slot_search(c: &mut Criterion) {
    let tz = TimeContext::utc(at("2024-06-09T00:00:00Z"));
    let busy = BusySnapshot::from_meetings(busy_calendar());
    let window = BusinessWindow {
        start_hour: 9,
        end_hour: 17,
        step_minutes: 15,
    };
    let query = SlotQuery::new(
        vec!["alice".into(), "bob".into(), "carol".into()],
        45,
        NaiveDate::from_ymd_opt(2024, 6, 10).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 6, 23).expect("valid date"),
    );

    let mut group = c.benchmark_group("slot_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("enumerate_two_weeks", |b| {
        b.iter(|| enumerate_feasible(black_box(&query), &window, &tz, &busy))
    });

    group.bench_function("enumerate_and_rank", |b| {
        b.iter(|| {
            let mut candidates = enumerate_feasible(black_box(&query), &window, &tz, &busy);
            rank(&mut candidates);
            candidates.truncate(10);
            candidates
        })
    });

    group.finish();
}

criterion_group!(benches, bench_slot_search);
criterion_main!(benches);
