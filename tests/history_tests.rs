use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use kline_watch::error::FetchError;
use kline_watch::history::{CandleHistory, HistoryBook, HistoryState};
use kline_watch::model::bar::Bar;

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
}

fn bar(offset: u64, close: f64) -> Bar {
    let open = 10.0;
    Bar::new(
        day(offset),
        open,
        open.max(close) + 0.2,
        open.min(close) - 0.2,
        close,
        50_000,
    )
}

fn rows(n: u64) -> Vec<Bar> {
    (0..n).map(|i| bar(i, 10.0 + i as f64 * 0.01)).collect()
}

#[test]
fn window_keeps_most_recent_bars() {
    let h = CandleHistory::from_fetched(&rows(60), 30);
    assert_eq!(h.len(), 30);
    assert_eq!(h.bars().first().unwrap().date, day(30));
    assert_eq!(h.last().unwrap().date, day(59));
    assert_eq!(h.date_range(), Some((day(30), day(59))));
    assert_eq!(h.stats().len(), 30);
}

#[test]
fn short_history_is_kept_whole() {
    let h = CandleHistory::from_fetched(&rows(12), 50);
    assert_eq!(h.len(), 12);
    assert_eq!(h.window(), 50);
}

#[test]
fn malformed_rows_are_dropped() {
    let mut input = rows(5);
    input[2].high = input[2].close - 1.0;
    input[3].open = f64::NAN;
    let h = CandleHistory::from_fetched(&input, 30);
    assert_eq!(h.len(), 3);
    assert!(h.bars().iter().all(|b| b.validate().is_ok()));
}

#[test]
fn stats_follow_retained_bars() {
    let h = CandleHistory::from_fetched(&[bar(0, 10.5)], 30);
    let stats = h.stats()[0];
    assert!((stats.change_pct - 5.0).abs() < 1e-9);
    // (10.7 - 9.8) / 10.0
    assert!((stats.amplitude_pct - 9.0).abs() < 1e-9);
}

#[test]
fn first_load_moves_through_loading_to_loaded() {
    let mut book = HistoryBook::new(30);
    assert_eq!(book.state(), &HistoryState::Empty);
    assert!(book.begin_fetch());
    assert_eq!(book.state(), &HistoryState::Loading);
    assert!(book.current().is_none());

    let published = book.complete(Ok(rows(40))).map(|h| h.len());
    assert_eq!(published, Some(30));
    assert!(matches!(book.state(), HistoryState::Loaded(_)));
}

#[test]
fn refresh_keeps_snapshot_visible() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    book.complete(Ok(rows(40)));

    assert!(book.begin_fetch());
    assert!(matches!(book.state(), HistoryState::Refreshing(_)));
    assert_eq!(book.current().map(|h| h.len()), Some(30));
    assert!(book.is_fetching());
}

#[test]
fn failed_refresh_retains_last_good_snapshot() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    book.complete(Ok(rows(40)));
    let before = book.current().cloned();

    book.begin_fetch();
    let err = FetchError::Network("timeout".to_string());
    assert!(book.complete(Err(err.clone())).is_none());

    match book.state() {
        HistoryState::Failed { last_good, error } => {
            assert_eq!(last_good, &before);
            assert_eq!(error, &err);
        }
        other => panic!("expected Failed, got {}", other.label()),
    }
    assert_eq!(book.current().cloned(), before);
}

#[test]
fn refresh_without_valid_rows_keeps_last_good_snapshot() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    book.complete(Ok(vec![bar(0, 10.5)]));
    let before = book.current().cloned();

    let mut broken = bar(1, 11.0);
    broken.high = broken.close - 0.5;
    book.begin_fetch();
    assert!(book.complete(Ok(vec![broken])).is_none());

    match book.state() {
        HistoryState::Failed { last_good, error } => {
            assert_eq!(last_good, &before);
            assert!(matches!(error, FetchError::Parse(_)));
        }
        other => panic!("expected Failed, got {}", other.label()),
    }
    assert_eq!(book.current().map(|h| h.len()), Some(1));

    // The window is still derived from the last good rows.
    book.set_window(50);
    assert_eq!(book.current().unwrap().last().unwrap().date, day(0));
}

#[test]
fn empty_first_load_fails() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    assert!(book.complete(Ok(Vec::new())).is_none());
    assert_eq!(book.state().label(), "failed");
    assert!(book.current().is_none());
}

#[test]
fn failed_first_load_has_nothing_to_show() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    book.complete(Err(FetchError::NotFound("sh999999".to_string())));
    assert!(book.current().is_none());
    assert_eq!(book.state().label(), "failed");

    // Retrying from a failed first load goes back to Loading.
    assert!(book.begin_fetch());
    assert_eq!(book.state(), &HistoryState::Loading);
}

#[test]
fn retry_after_failure_refreshes_last_good() {
    let mut book = HistoryBook::new(30);
    book.begin_fetch();
    book.complete(Ok(rows(40)));
    book.begin_fetch();
    book.complete(Err(FetchError::Parse("bad json".to_string())));

    assert!(book.begin_fetch());
    assert!(matches!(book.state(), HistoryState::Refreshing(_)));
    book.complete(Ok(rows(35)));
    assert_eq!(book.current().unwrap().last().unwrap().date, day(34));
}

#[test]
fn reset_returns_to_empty() {
    let mut book = HistoryBook::new(50);
    book.begin_fetch();
    book.complete(Ok(rows(10)));
    book.reset();
    assert_eq!(book.state(), &HistoryState::Empty);
    book.set_window(30);
    assert!(book.current().is_none());
}

proptest! {
    #[test]
    fn window_is_bounded_sorted_and_unique(
        offsets in prop::collection::vec(0u64..200, 0..150),
        wide in any::<bool>(),
    ) {
        let window = if wide { 50 } else { 30 };
        let input: Vec<Bar> = offsets.iter().map(|&o| bar(o, 10.1)).collect();
        let h = CandleHistory::from_fetched(&input, window);

        let mut distinct = offsets.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(h.len(), distinct.len().min(window));
        prop_assert!(h.bars().windows(2).all(|w| w[0].date < w[1].date));
        if let Some(&newest) = distinct.last() {
            prop_assert_eq!(h.last().unwrap().date, day(newest));
        }
    }
}
