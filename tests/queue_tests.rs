use chrono::Local;

use kline_watch::model::tick::Tick;
use kline_watch::queue::tick_queue;

fn tick(price: f64) -> Tick {
    Tick::from_baseline(Local::now(), 10.0, price, 10_000)
}

#[test]
fn drain_returns_ticks_in_enqueue_order() {
    let (tx, mut queue) = tick_queue();
    for p in [10.01, 10.02, 10.03] {
        assert!(tx.enqueue(tick(p)));
    }
    let prices: Vec<f64> = queue.drain_all().iter().map(|t| t.price).collect();
    assert_eq!(prices, vec![10.01, 10.02, 10.03]);
}

#[test]
fn second_drain_without_enqueue_is_empty() {
    let (tx, mut queue) = tick_queue();
    tx.enqueue(tick(10.0));
    assert_eq!(queue.drain_all().len(), 1);
    assert!(queue.drain_all().is_empty());
}

#[test]
fn empty_queue_drains_to_empty_batch() {
    let (_tx, mut queue) = tick_queue();
    assert!(queue.drain_all().is_empty());
}

#[test]
fn cloned_senders_share_one_queue() {
    let (tx, mut queue) = tick_queue();
    let other = tx.clone();
    tx.enqueue(tick(10.1));
    other.enqueue(tick(10.2));
    tx.enqueue(tick(10.3));
    let prices: Vec<f64> = queue.drain_all().iter().map(|t| t.price).collect();
    assert_eq!(prices, vec![10.1, 10.2, 10.3]);
}

#[test]
fn enqueue_reports_dropped_consumer() {
    let (tx, queue) = tick_queue();
    drop(queue);
    assert!(!tx.enqueue(tick(10.0)));
}
