use chrono::{Local, TimeZone};
use proptest::prelude::*;

use kline_watch::model::tick::Tick;
use kline_watch::stream::PriceStream;

#[test]
fn push_tick_formats_summary_line() {
    let ts = Local.with_ymd_and_hms(2024, 5, 6, 10, 15, 30).unwrap();
    let mut stream = PriceStream::new(20);
    stream.push_tick(&Tick::from_baseline(ts, 10.0, 10.1, 20_000));
    assert_eq!(stream.iter().next(), Some("10:15:30 10.10 +1.00%"));
}

#[test]
fn clear_empties_but_keeps_capacity() {
    let mut stream = PriceStream::new(50);
    stream.push("a".to_string());
    stream.clear();
    assert!(stream.is_empty());
    assert_eq!(stream.capacity(), 50);
}

proptest! {
    #[test]
    fn overflow_keeps_newest_first(wide in any::<bool>(), extra in 0usize..40) {
        let capacity = if wide { 50 } else { 20 };
        let mut stream = PriceStream::new(capacity);
        let total = capacity + extra;
        for i in 0..total {
            stream.push(format!("line {}", i));
        }

        prop_assert_eq!(stream.len(), capacity);
        let lines: Vec<&str> = stream.iter().collect();
        let head = format!("line {}", total - 1);
        let tail = format!("line {}", extra);
        prop_assert_eq!(lines[0], head.as_str());
        prop_assert_eq!(lines[capacity - 1], tail.as_str());
    }
}
