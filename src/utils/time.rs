use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TIMESTAMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Returns current timestamp in milliseconds (Unix epoch).
///
/// Strictly increasing within the process, so records created back to back
/// still sort in creation order.
pub fn current_timestamp_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP_MILLIS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(seen) => last = seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let stamps: Vec<i64> = (0..1000).map(|_| current_timestamp_millis()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(stamps[0] >= Utc::now().timestamp_millis() - 60_000);
    }
}
