//! Per-session token buckets (spec §4.8, §9 Design Notes: "plain structs
//! with monotonic-clock refill; no globals"). Deliberately hand-rolled
//! rather than pulled from `governor` — the spec directs this shape for
//! this specific piece, overriding the general preference for an ecosystem
//! rate-limiting crate.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(refill_rate_per_sec: f64, capacity: f64) -> Self {
        TokenBucket {
            capacity,
            tokens: capacity,
            refill_rate_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Attempts to consume one token; returns whether it was available.
    pub fn try_consume(&mut self) -> bool {
        self.refill(Instant::now());
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_full_and_drains() {
        let mut b = TokenBucket::new(1.0, 3.0);
        assert!(b.try_consume());
        assert!(b.try_consume());
        assert!(b.try_consume());
        assert!(!b.try_consume());
    }

    #[test]
    fn refills_over_time() {
        let mut b = TokenBucket::new(100.0, 1.0);
        assert!(b.try_consume());
        assert!(!b.try_consume());
        std::thread::sleep(Duration::from_millis(20));
        assert!(b.try_consume());
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut b = TokenBucket::new(1000.0, 2.0);
        std::thread::sleep(Duration::from_millis(50));
        b.refill(Instant::now());
        assert!(b.tokens <= 2.0);
    }
}
