//! Sliding-window rate limiter for the stats API.
//!
//! Across any interval of length `window`, at most `limit` acquisitions
//! begin. Waiting happens inside the critical section: a caller that is
//! blocked holds the slot queue, so a later caller can never record its
//! timestamp ahead of one that has waited longer.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    slots: Mutex<VecDeque<Instant>>,
}

/// Proof of an acquired slot, for scoped use at call sites. There is no
/// release: the window alone governs when the slot frees up.
#[must_use]
pub struct Pass<'a> {
    _limiter: PhantomData<&'a RateLimiter>,
}

impl RateLimiter {
    /// Panics if `limit` is zero or `window` is empty; both are programmer
    /// errors, not runtime conditions.
    pub fn new(limit: usize, window: Duration) -> Self {
        assert!(limit >= 1, "limit must be a positive integer");
        assert!(!window.is_zero(), "window must be a positive duration");
        Self {
            limit,
            window,
            slots: Mutex::new(VecDeque::with_capacity(limit)),
        }
    }

    /// Block until a slot is free in the sliding window, then claim it.
    pub fn acquire(&self) -> Pass<'_> {
        let mut slots = self.slots.lock().unwrap();

        let mut now = Instant::now();
        Self::prune(&mut slots, now, self.window);

        if slots.len() >= self.limit {
            // Sleep until the oldest in-window acquisition expires. Done
            // while holding the lock: waiters drain strictly in turn.
            let oldest = slots[slots.len() - self.limit];
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            thread::sleep(wait);
            now = Instant::now();
            Self::prune(&mut slots, now, self.window);
        }

        slots.push_back(now);
        Pass {
            _limiter: PhantomData,
        }
    }

    fn prune(slots: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = slots.front() {
            if now.duration_since(oldest) >= window {
                slots.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    /// Sorted acquisition times must respect the window: the i-th and the
    /// (i+limit)-th acquisition are at least `window` apart.
    fn assert_limited(mut times: Vec<Duration>, limit: usize, window: Duration) {
        times.sort_unstable();
        for (early, late) in times.iter().zip(times.iter().skip(limit)) {
            assert!(
                *late >= *early + window,
                "acquisitions too close: {early:?} then {late:?}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "limit must be a positive integer")]
    fn zero_limit_is_rejected() {
        let _ = RateLimiter::new(0, WINDOW);
    }

    #[test]
    #[should_panic(expected = "window must be a positive duration")]
    fn zero_window_is_rejected() {
        let _ = RateLimiter::new(2, Duration::ZERO);
    }

    #[test]
    fn first_acquisitions_pass_immediately() {
        let limiter = RateLimiter::new(2, WINDOW);
        let start = Instant::now();
        let _a = limiter.acquire();
        let _b = limiter.acquire();
        assert!(start.elapsed() < WINDOW / 2);
    }

    #[test]
    fn third_acquisition_waits_out_the_window() {
        let limiter = RateLimiter::new(2, WINDOW);
        let start = Instant::now();
        let mut times = Vec::new();
        for _ in 0..3 {
            let _pass = limiter.acquire();
            times.push(start.elapsed());
        }
        assert!(times[1] < WINDOW / 2, "second acquisition was delayed");
        assert!(times[2] >= WINDOW, "third acquisition skipped the window");
        assert_limited(times, 2, WINDOW);
    }

    #[test]
    fn limit_holds_under_concurrent_callers() {
        let limit = 3;
        let limiter = Arc::new(RateLimiter::new(limit, WINDOW));
        let start = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || {
                    let mut times = Vec::new();
                    for _ in 0..2 {
                        let _pass = limiter.acquire();
                        times.push(start.elapsed());
                    }
                    times
                })
            })
            .collect();

        let times: Vec<Duration> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(times.len(), 16);
        assert_limited(times, limit, WINDOW);
    }
}
