//! Rolling stabilization windows for scale decisions
//!
//! A [`RollingWindow`] retains, per key, only the events that could still
//! become the extremum (max or min) within a sliding time window. Each
//! reconcile tick feeds its replica proposal through [`RollingWindow::stabilize`],
//! which answers both "what is the extremum of the recent proposals?" and
//! "has the window been populated long enough to trust that answer?".
//!
//! The structure is process-wide and shared by every policy; keys are derived
//! with [`key_for`]. All mutation happens under a single lock, and the clock
//! is read inside the critical section so concurrent callers on the same key
//! observe monotonic timestamps.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Monotonic-enough time source, injectable so the window algorithm can be
/// exercised deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in real deployments.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-advanced clock for tests and history priming.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Which extremum a window tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Head of each sequence is the maximum value in the window.
    Max,
    /// Head of each sequence is the minimum value in the window.
    Min,
}

/// A single replica proposal observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleEvent {
    pub value: i32,
    pub timestamp: DateTime<Utc>,
}

/// Keyed sliding extremum window.
///
/// Per key the stored sequence is ordered by timestamp ascending and values
/// never increase head-to-tail for [`WindowKind::Max`] (never decrease for
/// [`WindowKind::Min`]); an event equal to the incoming value is kept, so
/// duplicates can outlive the tail that admitted them. Each event is pushed
/// and popped at most once, so a call is amortized O(1).
pub struct RollingWindow {
    kind: WindowKind,
    clock: Arc<dyn Clock>,
    events: Mutex<HashMap<String, VecDeque<ScaleEvent>>>,
}

impl RollingWindow {
    /// Create a window backed by the wall clock.
    pub fn new(kind: WindowKind) -> Self {
        Self::with_clock(kind, Arc::new(SystemClock))
    }

    /// Create a window with an injected clock.
    pub fn with_clock(kind: WindowKind, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind,
            clock,
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Record `value` for `key` and return `(stabilized, ready)`.
    ///
    /// `stabilized` is the extremum of the events still inside
    /// `window_duration`. `ready` reports whether the window's leading edge
    /// has moved past at least one old event; until that happens (on a
    /// freshly-populated key) callers must treat the stabilized value as
    /// insufficient history. A zero `window_duration` retains only the new
    /// event and is always ready.
    pub fn stabilize(&self, key: &str, value: i32, window_duration: Duration) -> (i32, bool) {
        let mut events = self.events.lock();
        let now = self.clock.now();
        let window = events.entry(key.to_string()).or_default();

        let mut popped = false;
        if window_duration <= Duration::zero() {
            window.clear();
        } else {
            // Strict comparison: an event exactly at the window boundary is
            // retained, the window is inclusive.
            while window
                .front()
                .is_some_and(|head| head.timestamp + window_duration < now)
            {
                window.pop_front();
                popped = true;
            }
        }

        match self.kind {
            WindowKind::Max => {
                while window.back().is_some_and(|tail| tail.value < value) {
                    window.pop_back();
                }
            }
            WindowKind::Min => {
                while window.back().is_some_and(|tail| tail.value > value) {
                    window.pop_back();
                }
            }
        }

        window.push_back(ScaleEvent {
            value,
            timestamp: now,
        });

        let stabilized = window.front().map(|head| head.value).unwrap_or(value);
        let ready = window_duration <= Duration::zero() || popped;
        (stabilized, ready)
    }

    #[cfg(test)]
    pub(crate) fn events_snapshot(&self, key: &str) -> Vec<ScaleEvent> {
        self.events
            .lock()
            .get(key)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Build the process-wide window key for a policy and its target.
pub fn key_for(
    namespace: &str,
    name: &str,
    target_name: &str,
    target_kind: &str,
    target_group: &str,
) -> String {
    format!("{namespace}/{name}/{target_name}/{target_kind}/{target_group}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn initial_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1997, 11, 7, 0, 0, 0).unwrap()
    }

    fn event(value: i32, timestamp: DateTime<Utc>) -> ScaleEvent {
        ScaleEvent { value, timestamp }
    }

    /// Prime a window by replaying (time, value) pairs through `stabilize`
    /// with a long-enough duration that nothing expires during priming.
    fn primed(
        kind: WindowKind,
        clock: &Arc<ManualClock>,
        seed: &[(DateTime<Utc>, i32)],
    ) -> RollingWindow {
        let window = RollingWindow::with_clock(kind, Arc::clone(clock) as Arc<dyn Clock>);
        for (at, value) in seed {
            clock.set(*at);
            window.stabilize("foobar", *value, Duration::seconds(100_000));
        }
        window
    }

    #[test]
    fn test_max_window_has_max_event_at_head() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(WindowKind::Max, &clock, &[(t0, 4), (t0, 3), (t0, 1)]);

        clock.set(t0 + Duration::milliseconds(1));
        let (stabilized, _) = window.stabilize("foobar", 2, Duration::seconds(10_000));

        assert_eq!(stabilized, 4);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(4, t0),
                event(3, t0),
                event(2, t0 + Duration::milliseconds(1)),
            ]
        );
    }

    #[test]
    fn test_min_window_has_min_event_at_head() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(WindowKind::Min, &clock, &[(t0, 1), (t0, 3), (t0, 7)]);

        clock.set(t0 + Duration::milliseconds(1));
        let (stabilized, _) = window.stabilize("foobar", 5, Duration::seconds(1));

        assert_eq!(stabilized, 1);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(1, t0),
                event(3, t0),
                event(5, t0 + Duration::milliseconds(1)),
            ]
        );
    }

    #[test]
    fn test_values_outside_the_window_are_removed() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 6),
                (t0 + Duration::seconds(5), 4),
                (t0 + Duration::seconds(10), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(11));
        let (stabilized, ready) = window.stabilize("foobar", 1, Duration::seconds(10));

        assert_eq!(stabilized, 4);
        assert!(ready, "an expired head means the window has matured");
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(4, t0 + Duration::seconds(5)),
                event(3, t0 + Duration::seconds(10)),
                event(1, t0 + Duration::seconds(11)),
            ]
        );
    }

    #[test]
    fn test_values_inside_the_window_are_kept() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 6),
                (t0 + Duration::seconds(5), 4),
                (t0 + Duration::seconds(10), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(11));
        let (stabilized, ready) = window.stabilize("foobar", 1, Duration::seconds(20));

        assert_eq!(stabilized, 6);
        assert!(!ready, "nothing expired, the window has not matured yet");
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(6, t0),
                event(4, t0 + Duration::seconds(5)),
                event(3, t0 + Duration::seconds(10)),
                event(1, t0 + Duration::seconds(11)),
            ]
        );
    }

    #[test]
    fn test_zero_window_keeps_single_value_and_is_ready() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 6),
                (t0 + Duration::seconds(1), 4),
                (t0 + Duration::seconds(2), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, ready) = window.stabilize("foobar", 1, Duration::zero());

        assert_eq!(stabilized, 1);
        assert!(ready);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![event(1, t0 + Duration::seconds(3))]
        );
    }

    #[test]
    fn test_value_greater_than_all_others_results_in_single_value() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 6),
                (t0 + Duration::seconds(1), 4),
                (t0 + Duration::seconds(2), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, _) = window.stabilize("foobar", 10, Duration::seconds(20));

        assert_eq!(stabilized, 10);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![event(10, t0 + Duration::seconds(3))]
        );
    }

    #[test]
    fn test_max_window_keeps_duplicate_values() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 6),
                (t0 + Duration::seconds(1), 4),
                (t0 + Duration::seconds(2), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, _) = window.stabilize("foobar", 4, Duration::seconds(20));

        assert_eq!(stabilized, 6);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(6, t0),
                event(4, t0 + Duration::seconds(1)),
                event(4, t0 + Duration::seconds(3)),
            ]
        );
    }

    #[test]
    fn test_min_window_keeps_duplicate_values() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Min,
            &clock,
            &[
                (t0, 2),
                (t0 + Duration::seconds(1), 4),
                (t0 + Duration::seconds(2), 5),
            ],
        );

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, _) = window.stabilize("foobar", 4, Duration::seconds(20));

        assert_eq!(stabilized, 2);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(2, t0),
                event(4, t0 + Duration::seconds(1)),
                event(4, t0 + Duration::seconds(3)),
            ]
        );
    }

    #[test]
    fn test_multiple_keys_are_handled_independently() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window =
            RollingWindow::with_clock(WindowKind::Min, Arc::clone(&clock) as Arc<dyn Clock>);

        for (at, value) in [
            (t0, 3),
            (t0 + Duration::seconds(1), 4),
            (t0 + Duration::seconds(2), 5),
        ] {
            clock.set(at);
            window.stabilize("foobar", value, Duration::seconds(100_000));
        }
        for (at, value) in [
            (t0, 2),
            (t0 + Duration::seconds(1), 4),
            (t0 + Duration::seconds(2), 5),
        ] {
            clock.set(at);
            window.stabilize("barfoo", value, Duration::seconds(100_000));
        }

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, _) = window.stabilize("barfoo", 4, Duration::seconds(20));

        assert_eq!(stabilized, 2);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(3, t0),
                event(4, t0 + Duration::seconds(1)),
                event(5, t0 + Duration::seconds(2)),
            ]
        );
        assert_eq!(
            window.events_snapshot("barfoo"),
            vec![
                event(2, t0),
                event(4, t0 + Duration::seconds(1)),
                event(4, t0 + Duration::seconds(3)),
            ]
        );
    }

    #[test]
    fn test_window_is_inclusive() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = primed(
            WindowKind::Max,
            &clock,
            &[
                (t0, 5),
                (t0 + Duration::seconds(1), 4),
                (t0 + Duration::seconds(2), 3),
            ],
        );

        clock.set(t0 + Duration::seconds(3));
        let (stabilized, _) = window.stabilize("foobar", 2, Duration::seconds(2));

        // The event at t0+1s sits exactly on the boundary and is retained.
        assert_eq!(stabilized, 4);
        assert_eq!(
            window.events_snapshot("foobar"),
            vec![
                event(4, t0 + Duration::seconds(1)),
                event(3, t0 + Duration::seconds(2)),
                event(2, t0 + Duration::seconds(3)),
            ]
        );
    }

    #[test]
    fn test_fresh_key_is_not_ready() {
        let clock = Arc::new(ManualClock::new(initial_time()));
        let window = RollingWindow::with_clock(WindowKind::Max, clock as Arc<dyn Clock>);

        let (stabilized, ready) = window.stabilize("fresh", 7, Duration::seconds(60));

        // Even though 7 is trivially the extremum, one sample is not history.
        assert_eq!(stabilized, 7);
        assert!(!ready);
    }

    #[test]
    fn test_same_clock_repeat_keeps_head_value() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window = RollingWindow::with_clock(WindowKind::Max, clock as Arc<dyn Clock>);

        let (first, _) = window.stabilize("foobar", 9, Duration::seconds(60));
        let (second, _) = window.stabilize("foobar", 9, Duration::seconds(60));

        assert_eq!(first, 9);
        assert_eq!(second, 9);
        assert_eq!(window.events_snapshot("foobar").len(), 2);
    }

    #[test]
    fn test_expiry_and_monotonicity_invariants_hold() {
        let t0 = initial_time();
        let clock = Arc::new(ManualClock::new(t0));
        let window =
            RollingWindow::with_clock(WindowKind::Max, Arc::clone(&clock) as Arc<dyn Clock>);
        let duration = Duration::seconds(30);

        for (i, value) in [5, 9, 2, 7, 7, 3, 11, 4, 4, 6].iter().enumerate() {
            clock.set(t0 + Duration::seconds(7 * i as i64));
            window.stabilize("invariants", *value, duration);

            let now = clock.now();
            let events = window.events_snapshot("invariants");
            assert!(!events.is_empty());
            for pair in events.windows(2) {
                assert!(pair[0].timestamp <= pair[1].timestamp);
                assert!(
                    pair[0].value >= pair[1].value,
                    "head-to-tail values must never increase in a max window: {events:?}"
                );
            }
            for ev in &events {
                assert!(ev.timestamp + duration >= now);
            }
        }
    }

    #[test]
    fn test_concurrent_stabilize_on_distinct_keys() {
        let window = Arc::new(RollingWindow::new(WindowKind::Min));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let window = Arc::clone(&window);
                std::thread::spawn(move || {
                    let key = format!("default/policy-{worker}/dep/Deployment/apps");
                    for value in 0..100 {
                        window.stabilize(&key, value, Duration::seconds(300));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for worker in 0..8 {
            let key = format!("default/policy-{worker}/dep/Deployment/apps");
            let events = window.events_snapshot(&key);
            // Min window fed ascending values keeps every sample.
            assert_eq!(events.len(), 100);
            assert_eq!(events[0].value, 0);
        }
    }

    #[test]
    fn test_key_for_joins_all_parts() {
        assert_eq!(
            key_for("default", "my-policy", "my-app", "Deployment", "apps"),
            "default/my-policy/my-app/Deployment/apps"
        );
    }
}
