//! Bounded concurrent racing of one logical request across candidates.
//!
//! Attempts are polled in place by the calling task instead of being
//! spawned, so dropping the in-flight set cancels every attempt. Whichever
//! way [`race`] returns (win, exhaustion, deadline, or the caller dropping
//! the future), no attempt outlives the call.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use log::{debug, info};
use tokio::time::Instant;

use crate::error::{AttemptError, RaceError, SourceFailure};

#[derive(Debug, Clone, Copy)]
pub struct RaceOptions {
    /// Attempts in flight at once; later candidates wait for a free slot.
    pub capacity: usize,
    pub per_candidate_timeout: Duration,
    pub overall_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceWin<T> {
    pub value: T,
    pub winner: String,
}

/// Run `attempt` against `candidates` with at most `options.capacity` in
/// flight, returning the first success in completion order.
///
/// Candidates are started in the given order. Failed attempts are logged and
/// recorded; once one succeeds, the rest are dropped unfinished.
///
/// # Errors
/// Returns [`RaceError::NoCandidates`] for an empty list,
/// [`RaceError::Exhausted`] when every attempt failed, and
/// [`RaceError::DeadlineExceeded`] when `options.overall_timeout` elapses
/// first.
pub async fn race<T, F, Fut>(
    candidates: &[String],
    options: RaceOptions,
    attempt: F,
) -> Result<RaceWin<T>, RaceError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    if candidates.is_empty() {
        return Err(RaceError::NoCandidates);
    }

    let started = Instant::now();
    let deadline = started + options.overall_timeout;
    let per_candidate = options.per_candidate_timeout;
    let attempt = &attempt;

    let mut in_flight = stream::iter(candidates.iter().cloned())
        .map(|candidate| async move {
            let outcome = tokio::time::timeout(per_candidate, attempt(candidate.clone()))
                .await
                .unwrap_or_else(|_| Err(AttemptError::Timeout(per_candidate)));
            (candidate, outcome)
        })
        .buffer_unordered(options.capacity.max(1));

    let mut failures = Vec::new();
    loop {
        let Ok(next) = tokio::time::timeout_at(deadline, in_flight.next()).await else {
            debug!(
                "Race deadline reached with {} of {} candidate(s) failed",
                failures.len(),
                candidates.len()
            );
            return Err(RaceError::DeadlineExceeded {
                elapsed: started.elapsed(),
                failures,
            });
        };

        match next {
            Some((candidate, Ok(value))) => {
                info!(
                    "Candidate {candidate} won after {}ms",
                    started.elapsed().as_millis()
                );
                return Ok(RaceWin {
                    value,
                    winner: candidate,
                });
            }
            Some((candidate, Err(error))) => {
                debug!("Candidate {candidate} failed: {error}");
                failures.push(SourceFailure {
                    source_url: candidate,
                    error,
                });
            }
            None => return Err(RaceError::Exhausted { failures }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{RaceOptions, race};
    use crate::error::{AttemptError, RaceError};

    /// Tracks how many attempts are alive (started and not yet dropped).
    #[derive(Clone, Default)]
    struct Liveness {
        live: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        started: Arc<AtomicUsize>,
    }

    struct LiveGuard(Arc<AtomicUsize>);

    impl Drop for LiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Liveness {
        fn enter(&self) -> LiveGuard {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            LiveGuard(Arc::clone(&self.live))
        }

        fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed(Duration),
        Fail(Duration),
        Hang,
    }

    fn candidates(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://m{i}.example/")).collect()
    }

    fn options(capacity: usize) -> RaceOptions {
        RaceOptions {
            capacity,
            per_candidate_timeout: Duration::from_millis(200),
            overall_timeout: Duration::from_secs(2),
        }
    }

    async fn run(
        behaviors: HashMap<String, Behavior>,
        list: &[String],
        options: RaceOptions,
        liveness: &Liveness,
    ) -> Result<super::RaceWin<String>, RaceError> {
        race(list, options, |candidate| {
            let behavior = behaviors[&candidate];
            let liveness = liveness.clone();
            async move {
                let _guard = liveness.enter();
                match behavior {
                    Behavior::Succeed(delay) => {
                        tokio::time::sleep(delay).await;
                        Ok(format!("body from {candidate}"))
                    }
                    Behavior::Fail(delay) => {
                        tokio::time::sleep(delay).await;
                        Err(AttemptError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY))
                    }
                    Behavior::Hang => std::future::pending().await,
                }
            }
        })
        .await
    }

    #[tokio::test]
    async fn single_viable_candidate_wins_from_any_position() {
        let list = candidates(5);
        for winner in 0..list.len() {
            let behaviors = list
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let behavior = if i == winner {
                        Behavior::Succeed(Duration::from_millis(5))
                    } else {
                        Behavior::Fail(Duration::from_millis(1))
                    };
                    (c.clone(), behavior)
                })
                .collect();
            let liveness = Liveness::default();

            let won = run(behaviors, &list, options(2), &liveness)
                .await
                .expect("the only viable candidate should win");

            assert_eq!(won.winner, list[winner]);
            assert_eq!(won.value, format!("body from {}", list[winner]));
            assert_eq!(liveness.live(), 0);
        }
    }

    #[tokio::test]
    async fn first_completed_success_wins_over_earlier_submission() {
        let list = candidates(2);
        let behaviors = HashMap::from([
            (list[0].clone(), Behavior::Succeed(Duration::from_millis(150))),
            (list[1].clone(), Behavior::Succeed(Duration::from_millis(5))),
        ]);
        let liveness = Liveness::default();

        let won = run(behaviors, &list, options(2), &liveness)
            .await
            .expect("a candidate should win");

        assert_eq!(won.winner, list[1]);
        assert_eq!(liveness.live(), 0, "slower attempt must be dropped");
    }

    #[tokio::test]
    async fn all_failures_exhaust_and_leave_nothing_running() {
        let list = candidates(4);
        let behaviors = list
            .iter()
            .map(|c| (c.clone(), Behavior::Fail(Duration::from_millis(2))))
            .collect();
        let liveness = Liveness::default();

        let error = run(behaviors, &list, options(2), &liveness)
            .await
            .expect_err("every candidate failing should exhaust the race");

        match error {
            RaceError::Exhausted { failures } => {
                assert_eq!(failures.len(), 4);
                let mut urls: Vec<_> = failures.into_iter().map(|f| f.source_url).collect();
                urls.sort();
                assert_eq!(urls, list);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(liveness.started(), 4);
        assert_eq!(liveness.live(), 0);
    }

    #[tokio::test]
    async fn capacity_bounds_concurrent_attempts() {
        let list = candidates(6);
        let behaviors = list
            .iter()
            .map(|c| (c.clone(), Behavior::Fail(Duration::from_millis(10))))
            .collect();
        let liveness = Liveness::default();

        let _ = run(behaviors, &list, options(2), &liveness).await;

        assert_eq!(liveness.peak(), 2);
        assert_eq!(liveness.started(), 6);
    }

    #[tokio::test]
    async fn queued_candidates_are_not_started_after_a_win() {
        let list = candidates(5);
        let mut behaviors: HashMap<_, _> = list
            .iter()
            .map(|c| (c.clone(), Behavior::Hang))
            .collect();
        behaviors.insert(list[0].clone(), Behavior::Succeed(Duration::from_millis(1)));
        let liveness = Liveness::default();

        let won = run(behaviors, &list, options(2), &liveness)
            .await
            .expect("first candidate should win");

        assert_eq!(won.winner, list[0]);
        assert_eq!(liveness.started(), 2);
        assert_eq!(liveness.live(), 0);
    }

    #[tokio::test]
    async fn slow_candidates_time_out_individually_and_later_ones_get_a_turn() {
        let list = candidates(3);
        let behaviors = HashMap::from([
            (list[0].clone(), Behavior::Hang),
            (list[1].clone(), Behavior::Hang),
            (list[2].clone(), Behavior::Succeed(Duration::from_millis(5))),
        ]);
        let liveness = Liveness::default();

        let won = run(behaviors, &list, options(2), &liveness)
            .await
            .expect("third candidate should get a slot once the first two time out");

        assert_eq!(won.winner, list[2]);
        assert_eq!(liveness.live(), 0);
    }

    #[tokio::test]
    async fn overall_deadline_abandons_race() {
        let list = candidates(3);
        let behaviors = list.iter().map(|c| (c.clone(), Behavior::Hang)).collect();
        let liveness = Liveness::default();
        let options = RaceOptions {
            capacity: 3,
            per_candidate_timeout: Duration::from_secs(5),
            overall_timeout: Duration::from_millis(50),
        };

        let error = run(behaviors, &list, options, &liveness)
            .await
            .expect_err("hanging candidates should hit the deadline");

        assert!(matches!(error, RaceError::DeadlineExceeded { .. }));
        assert_eq!(liveness.started(), 3);
        assert_eq!(liveness.live(), 0);
    }

    #[tokio::test]
    async fn dropping_the_race_future_cancels_attempts() {
        let list = candidates(3);
        let behaviors: HashMap<_, _> = list.iter().map(|c| (c.clone(), Behavior::Hang)).collect();
        let liveness = Liveness::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(30),
            run(behaviors, &list, options(3), &liveness),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(liveness.live(), 0);
    }

    #[tokio::test]
    async fn empty_candidate_list_is_rejected() {
        let calls = Mutex::new(0_usize);

        let result = race(&[], options(2), |_candidate| {
            *calls.lock().expect("lock") += 1;
            async { Ok::<_, AttemptError>(()) }
        })
        .await;

        assert_eq!(result, Err(RaceError::NoCandidates));
        assert_eq!(*calls.lock().expect("lock"), 0);
    }
}
