//! Time-bounded propagation queries

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use satkit::Instant;

use super::{Propagate, PropagatedState};
use crate::data::TrackedObject;
use crate::error::PropagationUnavailable;

#[derive(Debug)]
struct Query {
    id: u64,
    object: TrackedObject,
    instant: Instant,
}

type Answer = (u64, Result<PropagatedState, PropagationUnavailable>);

/// Long-lived thread running inner queries one at a time
struct QueryWorker {
    sender: Sender<Query>,
    receiver: Receiver<Answer>,
    next_id: u64,
    /// Query that missed its deadline and is still running
    expired: Option<u64>,
}

impl QueryWorker {
    fn spawn(inner: Arc<dyn Propagate>) -> std::io::Result<Self> {
        let (query_tx, query_rx) = mpsc::channel::<Query>();
        let (answer_tx, answer_rx) = mpsc::channel::<Answer>();

        thread::Builder::new()
            .name("satmap-propagate".to_string())
            .spawn(move || {
                while let Ok(query) = query_rx.recv() {
                    let result = inner.propagate(&query.object, &query.instant);
                    if answer_tx.send((query.id, result)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            sender: query_tx,
            receiver: answer_rx,
            next_id: 0,
            expired: None,
        })
    }

    /// Collect the late answer of an expired query, if it has arrived
    fn still_busy(&mut self) -> Result<bool, TryRecvError> {
        let Some(expired) = self.expired else {
            return Ok(false);
        };
        loop {
            match self.receiver.try_recv() {
                Ok((id, _)) if id == expired => {
                    self.expired = None;
                    return Ok(false);
                }
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return Ok(true),
                Err(e) => return Err(e),
            }
        }
    }
}

/// Runs queries of an inner propagator on a worker thread and gives up
/// after `timeout`
///
/// At most one query runs at a time. While an expired query is still
/// running, further queries time out at once instead of queueing behind it.
pub struct DeadlinePropagator {
    inner: Arc<dyn Propagate>,
    timeout: Duration,
    worker: Mutex<Option<QueryWorker>>,
}

impl DeadlinePropagator {
    pub fn new(inner: Arc<dyn Propagate>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            worker: Mutex::new(None),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn worker_gone(&self, object: &TrackedObject) -> PropagationUnavailable {
        PropagationUnavailable::Failed {
            id: object.id.clone(),
            message: "propagation worker exited".to_string(),
        }
    }
}

impl Propagate for DeadlinePropagator {
    fn propagate(
        &self,
        object: &TrackedObject,
        instant: &Instant,
    ) -> Result<PropagatedState, PropagationUnavailable> {
        let mut guard = self.worker.lock();
        if guard.is_none() {
            let worker = QueryWorker::spawn(Arc::clone(&self.inner)).map_err(|e| {
                PropagationUnavailable::Failed {
                    id: object.id.clone(),
                    message: format!("could not spawn propagation worker: {}", e),
                }
            })?;
            *guard = Some(worker);
        }
        let worker = guard.as_mut().ok_or_else(|| self.worker_gone(object))?;

        match worker.still_busy() {
            Ok(false) => {}
            Ok(true) => {
                log::debug!("Propagation worker still busy, skipping {}", object.id);
                return Err(PropagationUnavailable::TimedOut {
                    id: object.id.clone(),
                    after: self.timeout,
                });
            }
            Err(_) => {
                // Respawned on the next query
                *guard = None;
                return Err(self.worker_gone(object));
            }
        }

        let id = worker.next_id;
        worker.next_id += 1;
        let query = Query {
            id,
            object: object.clone(),
            instant: *instant,
        };
        if worker.sender.send(query).is_err() {
            *guard = None;
            return Err(self.worker_gone(object));
        }

        match worker.receiver.recv_timeout(self.timeout) {
            Ok((answer_id, result)) if answer_id == id => result,
            Ok(_) => Err(PropagationUnavailable::Failed {
                id: object.id.clone(),
                message: "answer for a different query".to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => {
                worker.expired = Some(id);
                Err(PropagationUnavailable::TimedOut {
                    id: object.id.clone(),
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                *guard = None;
                Err(self.worker_gone(object))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::Subpoint;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps for `delay`, tracking how many calls run at once
    struct SlowPropagator {
        delay: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
        calls: AtomicUsize,
        panic_first: bool,
    }

    impl SlowPropagator {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                panic_first: false,
            }
        }
    }

    impl Propagate for SlowPropagator {
        fn propagate(
            &self,
            _object: &TrackedObject,
            _instant: &Instant,
        ) -> Result<PropagatedState, PropagationUnavailable> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_first && call == 0 {
                panic!("collaborator crashed");
            }
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(PropagatedState {
                subpoint: Subpoint {
                    latitude_deg: 1.0,
                    longitude_deg: 2.0,
                    altitude_km: 400.0,
                },
                position_ecef_km: nalgebra::Vector3::new(6778.0, 0.0, 0.0),
                velocity_km_s: nalgebra::Vector3::new(0.0, 7.7, 0.0),
            })
        }
    }

    fn epoch() -> Instant {
        Instant::from_datetime(2026, 1, 29, 12, 0, 0.0).unwrap()
    }

    #[test]
    fn test_fast_query_passes_through() {
        let propagator = DeadlinePropagator::new(
            Arc::new(SlowPropagator::new(Duration::ZERO)),
            Duration::from_secs(5),
        );
        for _ in 0..3 {
            let state = propagator
                .propagate(&TrackedObject::new("A", None), &epoch())
                .unwrap();
            assert_eq!(state.subpoint.latitude_deg, 1.0);
        }
    }

    #[test]
    fn test_slow_query_times_out() {
        let propagator = DeadlinePropagator::new(
            Arc::new(SlowPropagator::new(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let err = propagator
            .propagate(&TrackedObject::new("A", None), &epoch())
            .unwrap_err();
        assert!(matches!(err, PropagationUnavailable::TimedOut { .. }));
        assert_eq!(err.object_id().as_str(), "A");
    }

    #[test]
    fn test_hung_collaborator_holds_one_thread() {
        let inner = Arc::new(SlowPropagator::new(Duration::from_millis(1000)));
        let propagator = DeadlinePropagator::new(inner.clone(), Duration::from_millis(5));

        // 20 ticks of 10 objects against a collaborator that never answers in time
        for i in 0..200 {
            let object = TrackedObject::new(format!("OBJ-{}", i % 10).as_str(), None);
            let err = propagator.propagate(&object, &epoch()).unwrap_err();
            assert!(matches!(err, PropagationUnavailable::TimedOut { .. }));
        }

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(inner.max_running.load(Ordering::SeqCst), 1);
        // One reference here, one in the decorator, one on the worker thread
        assert_eq!(Arc::strong_count(&inner), 3);

        // Once the late answer lands the worker takes new queries again
        thread::sleep(Duration::from_millis(1200));
        let _ = propagator.propagate(&TrackedObject::new("A", None), &epoch());
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while inner.calls.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worker_respawns_after_panic() {
        let inner = Arc::new(SlowPropagator {
            panic_first: true,
            ..SlowPropagator::new(Duration::ZERO)
        });
        let propagator = DeadlinePropagator::new(inner.clone(), Duration::from_secs(5));
        let object = TrackedObject::new("A", None);

        let err = propagator.propagate(&object, &epoch()).unwrap_err();
        assert!(matches!(err, PropagationUnavailable::Failed { .. }));
        assert!(propagator.propagate(&object, &epoch()).is_ok());
    }
}
