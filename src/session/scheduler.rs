//! Periodic refresh of marker positions and selected-object telemetry

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use satkit::Instant;

use crate::data::{ObjectId, TrackedObject};
use crate::error::{PropagationUnavailable, SessionError};
use crate::geo::GeoProjector;
use crate::propagation::{Propagate, PropagatedState};

use super::markers::{Marker, SharedRegistry};
use super::telemetry::{Telemetry, TelemetryDeriver};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(1000);

/// Frames that may wait unread; a tick finding the channel full is dropped
pub const FRAME_BACKLOG: usize = 1;

/// Source of the instant each tick propagates to
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        let now = chrono::Utc::now();
        Instant::from_unixtime(now.timestamp_micros() as f64 * 1e-6)
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        let mut now = self.now.lock();
        *now = *now + satkit::Duration::from_seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// What the presentation layer receives after every tick
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number, starting at 1
    pub tick: u64,
    /// Instant every marker in this frame was propagated to
    pub instant: Instant,
    pub markers: Vec<Marker>,
    pub selected: ObjectId,
    /// Readings for `selected`, if any have ever been available
    pub telemetry: Option<Telemetry>,
    /// True when `telemetry` was carried over from an earlier tick
    pub telemetry_stale: bool,
    pub failures: Vec<PropagationUnavailable>,
}

impl Frame {
    pub fn marker(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id.as_str() == id)
    }

    pub fn selected_marker(&self) -> Option<&Marker> {
        self.marker(self.selected.as_str())
    }
}

/// The work done by one tick
pub struct RefreshCycle {
    objects: Arc<[TrackedObject]>,
    registry: SharedRegistry,
    projector: GeoProjector,
    propagator: Arc<dyn Propagate>,
    deriver: TelemetryDeriver,
    clock: Arc<dyn Clock>,
    last_telemetry: HashMap<ObjectId, Telemetry>,
    ticks: u64,
}

impl RefreshCycle {
    pub fn new(
        objects: Arc<[TrackedObject]>,
        registry: SharedRegistry,
        projector: GeoProjector,
        propagator: Arc<dyn Propagate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            objects,
            registry,
            projector,
            deriver: TelemetryDeriver::new(Arc::clone(&propagator)),
            propagator,
            clock,
            last_telemetry: HashMap::new(),
            ticks: 0,
        }
    }

    /// Propagate every object to one shared instant, update markers, then
    /// derive telemetry for the selection
    ///
    /// A failure for one object only skips that object; its marker keeps the
    /// last good position.
    pub fn run_tick(&mut self) -> Frame {
        self.ticks += 1;
        let instant = self.clock.now();

        let mut placed = Vec::with_capacity(self.objects.len());
        let mut states: HashMap<ObjectId, PropagatedState> = HashMap::new();
        let mut failures = Vec::new();

        for object in self.objects.iter() {
            let state = match self.propagator.propagate(object, &instant) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!("Skipping {} this tick: {}", object.id, e);
                    failures.push(e);
                    continue;
                }
            };

            let pixel = self
                .projector
                .project(state.subpoint.latitude_deg, state.subpoint.longitude_deg);
            if !pixel.is_finite() {
                let e = PropagationUnavailable::Failed {
                    id: object.id.clone(),
                    message: "subpoint does not project onto the map".to_string(),
                };
                log::warn!("Skipping {} this tick: {}", object.id, e);
                failures.push(e);
                continue;
            }

            placed.push((object.id.clone(), pixel));
            states.insert(object.id.clone(), state);
        }

        // Marker updates and the selection read share one critical section
        let (selected, markers) = {
            let mut registry = self.registry.write();
            for (id, pixel) in &placed {
                if let Err(e) = registry.update_position(id.as_str(), *pixel) {
                    log::warn!("Marker update rejected: {}", e);
                }
            }
            (registry.selected().clone(), registry.markers().to_vec())
        };

        let (telemetry, telemetry_stale) = match states.get(&selected) {
            Some(state) => {
                let telemetry = self.deriver.derive_from(state);
                self.last_telemetry.insert(selected.clone(), telemetry);
                (Some(telemetry), false)
            }
            None => match self.last_telemetry.get(&selected) {
                Some(last) => (Some(*last), true),
                None => (None, false),
            },
        };

        log::debug!(
            "Tick {}: {}/{} markers updated, selected {}",
            self.ticks,
            placed.len(),
            self.objects.len(),
            selected
        );

        Frame {
            tick: self.ticks,
            instant,
            markers,
            selected,
            telemetry,
            telemetry_stale,
            failures,
        }
    }
}

/// Lifecycle of the refresh worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug)]
enum SchedulerCommand {
    RefreshNow,
    Stop,
}

/// Runs a [`RefreshCycle`] on a worker thread at a fixed interval
pub struct RefreshScheduler {
    interval: Duration,
    state: SchedulerState,
    commands: Option<Sender<SchedulerCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: SchedulerState::Idle,
            commands: None,
            worker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state; a worker that exited on its own counts as stopped
    pub fn state(&self) -> SchedulerState {
        match (&self.state, &self.worker) {
            (SchedulerState::Running, Some(worker)) if worker.is_finished() => {
                SchedulerState::Stopped
            }
            (state, _) => *state,
        }
    }

    /// Idle -> Running. The first tick runs immediately.
    pub fn start(
        &mut self,
        cycle: RefreshCycle,
        frames: SyncSender<Frame>,
    ) -> Result<(), SessionError> {
        if self.state != SchedulerState::Idle {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                action: "start",
            });
        }

        let (cmd_tx, cmd_rx) = mpsc::channel::<SchedulerCommand>();
        let interval = self.interval;
        let worker = thread::Builder::new()
            .name("satmap-refresh".to_string())
            .spawn(move || run_worker(cycle, frames, cmd_rx, interval))
            .map_err(|e| {
                SessionError::Configuration(format!("could not start refresh worker: {}", e))
            })?;

        self.commands = Some(cmd_tx);
        self.worker = Some(worker);
        self.state = SchedulerState::Running;
        log::info!("Refresh scheduler running every {:?}", interval);
        Ok(())
    }

    /// Ask for a tick now instead of at the next interval
    pub fn refresh_now(&self) -> bool {
        match &self.commands {
            Some(commands) => commands.send(SchedulerCommand::RefreshNow).is_ok(),
            None => false,
        }
    }

    /// Stop ticking and wait for an in-flight tick to finish
    pub fn stop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(SchedulerCommand::Stop);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Refresh worker panicked");
            }
        }
        if self.state != SchedulerState::Stopped {
            log::info!("Refresh scheduler stopped");
        }
        self.state = SchedulerState::Stopped;
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    mut cycle: RefreshCycle,
    frames: SyncSender<Frame>,
    commands: Receiver<SchedulerCommand>,
    interval: Duration,
) {
    let mut next_tick = std::time::Instant::now();

    loop {
        let frame = cycle.run_tick();
        match frames.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                log::debug!("Frame receiver behind, dropping tick {}", frame.tick);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::info!("Frame receiver closed, stopping refresh");
                break;
            }
        }

        let now = std::time::Instant::now();
        let command = match next_tick.checked_add(interval) {
            Some(deadline) => {
                // Missed deadlines are skipped rather than replayed
                next_tick = deadline.max(now);
                commands.recv_timeout(next_tick.saturating_duration_since(now))
            }
            None => {
                log::warn!(
                    "Refresh interval {:?} out of range, ticking on request only",
                    interval
                );
                commands.recv().map_err(|_| RecvTimeoutError::Disconnected)
            }
        };

        match command {
            Ok(SchedulerCommand::RefreshNow) => next_tick = std::time::Instant::now(),
            Ok(SchedulerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
