//! Periodic emission of `acces` status points.
//!
//! Every periodic point gets its own worker thread emitting the point with
//! value "on" once per period. The tasks of one configuration form a group
//! that is started and stopped as a whole:
//!
//! ```text
//! Idle --start--> Running --stop--> Stopping --(all joined)--> Idle
//! ```
//!
//! A task never sleeps longer than [`SchedulerConfig::max_sleep`], and its
//! sleeps are cut short when the group stop channel closes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, warn};

use crate::config::SchedulerConfig;
use crate::error::{SpResult, SystemSpError};
use crate::gate::EnableGate;
use crate::point::{CyclicPointInfo, Policy};
use crate::sink::SinkAdapter;
use crate::template::ReadingTemplate;
use crate::time::now_millis;

/// Lifecycle state of the task group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// No task exists.
    Idle,
    /// One task per periodic point is running.
    Running,
    /// Tasks were told to stop and are being joined.
    Stopping,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Firing bookkeeping of one periodic point.
///
/// The last fire time is wall clock and survives pauses of the enable
/// switch, so re-enabling after a long pause fires at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTimer {
    period_ms: i64,
    last_fire_ms: Option<i64>,
}

impl CycleTimer {
    /// A timer that is due at once.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period_ms: i64::try_from(period.as_millis()).unwrap_or(i64::MAX),
            last_fire_ms: None,
        }
    }

    /// True when a full period elapsed since the last fire, or it never fired.
    #[must_use]
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.last_fire_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.period_ms)
    }

    /// Records a fire at `now_ms`.
    pub fn fire(&mut self, now_ms: i64) {
        self.last_fire_ms = Some(now_ms);
    }

    /// Time left until the next fire, zero when due.
    #[must_use]
    pub fn remaining(&self, now_ms: i64) -> Duration {
        let remaining = match self.last_fire_ms {
            None => 0,
            Some(last) => self.period_ms - now_ms.saturating_sub(last),
        };
        Duration::from_millis(u64::try_from(remaining).unwrap_or(0))
    }

    /// Wall-clock time of the last fire, in epoch milliseconds.
    #[must_use]
    pub const fn last_fire_ms(&self) -> Option<i64> {
        self.last_fire_ms
    }
}

#[derive(Default)]
struct TaskGroup {
    stop_tx: Option<Sender<()>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Owner of the periodic emission tasks.
pub struct CyclicScheduler {
    cfg: SchedulerConfig,
    gate: EnableGate,
    sink: Arc<SinkAdapter>,
    group: Mutex<TaskGroup>,
    state: Mutex<SchedulerState>,
}

impl fmt::Debug for CyclicScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CyclicScheduler")
            .field("cfg", &self.cfg)
            .field("state", &self.state())
            .field("task_count", &self.task_count())
            .finish_non_exhaustive()
    }
}

impl CyclicScheduler {
    /// Creates an idle scheduler emitting through `sink` while `gate` is open.
    #[must_use]
    pub fn new(cfg: SchedulerConfig, gate: EnableGate, sink: Arc<SinkAdapter>) -> Self {
        Self {
            cfg,
            gate,
            sink,
            group: Mutex::new(TaskGroup::default()),
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    /// Task timing in use.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    /// Replaces the running group with one task per given point.
    ///
    /// Returns the number of tasks started. Points with a zero period never
    /// fire and get no task. An empty slice leaves the scheduler idle.
    ///
    /// # Errors
    ///
    /// Returns [`SystemSpError::Internal`] when a worker thread cannot be
    /// spawned. Tasks started before the failure are stopped again.
    pub fn start(&self, points: &[CyclicPointInfo]) -> SpResult<usize> {
        debug!(points = points.len(), "Starting configured cycles");
        let mut group = self.group.lock().unwrap_or_else(PoisonError::into_inner);
        self.stop_group(&mut group);

        let template = ReadingTemplate::new(Policy::Periodic);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        group.stop_tx = Some(stop_tx);

        for (index, point) in points.iter().enumerate() {
            if point.period_secs == 0 {
                warn!(asset = %point.asset_name, pivot_id = %point.pivot_id, "Zero emission period, cycle not started");
                continue;
            }

            let task = CycleTask {
                point: point.clone(),
                template: template.clone(),
                cfg: self.cfg,
                gate: self.gate.clone(),
                sink: Arc::clone(&self.sink),
                stop_rx: stop_rx.clone(),
            };
            // Labels may hold NUL bytes, which thread names reject.
            let spawned = thread::Builder::new()
                .name(format!("systemsp-cycle-{index}"))
                .spawn(move || task.run());

            match spawned {
                Ok(handle) => group.tasks.push(handle),
                Err(e) => {
                    error!(asset = %point.asset_name, error = %e, "Failed to spawn cycle thread");
                    self.stop_group(&mut group);
                    return Err(SystemSpError::internal(format!(
                        "failed to spawn cycle thread for {}: {e}",
                        point.asset_name
                    )));
                }
            }
        }

        if group.tasks.is_empty() {
            group.stop_tx = None;
            return Ok(0);
        }

        self.set_state(SchedulerState::Running);
        debug!(tasks = group.tasks.len(), "Cycles started");
        Ok(group.tasks.len())
    }

    /// Stops every task and waits for them to exit.
    pub fn stop(&self) {
        let mut group = self.group.lock().unwrap_or_else(PoisonError::into_inner);
        self.stop_group(&mut group);
    }

    fn stop_group(&self, group: &mut TaskGroup) {
        if group.tasks.is_empty() && group.stop_tx.is_none() {
            return;
        }
        debug!(tasks = group.tasks.len(), "Stopping all existing cycles");
        self.set_state(SchedulerState::Stopping);

        // Closing the channel wakes every sleeping task.
        drop(group.stop_tx.take());
        for handle in group.tasks.drain(..) {
            if handle.join().is_err() {
                warn!("Cycle thread panicked");
            }
        }

        self.set_state(SchedulerState::Idle);
        debug!("Cycles stopped");
    }

    /// Current lifecycle state of the group.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of tasks in the running group.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.group.lock().unwrap_or_else(PoisonError::into_inner).tasks.len()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl Drop for CyclicScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CycleTask {
    point: CyclicPointInfo,
    template: ReadingTemplate,
    cfg: SchedulerConfig,
    gate: EnableGate,
    sink: Arc<SinkAdapter>,
    stop_rx: Receiver<()>,
}

impl CycleTask {
    fn run(self) {
        let asset = self.point.asset_name.as_str();
        debug!(asset, period_secs = self.point.period_secs, "Status point cycle running");

        let mut timer = CycleTimer::new(self.point.period());
        loop {
            let wait = if self.gate.is_enabled() {
                let now = now_millis();
                if timer.is_due(now) {
                    let Ok(payload) = self.template.fill(&self.point, now, true) else {
                        return;
                    };
                    self.sink.emit(asset, payload);
                    timer.fire(now);
                }
                timer.remaining(now).min(self.cfg.max_sleep)
            } else {
                self.cfg.disabled_poll
            };

            match self.stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(asset, "Status point cycle stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use std::time::Instant;

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            max_sleep: Duration::from_millis(50),
            disabled_poll: Duration::from_millis(10),
        }
    }

    fn scheduler(enabled: bool) -> (CyclicScheduler, crate::sink::ReadingStream) {
        let sink = Arc::new(SinkAdapter::new());
        let (channel, stream) = ChannelSink::new();
        sink.register(Arc::new(channel));
        (CyclicScheduler::new(fast_config(), EnableGate::new(enabled), sink), stream)
    }

    #[test]
    fn test_timer_due_on_first_poll() {
        let timer = CycleTimer::new(Duration::from_secs(2));
        assert!(timer.is_due(0));
        assert!(timer.is_due(1_700_000_000_000));
        assert_eq!(timer.remaining(5), Duration::ZERO);
    }

    #[test]
    fn test_timer_waits_full_period() {
        let mut timer = CycleTimer::new(Duration::from_secs(2));
        timer.fire(10_000);
        assert!(!timer.is_due(11_999));
        assert_eq!(timer.remaining(11_500), Duration::from_millis(500));
        assert!(timer.is_due(12_000));
        assert_eq!(timer.remaining(13_000), Duration::ZERO);
    }

    #[test]
    fn test_timer_fires_at_once_after_long_pause() {
        let mut timer = CycleTimer::new(Duration::from_secs(3));
        timer.fire(0);
        assert!(timer.is_due(60_000));
        assert_eq!(timer.last_fire_ms(), Some(0));
    }

    #[test]
    fn test_start_emits_immediately() {
        let (scheduler, stream) = scheduler(true);
        let started = scheduler
            .start(&[
                CyclicPointInfo::new("id-1", "SpsTyp", "TS-1", 60),
                CyclicPointInfo::new("id-2", "DpsTyp", "TS-2", 60),
            ])
            .unwrap();
        assert_eq!(started, 2);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.task_count(), 2);

        let mut assets: Vec<String> = (0..2)
            .filter_map(|_| stream.recv_timeout(Duration::from_secs(2)))
            .map(|r| r.asset_name)
            .collect();
        assets.sort();
        assert_eq!(assets, vec!["TS-1".to_string(), "TS-2".to_string()]);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let (scheduler, _stream) = scheduler(true);
        scheduler.stop();
        scheduler
            .start(&[CyclicPointInfo::new("id-1", "SpsTyp", "TS-1", 3600)])
            .unwrap();

        let begin = Instant::now();
        scheduler.stop();
        assert!(begin.elapsed() < Duration::from_millis(500));
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_restart_replaces_group() {
        let (scheduler, _stream) = scheduler(false);
        scheduler
            .start(&[
                CyclicPointInfo::new("id-1", "SpsTyp", "TS-1", 1),
                CyclicPointInfo::new("id-2", "SpsTyp", "TS-2", 1),
            ])
            .unwrap();
        scheduler
            .start(&[CyclicPointInfo::new("id-3", "SpsTyp", "TS-3", 1)])
            .unwrap();
        assert_eq!(scheduler.task_count(), 1);

        assert_eq!(scheduler.start(&[]).unwrap(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_disabled_gate_suppresses_emission() {
        let (scheduler, stream) = scheduler(false);
        scheduler
            .start(&[CyclicPointInfo::new("id-1", "SpsTyp", "TS-1", 1)])
            .unwrap();
        assert!(stream.recv_timeout(Duration::from_millis(300)).is_none());

        scheduler.gate.set(true);
        assert!(stream.recv_timeout(Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_zero_period_gets_no_task() {
        let (scheduler, stream) = scheduler(true);
        let started = scheduler
            .start(&[
                CyclicPointInfo::new("id-0", "SpsTyp", "TS-0", 0),
                CyclicPointInfo::new("id-1", "SpsTyp", "TS-1", 3600),
            ])
            .unwrap();
        assert_eq!(started, 1);

        let first = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.asset_name, "TS-1");
        assert!(stream.recv_timeout(Duration::from_millis(200)).is_none());

        assert_eq!(scheduler.start(&[CyclicPointInfo::new("id-0", "SpsTyp", "TS-0", 0)]).unwrap(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_label_with_nul_byte_spawns() {
        let (scheduler, stream) = scheduler(true);
        scheduler
            .start(&[CyclicPointInfo::new("id-1", "SpsTyp", "TS\u{0}1", 3600)])
            .unwrap();
        let reading = stream.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(reading.asset_name, "TS\u{0}1");
        scheduler.stop();
    }

    #[test]
    fn test_unrenderable_point_ends_its_task() {
        let (scheduler, stream) = scheduler(true);
        scheduler
            .start(&[CyclicPointInfo::new("invalid", "invalid", "invalid", 1)])
            .unwrap();
        assert!(stream.recv_timeout(Duration::from_millis(300)).is_none());
        scheduler.stop();
    }
}
