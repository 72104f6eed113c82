// ==============================================================================
// scheduler.rs — THE SINGLE TICK SOURCE
// ------------------------------------------------------------------------------
// One TickScheduler owns one simulation behind Arc<Mutex<_>> and drives it from
// at most one tokio interval task:
// - start(): spawns the loop, returns a watch::Receiver of post-tick snapshots.
//   Fails with AlreadyRunning while a loop is alive.
// - stop(): signals the loop and waits for it to exit. Safe to call twice.
// - dropping the scheduler aborts the loop.
//
// dt is measured with tokio's clock between ticks; clamping is the
// simulation's job. Hosts feed input by locking simulation() between ticks,
// never mid-tick.
// ==============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::controller::DriveSimulation;
use crate::error::SchedulerError;
use crate::flight::FlightSimulation;
use crate::snapshot::{FlightSnapshot, VehicleSnapshot};

/// Anything a host loop can step and observe.
pub trait Simulated: Send + 'static {
    type Snapshot: Clone + Send + Sync + 'static;

    fn advance(&mut self, dt: f32);
    fn snapshot(&self) -> Self::Snapshot;
}

impl Simulated for DriveSimulation {
    type Snapshot = VehicleSnapshot;

    fn advance(&mut self, dt: f32) {
        DriveSimulation::advance(self, dt);
    }

    fn snapshot(&self) -> VehicleSnapshot {
        DriveSimulation::snapshot(self)
    }
}

impl Simulated for FlightSimulation {
    type Snapshot = FlightSnapshot;

    fn advance(&mut self, dt: f32) {
        FlightSimulation::advance(self, dt);
    }

    fn snapshot(&self) -> FlightSnapshot {
        FlightSimulation::snapshot(self)
    }
}

struct RunningLoop {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct TickScheduler<S: Simulated> {
    sim: Arc<Mutex<S>>,
    period: Duration,
    running: Option<RunningLoop>,
}

impl<S: Simulated> TickScheduler<S> {
    pub fn new(sim: S, tick_hz: u32) -> Result<Self, SchedulerError> {
        if tick_hz == 0 {
            return Err(SchedulerError::InvalidTickRate(tick_hz));
        }
        Ok(Self {
            sim: Arc::new(Mutex::new(sim)),
            period: Duration::from_secs_f64(1.0 / f64::from(tick_hz)),
            running: None,
        })
    }

    /// Shared handle for input and reads between ticks.
    pub fn simulation(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.sim)
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    pub async fn start(&mut self) -> Result<watch::Receiver<S::Snapshot>, SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let initial = self.sim.lock().await.snapshot();
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let sim = Arc::clone(&self.sim);
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let dt = now.duration_since(last).as_secs_f32();
                        last = now;

                        let snapshot = {
                            let mut sim = sim.lock().await;
                            sim.advance(dt);
                            sim.snapshot()
                        };
                        // keeps ticking with no observers
                        snapshot_tx.send_replace(snapshot);
                    }
                }
            }
            debug!("tick loop exited");
        });

        info!("tick loop started at {:.1} Hz", 1.0 / period.as_secs_f64());
        self.running = Some(RunningLoop { shutdown: shutdown_tx, task });
        Ok(snapshot_rx)
    }

    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        // the loop may already be gone; either way we wait for the task
        let _ = running.shutdown.send(());
        if let Err(err) = running.task.await {
            if err.is_panic() {
                error!("tick loop panicked: {err}");
            }
        }
        info!("tick loop stopped");
    }
}

impl<S: Simulated> Drop for TickScheduler<S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}
