//! Sound cycles: per-entity background performances
//!
//! Each cycle owns one worker thread that waits a random interval, then plays
//! its sound through the bound entity. At most one cycle exists per entity.
//!
//! ```text
//! RUNNING ──wait──> tick ──entity alive──> RUNNING
//!    │                └───entity gone────> TERMINATED
//!    └── stop / replaced / shutdown ─────> TERMINATED
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::Rng;

use super::entity::EntityId;
use super::output::PlaybackHandle;
use super::system::{Shared, SoundSystem};

/// Shortest allowed period bound of a sound cycle
pub const MIN_CYCLE_PERIOD: Duration = Duration::from_millis(1000);

/// What a cycle performs and how often
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub entity: EntityId,
    pub token: String,
    /// Upper bound of the random wait between performances
    pub period: Duration,
    pub vol_bot: i32,
    pub vol_top: i32,
    pub chance: i32,
    /// Lower bound of the wait; the sound's longest play length
    pub min_wait: Duration,
}

impl CyclePlan {
    /// Wait before the next performance
    fn next_wait(&self) -> Duration {
        let period_ms = self.period.as_millis().max(1) as u64;
        let random = Duration::from_millis(rand::thread_rng().gen_range(0..period_ms));
        self.min_wait.max(random)
    }
}

#[derive(Debug, Default)]
struct CycleState {
    running: bool,
    playing: Option<PlaybackHandle>,
}

/// Run state shared between a cycle's owner and its worker
#[derive(Debug, Default)]
struct CycleControl {
    state: Mutex<CycleState>,
}

impl CycleControl {
    fn running() -> Self {
        Self {
            state: Mutex::new(CycleState {
                running: true,
                playing: None,
            }),
        }
    }

    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Run one performance while still running and keep its handle
    ///
    /// Holds the state lock across `play`, so `terminate` either prevents the
    /// performance or waits for it and stops its line. Returns false once
    /// terminated.
    fn perform(&self, play: impl FnOnce() -> Option<PlaybackHandle>) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            return false;
        }
        state.playing = play();
        true
    }

    /// Stop the current performance and prevent further ticks
    fn terminate(&self) {
        let mut state = self.state.lock();
        state.running = false;
        if let Some(playing) = state.playing.take() {
            playing.stop();
        }
    }
}

/// A registered cycle as held by the table
struct SoundCycle {
    serial: u64,
    token: String,
    control: Arc<CycleControl>,
    cancel_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl SoundCycle {
    fn terminate(&self) {
        tracing::debug!("Terminating sound cycle: {}", self.token);
        self.control.terminate();
        // wake the worker if it is waiting
        let _ = self.cancel_tx.try_send(());
    }
}

/// Worker side of a cycle
struct CycleWorker {
    serial: u64,
    plan: CyclePlan,
    control: Arc<CycleControl>,
    cancel_rx: Receiver<()>,
    system: Weak<Shared>,
}

impl CycleWorker {
    fn run(self) {
        loop {
            match self.cancel_rx.recv_timeout(self.plan.next_wait()) {
                Err(RecvTimeoutError::Timeout) => {}
                // cancelled, or the cycle was dropped
                _ => break,
            }
            if !self.control.is_running() {
                break;
            }

            let Some(system) = SoundSystem::upgrade(&self.system) else {
                self.control.terminate();
                break;
            };

            match system.entities().resolve(self.plan.entity) {
                Some(entity) => {
                    let plan = &self.plan;
                    let performed = self.control.perform(|| {
                        entity
                            .play_sound(&system, &plan.token, plan.vol_bot, plan.vol_top, plan.chance)
                            .unwrap_or_else(|e| {
                                tracing::warn!("Sound cycle {} failed to play: {}", plan.token, e);
                                None
                            })
                    });
                    if !performed {
                        break;
                    }
                }
                None => {
                    tracing::debug!(
                        "Entity {} is gone, ending sound cycle {}",
                        self.plan.entity,
                        self.plan.token
                    );
                    system.cycles().remove_if_current(self.plan.entity, self.serial);
                    self.control.terminate();
                    break;
                }
            }
        }
    }
}

/// Table of active cycles, one per entity
#[derive(Default)]
pub struct CycleTable {
    cycles: Mutex<HashMap<EntityId, SoundCycle>>,
    next_serial: AtomicU64,
}

impl CycleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new cycle for `plan.entity`, terminating the one it replaces
    pub(crate) fn start(&self, plan: CyclePlan, system: Weak<Shared>) -> std::io::Result<()> {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let entity = plan.entity;
        let token = plan.token.clone();
        let control = Arc::new(CycleControl::running());
        let (cancel_tx, cancel_rx) = bounded(1);

        let worker = CycleWorker {
            serial,
            plan,
            control: Arc::clone(&control),
            cancel_rx,
            system,
        };

        let mut cycles = self.cycles.lock();
        if let Some(previous) = cycles.remove(&entity) {
            previous.terminate();
        }

        let handle = thread::Builder::new()
            .name(format!("sound-cycle-{token}"))
            .spawn(move || worker.run())?;

        cycles.insert(
            entity,
            SoundCycle {
                serial,
                token,
                control,
                cancel_tx,
                worker: Some(handle),
            },
        );
        Ok(())
    }

    /// Remove and terminate the cycle of `entity`, if any
    pub fn stop(&self, entity: EntityId) -> bool {
        let removed = self.cycles.lock().remove(&entity);
        match removed {
            Some(cycle) => {
                cycle.terminate();
                true
            }
            None => false,
        }
    }

    /// Deregister a cycle unless it was already replaced by a newer one
    fn remove_if_current(&self, entity: EntityId, serial: u64) {
        let mut cycles = self.cycles.lock();
        if cycles.get(&entity).is_some_and(|cycle| cycle.serial == serial) {
            cycles.remove(&entity);
        }
    }

    /// Terminate every cycle and wait for the workers to finish
    pub fn shutdown(&self) {
        let drained: Vec<SoundCycle> = {
            let mut cycles = self.cycles.lock();
            cycles.drain().map(|(_, cycle)| cycle).collect()
        };

        for cycle in &drained {
            cycle.terminate();
        }

        let current = thread::current().id();
        for mut cycle in drained {
            if let Some(worker) = cycle.worker.take() {
                if worker.thread().id() != current {
                    let _ = worker.join();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cycles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.cycles.lock().contains_key(&entity)
    }
}

impl Drop for CycleTable {
    fn drop(&mut self) {
        for cycle in self.cycles.get_mut().values() {
            cycle.terminate();
        }
    }
}
