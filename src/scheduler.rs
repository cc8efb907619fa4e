//! Keep-only-latest frame scheduling.
//!
//! One dedicated worker thread owns the heavy stages. `submit` never blocks:
//! if the worker is idle the frame is handed over through a one-slot
//! channel, otherwise it is dropped on the spot and its release hook runs.
//! At most one frame is ever in flight, so throughput is bounded by cycle
//! latency and staleness by one cycle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context, Result};

use crate::frame::RawFrame;

/// What happened to a submitted frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the worker.
    Accepted,
    /// A cycle was active (or the worker still starting); frame released.
    Dropped,
    /// No camera is bound; nothing is processed.
    Inert,
    /// The scheduler has been shut down.
    Closed,
}

/// Result of one processing cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The overlay was replaced; carries the new overlay generation.
    Published(u64),
    /// The frame was abandoned without touching the overlay.
    Skipped(String),
}

/// One processing cycle, run on the worker thread.
pub trait FrameProcessor: Send + 'static {
    fn process(&mut self, frame: RawFrame) -> CycleOutcome;
}

impl<F> FrameProcessor for F
where
    F: FnMut(RawFrame) -> CycleOutcome + Send + 'static,
{
    fn process(&mut self, frame: RawFrame) -> CycleOutcome {
        self(frame)
    }
}

/// Counter snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub completed: u64,
    pub published: u64,
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    accepted: AtomicU64,
    dropped: AtomicU64,
    completed: AtomicU64,
    published: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct FrameScheduler {
    name: String,
    tx: Option<SyncSender<RawFrame>>,
    busy: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    counters: Arc<Counters>,
    join: Option<JoinHandle<()>>,
}

impl FrameScheduler {
    /// Start the worker thread. `init` runs on the worker before the first
    /// frame is accepted; frames submitted until it returns are dropped.
    pub fn spawn<I, P>(name: &str, init: I) -> Result<Self>
    where
        I: FnOnce() -> P + Send + 'static,
        P: FrameProcessor,
    {
        let (tx, rx) = mpsc::sync_channel::<RawFrame>(1);
        let busy = Arc::new(AtomicBool::new(true));
        let live = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            rx,
            busy: busy.clone(),
            live: live.clone(),
            counters: counters.clone(),
        };
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker.run(init))
            .with_context(|| format!("failed to spawn worker thread '{}'", name))?;

        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            busy,
            live,
            counters,
            join: Some(join),
        })
    }

    /// Hand a frame to the worker if it is idle, otherwise drop it.
    /// Never blocks.
    pub fn submit(&self, frame: RawFrame) -> SubmitOutcome {
        Counters::bump(&self.counters.submitted);
        if !self.live.load(Ordering::Acquire) {
            return SubmitOutcome::Closed;
        }
        let Some(tx) = self.tx.as_ref() else {
            return SubmitOutcome::Closed;
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            Counters::bump(&self.counters.dropped);
            log::trace!("{}: cycle active, dropping frame ts={:?}", self.name, frame.timestamp);
            return SubmitOutcome::Dropped;
        }
        match tx.try_send(frame) {
            Ok(()) => {
                Counters::bump(&self.counters.accepted);
                SubmitOutcome::Accepted
            }
            Err(TrySendError::Full(frame)) => {
                Counters::bump(&self.counters.dropped);
                log::trace!("{}: hand-off slot full, dropping frame ts={:?}", self.name, frame.timestamp);
                SubmitOutcome::Dropped
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("{}: worker is gone; scheduler closed", self.name);
                self.live.store(false, Ordering::Release);
                SubmitOutcome::Closed
            }
        }
    }

    /// True while a cycle is running or the worker is still initializing.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot()
    }

    /// Stop accepting frames, let the current cycle finish, and join the
    /// worker.
    pub fn shutdown(mut self) -> Result<()> {
        self.live.store(false, Ordering::Release);
        self.tx = None;
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("{} worker thread panicked", self.name))?;
        }
        log::debug!("{}: stopped ({:?})", self.name, self.counters.snapshot());
        Ok(())
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        // The worker exits on its own once the sender is gone.
        self.live.store(false, Ordering::Release);
    }
}

struct Worker {
    rx: Receiver<RawFrame>,
    busy: Arc<AtomicBool>,
    live: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Worker {
    fn run<I, P>(self, init: I)
    where
        I: FnOnce() -> P,
        P: FrameProcessor,
    {
        let mut processor = init();
        self.busy.store(false, Ordering::Release);

        while let Ok(frame) = self.rx.recv() {
            if !self.live.load(Ordering::Acquire) {
                break;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| processor.process(frame)))
                .unwrap_or_else(|_| CycleOutcome::Skipped("processing cycle panicked".to_string()));

            Counters::bump(&self.counters.completed);
            match outcome {
                CycleOutcome::Published(generation) => {
                    Counters::bump(&self.counters.published);
                    log::trace!("cycle published overlay generation {}", generation);
                }
                CycleOutcome::Skipped(reason) => {
                    Counters::bump(&self.counters.skipped);
                    log::debug!("cycle skipped: {}", reason);
                }
            }
            self.busy.store(false, Ordering::Release);
        }
        self.busy.store(false, Ordering::Release);
    }
}
