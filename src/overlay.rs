//! Latest renderable boxes, shared between the analysis worker and the
//! renderer.
//!
//! `OverlayState` holds one immutable snapshot behind an `Arc`. `publish`
//! builds a complete new snapshot and swaps the pointer; `current` clones the
//! pointer. The lock only guards the pointer swap, so a reader can never
//! observe a half-written list or a mix of two generations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::geometry::Rect;

/// How the renderer should color a box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorClass {
    PrimarySubject,
    Other,
}

/// One box in display-surface pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayBox {
    pub rect: Rect,
    pub label: String,
    pub score: f32,
    pub color_class: ColorClass,
}

impl DisplayBox {
    /// Caption in the renderer's format, e.g. `person 0.87`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.score)
    }
}

/// One published generation of boxes.
#[derive(Debug, Default)]
pub struct OverlaySnapshot {
    /// 0 for the initial empty snapshot, then +1 per publish.
    pub generation: u64,
    pub boxes: Vec<DisplayBox>,
}

/// Single-slot holder of the latest `OverlaySnapshot`.
#[derive(Debug)]
pub struct OverlayState {
    slot: RwLock<Arc<OverlaySnapshot>>,
    closed: AtomicBool,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Arc::new(OverlaySnapshot::default())),
            closed: AtomicBool::new(false),
        }
    }

    /// Replace the published list wholesale. Returns the new generation, or
    /// `None` once the overlay has been closed.
    pub fn publish(&self, boxes: Vec<DisplayBox>) -> Option<u64> {
        let mut slot = self.write_slot();
        // Checked under the write lock; `close` flips the flag under the same lock.
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let generation = slot.generation + 1;
        *slot = Arc::new(OverlaySnapshot { generation, boxes });
        Some(generation)
    }

    /// Latest complete snapshot.
    pub fn current(&self) -> Arc<OverlaySnapshot> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.current().generation
    }

    /// Refuse all further publishes. Readers keep the last snapshot.
    ///
    /// Once this returns, no publish that raced with it can still land.
    pub fn close(&self) {
        let _slot = self.write_slot();
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Arc<OverlaySnapshot>> {
        match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new()
    }
}
