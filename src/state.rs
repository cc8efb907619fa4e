//! Pipeline lifecycle flag.
//!
//! `StateCell` stores `PipelineState` in a single atomic and only permits the
//! legal transitions:
//!
//! - `Uninitialized -> Ready` (model loaded)
//! - `Uninitialized -> ModelUnavailable` (model failed to load)
//! - `Ready -> Disabled` (unrecoverable engine fault)
//!
//! `ModelUnavailable` and `Disabled` are terminal for the engine instance.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PipelineState {
    #[default]
    Uninitialized,
    Ready,
    ModelUnavailable,
    Disabled,
}

impl PipelineState {
    fn to_u8(self) -> u8 {
        match self {
            PipelineState::Uninitialized => 0,
            PipelineState::Ready => 1,
            PipelineState::ModelUnavailable => 2,
            PipelineState::Disabled => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Ready,
            2 => PipelineState::ModelUnavailable,
            3 => PipelineState::Disabled,
            _ => PipelineState::Uninitialized,
        }
    }

    /// True when the host should show a degraded-mode indicator.
    pub fn is_degraded(self) -> bool {
        matches!(
            self,
            PipelineState::ModelUnavailable | PipelineState::Disabled
        )
    }

    /// No transition leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::ModelUnavailable | PipelineState::Disabled
        )
    }

    fn can_become(self, next: PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Uninitialized, PipelineState::Ready)
                | (PipelineState::Uninitialized, PipelineState::ModelUnavailable)
                | (PipelineState::Ready, PipelineState::Disabled)
        )
    }
}

/// Atomic lifecycle flag with transition observers.
#[derive(Debug, Default)]
pub struct StateCell {
    state: AtomicU8,
    observers: Mutex<Vec<Sender<PipelineState>>>,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Attempt a transition. Returns false (and changes nothing) when the
    /// transition is not legal from the current state.
    pub fn transition(&self, next: PipelineState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !PipelineState::from_u8(current).can_become(next) {
                return false;
            }
            match self.state.compare_exchange(
                current,
                next.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        log::info!(
            "pipeline state: {:?} -> {:?}",
            PipelineState::from_u8(current),
            next
        );
        self.notify(next);
        true
    }

    /// Receive every future transition. The current state is sent first.
    ///
    /// In a terminal state nothing is registered and the receiver
    /// disconnects after that first message.
    pub fn subscribe(&self) -> Receiver<PipelineState> {
        let (tx, rx) = mpsc::channel();
        // Holding the observer lock while reading means a concurrent
        // transition is either seen here or delivered afterwards.
        let mut observers = match self.observers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = self.get();
        let _ = tx.send(current);
        if !current.is_terminal() {
            observers.push(tx);
        }
        rx
    }

    fn notify(&self, next: PipelineState) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.retain(|tx| tx.send(next).is_ok());
            if next.is_terminal() {
                observers.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_only() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), PipelineState::Uninitialized);
        assert!(!cell.transition(PipelineState::Disabled));
        assert!(cell.transition(PipelineState::Ready));
        assert!(!cell.transition(PipelineState::ModelUnavailable));
        assert!(cell.transition(PipelineState::Disabled));
        assert!(!cell.transition(PipelineState::Ready));
        assert_eq!(cell.get(), PipelineState::Disabled);
    }

    #[test]
    fn model_unavailable_is_terminal() {
        let cell = StateCell::new();
        assert!(cell.transition(PipelineState::ModelUnavailable));
        assert!(!cell.transition(PipelineState::Ready));
        assert!(!cell.transition(PipelineState::Disabled));
        assert!(cell.get().is_degraded());
    }

    #[test]
    fn terminal_state_registers_no_observers() {
        let cell = StateCell::new();
        assert!(cell.transition(PipelineState::ModelUnavailable));
        for _ in 0..100 {
            let rx = cell.subscribe();
            assert_eq!(rx.recv(), Ok(PipelineState::ModelUnavailable));
            assert!(rx.recv().is_err());
        }
        assert!(cell.observers.lock().unwrap().is_empty());
    }

    #[test]
    fn observers_are_dropped_on_reaching_terminal_state() {
        let cell = StateCell::new();
        let rx = cell.subscribe();
        assert!(cell.transition(PipelineState::Ready));
        assert_eq!(cell.observers.lock().unwrap().len(), 1);
        assert!(cell.transition(PipelineState::Disabled));
        assert!(cell.observers.lock().unwrap().is_empty());
        let seen: Vec<_> = rx.iter().collect();
        assert_eq!(
            seen,
            vec![
                PipelineState::Uninitialized,
                PipelineState::Ready,
                PipelineState::Disabled
            ]
        );
    }

    #[test]
    fn observers_see_current_then_transitions() {
        let cell = StateCell::new();
        let rx = cell.subscribe();
        cell.transition(PipelineState::Ready);
        cell.transition(PipelineState::Disabled);
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                PipelineState::Uninitialized,
                PipelineState::Ready,
                PipelineState::Disabled
            ]
        );
    }
}
