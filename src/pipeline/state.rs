//! Pipeline states and the processing guard

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

/// When the pipeline accepts input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineState {
    /// Waiting for the wake signal
    Idle,
    /// Accumulating transcripts; a final one is processed
    ListeningForCommand,
    /// Exactly one utterance in flight; new input is ignored
    ProcessingCommand,
    /// A flagged intent waits for a yes/no answer
    AwaitingConfirmation,
}

impl PipelineState {
    /// States in which a final transcript is accepted
    pub fn accepts_transcripts(&self) -> bool {
        matches!(
            self,
            PipelineState::ListeningForCommand | PipelineState::AwaitingConfirmation
        )
    }
}

/// Shared state cell. The lock is never held across an await.
#[derive(Debug)]
pub struct StateCell {
    inner: Mutex<PipelineState>,
}

impl StateCell {
    pub fn new(initial: PipelineState) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> PipelineState {
        *self.lock()
    }

    pub fn set(&self, next: PipelineState) {
        let mut state = self.lock();
        if *state != next {
            tracing::debug!("Pipeline {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Move `from` to `to` only if currently in `from`
    pub fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        let mut state = self.lock();
        if *state == from {
            tracing::debug!("Pipeline {:?} -> {:?}", from, to);
            *state = to;
            true
        } else {
            false
        }
    }

    /// Claim the single processing slot. Returns the previous state, or
    /// `None` when an utterance is already in flight.
    pub fn begin_processing(&self, fallback_state: PipelineState) -> Option<ProcessingGuard<'_>> {
        let mut state = self.lock();
        if *state == PipelineState::ProcessingCommand {
            return None;
        }
        let previous = *state;
        tracing::debug!("Pipeline {:?} -> ProcessingCommand", previous);
        *state = PipelineState::ProcessingCommand;
        Some(ProcessingGuard {
            cell: self,
            previous,
            next: fallback_state,
        })
    }
}

/// Holds `ProcessingCommand`; leaving scope always releases it
pub struct ProcessingGuard<'a> {
    cell: &'a StateCell,
    previous: PipelineState,
    next: PipelineState,
}

impl ProcessingGuard<'_> {
    pub fn previous(&self) -> PipelineState {
        self.previous
    }

    /// State to enter when the guard is dropped
    pub fn release_to(&mut self, next: PipelineState) {
        self.next = next;
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected() {
        let cell = StateCell::new(PipelineState::ListeningForCommand);
        let guard = cell.begin_processing(PipelineState::Idle).unwrap();
        assert_eq!(guard.previous(), PipelineState::ListeningForCommand);
        assert!(cell.begin_processing(PipelineState::Idle).is_none());
        drop(guard);
        assert_eq!(cell.get(), PipelineState::Idle);
    }

    #[test]
    fn test_release_to_overrides_state() {
        let cell = StateCell::new(PipelineState::Idle);
        {
            let mut guard = cell.begin_processing(PipelineState::Idle).unwrap();
            guard.release_to(PipelineState::AwaitingConfirmation);
        }
        assert_eq!(cell.get(), PipelineState::AwaitingConfirmation);
    }

    #[test]
    fn test_transition_requires_source_state() {
        let cell = StateCell::new(PipelineState::Idle);
        assert!(!cell.transition(PipelineState::ListeningForCommand, PipelineState::Idle));
        assert!(cell.transition(PipelineState::Idle, PipelineState::ListeningForCommand));
        assert_eq!(cell.get(), PipelineState::ListeningForCommand);
    }
}
