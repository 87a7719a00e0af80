// src/engine/state.rs

//! Pure phase bookkeeping for a backup run.
//!
//! No IO happens here; the orchestrator reports each transition and this
//! module checks it against the allowed ordering and records the history.

use tracing::{debug, warn};

use super::Phase;

impl Phase {
    /// Whether `next` may directly follow `self`.
    ///
    /// Teardown (`Unmounting`) may start from any primary phase, since it runs
    /// whether or not that phase succeeded.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;

        if next == Aborted {
            return !matches!(self, Done | Aborted);
        }
        match self {
            Idle => next == Locking,
            Locking => matches!(next, Provisioning | Mounting),
            Provisioning => matches!(next, Mounting | Unmounting),
            Mounting => matches!(next, Archiving | Unmounting),
            Archiving => next == Unmounting,
            Unmounting => next == Destroying,
            Destroying => next == Done,
            Done | Aborted => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Aborted)
    }
}

/// Phase history of one run, plus the cancellation overlay.
#[derive(Debug, Clone)]
pub struct RunState {
    history: Vec<Phase>,
    cancel_requested: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            history: vec![Phase::Idle],
            cancel_requested: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Record a transition. Out-of-order transitions are logged and still
    /// recorded, so the history reflects what actually happened.
    pub fn advance(&mut self, next: Phase) {
        let current = self.phase();
        if !current.can_advance_to(next) {
            warn!(from = ?current, to = ?next, "unexpected phase transition");
        } else {
            debug!(from = ?current, to = ?next, "phase transition");
        }
        self.history.push(next);
    }

    pub fn mark_cancel_requested(&mut self) {
        self.cancel_requested = true;
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// Whether the run passed through `phase`.
    pub fn visited(&self, phase: Phase) -> bool {
        self.history.contains(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Phase::*;

    #[test]
    fn happy_path_is_valid() {
        let path = [
            Idle,
            Locking,
            Provisioning,
            Mounting,
            Archiving,
            Unmounting,
            Destroying,
            Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn existing_snapshots_skip_provisioning() {
        assert!(Locking.can_advance_to(Mounting));
    }

    #[test]
    fn failures_jump_to_teardown_or_abort() {
        assert!(Provisioning.can_advance_to(Unmounting));
        assert!(Mounting.can_advance_to(Unmounting));
        assert!(Locking.can_advance_to(Aborted));
        assert!(Unmounting.can_advance_to(Aborted));
        assert!(Destroying.can_advance_to(Aborted));
    }

    #[test]
    fn teardown_cannot_be_skipped_or_reordered() {
        assert!(!Archiving.can_advance_to(Destroying));
        assert!(!Archiving.can_advance_to(Done));
        assert!(!Destroying.can_advance_to(Unmounting));
    }

    #[test]
    fn terminal_phases_are_final() {
        for next in [Idle, Locking, Done, Aborted] {
            assert!(!Done.can_advance_to(next));
            assert!(!Aborted.can_advance_to(next));
        }
        assert!(Done.is_terminal() && Aborted.is_terminal());
    }

    #[test]
    fn run_state_records_history_and_cancel_overlay() {
        let mut state = RunState::new();
        assert_eq!(state.phase(), Idle);
        state.advance(Locking);
        state.advance(Aborted);
        assert_eq!(state.history(), &[Idle, Locking, Aborted]);
        assert!(state.visited(Locking));
        assert!(!state.visited(Provisioning));

        assert!(!state.cancel_requested());
        state.mark_cancel_requested();
        assert!(state.cancel_requested());
    }
}
