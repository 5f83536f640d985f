//! Recording workflow state machine.
//!
//! One process-wide [`StateMachine`] is the single source of truth for what
//! phase the pipeline is in.  Transitions go through a guarded adjacency
//! table; anything not in the table is rejected with a log line rather than
//! an error, because forbidden requests are almost always duplicate or
//! late-arriving gestures (a second hotkey release, a cancel after the
//! pipeline already errored) that should simply be ignored.
//!
//! ```text
//! Idle ─────────▶ Recording
//! Recording ────▶ Stopping | Cancelled | Error
//! Stopping ─────▶ Transcribing | Cancelled | Error
//! Transcribing ─▶ Injecting | Cancelled | Error
//! Injecting ────▶ Complete | Error
//! Complete, Cancelled, Error ─▶ Idle
//! ```
//!
//! Subscribers receive every accepted transition over an unbounded channel,
//! so a slow consumer can never hold up the transition itself.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Phase of the recording pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// Ready for a new recording; initial and terminal state.
    Idle,
    /// Microphone is live and accumulating samples.
    Recording,
    /// Stop requested; the capture session is being finalized.
    Stopping,
    /// Artifact handed to the recognizer; bounded only by the watchdog.
    Transcribing,
    /// Recognized text is being delivered to the active application.
    Injecting,
    Complete,
    Cancelled,
    Error,
}

impl WorkflowState {
    /// Whether the adjacency table permits moving from `self` to `target`.
    fn allows(self, target: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, target),
            (Idle, Recording)
                | (Recording, Stopping)
                | (Recording, Cancelled)
                | (Recording, Error)
                | (Stopping, Transcribing)
                | (Stopping, Cancelled)
                | (Stopping, Error)
                | (Transcribing, Injecting)
                | (Transcribing, Error)
                | (Transcribing, Cancelled)
                | (Injecting, Complete)
                | (Injecting, Error)
                | (Complete, Idle)
                | (Cancelled, Idle)
                | (Error, Idle)
        )
    }
}

/// One accepted transition, as delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: WorkflowState,
    pub to: WorkflowState,
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// Guarded workflow state with transition notifications.
///
/// # Example
///
/// ```rust
/// use whisperkey::workflow::{StateMachine, WorkflowState};
///
/// let fsm = StateMachine::new();
/// assert!(fsm.try_transition(WorkflowState::Recording));
/// assert!(!fsm.try_transition(WorkflowState::Transcribing)); // must stop first
/// assert_eq!(fsm.current(), WorkflowState::Recording);
/// ```
pub struct StateMachine {
    inner: Mutex<Inner>,
}

struct Inner {
    current: WorkflowState,
    previous: WorkflowState,
    entered_at: Instant,
    subscribers: Vec<mpsc::UnboundedSender<StateChange>>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: WorkflowState::Idle,
                previous: WorkflowState::Idle,
                entered_at: Instant::now(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Current workflow phase.
    pub fn current(&self) -> WorkflowState {
        self.inner.lock().unwrap().current
    }

    /// The state before the last accepted transition.
    pub fn previous(&self) -> WorkflowState {
        self.inner.lock().unwrap().previous
    }

    /// How long the machine has been in the current state.
    pub fn elapsed_in_state(&self) -> Duration {
        self.inner.lock().unwrap().entered_at.elapsed()
    }

    /// Attempt a transition to `target`.
    ///
    /// Returns `false` and logs when the adjacency table forbids the move;
    /// the state is left untouched.  Accepted transitions record the
    /// previous state and entry time, then notify subscribers (an unbounded
    /// send, so a slow subscriber cannot block this call).
    pub fn try_transition(&self, target: WorkflowState) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.current.allows(target) {
            log::warn!(
                "rejected workflow transition {:?} -> {target:?}",
                inner.current
            );
            return false;
        }

        let change = StateChange {
            from: inner.current,
            to: target,
        };
        inner.previous = inner.current;
        inner.current = target;
        inner.entered_at = Instant::now();
        log::debug!("workflow {:?} -> {target:?}", change.from);

        inner.subscribers.retain(|tx| tx.send(change).is_ok());
        true
    }

    /// Unconditionally force the machine back to `Idle`.
    ///
    /// Recovery escape hatch for disposal and for rapid repeated gestures
    /// that left a terminal state unconsumed.  Subscribers are notified only
    /// if the state actually changed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.current == WorkflowState::Idle {
            return;
        }

        let change = StateChange {
            from: inner.current,
            to: WorkflowState::Idle,
        };
        log::debug!("workflow reset from {:?}", change.from);
        inner.previous = inner.current;
        inner.current = WorkflowState::Idle;
        inner.entered_at = Instant::now();
        inner.subscribers.retain(|tx| tx.send(change).is_ok());
    }

    /// Register a transition listener.
    ///
    /// Every accepted transition (and every effective [`reset`]) after this
    /// call is delivered in order.
    ///
    /// [`reset`]: StateMachine::reset
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(tx);
        rx
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: WorkflowState) {
        let mut inner = self.inner.lock().unwrap();
        inner.previous = inner.current;
        inner.current = state;
        inner.entered_at = Instant::now();
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
