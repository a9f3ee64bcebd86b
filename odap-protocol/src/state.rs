//! Transfer state machine
//!
//! Enforces the strict phase ordering of a transfer session. Every phase
//! requires the session to sit in exactly one predecessor state and moves it
//! to exactly one successor state.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol phase (one request/ack round trip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Transfer initialization
    Initiation,
    /// Transfer commence
    Commence,
    /// Lock evidence exchange
    LockEvidence,
    /// Commit preparation
    CommitPreparation,
    /// Commit final
    CommitFinal,
    /// Transfer complete
    Complete,
}

impl Phase {
    /// All phases in protocol order
    pub const ALL: [Phase; 6] = [
        Phase::Initiation,
        Phase::Commence,
        Phase::LockEvidence,
        Phase::CommitPreparation,
        Phase::CommitFinal,
        Phase::Complete,
    ];

    /// State the session must be in before this phase's request is accepted.
    /// `None` for initiation, which creates the session.
    pub fn required_state(&self) -> Option<TransferState> {
        match self {
            Phase::Initiation => None,
            Phase::Commence => Some(TransferState::Initialized),
            Phase::LockEvidence => Some(TransferState::Commenced),
            Phase::CommitPreparation => Some(TransferState::Locked),
            Phase::CommitFinal => Some(TransferState::Prepared),
            Phase::Complete => Some(TransferState::Finalized),
        }
    }

    /// State the session reaches once this phase is acknowledged
    pub fn reached_state(&self) -> TransferState {
        match self {
            Phase::Initiation => TransferState::Initialized,
            Phase::Commence => TransferState::Commenced,
            Phase::LockEvidence => TransferState::Locked,
            Phase::CommitPreparation => TransferState::Prepared,
            Phase::CommitFinal => TransferState::Finalized,
            Phase::Complete => TransferState::Completed,
        }
    }

    /// Operation name used in audit records
    pub fn operation(&self) -> &'static str {
        match self {
            Phase::Initiation => "validate",
            Phase::Commence => "commence",
            Phase::LockEvidence => "lock",
            Phase::CommitPreparation => "prepare",
            Phase::CommitFinal => "final",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initiation => "Initiation",
            Phase::Commence => "Commence",
            Phase::LockEvidence => "LockEvidence",
            Phase::CommitPreparation => "CommitPreparation",
            Phase::CommitFinal => "CommitFinal",
            Phase::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Transfer session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TransferState {
    /// Initialization acknowledged
    #[default]
    Initialized = 1,
    /// Commence acknowledged
    Commenced = 2,
    /// Lock evidence acknowledged
    Locked = 3,
    /// Commit preparation acknowledged
    Prepared = 4,
    /// Commit final acknowledged
    Finalized = 5,
    /// Transfer complete acknowledged
    Completed = 6,

    /// Aborted and compensated
    Reverted = 20,
}

impl TransferState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;

        matches!(
            (self, next),
            // Forward flow
            | (Initialized, Commenced)
            | (Commenced, Locked)
            | (Locked, Prepared)
            | (Prepared, Finalized)
            | (Finalized, Completed)

            // Abort paths
            | (Initialized, Reverted)
            | (Commenced, Reverted)
            | (Locked, Reverted)
            | (Prepared, Reverted)
            | (Finalized, Reverted)
        )
    }

    /// Check if state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed | TransferState::Reverted)
    }

    /// Whether a request for `phase` arrives too late: the session already
    /// acknowledged that phase or is terminal.
    pub fn has_passed(&self, phase: Phase) -> bool {
        self.is_terminal() || (*self as u8) >= (phase.reached_state() as u8)
    }
}

/// State machine for transfer enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMachine {
    current: TransferState,
}

impl StateMachine {
    /// Create new state machine at the initial state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state machine at specific state
    pub fn at_state(state: TransferState) -> Self {
        Self { current: state }
    }

    /// Get current state
    pub fn current(&self) -> TransferState {
        self.current
    }

    /// Transition to next state
    pub fn transition(&mut self, next: TransferState) -> Result<()> {
        if self.current.is_terminal() {
            return Err(Error::InvalidStateTransition {
                from: format!("{:?}", self.current),
                to: format!("{:?}", next),
                reason: "current state is terminal".to_string(),
            });
        }

        if !self.current.can_transition_to(next) {
            return Err(Error::InvalidStateTransition {
                from: format!("{:?}", self.current),
                to: format!("{:?}", next),
                reason: "transition not allowed by state machine".to_string(),
            });
        }

        self.current = next;
        Ok(())
    }
}
