use crate::battle::phase::Phase;
use crate::battler::BattlerId;
use thiserror::Error;

/// Main error type for the battle engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BattleEngineError {
    /// Error related to loading or looking up database records
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// Error related to invalid battle state
    #[error("Battle state error: {0}")]
    BattleState(#[from] BattleStateError),
    /// Error related to invalid host requests
    #[error("Action error: {0}")]
    Action(#[from] ActionError),
}

/// Errors related to database operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    /// A data file could not be read
    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },
    /// A data file could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    /// The requested record does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },
}

/// Errors related to battle state validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BattleStateError {
    /// A battle operation was called before `setup`
    #[error("No battle has been set up")]
    NotSetUp,
    /// A phase change that the transition table does not allow
    #[error("Illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition { from: Phase, to: Phase },
    /// The battler id does not refer to a member of the party or troop
    #[error("Unknown battler {0:?}")]
    UnknownBattler(BattlerId),
    /// The operation is not available in the current phase
    #[error("Operation not allowed during {0:?}")]
    WrongPhase(Phase),
}

/// Errors related to host requests
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// No actor is currently choosing a command
    #[error("No actor is inputting a command")]
    NotInputting,
    /// Escape was requested in a battle that forbids it
    #[error("Escape is not allowed in this battle")]
    EscapeForbidden,
    /// The action has no skill or item to use
    #[error("Action has no skill or item")]
    NoItem,
}

/// Type alias for Results using BattleEngineError
pub type BattleResult<T> = Result<T, BattleEngineError>;

/// Type alias for Results using DataError
pub type DataResult<T> = Result<T, DataError>;
