//! Error taxonomy for the engine crate.
//!
//! Compile-time grammar errors get their own enum since `compile` must never
//! partially commit a buffer, while everything else that can cross a public
//! API boundary funnels through `EngineError`.

use thiserror::Error;

/// Errors produced while parsing source text into a node list (§4.2, §6.4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown type name '{0}'")]
    UnknownType(String),

    #[error("empty type name")]
    EmptyName,

    #[error("unexpected character at position {0}")]
    InvalidCharacter(usize),

    #[error("unbalanced ']' with no matching '[' at position {0}")]
    UnbalancedChildren(usize),

    #[error("source ends with unclosed '['")]
    UnclosedChildren,
}

/// Top-level error type for everything the engine exposes beyond parsing.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A byte buffer handed to a codec accessor was not produced by this
    /// crate's compiler, or has been corrupted (out-of-bounds offset, bad
    /// tag byte, etc). The compiler itself never produces one of these.
    #[error("invalid compiled buffer: {0}")]
    InvalidBuffer(String),

    /// A node's `type_idx` has no corresponding entry in the `TypeRegistry`
    /// passed to `prepare`/`enqueue` — only reachable if a buffer compiled
    /// against one registry is stepped against another.
    #[error("no task type registered for type index {0}")]
    UnknownTaskType(i16),
}
