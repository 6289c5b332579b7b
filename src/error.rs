//! Custom error types for the application.
//!
//! Two error enums live here, both built with `thiserror`:
//!
//! - **`NodeError`**: raised while interpreting a single program node (a field is
//!   missing, a literal cannot be parsed, or a value is out of range). The interpreter
//!   catches these locally, reports them on the event log and carries on with the
//!   next sibling, so they never abort a run.
//! - **`BotError`**: everything surfaced by the library API outside of a run, such as
//!   configuration loading, program persistence and device address handling.
//!
//! Nothing in the library is fatal to the process. The worst outcome of any error
//! is a partially executed program, which the user recovers from by re-running or
//! issuing a stop.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, BotError>;

/// Failure while interpreting one program node.
///
/// `kind` is the block's display name and `field` the name of the offending field.
#[allow(missing_docs)]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    /// A required field has no value.
    #[error("{kind} block is missing its {field} field")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A field value could not be parsed.
    #[error("{kind} block has an invalid {field} value '{value}'")]
    InvalidLiteral {
        kind: &'static str,
        field: &'static str,
        value: String,
    },

    /// A numeric field is outside its allowed range.
    #[error("{kind} block {field} {value} is outside {min}..={max}")]
    OutOfRange {
        kind: &'static str,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A loop count is too small.
    #[error("{kind} block {field} {value} is below the minimum of {min}")]
    BelowMinimum {
        kind: &'static str,
        field: &'static str,
        value: f64,
        min: f64,
    },

    /// The block type is not one the interpreter can run.
    #[error("Unsupported block type '{type_name}'")]
    Unsupported { type_name: String },
}

/// Errors surfaced by the library API.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration could not be loaded or extracted.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but holds invalid values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A program could not be read or written as JSON.
    #[error("Program serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The robot address cannot be turned into a command URL.
    #[error("Invalid device address '{address}': {reason}")]
    InvalidAddress {
        /// The address as given.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Slot names are limited to ASCII letters, digits, `-` and `_`.
    #[error("Invalid program slot name '{0}' (use letters, digits, '-' or '_')")]
    InvalidSlot(String),

    /// Nothing has been saved under this slot.
    #[error("No saved program in slot '{0}'")]
    SlotNotFound(String),

    /// No built-in example has this name.
    #[error("Unknown example program '{0}'")]
    UnknownExample(String),
}
