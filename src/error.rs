//! Error types used by the viewvisor runtime and task sources.
//!
//! This module defines two main error enums:
//!
//! - [`PresenterError`] — configuration/misuse errors raised by the presenter
//!   plumbing itself (factory lookup, provider access order).
//! - [`TaskError`] — errors raised by individual task executions.
//!
//! The two never mix: a [`TaskError`] always surfaces as an `Error`
//! notification delivered to the consumer callbacks (it is never returned
//! from registry methods), while a [`PresenterError`] is always returned
//! immediately to the caller and never flows through the notification
//! machinery.

use thiserror::Error;

/// # Errors produced by the presenter plumbing.
///
/// These represent configuration mistakes, not runtime conditions: an
/// unregistered presenter type or an access before [`prepare`] was called.
/// They are surfaced to the caller and must not be swallowed.
///
/// [`prepare`]: crate::PresenterProvider::prepare
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PresenterError {
    /// No factory was registered for the requested presenter type.
    #[error("no factory registered for presenter type {type_name}")]
    NotProvided {
        /// Type name of the presenter that could not be resolved.
        type_name: &'static str,
    },

    /// The provider was asked for its presenter before `prepare()` ran.
    #[error("prepare() must be called before accessing the presenter")]
    NotPrepared,
}

impl PresenterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use viewvisor::PresenterError;
    ///
    /// assert_eq!(PresenterError::NotPrepared.as_label(), "presenter_not_prepared");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PresenterError::NotProvided { .. } => "presenter_not_provided",
            PresenterError::NotPrepared => "presenter_not_prepared",
        }
    }
}

/// # Errors produced by task execution.
///
/// A task source finishes with exactly one terminal signal; when that signal
/// is a failure it is one of these variants, wrapped in an `Error`
/// notification and replayed to consumers like any other notification.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The source panicked; the panic was caught at the pump boundary.
    #[error("source panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// Task was cancelled before producing its terminal signal.
    #[error("task cancelled")]
    Canceled,
}

impl TaskError {
    /// Creates a [`TaskError::Fail`] from any displayable error.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use viewvisor::TaskError;
    ///
    /// let err = TaskError::fail("boom");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns true if the task was cancelled rather than failing on its own.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}
