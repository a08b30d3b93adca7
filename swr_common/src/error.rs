// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported to callers of the pipeline.

use crate::routine::{RoutineError, Stage};
use thiserror::Error;

/// Errors that can occur while configuring the pipeline or submitting work to it.
///
/// None of these are reported once a draw call has been handed to the workers: every
/// check happens synchronously before any task is published.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A routine could not be generated for the resolved configuration.
    ///
    /// The draw call was abandoned and no pixels were written.
    #[error("Out of memory while generating the {stage} routine: {reason}")]
    OutOfMemory {
        /// The pipeline stage whose routine failed to generate.
        stage: Stage,
        /// Why generation failed.
        reason: String,
    },
    /// The bound state cannot be drawn with, for example an enabled vertex attribute
    /// without a source.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// The pipeline configuration is out of its supported bounds.
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be started.
    #[error("Couldn't spawn worker thread")]
    WorkerSpawn(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidOperation`].
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

impl From<RoutineError> for Error {
    fn from(error: RoutineError) -> Self {
        Self::OutOfMemory {
            stage: error.stage,
            reason: error.reason,
        }
    }
}

/// A specialized `Result` type for pipeline operations.
pub type Result<T, E = Error> = core::result::Result<T, E>;
