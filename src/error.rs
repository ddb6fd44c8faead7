//! Crate-wide error taxonomy (spec §7).
//!
//! Each variant here corresponds to one entry of the error taxonomy, except
//! `Infeasible`: per spec §4.3/§7 it is reported, not raised, so it is
//! carried as data on [`crate::routing::RoutingReport`] rather than as an
//! `Error` variant. Configuration and topology errors abort the operation
//! that raised them and carry the offending token or XPath.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building, routing, serializing or regenerating a network.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration XML is absent, malformed, or uses an unrecognized unit.
    #[error("bad configuration at {path}: {reason}")]
    BadConfig {
        /// XPath-ish location of the offending element.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The topology description does not close, has a link-count mismatch, a
    /// self-loop, or an unknown link category.
    #[error("bad topology description: {0}")]
    BadTopology(String),

    /// The regeneration cannot succeed even after exhausting degradation.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    /// The solver subprocess itself could not be run (distinct from it simply
    /// not producing an output file, which is the normal degradation trigger).
    #[error("solver failed to run `{program}`: {reason}")]
    SolverFailure {
        /// Path or name of the solver binary.
        program: PathBuf,
        /// Underlying reason (e.g. `io::Error` message).
        reason: String,
    },

    /// Wrapped I/O error, e.g. reading a configuration or writing an artifact.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped XML parse error from the configuration/artifact reader.
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// Wrapped XML serialization error from the artifact writer.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::DeError),
}

impl Error {
    /// Build a [`Error::BadConfig`] for a missing or malformed element.
    pub fn bad_config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BadConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
