//! ## Custom errors
//!
//! All fallible operations in this crate return `IrTreeError` rather than panicking,
//! except where a mismatch is a programming error at the call site (see `geometry`).
//! Per the error-handling design: configuration and shape errors are raised before any
//! state change; storage errors are fatal to the operation in progress; missing-document
//! and missing-cluster conditions surface here too rather than aborting the IR-tree build.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors raised by the R-tree engine, the IR-tree builder and the top-k search.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub enum IrTreeError {
    /// An invalid property value or combination was supplied when constructing a tree.
    Configuration {
        /// Human-readable explanation of what was invalid.
        reason: String,
    },
    /// A geometric operation was given an argument of the wrong dimension.
    Shape {
        /// The dimension the operation expected.
        expected_dim: usize,
        /// The dimension that was actually found.
        found_dim: usize,
    },
    /// The page store reported an unrecoverable failure (IO error, etc).
    Storage {
        /// Human-readable explanation of the failure.
        reason: String,
    },
    /// The page store was asked to load or delete a page identifier it does not know.
    InvalidPage {
        /// The offending page identifier.
        page: i64,
    },
    /// The IR-tree builder could not find the terms for a leaf document.
    MissingDocument {
        /// The document identifier that could not be resolved.
        doc_id: u64,
    },
    /// The cluster-enhanced IR-tree builder could not resolve a document's cluster.
    MissingCluster {
        /// The document identifier whose cluster could not be resolved.
        doc_id: u64,
    },
}

impl fmt::Display for IrTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrTreeError::Configuration { reason } => {
                write!(f, "invalid configuration: {reason}")
            }
            IrTreeError::Shape {
                expected_dim,
                found_dim,
            } => {
                write!(
                    f,
                    "shape error: expected dimension {expected_dim}, found {found_dim}"
                )
            }
            IrTreeError::Storage { reason } => write!(f, "storage error: {reason}"),
            IrTreeError::InvalidPage { page } => write!(f, "invalid page identifier: {page}"),
            IrTreeError::MissingDocument { doc_id } => {
                write!(f, "missing document terms for doc {doc_id}")
            }
            IrTreeError::MissingCluster { doc_id } => {
                write!(f, "missing cluster assignment for doc {doc_id}")
            }
        }
    }
}

impl Error for IrTreeError {}
