//! CLI error types.

use std::{io, path::PathBuf};

use sealpipe_core::{ProcedureError, Rejection};
use sealpipe_proto::ProtocolError;
use thiserror::Error;

/// Errors reported by the `sealpipe` binary.
#[derive(Error, Debug)]
pub enum CliError {
    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An input file is not valid JSON of the expected shape.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A route in the routes file has an invalid configuration.
    #[error("route {route}: {source}")]
    InvalidRoute {
        /// Offending route id
        route: String,
        /// Validation failure
        #[source]
        source: ProcedureError,
    },

    /// Two routes in the routes file share a slug.
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),

    /// The command needs `--routes` and none was given.
    #[error("this command needs --routes")]
    RoutesRequired,

    /// Command-line input is not usable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Descriptor document rejected on parse.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Core operation failed.
    #[error(transparent)]
    Procedure(#[from] ProcedureError),

    /// The gateway rejected the request. Details are in the debug log.
    #[error("request rejected: {0}")]
    Rejected(Rejection),

    /// Writing output failed.
    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),

    /// Serializing output failed.
    #[error("cannot serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<Rejection> for CliError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}
