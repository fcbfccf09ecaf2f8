//! Mapping between the core allocation errors and gRPC status codes.
//!
//! The server collapses every allocation failure into a `Status` with a
//! code that preserves the caller-relevant distinction: invalid input,
//! indeterminate timeout, unavailable durable store, or internal fault. The
//! client maps statuses back into `gdid::Error` so generator-side policy
//! (failover, breaker, abandonment) works identically over the wire and
//! in-process.

use gdid::Error;
use tonic::{Code, Status};

/// Converts an allocation failure into the `Status` returned to gRPC
/// callers.
pub fn error_to_status(error: &Error) -> Status {
    match error {
        Error::InvalidKey { reason } => Status::invalid_argument(reason.clone()),
        Error::Rejected { reason } => Status::invalid_argument(reason.clone()),
        Error::Timeout { .. } => Status::deadline_exceeded(error.to_string()),
        Error::Transport { .. }
        | Error::HostsExhausted { .. }
        | Error::ReadTotalFailure { .. }
        | Error::WriteTotalFailure { .. } => Status::unavailable(error.to_string()),
        Error::EraExhausted { .. } => Status::resource_exhausted(error.to_string()),
        _ => Status::internal(error.to_string()),
    }
}

/// Converts a `Status` received from an authority endpoint back into the
/// core error taxonomy.
///
/// Everything that is not clearly a rejected request is treated as a
/// transport-level failure of this endpoint attempt; the registry's
/// breaker and failover logic take it from there.
pub fn status_to_error(host: &str, status: &Status) -> Error {
    match status.code() {
        Code::InvalidArgument => Error::Rejected {
            reason: status.message().to_string(),
        },
        Code::ResourceExhausted => Error::Rejected {
            reason: status.message().to_string(),
        },
        _ => Error::Transport {
            host: host.to_string(),
            context: format!("{}: {}", status.code(), status.message()),
        },
    }
}
