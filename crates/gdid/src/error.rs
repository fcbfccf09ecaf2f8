//! Unified error type for the GDID allocation subsystem.
//!
//! Everything beneath the authority boundary (location I/O, transport,
//! timeouts) collapses into one [`Error`] at the generator API surface;
//! call-site policy decides whether a failed allocation is fatal or a
//! degraded mode. The enum is `Clone` so failures can also travel inside
//! [`GdidEvent`](crate::GdidEvent) payloads.

pub type Result<T> = core::result::Result<T, Error>;

/// All failures the allocation subsystem can surface.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A scope or sequence name failed validation. Raised synchronously,
    /// before any lock or network call.
    #[error("invalid sequence key: {reason}")]
    InvalidKey { reason: String },

    /// The transport reported a definite failure talking to an authority
    /// host. The call did not take effect.
    #[error("transport error calling authority host `{host}`: {context}")]
    Transport { host: String, context: String },

    /// An authority call exceeded its deadline. The outcome is
    /// *indeterminate*: the durable write may have committed, so any block
    /// tied to this call must be abandoned, never used.
    #[error("authority host `{host}` timed out after {millis}ms (outcome indeterminate)")]
    Timeout { host: String, millis: u64 },

    /// Every registered authority host for the scope was tried and failed,
    /// or none are registered.
    #[error("no usable authority host for scope `{scope}`")]
    HostsExhausted { scope: String },

    /// One location failed a read or write. Recovered internally by the
    /// redundancy policy; only surfaced when wrapping a total failure.
    #[error("location `{location}` failed: {context}")]
    Location { location: String, context: String },

    /// No configured location could produce the sequence state. Never
    /// defaulted to zero: a missing store must not look like a fresh
    /// sequence.
    #[error("sequence state for `{key}` unreadable from every location")]
    ReadTotalFailure { key: String },

    /// No configured location accepted the post-grant state, so the grant
    /// was withheld.
    #[error("sequence state for `{key}` unwritable to every location")]
    WriteTotalFailure { key: String },

    /// The era counter itself ran out; the sequence's ID space is spent.
    #[error("era space exhausted for `{key}`")]
    EraExhausted { key: String },

    /// The request was structurally valid but not servable (for example a
    /// batch larger than the authority's maximum block size).
    #[error("allocation rejected: {reason}")]
    Rejected { reason: String },
}
