//! Transport seam between generators and authorities.

use crate::error::Result;
use crate::id::{BlockGrant, SequenceKey};
use std::future::Future;
use std::sync::Arc;

/// A synchronous-call-with-timeout view of one authority endpoint.
///
/// The generator side of the protocol only ever needs this single
/// operation; framing, connection management, and low-level retries belong
/// to the implementation. The gRPC client in `gdid-tonic-core` implements
/// this over a tonic channel, and [`Arc<Authority<L>>`](crate::Authority)
/// implements it directly for in-process wiring.
pub trait AllocationClient: Send + Sync + 'static {
    /// Requests a fresh counter block of at least `requested_size` for
    /// `key`.
    fn allocate_block(
        &self,
        key: &SequenceKey,
        requested_size: u64,
    ) -> impl Future<Output = Result<BlockGrant>> + Send;
}

impl<C: AllocationClient> AllocationClient for Arc<C> {
    fn allocate_block(
        &self,
        key: &SequenceKey,
        requested_size: u64,
    ) -> impl Future<Output = Result<BlockGrant>> + Send {
        C::allocate_block(self, key, requested_size)
    }
}
