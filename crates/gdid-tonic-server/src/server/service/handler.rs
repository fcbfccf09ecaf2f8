//! gRPC service implementation for GDID block allocation.
//!
//! [`AuthorityService`] is the concrete implementation of the
//! [`GdidAuthority`] service from the protobuf specification. It validates
//! incoming requests, delegates to the [`Authority`] allocation engine
//! (per-sequence serialization, redundant location I/O, era promotion), and
//! maps allocation failures onto gRPC status codes.

use crate::server::location::FileLocation;
use gdid::{Authority, SequenceKey};
use gdid_tonic_core::error::error_to_status;
use gdid_tonic_core::proto::{
    AllocateBlockRequest, AllocateBlockResponse, gdid_authority_server::GdidAuthority,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// gRPC front end for one authority shard.
#[derive(Clone)]
pub struct AuthorityService {
    authority: Arc<Authority<FileLocation>>,
}

impl AuthorityService {
    pub fn new(authority: Arc<Authority<FileLocation>>) -> Self {
        Self { authority }
    }
}

#[tonic::async_trait]
impl GdidAuthority for AuthorityService {
    /// Handles one block allocation.
    ///
    /// Name validation happens before the per-sequence critical section is
    /// entered; a grant is only returned once its post-grant state is
    /// durable on at least one location, so a lost reply can never lead to
    /// a re-issued counter.
    #[tracing::instrument(skip_all, fields(
        scope = %req.get_ref().scope,
        sequence = %req.get_ref().sequence,
        requested = req.get_ref().requested_size,
    ))]
    async fn allocate_block(
        &self,
        req: Request<AllocateBlockRequest>,
    ) -> Result<Response<AllocateBlockResponse>, Status> {
        let msg = req.into_inner();
        let key =
            SequenceKey::new(msg.scope, msg.sequence).map_err(|e| error_to_status(&e))?;

        let grant = self
            .authority
            .allocate_block(&key, msg.requested_size)
            .await
            .map_err(|e| error_to_status(&e))?;

        Ok(Response::new(AllocateBlockResponse {
            era: grant.era,
            authority: u32::from(grant.authority),
            start: grant.start,
            count: grant.count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdid::{AuthorityConfig, NullSink};

    fn service(dir: &std::path::Path) -> AuthorityService {
        let authority = Arc::new(
            Authority::new(
                AuthorityConfig::new(5),
                vec![FileLocation::new(dir)],
                Arc::new(NullSink),
            )
            .unwrap(),
        );
        AuthorityService::new(authority)
    }

    fn request(scope: &str, sequence: &str, requested_size: u64) -> Request<AllocateBlockRequest> {
        Request::new(AllocateBlockRequest {
            scope: scope.into(),
            sequence: sequence.into(),
            requested_size,
        })
    }

    #[tokio::test]
    async fn grants_are_disjoint_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let first = svc
            .allocate_block(request("sky", "sky_log", 100))
            .await
            .unwrap()
            .into_inner();
        let second = svc
            .allocate_block(request("sky", "sky_log", 100))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(first.authority, 5);
        // Default minimum block is 1024, so the 100-requests round up.
        assert_eq!(first.start, 0);
        assert_eq!(first.count, 1024);
        assert_eq!(second.start, 1024);

        // A fresh service over the same location resumes, never resets.
        let reopened = service(dir.path());
        let third = reopened
            .allocate_block(request("sky", "sky_log", 100))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(third.start, 2048);
    }

    #[tokio::test]
    async fn invalid_names_are_rejected_synchronously() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());

        let status = svc
            .allocate_block(request("sky", "no spaces", 10))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        // Nothing was created for the rejected key.
        assert!(!dir.path().join("sky").exists());
    }
}
