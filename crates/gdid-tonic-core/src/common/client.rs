//! `AllocationClient` over a tonic channel.

use crate::error::status_to_error;
use crate::proto::{AllocateBlockRequest, gdid_authority_client::GdidAuthorityClient};
use gdid::{AllocationClient, BlockGrant, Error, Result, SequenceKey};
use tonic::transport::{Channel, Endpoint};

/// One remote authority endpoint, usable wherever the core crate expects an
/// [`AllocationClient`] (typically registered in an
/// [`AuthorityHostRegistry`](gdid::AuthorityHostRegistry)).
///
/// The wrapped tonic client multiplexes over a single HTTP/2 channel and is
/// cheap to clone per call.
#[derive(Clone)]
pub struct GrpcAuthorityClient {
    host: String,
    inner: GdidAuthorityClient<Channel>,
}

impl GrpcAuthorityClient {
    /// Connects to `addr` (e.g. `http://10.0.0.5:50051`).
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let host = addr.into();
        let endpoint = Endpoint::from_shared(host.clone()).map_err(|e| Error::Transport {
            host: host.clone(),
            context: e.to_string(),
        })?;
        let channel = endpoint.connect().await.map_err(|e| Error::Transport {
            host: host.clone(),
            context: e.to_string(),
        })?;
        Ok(Self::with_channel(host, channel))
    }

    /// Wraps an already-established channel; `host` is only used for error
    /// and event attribution.
    pub fn with_channel(host: impl Into<String>, channel: Channel) -> Self {
        Self {
            host: host.into(),
            inner: GdidAuthorityClient::new(channel),
        }
    }
}

impl AllocationClient for GrpcAuthorityClient {
    async fn allocate_block(&self, key: &SequenceKey, requested_size: u64) -> Result<BlockGrant> {
        let mut client = self.inner.clone();
        let response = client
            .allocate_block(AllocateBlockRequest {
                scope: key.scope().to_string(),
                sequence: key.sequence().to_string(),
                requested_size,
            })
            .await
            .map_err(|status| status_to_error(&self.host, &status))?
            .into_inner();

        let authority = u16::try_from(response.authority).map_err(|_| Error::Transport {
            host: self.host.clone(),
            context: format!("authority shard {} out of range", response.authority),
        })?;

        Ok(BlockGrant {
            era: response.era,
            authority,
            start: response.start,
            count: response.count,
        })
    }
}
