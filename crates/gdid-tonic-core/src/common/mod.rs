//! Shared wire-level pieces for the GDID allocation service.
//!
//! ## Submodules
//!
//! - [`client`] - `AllocationClient` implementation over a tonic channel.
//! - [`error`] - Conversions between `gdid::Error` and `tonic::Status`.
//! - [`proto`] - Generated service and message types for `gdid.proto`.

pub mod client;
pub mod error;

/// gRPC service and message definitions generated from `proto/gdid.proto`.
pub mod proto {
    tonic::include_proto!("gdid");
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("gdid_descriptor");
}
