#![doc = include_str!("../README.md")]

mod authority;
mod client;
mod error;
mod event;
mod generator;
mod id;
mod location;
mod registry;

pub use authority::{Authority, AuthorityConfig};
pub use client::AllocationClient;
pub use error::{Error, Result};
pub use event::{EventSink, GdidEvent, NullSink, TracingSink};
pub use generator::{GdidGenerator, GeneratorConfig};
pub use id::{BlockGrant, Gdid, MAX_COUNTER, SequenceKey, SequenceState};
pub use location::{Location, MemoryLocation};
pub use registry::{AuthorityHostRegistry, RegistryConfig};
