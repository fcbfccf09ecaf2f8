#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access `gdid` via
// `gdid_tonic_core::gdid`
pub use gdid;
