pub mod builder;
pub mod config;
pub mod copy;
pub mod copy_verify;
pub mod diff;
pub mod error;
pub mod hasher;
pub mod manifest;
pub mod paths;
pub mod reuse;
pub mod sidecar;
pub mod verify;

pub use error::{CpvError, Result};
