//! Filesystem layer for Conduit
//!
//! Provides the two primitives the component registry is built on:
//! atomic whole-file writes and cross-process advisory locks.

pub mod error;
pub mod io;
pub mod lock;

pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use lock::FileLock;
