//! Shared test utilities for the Conduit workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`stubs`]: in-process installer, detector, probe and output sink
//! - [`workspace`]: [`TestWorkspace`](workspace::TestWorkspace) project
//!   directory with a fake `composer` script

pub mod stubs;
pub mod workspace;

pub use stubs::{RecordingSink, StubDetector, StubInstaller, StubProbe};
pub use workspace::{FakeComposer, TestWorkspace};
