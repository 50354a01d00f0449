//! Command implementations for conduit-cli

pub mod install;
pub mod list;
pub mod remove;
pub mod verify;

pub use install::{InstallOptions, run_install};
pub use list::run_list;
pub use remove::run_remove;
pub use verify::run_verify;
