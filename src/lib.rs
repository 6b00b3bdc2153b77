//! Query and control system services without caring which init system the
//! host runs.
//!
//! [`init::select`] inspects the host once and returns an
//! [`InitManager`](init::InitManager) backed by systemd (over D-Bus) or
//! OpenRC (through `rc-service`/`rc-update`). Everything after that goes
//! through the trait.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod init;
pub mod pattern;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use init::{detect, select, InitKind, InitManager};
pub use service::InitService;
