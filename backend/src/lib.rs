//! Interactive ghc-mod session client.
//!
//! One long-lived `ghc-mod legacy-interactive` subprocess runs per
//! project. Commands are written to its stdin and replies read back
//! using the line-prefix framing (`O: ` output, `X: ` errors, `O: OK`
//! terminator). Raw reply text is translated into typed diagnostic and
//! symbol records for the editor integration.

pub mod config;
pub mod launch;
pub mod registry;
pub mod session;
pub mod translate;

pub(crate) mod drain;

mod backend;

pub use backend::{GhcModBackend, SearchType};
pub use config::BackendConfig;
pub use launch::{LaunchError, Launcher};
pub use registry::SessionRegistry;
pub use session::{RawReply, Session};
