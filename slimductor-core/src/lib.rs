//! Slimductor core library: session registry and orchestrator election.
//!
//! Public API surface:
//! - [`types`]: [`SessionEntry`], [`SessionId`], [`Role`]
//! - [`store`]: [`EntryStore`] with the directory-backed and in-memory stores
//! - [`liveness`]: [`LivenessOracle`] and the OS-backed probe
//! - [`role`]: pure election rules for one project domain
//! - [`registry`]: [`Registry`]: register / deregister / set_role / check / list
//! - [`config`], [`identity`], [`paths`]: home layout, YAML config, caller identity
//! - [`error`]: [`RegistryError`]

pub mod config;
pub mod error;
pub mod identity;
pub mod liveness;
pub mod paths;
pub mod registry;
pub mod role;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::RegistryError;
pub use liveness::{LivenessOracle, OsLiveness};
pub use registry::{Registration, Registry, Summary, SummaryRow};
pub use store::{DirStore, EntryStore, MemoryStore};
pub use types::{Role, SessionEntry, SessionId};
