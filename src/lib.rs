//! Protection engine for Minecraft-family server hosts.
//!
//! Two independent subsystems share a spatial-lookup core:
//!
//! - [`locker`] protects single blocks, multi-block structures and entities
//!   with owned locks, per-user access lists, passwords and KeyBook
//!   credential items.
//! - [`protector`] overlays named world regions carrying tri-state
//!   permission matrices (build, use, damage, spawn, move) that are folded
//!   into a single decision per gameplay event.
//!
//! The engine is host-agnostic: the server runtime delivers cancellable
//! events (see [`events`]) and provides permission checks and messaging
//! through the traits in [`host`]. All in-memory state is mutated
//! synchronously on the caller's thread; sled persistence catches up through
//! the background writer in [`db_operations`].

pub mod config;
pub mod db_operations;
pub mod error;
pub mod events;
pub mod host;
pub mod locker;
pub mod logging;
pub mod math;
pub mod protector;

pub use config::BlockwardConfig;
pub use error::{BlockwardError, BlockwardResult};
pub use events::Cancellable;
pub use host::{Feedback, HostContext, Messenger, PermissionProvider, PlayerDirectory};
pub use locker::manager::LockManager;
pub use protector::manager::RegionManager;
pub use protector::tristate::Tristate;
