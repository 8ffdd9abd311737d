//! I/O and construction layer: an in-memory [`GroundTarget`](ground_core::GroundTarget)
//! sink and a programmatic [`Database`](ground_core::Database) builder.
//! Parsing an on-disk program format is out of scope — callers construct a
//! [`DatabaseBuilder`] directly, the way `ground_cli`'s demo program does.

pub mod builder;
pub mod target;

pub use builder::{CompiledDatabase, DatabaseBuilder};
pub use target::{find_named, GroundFormula};
