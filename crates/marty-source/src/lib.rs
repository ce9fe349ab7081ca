//! # Source Inspector
//!
//! Queries the source replica — in autocommit mode, so every query observes
//! whatever state recovery is paused at — for catalog metadata and row
//! data. Owns the process-lifetime `relation_file_node -> Table` index used
//! by the capture engine to resolve redo records to tracked tables.

mod connect;
mod inspector;
mod lookup;
mod sql;

pub use connect::connect;
pub use inspector::SourceInspector;
pub use lookup::Lookup;
