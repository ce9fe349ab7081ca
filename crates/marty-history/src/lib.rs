//! # History Store
//!
//! Owns the history database: the four `marty_*` metadata tables tracking
//! catalog versions, and one `data_*` table per captured relation holding
//! versioned row data. Every write is issued through a transaction scoped
//! to a single drained source commit (see [`HistoryStore::open_update`]).

mod ident;
mod schema_ddl;
mod sql;
mod store;

pub use ident::quote_ident;
pub use store::{HistoryStore, HistoryTxn};
