//! # Catalog Model
//!
//! In-memory description of the schemas, tables and columns observed on the
//! source database, plus the naming rules used to project them onto the
//! history store's per-version data tables.
//!
//! Identity in this module is always the source's own identity: a `ctid`
//! (the physical tuple identifier of the row in the source's catalog
//! relation) for matching DDL redo records, and an `oid` for catalog
//! cross-references (see the relation-file-node-vs-oid note in the top
//! level design docs).

mod ids;
mod raw_value;
mod schema;
mod table;

pub use ids::{Oid, TupleId, UpdateId};
pub use raw_value::RawValue;
pub use schema::Schema;
pub use table::{Column, InternalColumn, Table};
