use marty_catalog::{Oid, TupleId};

/// Point-lookup key used to resolve a catalog row observed in a DDL redo
/// record back to its full [`marty_catalog::Schema`]/[`marty_catalog::Table`]/[`marty_catalog::Column`].
#[derive(Debug, Clone, Copy)]
pub enum Lookup {
    Ctid(TupleId),
    Oid(Oid),
}
