use crate::ids::{Oid, TupleId};

/// A non-system namespace on the source (or its mirrored catalog-version
/// row in the history store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub ctid: TupleId,
    pub oid: Oid,
    pub name: String,
}

impl Schema {
    pub fn new(ctid: TupleId, oid: Oid, name: impl Into<String>) -> Self {
        Self {
            ctid,
            oid,
            name: name.into(),
        }
    }
}
