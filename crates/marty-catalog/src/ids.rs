use std::fmt;

/// A physical tuple identifier `(block, offset)` naming a row inside a
/// relation, as returned by Postgres' `ctid` system column.
///
/// `ctid`s are used as stable-enough identity for catalog versions: they
/// are unstable under `VACUUM FULL`, which this design assumes does not run
/// concurrently against the observed source (see the design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId {
    pub block: u32,
    pub offset: u16,
}

impl TupleId {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.block, self.offset)
    }
}

/// Error returned when a `ctid`'s `(block,offset)` text form can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTupleIdError(pub String);

impl fmt::Display for ParseTupleIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid tid literal: {}", self.0)
    }
}

impl std::error::Error for ParseTupleIdError {}

impl std::str::FromStr for TupleId {
    type Err = ParseTupleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| ParseTupleIdError(s.to_string()))?;
        let (block, offset) = inner.split_once(',').ok_or_else(|| ParseTupleIdError(s.to_string()))?;
        let block: u32 = block.parse().map_err(|_| ParseTupleIdError(s.to_string()))?;
        let offset: u16 = offset.parse().map_err(|_| ParseTupleIdError(s.to_string()))?;
        Ok(TupleId::new(block, offset))
    }
}

/// A Postgres `oid`: the logical identifier tables and columns use to
/// reference each other, distinct from the physical relation file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(pub u32);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u32> for Oid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A `marty_updates.id`: the temporal axis of the history store. Gap-free
/// over the range of applied source commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub i64);

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for UpdateId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_id_roundtrips_through_display_and_from_str() {
        let tid = TupleId::new(3, 7);
        assert_eq!(tid.to_string(), "(3,7)");
        assert_eq!("(3,7)".parse::<TupleId>().unwrap(), tid);
    }

    #[test]
    fn tuple_id_rejects_malformed_text() {
        assert!("3,7".parse::<TupleId>().is_err());
        assert!("(3)".parse::<TupleId>().is_err());
        assert!("(x,7)".parse::<TupleId>().is_err());
    }
}
