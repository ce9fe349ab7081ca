use std::error::Error;

use bytes::BytesMut;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};

/// A single column value carried as its raw wire encoding, tagged with the
/// Postgres type it was read as.
///
/// The capture engine never decodes user-table values into Rust types: it
/// only needs to move a row from the source connection to the history
/// connection unchanged. Capturing the binary encoding via [`FromSql`] and
/// replaying it verbatim via [`ToSql`] avoids hand-rolling a decoder for
/// every Postgres type the source might use, at the cost of requiring the
/// destination column to have the identical type (true here, since the
/// history store's data tables are created with the source's own column
/// types).
#[derive(Debug, Clone)]
pub struct RawValue {
    pg_type: Type,
    bytes: Option<Vec<u8>>,
}

impl RawValue {
    pub fn pg_type(&self) -> &Type {
        &self.pg_type
    }

    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }
}

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawValue {
            pg_type: ty.clone(),
            bytes: Some(raw.to_vec()),
        })
    }

    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawValue {
            pg_type: ty.clone(),
            bytes: None,
        })
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for RawValue {
    fn to_sql(&self, _ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.bytes {
            Some(bytes) => {
                out.extend_from_slice(bytes);
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
