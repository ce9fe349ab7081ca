use marty_catalog::{Schema, Table};
use marty_cli::HistoryArgs;
use marty_error::CloneError;
use tokio_postgres::Client;

use crate::ident::quote_ident;
use crate::sql;

const CREATE_MARTY_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS marty";
const CREATE_DBLINK_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS dblink";
const CREATE_BOOKKEEPING: &str = "CREATE TABLE marty.bookkeeping(
    view_name name UNIQUE,
    local_table name,
    cached boolean DEFAULT false,
    coldef text,
    remote_select_stmt text,
    temp_table_def text
)";

/// Builds the federated views in a clone database over a pinned history
/// snapshot: a `marty` bookkeeping schema plus, per table, a local overlay
/// table, a lazily-populated view backed by `dblink`, and the `INSTEAD OF`
/// triggers that route writes against the view into the overlay.
pub struct ClonePopulator {
    client: Client,
    update: i64,
}

impl ClonePopulator {
    pub fn new(client: Client, update: i64) -> Self {
        Self { client, update }
    }

    /// Creates the `marty` bookkeeping schema and the two plpgsql functions
    /// every generated view calls through: `coninfo()` (the `dblink`
    /// connection string to the history store) and `view_select()` (fetches
    /// a view's remote rows into its overlay table on first read, then
    /// serves from the cached copy).
    pub async fn initialize(&self, history: &HistoryArgs) -> Result<(), CloneError> {
        self.client.batch_execute(CREATE_MARTY_SCHEMA).await.map_err(CloneError::Database)?;
        self.client
            .batch_execute(CREATE_DBLINK_EXTENSION)
            .await
            .map_err(CloneError::Database)?;
        self.client.batch_execute(CREATE_BOOKKEEPING).await.map_err(CloneError::Database)?;

        let coninfo = dblink_connstr(history);
        let create_coninfo_fn = format!(
            "CREATE FUNCTION coninfo() RETURNS text AS $$
                BEGIN
                    RETURN '{coninfo}';
                END;
            $$ LANGUAGE plpgsql"
        );
        self.client.batch_execute(&create_coninfo_fn).await.map_err(CloneError::Database)?;

        self.client
            .batch_execute(CREATE_VIEW_SELECT_FN)
            .await
            .map_err(CloneError::Database)?;
        Ok(())
    }

    pub async fn create_schema(&self, schema: &Schema) -> Result<(), CloneError> {
        tracing::info!(name = %schema.name, "creating schema");
        let ident = quote_ident(&schema.name)?;
        self.client
            .batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {ident}"))
            .await
            .map_err(CloneError::Database)?;
        Ok(())
    }

    /// Materialises one table's overlay/view/trigger set. `table.columns`
    /// must already be populated (via [`crate::HistoryInspector::columns`]).
    pub async fn create_table(&self, table: &Table) -> Result<(), CloneError> {
        tracing::info!(name = %table.long_name(), "creating federated view");

        self.client
            .batch_execute(&sql::create_overlay_table(table)?)
            .await
            .map_err(CloneError::Database)?;
        let table_oid_row = self
            .client
            .query_one(sql::LOOKUP_RELATION_OID, &[&table.internal_name()])
            .await
            .map_err(CloneError::Database)?;
        let table_oid: u32 = table_oid_row.get(0);
        for column in &table.columns {
            self.client
                .execute(sql::FIX_TYPE_MODIFIER, &[&column.type_modifier, &table_oid, &column.name])
                .await
                .map_err(CloneError::Database)?;
        }

        self.client
            .batch_execute(&sql::create_federated_view(table)?)
            .await
            .map_err(CloneError::Database)?;

        let coldef = sql::column_list(table)?;
        let remote_select_stmt = sql::remote_select_stmt(table, self.update);
        let temp_table_def = sql::temp_table_def(table)?;
        let local_table = format!("marty.{}", table.internal_name());
        self.client
            .execute(
                sql::insert_bookkeeping_row(),
                &[&table.long_name(), &local_table, &coldef, &remote_select_stmt, &temp_table_def],
            )
            .await
            .map_err(CloneError::Database)?;

        self.client
            .batch_execute(&sql::instead_of_triggers(table)?)
            .await
            .map_err(CloneError::Database)?;
        Ok(())
    }
}

const CREATE_VIEW_SELECT_FN: &str = "CREATE FUNCTION view_select(my_view_name text) RETURNS SETOF RECORD AS $$
    DECLARE
        view_info RECORD;
    BEGIN
        SELECT * FROM marty.bookkeeping WHERE view_name = my_view_name INTO view_info;
        IF NOT view_info.cached THEN
            RAISE NOTICE 'fetching %', view_info.view_name;
            EXECUTE 'INSERT INTO ' || view_info.local_table ||
                    ' SELECT ' || view_info.coldef ||
                    ' FROM dblink(''' || coninfo() || ''', ''' || view_info.remote_select_stmt || ''')' ||
                    ' AS ' || view_info.temp_table_def;
            UPDATE marty.bookkeeping SET cached = true WHERE view_name = my_view_name;
        END IF;
        RETURN QUERY EXECUTE 'SELECT ' || view_info.coldef || ' FROM ' || view_info.local_table;
    END;
$$ LANGUAGE plpgsql";

fn dblink_connstr(history: &HistoryArgs) -> String {
    let mut parts = vec![
        format!("host={}", history.history_host),
        format!("port={}", history.history_port),
        format!("user={}", history.history_user),
        format!("dbname={}", history.history_database),
    ];
    if let Some(password) = &history.history_password {
        parts.push(format!("password={password}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dblink_connstr_omits_password_when_absent() {
        let args = HistoryArgs {
            history_host: "h".to_string(),
            history_port: 5432,
            history_user: "u".to_string(),
            history_password: None,
            history_database: "d".to_string(),
        };
        assert_eq!(dblink_connstr(&args), "host=h port=5432 user=u dbname=d");
    }
}
