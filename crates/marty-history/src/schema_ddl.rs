//! The four metadata tables, created once (idempotent) at startup.

pub const CREATE_MARTY_UPDATES: &str = "CREATE TABLE IF NOT EXISTS marty_updates(
    id BIGSERIAL PRIMARY KEY,
    time TIMESTAMP NOT NULL DEFAULT current_timestamp,
    mastertime TIMESTAMP NOT NULL
)";

pub const CREATE_MARTY_SCHEMAS: &str = "CREATE TABLE IF NOT EXISTS marty_schemas(
    _ctid tid NOT NULL,
    oid oid NOT NULL,
    name name NOT NULL,
    start bigint NOT NULL REFERENCES marty_updates(id),
    stop bigint REFERENCES marty_updates(id)
)";

pub const CREATE_MARTY_TABLES: &str = "CREATE TABLE IF NOT EXISTS marty_tables(
    _ctid tid NOT NULL,
    oid oid NOT NULL,
    name name NOT NULL,
    schema oid NOT NULL,
    internal_name name NOT NULL,
    start bigint NOT NULL REFERENCES marty_updates(id),
    stop bigint REFERENCES marty_updates(id)
)";

pub const CREATE_MARTY_COLUMNS: &str = "CREATE TABLE IF NOT EXISTS marty_columns(
    _ctid tid NOT NULL,
    table_oid oid NOT NULL,
    name name NOT NULL,
    number int2 NOT NULL,
    type name NOT NULL,
    length int4 NOT NULL,
    internal_name name NOT NULL,
    start bigint NOT NULL REFERENCES marty_updates(id),
    stop bigint REFERENCES marty_updates(id)
)";
