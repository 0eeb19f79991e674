use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "rosterd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS polling_units(
            id TEXT PRIMARY KEY,
            ward_id TEXT NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            registered_count INTEGER NOT NULL DEFAULT 0,
            accredited_count INTEGER NOT NULL DEFAULT 0,
            UNIQUE(ward_id, code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_polling_units_ward ON polling_units(ward_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS voters(
            id TEXT PRIMARY KEY,
            polling_unit_id TEXT NOT NULL,
            name TEXT NOT NULL,
            external_id TEXT NOT NULL,
            gender TEXT NOT NULL,
            birth_year TEXT NOT NULL,
            ref_index INTEGER NOT NULL,
            FOREIGN KEY(polling_unit_id) REFERENCES polling_units(id)
        )",
        [],
    )?;

    // Older workspaces predate portraits and row timestamps.
    ensure_voters_image_url(conn)?;
    ensure_voters_updated_at(conn)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_voters_unit ON voters(polling_unit_id)",
        [],
    )?;
    // Not UNIQUE: the repair pass has to be able to load rosters that
    // picked up duplicate positions.
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_voters_unit_ref ON voters(polling_unit_id, ref_index)",
        [],
    )?;

    Ok(())
}

fn ensure_voters_image_url(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "voters", "image_url")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE voters ADD COLUMN image_url TEXT", [])?;
    Ok(())
}

fn ensure_voters_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "voters", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE voters ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
pub(crate) fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_voters_table_gains_image_and_timestamp_columns() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute(
            "CREATE TABLE voters(
                id TEXT PRIMARY KEY,
                polling_unit_id TEXT NOT NULL,
                name TEXT NOT NULL,
                external_id TEXT NOT NULL,
                gender TEXT NOT NULL,
                birth_year TEXT NOT NULL,
                ref_index INTEGER NOT NULL
            )",
            [],
        )
        .expect("legacy table");
        assert!(!table_has_column(&conn, "voters", "image_url").unwrap());

        init_schema(&conn).expect("migrate");
        assert!(table_has_column(&conn, "voters", "image_url").unwrap());
        assert!(table_has_column(&conn, "voters", "updated_at").unwrap());

        // Idempotent on an already-migrated database.
        init_schema(&conn).expect("migrate again");
    }
}
