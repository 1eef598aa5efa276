//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    // Create migrations table if it doesn't exist
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    // Get current version
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    // Run migrations
    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- BATCHES (lotes)
        -- One fermentation run from preparation to completion
        -- ============================================
        CREATE TABLE batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            creation_date TEXT NOT NULL,         -- ISO date: "2025-07-01"
            yeast TEXT NOT NULL DEFAULT '',      -- yeast strain, e.g., "EC-1118"

            -- Must composition, stored as entered (free-form numeric text,
            -- may be empty or use a decimal comma)
            pulp_mass_kg TEXT NOT NULL DEFAULT '',
            pulp_brix TEXT NOT NULL DEFAULT '',
            water_volume_l TEXT NOT NULL DEFAULT '',
            ph TEXT NOT NULL DEFAULT '',

            -- Pre-fermentation adjustments, same storage convention
            added_sugar_kg TEXT NOT NULL DEFAULT '',
            initial_sg TEXT NOT NULL DEFAULT '',
            initial_brix TEXT NOT NULL DEFAULT '',
            initial_temp_c TEXT NOT NULL DEFAULT '',

            status TEXT NOT NULL CHECK(status IN ('preparing', 'fermenting', 'completed')) DEFAULT 'preparing',

            -- Metadata
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_batches_name ON batches(name);
        CREATE INDEX idx_batches_status ON batches(status);

        -- ============================================
        -- BATCH INGREDIENTS
        -- Ingredient usages embedded in a batch; the name is a soft
        -- reference into inventory_items (matched by name only)
        -- ============================================
        CREATE TABLE batch_ingredients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            position INTEGER NOT NULL DEFAULT 0, -- preserves entry order
            name TEXT NOT NULL,
            quantity TEXT NOT NULL DEFAULT '',   -- free-form numeric text
            unit TEXT NOT NULL DEFAULT 'g',

            -- Metadata
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_batch_ingredients_batch ON batch_ingredients(batch_id);

        -- ============================================
        -- FERMENTATION LOG
        -- Dated readings per batch; ordering key is date
        -- ============================================
        CREATE TABLE fermentation_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
            date TEXT NOT NULL,                  -- ISO date: "2025-07-03"
            sg REAL,                             -- specific gravity, e.g., 1.090
            brix REAL,                           -- degrees Brix
            temp_c REAL,                         -- temperature in Celsius

            -- Metadata
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_fermentation_log_batch ON fermentation_log(batch_id);
        CREATE INDEX idx_fermentation_log_date ON fermentation_log(date);

        -- ============================================
        -- INVENTORY ITEMS
        -- Winemaking supplies; independent lifecycle from batches
        -- ============================================
        CREATE TABLE inventory_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            brand TEXT,                          -- nullable, for branded products
            quantity REAL NOT NULL DEFAULT 0,
            unit TEXT NOT NULL DEFAULT 'g',
            expiry_date TEXT,                    -- nullable ISO date

            -- Metadata
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_inventory_items_name ON inventory_items(name);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
