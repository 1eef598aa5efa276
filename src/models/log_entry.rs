//! Fermentation log model
//!
//! Dated readings (specific gravity, Brix, temperature) recorded against a
//! batch. Readings are optional per entry; a note-only entry is valid.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A fermentation log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub batch_id: i64,
    pub date: String,
    pub sg: Option<f64>,
    pub brix: Option<f64>,
    pub temp_c: Option<f64>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryCreate {
    pub batch_id: i64,
    pub date: Option<String>,
    pub sg: Option<f64>,
    pub brix: Option<f64>,
    pub temp_c: Option<f64>,
    pub notes: Option<String>,
}

/// Data for updating a log entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEntryUpdate {
    pub date: Option<String>,
    pub sg: Option<f64>,
    pub brix: Option<f64>,
    pub temp_c: Option<f64>,
    pub notes: Option<String>,
}

impl LogEntry {
    /// Create a LogEntry from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            batch_id: row.get("batch_id")?,
            date: row.get("date")?,
            sg: row.get("sg")?,
            brix: row.get("brix")?,
            temp_c: row.get("temp_c")?,
            notes: row.get("notes")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new log entry
    pub fn create(conn: &Connection, data: &LogEntryCreate) -> DbResult<Self> {
        let date = data
            .date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());

        conn.execute(
            r#"
            INSERT INTO fermentation_log (batch_id, date, sg, brix, temp_c, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![data.batch_id, date, data.sg, data.brix, data.temp_c, data.notes],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a log entry by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM fermentation_log WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all entries for a batch, oldest first.
    ///
    /// Chronological order is the contract here: charts and the analysis
    /// prompt both take "last entry" to mean the most recent reading.
    /// Entries sharing a date stay in insertion order.
    pub fn list_for_batch(conn: &Connection, batch_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM fermentation_log WHERE batch_id = ?1 ORDER BY date ASC, id ASC"
        )?;

        let entries = stmt
            .query_map([batch_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Get the most recent entry for a batch
    pub fn latest_for_batch(conn: &Connection, batch_id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM fermentation_log WHERE batch_id = ?1 ORDER BY date DESC, id DESC LIMIT 1"
        )?;

        let result = stmt.query_row([batch_id], Self::from_row);
        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Update a log entry
    pub fn update(conn: &Connection, id: i64, data: &LogEntryUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref date) = data.date {
            updates.push(format!("date = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(date.clone()));
        }
        if let Some(sg) = data.sg {
            updates.push(format!("sg = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(sg));
        }
        if let Some(brix) = data.brix {
            updates.push(format!("brix = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(brix));
        }
        if let Some(temp) = data.temp_c {
            updates.push(format!("temp_c = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(temp));
        }
        if let Some(ref notes) = data.notes {
            updates.push(format!("notes = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(notes.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE fermentation_log SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a log entry
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM fermentation_log WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Count entries for a batch
    pub fn count_for_batch(conn: &Connection, batch_id: i64) -> DbResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fermentation_log WHERE batch_id = ?1",
            [batch_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO batches (name, creation_date) VALUES ('Tinto', '2025-07-01')",
            [],
        )
        .unwrap();
        conn
    }

    fn entry(batch_id: i64, date: &str, sg: f64) -> LogEntryCreate {
        LogEntryCreate {
            batch_id,
            date: Some(date.to_string()),
            sg: Some(sg),
            brix: None,
            temp_c: None,
            notes: None,
        }
    }

    #[test]
    fn test_list_is_chronological_regardless_of_insert_order() {
        let conn = test_conn();
        LogEntry::create(&conn, &entry(1, "2025-07-08", 1.025)).unwrap();
        LogEntry::create(&conn, &entry(1, "2025-07-01", 1.090)).unwrap();
        LogEntry::create(&conn, &entry(1, "2025-07-03", 1.075)).unwrap();

        let dates: Vec<String> = LogEntry::list_for_batch(&conn, 1)
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2025-07-01", "2025-07-03", "2025-07-08"]);
    }

    #[test]
    fn test_same_date_entries_keep_insertion_order() {
        let conn = test_conn();
        let first = LogEntry::create(&conn, &entry(1, "2025-07-01", 1.090)).unwrap();
        let second = LogEntry::create(&conn, &entry(1, "2025-07-01", 1.088)).unwrap();

        let entries = LogEntry::list_for_batch(&conn, 1).unwrap();
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);
    }

    #[test]
    fn test_latest_for_batch_picks_newest_date() {
        let conn = test_conn();
        LogEntry::create(&conn, &entry(1, "2025-07-15", 0.998)).unwrap();
        LogEntry::create(&conn, &entry(1, "2025-07-01", 1.090)).unwrap();

        let latest = LogEntry::latest_for_batch(&conn, 1).unwrap().unwrap();
        assert_eq!(latest.date, "2025-07-15");
        assert_eq!(latest.sg, Some(0.998));

        assert!(LogEntry::latest_for_batch(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_note_only_entry_is_valid() {
        let conn = test_conn();
        let created = LogEntry::create(
            &conn,
            &LogEntryCreate {
                batch_id: 1,
                date: Some("2025-07-20".to_string()),
                sg: None,
                brix: None,
                temp_c: None,
                notes: Some("Primer trasiego.".to_string()),
            },
        )
        .unwrap();

        assert_eq!(created.sg, None);
        assert_eq!(created.notes.as_deref(), Some("Primer trasiego."));
    }
}
