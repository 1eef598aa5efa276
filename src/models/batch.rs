//! Batch model
//!
//! Represents one winemaking batch (a "lote") from must preparation through
//! fermentation. Must composition and adjustment fields are stored as the
//! free-form text the maker typed; calculations parse them on demand.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use crate::enology::{normalize_numeric_input, parse_decimal};
use super::{LogEntry, LogEntryCreate};

/// Batch lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Preparing,
    Fermenting,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Preparing => "preparing",
            BatchStatus::Fermenting => "fermenting",
            BatchStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "preparing" | "preparación" | "en preparación" => Some(BatchStatus::Preparing),
            "fermenting" | "fermentación" | "en fermentación" => Some(BatchStatus::Fermenting),
            "completed" | "completado" => Some(BatchStatus::Completed),
            _ => None,
        }
    }

    /// Spanish label shown in reports and exports
    pub fn display_name(&self) -> &'static str {
        match self {
            BatchStatus::Preparing => "En Preparación",
            BatchStatus::Fermenting => "En Fermentación",
            BatchStatus::Completed => "Completado",
        }
    }
}

/// Must composition as entered by the maker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MustComposition {
    #[serde(default)]
    pub pulp_mass_kg: String,
    #[serde(default)]
    pub pulp_brix: String,
    #[serde(default)]
    pub water_volume_l: String,
    #[serde(default)]
    pub ph: String,
}

impl MustComposition {
    /// Normalize each field the way the capture form does: decimal comma
    /// to dot, unparseable text to empty.
    pub fn normalized(&self) -> Self {
        Self {
            pulp_mass_kg: normalize_numeric_input(&self.pulp_mass_kg),
            pulp_brix: normalize_numeric_input(&self.pulp_brix),
            water_volume_l: normalize_numeric_input(&self.water_volume_l),
            ph: normalize_numeric_input(&self.ph),
        }
    }
}

/// Pre-fermentation adjustments as entered by the maker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub added_sugar_kg: String,
    #[serde(default)]
    pub initial_sg: String,
    #[serde(default)]
    pub initial_brix: String,
    #[serde(default)]
    pub initial_temp_c: String,
}

impl Adjustments {
    pub fn normalized(&self) -> Self {
        Self {
            added_sugar_kg: normalize_numeric_input(&self.added_sugar_kg),
            initial_sg: normalize_numeric_input(&self.initial_sg),
            initial_brix: normalize_numeric_input(&self.initial_brix),
            initial_temp_c: normalize_numeric_input(&self.initial_temp_c),
        }
    }
}

/// A winemaking batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub creation_date: String,
    pub yeast: String,
    pub must: MustComposition,
    pub adjustments: Adjustments,
    pub status: BatchStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchCreate {
    pub name: String,
    pub creation_date: Option<String>,
    #[serde(default)]
    pub yeast: String,
    #[serde(default)]
    pub must: MustComposition,
    #[serde(default)]
    pub adjustments: Adjustments,
    pub status: Option<BatchStatus>,
}

/// Data for updating a batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub name: Option<String>,
    pub creation_date: Option<String>,
    pub yeast: Option<String>,
    pub pulp_mass_kg: Option<String>,
    pub pulp_brix: Option<String>,
    pub water_volume_l: Option<String>,
    pub ph: Option<String>,
    pub added_sugar_kg: Option<String>,
    pub initial_sg: Option<String>,
    pub initial_brix: Option<String>,
    pub initial_temp_c: Option<String>,
    pub status: Option<BatchStatus>,
}

impl BatchUpdate {
    /// Normalize the numeric text fields that are present
    fn normalized(&self) -> Self {
        let norm = |v: &Option<String>| v.as_deref().map(normalize_numeric_input);
        Self {
            name: self.name.clone(),
            creation_date: self.creation_date.clone(),
            yeast: self.yeast.clone(),
            pulp_mass_kg: norm(&self.pulp_mass_kg),
            pulp_brix: norm(&self.pulp_brix),
            water_volume_l: norm(&self.water_volume_l),
            ph: norm(&self.ph),
            added_sugar_kg: norm(&self.added_sugar_kg),
            initial_sg: norm(&self.initial_sg),
            initial_brix: norm(&self.initial_brix),
            initial_temp_c: norm(&self.initial_temp_c),
            status: self.status,
        }
    }
}

impl Batch {
    /// Create a Batch from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get("status")?;
        let status = BatchStatus::from_str(&status_str).unwrap_or_default();

        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            creation_date: row.get("creation_date")?,
            yeast: row.get("yeast")?,
            must: MustComposition {
                pulp_mass_kg: row.get("pulp_mass_kg")?,
                pulp_brix: row.get("pulp_brix")?,
                water_volume_l: row.get("water_volume_l")?,
                ph: row.get("ph")?,
            },
            adjustments: Adjustments {
                added_sugar_kg: row.get("added_sugar_kg")?,
                initial_sg: row.get("initial_sg")?,
                initial_brix: row.get("initial_brix")?,
                initial_temp_c: row.get("initial_temp_c")?,
            },
            status,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert a new batch and seed its fermentation log.
    ///
    /// A fresh batch gets one log entry dated on its creation date with the
    /// initial readings and the note "Lote creado.", so charts and analysis
    /// have a starting point.
    pub fn create(conn: &Connection, data: &BatchCreate) -> DbResult<Self> {
        let creation_date = data
            .creation_date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string());
        let must = data.must.normalized();
        let adjustments = data.adjustments.normalized();
        let status = data.status.unwrap_or_default();

        conn.execute(
            r#"
            INSERT INTO batches (
                name, creation_date, yeast,
                pulp_mass_kg, pulp_brix, water_volume_l, ph,
                added_sugar_kg, initial_sg, initial_brix, initial_temp_c,
                status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                data.name,
                creation_date,
                data.yeast,
                must.pulp_mass_kg,
                must.pulp_brix,
                must.water_volume_l,
                must.ph,
                adjustments.added_sugar_kg,
                adjustments.initial_sg,
                adjustments.initial_brix,
                adjustments.initial_temp_c,
                status.as_str(),
            ],
        )?;

        let id = conn.last_insert_rowid();

        LogEntry::create(
            conn,
            &LogEntryCreate {
                batch_id: id,
                date: Some(creation_date),
                sg: parse_decimal(&adjustments.initial_sg),
                brix: parse_decimal(&adjustments.initial_brix),
                temp_c: parse_decimal(&adjustments.initial_temp_c),
                notes: Some("Lote creado.".to_string()),
            },
        )?;

        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a batch by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM batches WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(batch) => Ok(Some(batch)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List batches with optional filtering
    pub fn list(
        conn: &Connection,
        query: Option<&str>,
        status: Option<BatchStatus>,
        sort_by: &str,
        sort_order: &str,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Self>> {
        let order = if sort_order.to_lowercase() == "desc" { "DESC" } else { "ASC" };
        let sort_col = match sort_by.to_lowercase().as_str() {
            "created_at" => "created_at",
            "creation_date" => "creation_date",
            "status" => "status",
            _ => "name",
        };

        let (sql, search_param) = match (query, status) {
            (Some(q), Some(_)) => (
                format!(
                    "SELECT * FROM batches WHERE name LIKE ?1 AND status = ?2 ORDER BY {} {} LIMIT ?3 OFFSET ?4",
                    sort_col, order
                ),
                Some(format!("%{}%", q)),
            ),
            (Some(q), None) => (
                format!(
                    "SELECT * FROM batches WHERE name LIKE ?1 ORDER BY {} {} LIMIT ?2 OFFSET ?3",
                    sort_col, order
                ),
                Some(format!("%{}%", q)),
            ),
            (None, Some(_)) => (
                format!(
                    "SELECT * FROM batches WHERE status = ?1 ORDER BY {} {} LIMIT ?2 OFFSET ?3",
                    sort_col, order
                ),
                None,
            ),
            (None, None) => (
                format!(
                    "SELECT * FROM batches ORDER BY {} {} LIMIT ?1 OFFSET ?2",
                    sort_col, order
                ),
                None,
            ),
        };

        let mut stmt = conn.prepare(&sql)?;

        let batches = match (search_param, status) {
            (Some(pattern), Some(st)) => stmt
                .query_map(params![pattern, st.as_str(), limit, offset], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            (Some(pattern), None) => stmt
                .query_map(params![pattern, limit, offset], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            (None, Some(st)) => stmt
                .query_map(params![st.as_str(), limit, offset], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            (None, None) => stmt
                .query_map(params![limit, offset], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(batches)
    }

    /// List every batch in insertion order
    pub fn list_all(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM batches ORDER BY id")?;
        let batches = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    /// Update a batch
    pub fn update(conn: &Connection, id: i64, data: &BatchUpdate) -> DbResult<Option<Self>> {
        let data = data.normalized();

        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! add_update {
            ($field:ident, $col:expr) => {
                if let Some(ref val) = data.$field {
                    updates.push(format!("{} = ?{}", $col, params_vec.len() + 1));
                    params_vec.push(Box::new(val.clone()));
                }
            };
        }

        add_update!(name, "name");
        add_update!(creation_date, "creation_date");
        add_update!(yeast, "yeast");
        add_update!(pulp_mass_kg, "pulp_mass_kg");
        add_update!(pulp_brix, "pulp_brix");
        add_update!(water_volume_l, "water_volume_l");
        add_update!(ph, "ph");
        add_update!(added_sugar_kg, "added_sugar_kg");
        add_update!(initial_sg, "initial_sg");
        add_update!(initial_brix, "initial_brix");
        add_update!(initial_temp_c, "initial_temp_c");

        if let Some(status) = data.status {
            updates.push(format!("status = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(status.as_str().to_string()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE batches SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Set the lifecycle status directly
    pub fn set_status(conn: &Connection, id: i64, status: BatchStatus) -> DbResult<Option<Self>> {
        conn.execute(
            "UPDATE batches SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![status.as_str(), id],
        )?;

        Self::get_by_id(conn, id)
    }

    /// Count batches (optionally filtered by status)
    pub fn count(conn: &Connection, status: Option<BatchStatus>) -> DbResult<i64> {
        let count: i64 = if let Some(st) = status {
            conn.query_row(
                "SELECT COUNT(*) FROM batches WHERE status = ?1",
                [st.as_str()],
                |row| row.get(0),
            )?
        } else {
            conn.query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?
        };
        Ok(count)
    }

    /// Delete a batch; ingredients and log entries cascade
    /// Returns Ok(true) if deleted, Ok(false) if not found
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        if Self::get_by_id(conn, id)?.is_none() {
            return Ok(false);
        }

        let rows = conn.execute("DELETE FROM batches WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn create_data(name: &str) -> BatchCreate {
        BatchCreate {
            name: name.to_string(),
            creation_date: Some("2025-07-01".to_string()),
            yeast: "EC-1118".to_string(),
            must: MustComposition {
                pulp_mass_kg: "20".to_string(),
                pulp_brix: "22".to_string(),
                water_volume_l: "5".to_string(),
                ph: "3,5".to_string(),
            },
            adjustments: Adjustments {
                added_sugar_kg: "1".to_string(),
                initial_sg: "1.090".to_string(),
                initial_brix: "21.8".to_string(),
                initial_temp_c: "22".to_string(),
            },
            status: None,
        }
    }

    #[test]
    fn test_status_round_trip_and_aliases() {
        for status in [BatchStatus::Preparing, BatchStatus::Fermenting, BatchStatus::Completed] {
            assert_eq!(BatchStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BatchStatus::from_str("En Fermentación"), Some(BatchStatus::Fermenting));
        assert_eq!(BatchStatus::from_str("Completado"), Some(BatchStatus::Completed));
        assert_eq!(BatchStatus::from_str("embotellado"), None);
    }

    #[test]
    fn test_create_normalizes_comma_decimals() {
        let conn = test_conn();
        let batch = Batch::create(&conn, &create_data("Tinto")).unwrap();

        assert_eq!(batch.must.ph, "3.5");
        assert_eq!(batch.status, BatchStatus::Preparing);
    }

    #[test]
    fn test_create_seeds_initial_log_entry() {
        let conn = test_conn();
        let batch = Batch::create(&conn, &create_data("Tinto")).unwrap();

        let log = LogEntry::list_for_batch(&conn, batch.id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].date, "2025-07-01");
        assert_eq!(log[0].sg, Some(1.090));
        assert_eq!(log[0].brix, Some(21.8));
        assert_eq!(log[0].temp_c, Some(22.0));
        assert_eq!(log[0].notes.as_deref(), Some("Lote creado."));
    }

    #[test]
    fn test_delete_cascades_to_log() {
        let conn = test_conn();
        let batch = Batch::create(&conn, &create_data("Tinto")).unwrap();

        assert!(Batch::delete(&conn, batch.id).unwrap());
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM fermentation_log WHERE batch_id = ?1",
                [batch.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_update_is_partial() {
        let conn = test_conn();
        let batch = Batch::create(&conn, &create_data("Tinto")).unwrap();

        let updated = Batch::update(
            &conn,
            batch.id,
            &BatchUpdate {
                water_volume_l: Some("6,5".to_string()),
                status: Some(BatchStatus::Fermenting),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.must.water_volume_l, "6.5");
        assert_eq!(updated.must.pulp_mass_kg, "20");
        assert_eq!(updated.status, BatchStatus::Fermenting);
    }

    #[test]
    fn test_list_filters_by_status() {
        let conn = test_conn();
        Batch::create(&conn, &create_data("Tinto")).unwrap();
        let white = Batch::create(&conn, &create_data("Blanco")).unwrap();
        Batch::set_status(&conn, white.id, BatchStatus::Completed).unwrap();

        let completed =
            Batch::list(&conn, None, Some(BatchStatus::Completed), "name", "asc", 50, 0).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].name, "Blanco");

        let all = Batch::list(&conn, None, None, "name", "asc", 50, 0).unwrap();
        assert_eq!(all.len(), 2);
    }
}
