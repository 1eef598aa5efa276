//! Batch ingredient model
//!
//! Ingredient usages recorded against a batch. The name is a soft reference
//! into the inventory: when it matches an inventory item exactly, the unit
//! is inherited from there, the same way the capture form autofills it.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;
use crate::enology::normalize_numeric_input;

/// An ingredient used in a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientUsage {
    pub id: i64,
    pub batch_id: i64,
    pub position: i64,
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for adding an ingredient to a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientUsageCreate {
    pub batch_id: i64,
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    pub unit: Option<String>,
}

/// Data for updating an ingredient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientUsageUpdate {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
}

/// Look up the unit of an inventory item by exact name
pub fn resolve_unit(conn: &Connection, name: &str) -> DbResult<Option<String>> {
    let result: Result<String, _> = conn.query_row(
        "SELECT unit FROM inventory_items WHERE name = ?1 ORDER BY id LIMIT 1",
        [name],
        |row| row.get(0),
    );
    match result {
        Ok(unit) => Ok(Some(unit)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl IngredientUsage {
    /// Create an IngredientUsage from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            batch_id: row.get("batch_id")?,
            position: row.get("position")?,
            name: row.get("name")?,
            quantity: row.get("quantity")?,
            unit: row.get("unit")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Add an ingredient to a batch.
    ///
    /// An explicit unit wins; otherwise the unit is inherited from the
    /// inventory item with the same name, falling back to grams.
    pub fn create(conn: &Connection, data: &IngredientUsageCreate) -> DbResult<Self> {
        let unit = match &data.unit {
            Some(u) => u.clone(),
            None => resolve_unit(conn, &data.name)?.unwrap_or_else(|| "g".to_string()),
        };
        let quantity = normalize_numeric_input(&data.quantity);

        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM batch_ingredients WHERE batch_id = ?1",
            [data.batch_id],
            |row| row.get(0),
        )?;

        conn.execute(
            r#"
            INSERT INTO batch_ingredients (batch_id, position, name, quantity, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![data.batch_id, position, data.name, quantity, unit],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get an ingredient by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM batch_ingredients WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get all ingredients for a batch in entry order
    pub fn get_for_batch(conn: &Connection, batch_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM batch_ingredients WHERE batch_id = ?1 ORDER BY position, id"
        )?;

        let ingredients = stmt
            .query_map([batch_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ingredients)
    }

    /// Update an ingredient.
    ///
    /// Renaming without an explicit unit re-resolves the unit against the
    /// inventory, mirroring create.
    pub fn update(conn: &Connection, id: i64, data: &IngredientUsageUpdate) -> DbResult<Option<Self>> {
        let mut unit = data.unit.clone();
        if let (Some(name), None) = (&data.name, &unit) {
            unit = resolve_unit(conn, name)?;
        }

        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref name) = data.name {
            updates.push(format!("name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(name.clone()));
        }
        if let Some(ref qty) = data.quantity {
            updates.push(format!("quantity = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(normalize_numeric_input(qty)));
        }
        if let Some(ref u) = unit {
            updates.push(format!("unit = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(u.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE batch_ingredients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete an ingredient
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM batch_ingredients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Get the batch_id for an ingredient
    pub fn get_batch_id(conn: &Connection, id: i64) -> DbResult<Option<i64>> {
        let result: Result<i64, _> = conn.query_row(
            "SELECT batch_id FROM batch_ingredients WHERE id = ?1",
            [id],
            |row| row.get(0),
        );
        match result {
            Ok(batch_id) => Ok(Some(batch_id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
