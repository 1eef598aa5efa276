//! Inventory MCP Tools
//!
//! Tools for managing winemaking supplies.

use serde::Serialize;

use crate::db::Database;
use crate::models::{InventoryItem, InventoryItemCreate, InventoryItemUpdate};

/// Response for add_inventory_item
#[derive(Debug, Serialize)]
pub struct AddInventoryItemResponse {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub created_at: String,
}

/// Summary of an inventory item for list/search results
#[derive(Debug, Serialize)]
pub struct InventoryItemSummary {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub expiry_date: Option<String>,
}

impl From<&InventoryItem> for InventoryItemSummary {
    fn from(item: &InventoryItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            brand: item.brand.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            expiry_date: item.expiry_date.clone(),
        }
    }
}

/// Full inventory item detail response
#[derive(Debug, Serialize)]
pub struct InventoryItemDetail {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub expiry_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub used_in_batches: Vec<String>,
}

/// Response for search_inventory
#[derive(Debug, Serialize)]
pub struct SearchInventoryResponse {
    pub items: Vec<InventoryItemSummary>,
    pub total: usize,
}

/// Response for list_inventory
#[derive(Debug, Serialize)]
pub struct ListInventoryResponse {
    pub items: Vec<InventoryItemSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for successful delete_inventory_item
#[derive(Debug, Serialize)]
pub struct DeleteInventoryItemResponse {
    pub success: bool,
    pub deleted_id: i64,
}

/// Batch names whose ingredient list references an item name
fn batches_using_name(
    conn: &rusqlite::Connection,
    name: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT b.name FROM batches b
        INNER JOIN batch_ingredients bi ON bi.batch_id = b.id
        WHERE bi.name = ?1
        ORDER BY b.name
        "#,
    )?;

    let names = stmt
        .query_map([name], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(names)
}

// ============================================================================
// Inventory Tools
// ============================================================================

/// Add a new inventory item
pub fn add_inventory_item(
    db: &Database,
    data: InventoryItemCreate,
) -> Result<AddInventoryItemResponse, String> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err("Item name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = InventoryItem::create(&conn, &data)
        .map_err(|e| format!("Failed to add inventory item: {}", e))?;

    Ok(AddInventoryItemResponse {
        id: item.id,
        name: item.name,
        brand: item.brand,
        created_at: item.created_at,
    })
}

/// Get an inventory item with batch usage
pub fn get_inventory_item(db: &Database, id: i64) -> Result<Option<InventoryItemDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = InventoryItem::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get inventory item: {}", e))?;

    match item {
        Some(item) => {
            let used_in_batches = batches_using_name(&conn, &item.name)
                .map_err(|e| format!("Failed to get batch usage: {}", e))?;

            Ok(Some(InventoryItemDetail {
                id: item.id,
                name: item.name,
                brand: item.brand,
                quantity: item.quantity,
                unit: item.unit,
                expiry_date: item.expiry_date,
                created_at: item.created_at,
                updated_at: item.updated_at,
                used_in_batches,
            }))
        }
        None => Ok(None),
    }
}

/// Search inventory by name or brand
pub fn search_inventory(
    db: &Database,
    query: &str,
    limit: i64,
) -> Result<SearchInventoryResponse, String> {
    let limit = limit.min(100).max(1);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let items = InventoryItem::search(&conn, query, limit)
        .map_err(|e| format!("Failed to search inventory: {}", e))?;

    let summaries: Vec<InventoryItemSummary> = items.iter().map(Into::into).collect();
    let total = summaries.len();

    Ok(SearchInventoryResponse {
        items: summaries,
        total,
    })
}

/// List inventory items
pub fn list_inventory(
    db: &Database,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListInventoryResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let items = InventoryItem::list(&conn, sort_by, sort_order, limit, offset)
        .map_err(|e| format!("Failed to list inventory: {}", e))?;

    let total = InventoryItem::count(&conn)
        .map_err(|e| format!("Failed to count inventory: {}", e))?;

    Ok(ListInventoryResponse {
        items: items.iter().map(Into::into).collect(),
        total,
        limit,
        offset,
    })
}

/// Update an inventory item
pub fn update_inventory_item(
    db: &Database,
    id: i64,
    data: InventoryItemUpdate,
) -> Result<Option<InventoryItem>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    InventoryItem::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update inventory item: {}", e))
}

/// Delete an inventory item.
///
/// Always allowed: batch ingredients reference items by name only, so
/// existing batches keep their rows and simply lose the inventory link.
pub fn delete_inventory_item(db: &Database, id: i64) -> Result<DeleteInventoryItemResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let item = InventoryItem::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?;
    if item.is_none() {
        return Err(format!("Inventory item not found with id: {}", id));
    }

    InventoryItem::delete(&conn, id)
        .map_err(|e| format!("Failed to delete inventory item: {}", e))?;

    Ok(DeleteInventoryItemResponse {
        success: true,
        deleted_id: id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchCreate, IngredientUsage, IngredientUsageCreate};

    fn test_db(name: &str) -> Database {
        let db = Database::new(format!("file:{}?mode=memory&cache=shared", name)).unwrap();
        let conn = db.get_conn().unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        db
    }

    #[test]
    fn test_delete_leaves_batch_ingredients_intact() {
        let db = test_db("inventory_soft_refs");
        let item = add_inventory_item(
            &db,
            InventoryItemCreate {
                name: "Uva Merlot".to_string(),
                brand: Some("Viñedo Local".to_string()),
                quantity: 25.0,
                unit: "kg".to_string(),
                expiry_date: Some("2025-09-15".to_string()),
            },
        )
        .unwrap();

        let conn = db.get_conn().unwrap();
        let batch = crate::models::Batch::create(
            &conn,
            &BatchCreate {
                name: "Tinto".to_string(),
                creation_date: Some("2025-07-01".to_string()),
                yeast: String::new(),
                must: Default::default(),
                adjustments: Default::default(),
                status: None,
            },
        )
        .unwrap();
        IngredientUsage::create(
            &conn,
            &IngredientUsageCreate {
                batch_id: batch.id,
                name: "Uva Merlot".to_string(),
                quantity: "20".to_string(),
                unit: None,
            },
        )
        .unwrap();
        drop(conn);

        let detail = get_inventory_item(&db, item.id).unwrap().unwrap();
        assert_eq!(detail.used_in_batches, vec!["Tinto"]);

        delete_inventory_item(&db, item.id).unwrap();

        let conn = db.get_conn().unwrap();
        let remaining = IngredientUsage::get_for_batch(&conn, batch.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].unit, "kg");
    }
}
