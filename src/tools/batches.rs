//! Batch MCP Tools
//!
//! Tools for managing winemaking batches, their ingredients, and their
//! fermentation logs.

use serde::Serialize;

use crate::db::Database;
use crate::enology::Formulation;
use crate::models::{
    Batch, BatchCreate, BatchStatus, BatchUpdate, IngredientUsage, IngredientUsageCreate,
    IngredientUsageUpdate, LogEntry, LogEntryCreate, LogEntryUpdate,
};

/// Response for create_batch
#[derive(Debug, Serialize)]
pub struct CreateBatchResponse {
    pub id: i64,
    pub name: String,
    pub creation_date: String,
    pub status: String,
    pub ingredients_added: usize,
    pub created_at: String,
}

/// Single ingredient row passed inline with create_batch
#[derive(Debug)]
pub struct InlineIngredient {
    pub name: String,
    pub quantity: String,
    pub unit: Option<String>,
}

/// Estimated formulation figures for a batch
#[derive(Debug, Serialize)]
pub struct FormulationView {
    pub estimated_volume_l: f64,
    pub total_mass_kg: f64,
    pub pulp_mass_fraction_percent: f64,
    pub concentrations: Vec<IngredientConcentration>,
}

/// Per-ingredient concentration against the estimated volume
#[derive(Debug, Serialize)]
pub struct IngredientConcentration {
    pub id: i64,
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub concentration: String,
}

/// Full batch detail with ingredients, log, and formulation
#[derive(Debug, Serialize)]
pub struct BatchDetail {
    pub id: i64,
    pub name: String,
    pub creation_date: String,
    pub yeast: String,
    pub must: crate::models::MustComposition,
    pub adjustments: crate::models::Adjustments,
    pub status: String,
    pub status_display: String,
    pub ingredients: Vec<IngredientUsage>,
    pub fermentation_log: Vec<LogEntry>,
    pub formulation: FormulationView,
    pub created_at: String,
    pub updated_at: String,
}

/// Batch summary for listing
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub id: i64,
    pub name: String,
    pub creation_date: String,
    pub status: String,
    pub status_display: String,
    pub ingredient_count: usize,
    pub log_entry_count: i64,
    pub latest_sg: Option<f64>,
}

/// Response for list_batches
#[derive(Debug, Serialize)]
pub struct ListBatchesResponse {
    pub batches: Vec<BatchSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Response for set_batch_status
#[derive(Debug, Serialize)]
pub struct SetStatusResponse {
    pub id: i64,
    pub status: String,
    pub status_display: String,
    pub updated_at: String,
}

/// Response for successful delete
#[derive(Debug, Serialize)]
pub struct DeleteBatchResponse {
    pub success: bool,
    pub deleted_id: i64,
}

/// Response for add_log_entry
#[derive(Debug, Serialize)]
pub struct AddLogEntryResponse {
    pub id: i64,
    pub batch_id: i64,
    pub date: String,
    pub sg: Option<f64>,
    pub brix: Option<f64>,
    pub temp_c: Option<f64>,
}

/// Response for list_log_entries
#[derive(Debug, Serialize)]
pub struct ListLogEntriesResponse {
    pub batch_id: i64,
    pub entries: Vec<LogEntry>,
    pub count: usize,
}

fn parse_status(s: &str) -> Result<BatchStatus, String> {
    BatchStatus::from_str(s).ok_or_else(|| {
        format!(
            "Invalid status: {}. Valid values: preparing, fermenting, completed",
            s
        )
    })
}

fn build_formulation_view(batch: &Batch, ingredients: &[IngredientUsage]) -> FormulationView {
    let formulation = Formulation::compute(batch);
    let concentrations = ingredients
        .iter()
        .map(|i| IngredientConcentration {
            id: i.id,
            name: i.name.clone(),
            quantity: i.quantity.clone(),
            unit: i.unit.clone(),
            concentration: formulation.concentration_of(i),
        })
        .collect();

    FormulationView {
        estimated_volume_l: formulation.estimated_volume_l,
        total_mass_kg: formulation.total_mass_kg,
        pulp_mass_fraction_percent: formulation.pulp_mass_fraction_percent,
        concentrations,
    }
}

// ============================================================================
// Batch Tools
// ============================================================================

/// Create a new batch.
///
/// Inline ingredient rows are inserted after the batch, in order, with
/// the same unit inheritance as add_batch_ingredient. Rows with a blank
/// name are skipped.
pub fn create_batch(
    db: &Database,
    data: BatchCreate,
    ingredients: Vec<InlineIngredient>,
) -> Result<CreateBatchResponse, String> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err("Batch name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::create(&conn, &data)
        .map_err(|e| format!("Failed to create batch: {}", e))?;

    let mut ingredients_added = 0;
    for row in ingredients {
        if row.name.trim().is_empty() {
            continue;
        }
        IngredientUsage::create(
            &conn,
            &IngredientUsageCreate {
                batch_id: batch.id,
                name: row.name,
                quantity: row.quantity,
                unit: row.unit,
            },
        )
        .map_err(|e| format!("Failed to add ingredient: {}", e))?;
        ingredients_added += 1;
    }

    Ok(CreateBatchResponse {
        id: batch.id,
        name: batch.name,
        creation_date: batch.creation_date,
        status: batch.status.as_str().to_string(),
        ingredients_added,
        created_at: batch.created_at,
    })
}

/// Get a batch with full details
pub fn get_batch(db: &Database, id: i64) -> Result<Option<BatchDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get batch: {}", e))?;

    match batch {
        Some(batch) => {
            let ingredients = IngredientUsage::get_for_batch(&conn, id)
                .map_err(|e| format!("Failed to get ingredients: {}", e))?;

            let fermentation_log = LogEntry::list_for_batch(&conn, id)
                .map_err(|e| format!("Failed to get fermentation log: {}", e))?;

            let formulation = build_formulation_view(&batch, &ingredients);

            Ok(Some(BatchDetail {
                id: batch.id,
                name: batch.name,
                creation_date: batch.creation_date,
                yeast: batch.yeast,
                must: batch.must,
                adjustments: batch.adjustments,
                status: batch.status.as_str().to_string(),
                status_display: batch.status.display_name().to_string(),
                ingredients,
                fermentation_log,
                formulation,
                created_at: batch.created_at,
                updated_at: batch.updated_at,
            }))
        }
        None => Ok(None),
    }
}

/// List batches with filtering
pub fn list_batches(
    db: &Database,
    query: Option<&str>,
    status: Option<&str>,
    sort_by: &str,
    sort_order: &str,
    limit: i64,
    offset: i64,
) -> Result<ListBatchesResponse, String> {
    let limit = limit.min(200).max(1);
    let offset = offset.max(0);

    let status = match status {
        Some(s) => Some(parse_status(s)?),
        None => None,
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batches = Batch::list(&conn, query, status, sort_by, sort_order, limit, offset)
        .map_err(|e| format!("Failed to list batches: {}", e))?;

    let total = Batch::count(&conn, status)
        .map_err(|e| format!("Failed to count batches: {}", e))?;

    let mut summaries = Vec::new();
    for batch in batches {
        let ingredients = IngredientUsage::get_for_batch(&conn, batch.id)
            .map_err(|e| format!("Failed to get ingredients: {}", e))?;
        let log_entry_count = LogEntry::count_for_batch(&conn, batch.id)
            .map_err(|e| format!("Failed to count log entries: {}", e))?;
        let latest = LogEntry::latest_for_batch(&conn, batch.id)
            .map_err(|e| format!("Failed to get latest entry: {}", e))?;

        summaries.push(BatchSummary {
            id: batch.id,
            name: batch.name,
            creation_date: batch.creation_date,
            status: batch.status.as_str().to_string(),
            status_display: batch.status.display_name().to_string(),
            ingredient_count: ingredients.len(),
            log_entry_count,
            latest_sg: latest.and_then(|e| e.sg),
        });
    }

    Ok(ListBatchesResponse {
        batches: summaries,
        total,
        limit,
        offset,
    })
}

/// Update a batch
pub fn update_batch(db: &Database, id: i64, data: BatchUpdate) -> Result<Option<Batch>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    Batch::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update batch: {}", e))
}

/// Set the lifecycle status of a batch
pub fn set_batch_status(
    db: &Database,
    id: i64,
    status: &str,
) -> Result<Option<SetStatusResponse>, String> {
    let status = parse_status(status)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let updated = Batch::set_status(&conn, id, status)
        .map_err(|e| format!("Failed to set status: {}", e))?;

    Ok(updated.map(|batch| SetStatusResponse {
        id: batch.id,
        status: batch.status.as_str().to_string(),
        status_display: batch.status.display_name().to_string(),
        updated_at: batch.updated_at,
    }))
}

/// Delete a batch with its ingredients and log
pub fn delete_batch(db: &Database, id: i64) -> Result<DeleteBatchResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, id)
        .map_err(|e| format!("Database error: {}", e))?;
    if batch.is_none() {
        return Err(format!("Batch not found with id: {}", id));
    }

    Batch::delete(&conn, id)
        .map_err(|e| format!("Failed to delete batch: {}", e))?;

    Ok(DeleteBatchResponse {
        success: true,
        deleted_id: id,
    })
}

/// Get the estimated formulation for a batch
pub fn get_batch_formulation(db: &Database, id: i64) -> Result<Option<FormulationView>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get batch: {}", e))?;

    match batch {
        Some(batch) => {
            let ingredients = IngredientUsage::get_for_batch(&conn, id)
                .map_err(|e| format!("Failed to get ingredients: {}", e))?;
            Ok(Some(build_formulation_view(&batch, &ingredients)))
        }
        None => Ok(None),
    }
}

// ============================================================================
// Batch Ingredient Tools
// ============================================================================

/// Add an ingredient to a batch
pub fn add_batch_ingredient(
    db: &Database,
    data: IngredientUsageCreate,
) -> Result<IngredientUsage, String> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err("Ingredient name cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, data.batch_id)
        .map_err(|e| format!("Database error checking batch: {}", e))?;
    if batch.is_none() {
        return Err(format!("Batch not found with id: {}", data.batch_id));
    }

    IngredientUsage::create(&conn, &data)
        .map_err(|e| format!("Failed to add ingredient: {}", e))
}

/// Update a batch ingredient
pub fn update_batch_ingredient(
    db: &Database,
    id: i64,
    data: IngredientUsageUpdate,
) -> Result<Option<IngredientUsage>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    IngredientUsage::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update ingredient: {}", e))
}

/// Remove an ingredient from a batch
pub fn remove_batch_ingredient(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    IngredientUsage::delete(&conn, id)
        .map_err(|e| format!("Failed to remove ingredient: {}", e))
}

// ============================================================================
// Fermentation Log Tools
// ============================================================================

/// Add a fermentation log entry to a batch
pub fn add_log_entry(db: &Database, data: LogEntryCreate) -> Result<AddLogEntryResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, data.batch_id)
        .map_err(|e| format!("Database error checking batch: {}", e))?;
    if batch.is_none() {
        return Err(format!("Batch not found with id: {}", data.batch_id));
    }

    let entry = LogEntry::create(&conn, &data)
        .map_err(|e| format!("Failed to add log entry: {}", e))?;

    Ok(AddLogEntryResponse {
        id: entry.id,
        batch_id: entry.batch_id,
        date: entry.date,
        sg: entry.sg,
        brix: entry.brix,
        temp_c: entry.temp_c,
    })
}

/// List the fermentation log for a batch, oldest first
pub fn list_log_entries(db: &Database, batch_id: i64) -> Result<ListLogEntriesResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batch = Batch::get_by_id(&conn, batch_id)
        .map_err(|e| format!("Database error checking batch: {}", e))?;
    if batch.is_none() {
        return Err(format!("Batch not found with id: {}", batch_id));
    }

    let entries = LogEntry::list_for_batch(&conn, batch_id)
        .map_err(|e| format!("Failed to list log entries: {}", e))?;
    let count = entries.len();

    Ok(ListLogEntriesResponse {
        batch_id,
        entries,
        count,
    })
}

/// Update a log entry
pub fn update_log_entry(
    db: &Database,
    id: i64,
    data: LogEntryUpdate,
) -> Result<Option<LogEntry>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    LogEntry::update(&conn, id, &data)
        .map_err(|e| format!("Failed to update log entry: {}", e))
}

/// Delete a log entry
pub fn delete_log_entry(db: &Database, id: i64) -> Result<bool, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    LogEntry::delete(&conn, id)
        .map_err(|e| format!("Failed to delete log entry: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{Adjustments, MustComposition};

    // Named shared-cache databases keep the whole pool on one in-memory
    // store; a plain :memory: path would give every pooled connection its
    // own empty database.
    fn test_db(name: &str) -> Database {
        let db = Database::new(format!("file:{}?mode=memory&cache=shared", name)).unwrap();
        let conn = db.get_conn().unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        db
    }

    fn reference_batch(db: &Database) -> i64 {
        let response = create_batch(
            db,
            BatchCreate {
                name: "Merlot Experimental 2025".to_string(),
                creation_date: Some("2025-07-01".to_string()),
                yeast: "EC-1118".to_string(),
                must: MustComposition {
                    pulp_mass_kg: "20".to_string(),
                    pulp_brix: "22".to_string(),
                    water_volume_l: "5".to_string(),
                    ph: "3.5".to_string(),
                },
                adjustments: Adjustments {
                    added_sugar_kg: "1".to_string(),
                    initial_sg: "1.090".to_string(),
                    initial_brix: "21.8".to_string(),
                    initial_temp_c: "22".to_string(),
                },
                status: None,
            },
            Vec::new(),
        )
        .unwrap();
        response.id
    }

    #[test]
    fn test_batch_detail_includes_formulation() {
        let db = test_db("batches_detail");
        let id = reference_batch(&db);

        let detail = get_batch(&db, id).unwrap().unwrap();
        assert_eq!(detail.formulation.estimated_volume_l, 19.0);
        assert_eq!(detail.formulation.total_mass_kg, 26.0);
        assert_eq!(detail.fermentation_log.len(), 1);
        assert_eq!(detail.status_display, "En Preparación");
    }

    #[test]
    fn test_formulation_concentrations_track_ingredients() {
        let db = test_db("batches_concentration");
        let id = reference_batch(&db);

        add_batch_ingredient(
            &db,
            IngredientUsageCreate {
                batch_id: id,
                name: "Nutriente (Fermaid K)".to_string(),
                quantity: "5".to_string(),
                unit: Some("kg".to_string()),
            },
        )
        .unwrap();

        let view = get_batch_formulation(&db, id).unwrap().unwrap();
        assert_eq!(view.concentrations.len(), 1);
        assert_eq!(view.concentrations[0].concentration, "263.16 g/L");
    }

    #[test]
    fn test_inline_ingredients_inherit_units() {
        let db = test_db("batches_inline");
        crate::tools::inventory::add_inventory_item(
            &db,
            crate::models::InventoryItemCreate {
                name: "Nutriente (Fermaid K)".to_string(),
                brand: None,
                quantity: 100.0,
                unit: "g".to_string(),
                expiry_date: None,
            },
        )
        .unwrap();

        let response = create_batch(
            &db,
            BatchCreate {
                name: "Tinto".to_string(),
                creation_date: None,
                yeast: String::new(),
                must: Default::default(),
                adjustments: Default::default(),
                status: None,
            },
            vec![
                InlineIngredient {
                    name: "Nutriente (Fermaid K)".to_string(),
                    quantity: "5".to_string(),
                    unit: None,
                },
                InlineIngredient {
                    name: "   ".to_string(),
                    quantity: "1".to_string(),
                    unit: None,
                },
                InlineIngredient {
                    name: "Uva Merlot".to_string(),
                    quantity: "20".to_string(),
                    unit: Some("kg".to_string()),
                },
            ],
        )
        .unwrap();
        assert_eq!(response.ingredients_added, 2);

        let conn = db.get_conn().unwrap();
        let rows = IngredientUsage::get_for_batch(&conn, response.id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unit, "g");
        assert_eq!(rows[1].unit, "kg");
    }

    #[test]
    fn test_invalid_status_is_rejected() {
        let db = test_db("batches_status");
        let id = reference_batch(&db);

        let err = set_batch_status(&db, id, "embotellado").unwrap_err();
        assert!(err.contains("Invalid status"));

        let updated = set_batch_status(&db, id, "En Fermentación").unwrap().unwrap();
        assert_eq!(updated.status, "fermenting");
    }

    #[test]
    fn test_missing_batch_is_reported() {
        let db = test_db("batches_missing");
        assert!(get_batch(&db, 42).unwrap().is_none());
        assert!(delete_batch(&db, 42).is_err());
    }
}
