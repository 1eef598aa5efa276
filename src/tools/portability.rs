//! Data portability
//!
//! Whole-database JSON export and import in the tracker's interchange
//! format: `{"lotes": [...], "inventory": [...], "exportDate": "..."}`.
//! Field names follow the original persistence layout (Spanish camelCase),
//! so files exported by earlier versions of the tracker import cleanly.
//! Import replaces a collection wholesale, but only when its key is
//! present in the file.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::Database;
use crate::enology::numeric::{de_lenient_f64, de_numeric_text, de_opt_f64, normalize_numeric_input};
use crate::models::{Batch, BatchStatus, IngredientUsage, InventoryItem, LogEntry};

// ============================================================================
// Interchange Records
// ============================================================================

/// Must composition in interchange form
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MustRecord {
    #[serde(default, deserialize_with = "de_numeric_text")]
    pub pulpa: String,
    #[serde(rename = "pulpaBrix", default, deserialize_with = "de_numeric_text")]
    pub pulpa_brix: String,
    #[serde(default, deserialize_with = "de_numeric_text")]
    pub agua: String,
    #[serde(default, deserialize_with = "de_numeric_text")]
    pub ph: String,
}

/// Adjustments in interchange form
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AdjustmentsRecord {
    #[serde(default, deserialize_with = "de_numeric_text")]
    pub azucar: String,
    #[serde(rename = "sgInicial", default, deserialize_with = "de_numeric_text")]
    pub sg_inicial: String,
    #[serde(rename = "bxInicial", default, deserialize_with = "de_numeric_text")]
    pub bx_inicial: String,
    #[serde(rename = "tempInicial", default, deserialize_with = "de_numeric_text")]
    pub temp_inicial: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngredientRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_numeric_text")]
    pub quantity: String,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "g".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub sg: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub brix: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub temp: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "creationDate", default)]
    pub creation_date: String,
    #[serde(default)]
    pub yeast: String,
    #[serde(default)]
    pub mosto: MustRecord,
    #[serde(default)]
    pub ajustes: AdjustmentsRecord,
    #[serde(default)]
    pub ingredientes: Vec<IngredientRecord>,
    #[serde(rename = "fermentationLog", default)]
    pub fermentation_log: Vec<LogRecord>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub quantity: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub expiry: String,
}

/// Top-level interchange file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lotes: Option<Vec<LoteRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryRecord>>,
    #[serde(rename = "exportDate", default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub path: String,
    pub lotes: usize,
    pub inventory_items: usize,
    pub export_date: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub lotes_imported: Option<usize>,
    pub log_entries_imported: usize,
    pub ingredients_imported: usize,
    pub inventory_imported: Option<usize>,
}

// ============================================================================
// Export
// ============================================================================

fn empty_to_none(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Collect the whole database into an interchange file
pub fn collect_export(db: &Database) -> Result<DataFile, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let batches = Batch::list_all(&conn).map_err(|e| format!("Failed to list batches: {}", e))?;

    let mut lotes = Vec::with_capacity(batches.len());
    for batch in &batches {
        let ingredients = IngredientUsage::get_for_batch(&conn, batch.id)
            .map_err(|e| format!("Failed to get ingredients: {}", e))?;
        let log = LogEntry::list_for_batch(&conn, batch.id)
            .map_err(|e| format!("Failed to get fermentation log: {}", e))?;

        lotes.push(LoteRecord {
            id: Some(serde_json::Value::from(batch.id)),
            name: batch.name.clone(),
            creation_date: batch.creation_date.clone(),
            yeast: batch.yeast.clone(),
            mosto: MustRecord {
                pulpa: batch.must.pulp_mass_kg.clone(),
                pulpa_brix: batch.must.pulp_brix.clone(),
                agua: batch.must.water_volume_l.clone(),
                ph: batch.must.ph.clone(),
            },
            ajustes: AdjustmentsRecord {
                azucar: batch.adjustments.added_sugar_kg.clone(),
                sg_inicial: batch.adjustments.initial_sg.clone(),
                bx_inicial: batch.adjustments.initial_brix.clone(),
                temp_inicial: batch.adjustments.initial_temp_c.clone(),
            },
            ingredientes: ingredients
                .iter()
                .map(|ing| IngredientRecord {
                    name: ing.name.clone(),
                    quantity: ing.quantity.clone(),
                    unit: ing.unit.clone(),
                })
                .collect(),
            fermentation_log: log
                .iter()
                .map(|entry| LogRecord {
                    id: Some(serde_json::Value::from(entry.id)),
                    date: entry.date.clone(),
                    sg: entry.sg,
                    brix: entry.brix,
                    temp: entry.temp_c,
                    notes: entry.notes.clone().unwrap_or_default(),
                })
                .collect(),
            status: Some(batch.status.display_name().to_string()),
        });
    }

    let items = InventoryItem::list_all(&conn)
        .map_err(|e| format!("Failed to list inventory: {}", e))?;
    let inventory = items
        .iter()
        .map(|item| InventoryRecord {
            id: Some(serde_json::Value::from(item.id)),
            name: item.name.clone(),
            brand: item.brand.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            expiry: item.expiry_date.clone().unwrap_or_default(),
        })
        .collect();

    Ok(DataFile {
        lotes: Some(lotes),
        inventory: Some(inventory),
        export_date: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    })
}

/// Export all data to a JSON file
pub fn export_data(db: &Database, output_path: &str) -> Result<ExportResponse, String> {
    let data = collect_export(db)?;

    let lotes = data.lotes.as_ref().map(|l| l.len()).unwrap_or(0);
    let inventory_items = data.inventory.as_ref().map(|i| i.len()).unwrap_or(0);
    let export_date = data.export_date.clone().unwrap_or_default();

    let json = serde_json::to_string_pretty(&data)
        .map_err(|e| format!("Failed to serialize data: {}", e))?;

    let path = Path::new(output_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::write(path, json).map_err(|e| format!("Failed to write export: {}", e))?;

    info!("Exported {} lotes and {} inventory items to {}", lotes, inventory_items, output_path);

    Ok(ExportResponse {
        path: output_path.to_string(),
        lotes,
        inventory_items,
        export_date,
    })
}

// ============================================================================
// Import
// ============================================================================

/// Import data from interchange JSON.
///
/// Each collection present in the file replaces the stored one entirely;
/// absent collections are left untouched. All changes happen in one
/// transaction, so a file that fails halfway leaves the database as it was.
pub fn import_json(db: &Database, json: &str) -> Result<ImportResponse, String> {
    let data: DataFile =
        serde_json::from_str(json).map_err(|e| format!("Invalid JSON data: {}", e))?;

    let (lotes_imported, log_entries_imported, ingredients_imported, inventory_imported) = db
        .with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut lote_count = None;
            let mut log_count = 0;
            let mut ingredient_count = 0;

            if let Some(lotes) = &data.lotes {
                tx.execute("DELETE FROM batches", [])?;

                for lote in lotes {
                    let status = lote
                        .status
                        .as_deref()
                        .and_then(BatchStatus::from_str)
                        .unwrap_or_default();

                    tx.execute(
                        r#"
                        INSERT INTO batches (
                            name, creation_date, yeast,
                            pulp_mass_kg, pulp_brix, water_volume_l, ph,
                            added_sugar_kg, initial_sg, initial_brix, initial_temp_c,
                            status
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                        "#,
                        rusqlite::params![
                            lote.name,
                            lote.creation_date,
                            lote.yeast,
                            normalize_numeric_input(&lote.mosto.pulpa),
                            normalize_numeric_input(&lote.mosto.pulpa_brix),
                            normalize_numeric_input(&lote.mosto.agua),
                            normalize_numeric_input(&lote.mosto.ph),
                            normalize_numeric_input(&lote.ajustes.azucar),
                            normalize_numeric_input(&lote.ajustes.sg_inicial),
                            normalize_numeric_input(&lote.ajustes.bx_inicial),
                            normalize_numeric_input(&lote.ajustes.temp_inicial),
                            status.as_str(),
                        ],
                    )?;
                    let batch_id = tx.last_insert_rowid();

                    for (position, ing) in lote.ingredientes.iter().enumerate() {
                        tx.execute(
                            r#"
                            INSERT INTO batch_ingredients (batch_id, position, name, quantity, unit)
                            VALUES (?1, ?2, ?3, ?4, ?5)
                            "#,
                            rusqlite::params![
                                batch_id,
                                position as i64,
                                ing.name,
                                normalize_numeric_input(&ing.quantity),
                                ing.unit,
                            ],
                        )?;
                        ingredient_count += 1;
                    }

                    for entry in &lote.fermentation_log {
                        tx.execute(
                            r#"
                            INSERT INTO fermentation_log (batch_id, date, sg, brix, temp_c, notes)
                            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                            "#,
                            rusqlite::params![
                                batch_id,
                                entry.date,
                                entry.sg,
                                entry.brix,
                                entry.temp,
                                empty_to_none(&entry.notes),
                            ],
                        )?;
                        log_count += 1;
                    }
                }

                lote_count = Some(lotes.len());
            }

            let mut item_count = None;
            if let Some(inventory) = &data.inventory {
                tx.execute("DELETE FROM inventory_items", [])?;

                for item in inventory {
                    tx.execute(
                        r#"
                        INSERT INTO inventory_items (name, brand, quantity, unit, expiry_date)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                        rusqlite::params![
                            item.name,
                            empty_to_none(&item.brand),
                            item.quantity,
                            item.unit,
                            empty_to_none(&item.expiry),
                        ],
                    )?;
                }

                item_count = Some(inventory.len());
            }

            tx.commit()?;
            Ok((lote_count, log_count, ingredient_count, item_count))
        })
        .map_err(|e| format!("Failed to import data: {}", e))?;

    info!(
        "Imported {:?} lotes ({} log entries, {} ingredients), {:?} inventory items",
        lotes_imported, log_entries_imported, ingredients_imported, inventory_imported
    );

    Ok(ImportResponse {
        lotes_imported,
        log_entries_imported,
        ingredients_imported,
        inventory_imported,
    })
}

/// Import data from a JSON file on disk
pub fn import_data(db: &Database, file_path: &str) -> Result<ImportResponse, String> {
    let json = std::fs::read_to_string(file_path)
        .map_err(|e| format!("Failed to read {}: {}", file_path, e))?;
    import_json(db, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{BatchCreate, IngredientUsageCreate, InventoryItemCreate, MustComposition};

    // Shared-cache URI so every pooled connection sees the same database.
    fn test_db(name: &str) -> Database {
        let db = Database::new(&format!("file:{}?mode=memory&cache=shared", name)).unwrap();
        let conn = db.get_conn().unwrap();
        run_migrations(&conn).unwrap();
        db
    }

    #[test]
    fn test_export_uses_interchange_field_names() {
        let db = test_db("portability_export");
        let conn = db.get_conn().unwrap();

        let batch = Batch::create(
            &conn,
            &BatchCreate {
                name: "Tinto".to_string(),
                creation_date: Some("2025-07-01".to_string()),
                yeast: "EC-1118".to_string(),
                must: MustComposition {
                    pulp_mass_kg: "20".to_string(),
                    pulp_brix: "22".to_string(),
                    water_volume_l: "5".to_string(),
                    ph: "3,5".to_string(),
                },
                adjustments: Default::default(),
                status: None,
            },
        )
        .unwrap();
        IngredientUsage::create(
            &conn,
            &IngredientUsageCreate {
                batch_id: batch.id,
                name: "Nutriente".to_string(),
                quantity: "5".to_string(),
                unit: Some("g".to_string()),
            },
        )
        .unwrap();
        InventoryItem::create(
            &conn,
            &InventoryItemCreate {
                name: "Azúcar Refinada".to_string(),
                brand: None,
                quantity: 5.0,
                unit: "kg".to_string(),
                expiry_date: None,
            },
        )
        .unwrap();
        drop(conn);

        let data = collect_export(&db).unwrap();
        let json = serde_json::to_value(&data).unwrap();

        let lote = &json["lotes"][0];
        assert_eq!(lote["name"], "Tinto");
        assert_eq!(lote["creationDate"], "2025-07-01");
        assert_eq!(lote["mosto"]["pulpa"], "20");
        assert_eq!(lote["mosto"]["pulpaBrix"], "22");
        assert_eq!(lote["mosto"]["agua"], "5");
        assert_eq!(lote["mosto"]["ph"], "3.5");
        assert_eq!(lote["status"], "En Preparación");
        // Creation seeds one log entry
        assert_eq!(lote["fermentationLog"][0]["notes"], "Lote creado.");
        assert_eq!(lote["ingredientes"][0]["quantity"], "5");

        assert_eq!(json["inventory"][0]["name"], "Azúcar Refinada");
        assert_eq!(json["inventory"][0]["expiry"], "");

        // JS-style ISO timestamp with milliseconds
        let export_date = json["exportDate"].as_str().unwrap();
        assert_eq!(export_date.len(), 24);
        assert!(export_date.ends_with('Z'));
    }

    #[test]
    fn test_import_replaces_only_present_collections() {
        let db = test_db("portability_import");
        let conn = db.get_conn().unwrap();
        Batch::create(
            &conn,
            &BatchCreate {
                name: "Viejo".to_string(),
                creation_date: None,
                yeast: String::new(),
                must: Default::default(),
                adjustments: Default::default(),
                status: None,
            },
        )
        .unwrap();
        InventoryItem::create(
            &conn,
            &InventoryItemCreate {
                name: "Levadura".to_string(),
                brand: None,
                quantity: 10.0,
                unit: "g".to_string(),
                expiry_date: None,
            },
        )
        .unwrap();
        drop(conn);

        let json = r#"{
            "lotes": [{
                "id": 1,
                "name": "Nuevo",
                "creationDate": "2025-08-01",
                "yeast": "71B",
                "mosto": {"pulpa": 10, "pulpaBrix": "21", "agua": "4", "ph": 3.4},
                "ajustes": {"azucar": 0.5, "sgInicial": "1,085", "bxInicial": 20.4, "tempInicial": 21},
                "ingredientes": [{"name": "Nutriente", "quantity": 3, "unit": "g"}],
                "fermentationLog": [
                    {"id": 1, "date": "2025-08-01", "sg": 1.085, "brix": 20.4, "temp": 21, "notes": "Inicio."},
                    {"id": 2, "date": "2025-08-03", "sg": "1,06", "brix": "", "temp": null, "notes": ""}
                ],
                "status": "En Fermentación"
            }]
        }"#;

        let resp = import_json(&db, json).unwrap();
        assert_eq!(resp.lotes_imported, Some(1));
        assert_eq!(resp.log_entries_imported, 2);
        assert_eq!(resp.ingredients_imported, 1);
        assert_eq!(resp.inventory_imported, None);

        let conn = db.get_conn().unwrap();
        let batches = Batch::list_all(&conn).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].name, "Nuevo");
        assert_eq!(batches[0].status, BatchStatus::Fermenting);
        // Numbers and comma decimals both land as normalized text
        assert_eq!(batches[0].must.pulp_mass_kg, "10");
        assert_eq!(batches[0].adjustments.initial_sg, "1.085");

        let log = LogEntry::list_for_batch(&conn, batches[0].id).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].sg, Some(1.06));
        assert_eq!(log[1].brix, None);
        assert_eq!(log[1].temp_c, None);
        assert_eq!(log[1].notes, None);

        // Inventory key was absent, so the old item survives
        let items = InventoryItem::list_all(&conn).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Levadura");
    }

    #[test]
    fn test_import_inventory_only() {
        let db = test_db("portability_inventory");
        let json = r#"{
            "inventory": [
                {"id": "item-123", "name": "Uva Merlot", "brand": "Viñedo Local", "quantity": "25", "unit": "kg", "expiry": "2025-09-15"},
                {"name": "Bentonita", "quantity": 200}
            ]
        }"#;

        let resp = import_json(&db, json).unwrap();
        assert_eq!(resp.lotes_imported, None);
        assert_eq!(resp.inventory_imported, Some(2));

        let conn = db.get_conn().unwrap();
        let items = InventoryItem::list_all(&conn).unwrap();
        assert_eq!(items[0].quantity, 25.0);
        assert_eq!(items[0].brand.as_deref(), Some("Viñedo Local"));
        assert_eq!(items[1].unit, "g");
        assert_eq!(items[1].brand, None);
    }

    #[test]
    fn test_import_rejects_malformed_json() {
        let db = test_db("portability_malformed");
        let err = import_json(&db, "{not json").unwrap_err();
        assert!(err.contains("Invalid JSON data"));
    }

    #[test]
    fn test_round_trip_preserves_batches() {
        let db = test_db("portability_roundtrip");
        let json = r#"{
            "lotes": [{
                "name": "Merlot",
                "creationDate": "2025-07-01",
                "yeast": "EC-1118",
                "mosto": {"pulpa": "20", "pulpaBrix": "22", "agua": "5", "ph": "3.5"},
                "ajustes": {"azucar": "1", "sgInicial": "1.090", "bxInicial": "21.8", "tempInicial": "22"},
                "ingredientes": [{"name": "Nutriente (Fermaid K)", "quantity": "5", "unit": "g"}],
                "fermentationLog": [{"date": "2025-07-01", "sg": 1.09, "brix": 21.8, "temp": 22, "notes": "Inicio."}],
                "status": "Completado"
            }],
            "inventory": []
        }"#;

        import_json(&db, json).unwrap();
        let exported = collect_export(&db).unwrap();

        let lotes = exported.lotes.unwrap();
        assert_eq!(lotes.len(), 1);
        assert_eq!(lotes[0].name, "Merlot");
        assert_eq!(lotes[0].status.as_deref(), Some("Completado"));
        assert_eq!(lotes[0].mosto.ph, "3.5");
        assert_eq!(lotes[0].fermentation_log.len(), 1);
        assert_eq!(lotes[0].fermentation_log[0].sg, Some(1.09));
        assert_eq!(exported.inventory.unwrap().len(), 0);
    }
}
