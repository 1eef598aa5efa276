//! Utility to seed the database with the demo batch and inventory
//!
//! Loads the sample data that shipped with the original tracker: three
//! inventory items and one completed Merlot batch with a full fermentation
//! log. Does nothing if the database already has data.

use std::path::PathBuf;

/// Demo dataset in the JSON interchange format
const DEMO_DATA: &str = r#"{
  "lotes": [
    {
      "id": "lote-1",
      "name": "Merlot Experimental 2025",
      "creationDate": "2025-07-01",
      "yeast": "EC-1118",
      "mosto": { "pulpa": "20", "pulpaBrix": "22", "agua": "5", "ph": "3.5" },
      "ajustes": { "azucar": "1", "sgInicial": "1.090", "bxInicial": "21.8", "tempInicial": "22" },
      "ingredientes": [
        { "name": "Nutriente (Fermaid K)", "quantity": "5", "unit": "g" }
      ],
      "fermentationLog": [
        { "id": "log-1", "date": "2025-07-01", "sg": 1.090, "brix": 21.8, "temp": 22, "notes": "Mosto preparado y levadura inoculada." },
        { "id": "log-2", "date": "2025-07-03", "sg": 1.075, "brix": 18.8, "temp": 24, "notes": "Fermentación activa, burbujeo constante." },
        { "id": "log-3", "date": "2025-07-05", "sg": 1.050, "brix": 12.8, "temp": 25, "notes": "Aromas frutales intensos." },
        { "id": "log-4", "date": "2025-07-08", "sg": 1.025, "brix": 6.5, "temp": 23, "notes": "La actividad ha disminuido un poco." },
        { "id": "log-5", "date": "2025-07-12", "sg": 1.010, "brix": 2.6, "temp": 21, "notes": "Fermentación casi completa." },
        { "id": "log-6", "date": "2025-07-15", "sg": 0.998, "brix": -0.5, "temp": 20, "notes": "Fermentación finalizada. Se prepara para el primer trasiego." }
      ],
      "status": "Completado"
    }
  ],
  "inventory": [
    { "id": "item-1", "name": "Nutriente (Fermaid K)", "brand": "Scott Labs", "quantity": 100, "unit": "g", "expiry": "2026-06-30" },
    { "id": "item-2", "name": "Uva Merlot", "brand": "Viñedo Local", "quantity": 25, "unit": "kg", "expiry": "2025-09-15" },
    { "id": "item-3", "name": "Azúcar Refinada", "brand": "Genérico", "quantity": 5, "unit": "kg", "expiry": "2027-01-01" }
  ]
}"#;

fn get_database_path() -> PathBuf {
    std::env::var("VINOTECA_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            std::fs::create_dir_all(&path).ok();
            path.push("vinoteca.db");
            path
        })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_database_path();
    println!("Database path: {}", db_path.display());

    let database = vinoteca::db::Database::new(&db_path)?;

    // Run migrations
    database.with_conn(|conn| {
        vinoteca::db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    // Import replaces data wholesale, so refuse to clobber a database
    // that is already in use.
    let (batches, items) = database.with_conn(|conn| {
        Ok((
            vinoteca::models::Batch::count(conn, None)?,
            vinoteca::models::InventoryItem::count(conn)?,
        ))
    })?;
    if batches > 0 || items > 0 {
        println!(
            "Database already has {} batches and {} inventory items; nothing to do.",
            batches, items
        );
        return Ok(());
    }

    let result = vinoteca::tools::portability::import_json(&database, DEMO_DATA)?;
    println!("Demo data seeded:");
    println!("  Batches: {}", result.lotes_imported.unwrap_or(0));
    println!("  Log entries: {}", result.log_entries_imported);
    println!("  Ingredients: {}", result.ingredients_imported);
    println!("  Inventory items: {}", result.inventory_imported.unwrap_or(0));

    Ok(())
}
