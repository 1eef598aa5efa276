//! Vinoteca Status Tool
//!
//! Provides runtime status information about the Vinoteca service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::db::Database;
use crate::models::{Batch, InventoryItem};

/// Batch tracking instructions for AI assistants
pub const BATCH_INSTRUCTIONS: &str = r#"
# Vinoteca Batch Tracking Instructions

This guide explains how to track home winemaking batches ("lotes") using the Vinoteca tools.

## Overview

Vinoteca tracks:
1. **Batches (lotes)** - One fermentation run each: must composition, adjustments, ingredients, fermentation log, lifecycle status
2. **Inventory** - Winemaking supplies (yeast, nutrients, sugar, fruit) with brand, stock and expiry
3. **Vinopedia** - A built-in enology glossary and COVENIN 3342-97 classification tables
4. **Analysis** - AI-generated status/tasting reports per batch (requires GEMINI_API_KEY)

---

## Numeric Text Fields

Must composition (`pulp_mass_kg`, `pulp_brix`, `water_volume_l`, `ph`), adjustments
(`added_sugar_kg`, `initial_sg`, `initial_brix`, `initial_temp_c`) and ingredient
quantities are **free-form numeric text**, not numbers:

- A decimal comma works: `"3,5"` is stored as `"3.5"`
- A bare leading dot gets a zero: `".5"` becomes `"0.5"`
- Text that does not parse as a number is stored empty and counts as 0 in calculations

Pass these as strings exactly as the winemaker dictates them. Do not round or reformat.

## Batch Lifecycle

| Stored value | Display form |
|--------------|--------------|
| `preparing` | En Preparación |
| `fermenting` | En Fermentación |
| `completed` | Completado |

`set_batch_status` and the `status` parameters accept either form. New batches
start as `preparing`.

---

## Step-by-Step Workflow

### Step 1: Stock the Inventory (optional but recommended)

```
add_inventory_item(
  name: "Nutriente (Fermaid K)",
  brand: "Scott Labs",
  quantity: 100,
  unit: "g",
  expiry_date: "2026-06-30"
)
```

Why first? When a batch ingredient matches an inventory item **by exact name**,
the ingredient inherits that item's unit automatically. Unmatched names default
to grams.

### Step 2: Create the Batch

```
create_batch(
  name: "Merlot Experimental 2025",
  creation_date: "2025-07-01",
  yeast: "EC-1118",
  pulp_mass_kg: "20",
  pulp_brix: "22",
  water_volume_l: "5",
  ph: "3,5",
  added_sugar_kg: "1",
  initial_sg: "1.090",
  initial_brix: "21.8",
  initial_temp_c: "22"
)
```

Creation seeds the fermentation log with one entry dated on the creation date,
carrying the initial SG/Brix/temperature readings and the note "Lote creado.".

An `ingredients` array can be passed inline (same fields as
`add_batch_ingredient`, minus `batch_id`); rows with a blank name are skipped.

### Step 3: Add Ingredients (or inline at creation)

```
add_batch_ingredient(
  batch_id: 1,
  name: "Nutriente (Fermaid K)",
  quantity: "5"
)
```

No `unit` given: it resolves from the inventory item of the same name ("g" here).
Pass `unit` explicitly to override.

### Step 4: Check the Formulation

```
get_batch_formulation(id: 1)
```

Returns the calculated plan:
- `estimated_volume_l` = water volume + 0.7 x pulp mass (pulp contributes ~0.7 L/kg)
- `total_mass_kg` = pulp + water (1 kg/L) + added sugar
- `pulp_mass_fraction_percent` = pulp share of total mass (0 when total mass is 0)
- Per-ingredient `concentration` in g/L against the estimated volume
  (kg quantities are converted to grams; "N/A" when the volume is 0)

The formulation is recomputed from current values on every call; there is
nothing to refresh.

### Step 5: Log the Fermentation

```
add_log_entry(
  batch_id: 1,
  date: "2025-07-03",
  sg: 1.075,
  brix: 18.8,
  temp_c: 24,
  notes: "Fermentación activa, burbujeo constante."
)

set_batch_status(id: 1, status: "fermenting")
```

All readings are optional; a note-only entry is valid. Entries list in
chronological order (same-date entries keep insertion order).

### Step 6: Chart the Curve

```
generate_fermentation_chart(
  batch_id: 1,
  metric: "sg",
  output_path: "/tmp/merlot_sg.png"
)
```

- `metric` is `"sg"` (default) or `"brix"`; it draws on the left axis,
  temperature on the right axis
- Needs at least 2 entries with the chosen metric, otherwise it errors
- Entries missing the metric or the temperature are skipped, not drawn as 0

### Step 7: Ask for an Analysis

```
analyze_batch(batch_id: 1)
```

Builds a Spanish prompt from the batch (name, status, latest log readings,
ingredient list) and asks the Gemini API for a report with four sections:

| Section | Heading in report |
|---------|-------------------|
| Status | Análisis del Estado Actual |
| Tasting | Notas de Cata Sugeridas |
| Next steps | Próximos Pasos |
| Advice | Consejo del Enólogo |

The response includes both `raw_report` and the parsed `sections`. A section
the model skipped reads "No disponible.". If the API call fails, the report
text is the error ("Error al contactar la IA: ...") and all four sections are
"No disponible.". Relay that text; do not retry in a loop.

**Requires the `GEMINI_API_KEY` environment variable on the server process.**

`sectionize_report(text: ...)` runs the same section parser over any text
without touching the database or the API.

---

## Vinopedia

```
glossary()                    // all nine terms
glossary(term: "trasiego")    // case-insensitive substring match
wine_classifications()        // sugar, sparkling and alcohol-grade tables
```

Definitions are in Spanish, based on COVENIN 3342-97. Quote them as-is.

## Backup and Restore

```
export_data(output_path: "/backups/vinoteca.json")
import_data(file_path: "/backups/vinoteca.json")
```

The file format is `{"lotes": [...], "inventory": [...], "exportDate": "..."}`
with the original tracker's field names, so old exports import cleanly.

**Import replaces a collection wholesale.** If the file has a `lotes` key, ALL
current batches are deleted first; same for `inventory`. A key that is absent
leaves that collection untouched. Confirm with the user before importing over
existing data.

---

## Quick Reference

| Task | Tool |
|------|------|
| Create batch | `create_batch` |
| View batch with log + formulation | `get_batch` |
| List/search batches | `list_batches` |
| Update batch fields | `update_batch` |
| Change lifecycle status | `set_batch_status` |
| Delete batch (cascades) | `delete_batch` |
| Formulation only | `get_batch_formulation` |
| Add ingredient | `add_batch_ingredient` |
| Update ingredient | `update_batch_ingredient` |
| Remove ingredient | `remove_batch_ingredient` |
| Add log entry | `add_log_entry` |
| List log entries | `list_log_entries` |
| Update log entry | `update_log_entry` |
| Delete log entry | `delete_log_entry` |
| Add inventory item | `add_inventory_item` |
| View inventory item | `get_inventory_item` |
| Search inventory | `search_inventory` |
| List inventory | `list_inventory` |
| Update inventory item | `update_inventory_item` |
| Delete inventory item | `delete_inventory_item` |
| AI analysis of a batch | `analyze_batch` |
| Parse report text into sections | `sectionize_report` |
| Render fermentation chart PNG | `generate_fermentation_chart` |
| Glossary lookup | `glossary` |
| Classification tables | `wine_classifications` |
| Export all data to JSON | `export_data` |
| Import data from JSON | `import_data` |
| Service status | `vinoteca_status` |

## Notes

- Dates use ISO format: YYYY-MM-DD; they are stored as given, not validated
- Deleting a batch deletes its ingredients and fermentation log (cascade)
- Deleting an inventory item never touches batches; the name reference simply
  stops resolving, and existing ingredient rows keep their unit
- Renaming a batch ingredient without passing a unit re-resolves the unit
  against the inventory
- `list_batches` sorts by `name`, `created_at`, `creation_date` or `status`;
  `list_inventory` by `name`, `quantity`, `expiry_date` or `created_at`
"#;

/// Runtime status of the Vinoteca service
#[derive(Debug, Clone, Serialize)]
pub struct VinotecaStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub batch_count: Option<i64>,
    pub inventory_count: Option<i64>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
}

impl StatusTracker {
    /// Create a new status tracker
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
        }
    }

    /// Get the current status
    pub fn get_status(&self, db: &Database) -> VinotecaStatus {
        let build_info = BuildInfo::current();

        // Get database size if it exists
        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let (batch_count, inventory_count) = match db.get_conn() {
            Ok(conn) => (
                Batch::count(&conn, None).ok(),
                InventoryItem::count(&conn).ok(),
            ),
            Err(_) => (None, None),
        };

        // Get process info
        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        VinotecaStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            batch_count,
            inventory_count,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
