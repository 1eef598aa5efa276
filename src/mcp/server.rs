//! Vinoteca MCP Server Implementation
//!
//! Implements the MCP server with all Vinoteca tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::models::{
    Adjustments, BatchCreate, BatchStatus, BatchUpdate, IngredientUsageCreate,
    IngredientUsageUpdate, InventoryItemCreate, InventoryItemUpdate, LogEntryCreate,
    LogEntryUpdate, MustComposition,
};
use crate::report::{GeminiClient, ReportBackend};
use crate::tools::analysis;
use crate::tools::batches;
use crate::tools::charts;
use crate::tools::glossary;
use crate::tools::inventory;
use crate::tools::portability;
use crate::tools::status::StatusTracker;

/// Vinoteca MCP Service
#[derive(Clone)]
pub struct VinotecaService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    /// Text-generation backend for analyze_batch
    backend: Arc<dyn ReportBackend>,
    tool_router: ToolRouter<VinotecaService>,
}

impl VinotecaService {
    pub fn new(database_path: PathBuf, database: Database) -> Self {
        Self::with_backend(database_path, database, Arc::new(GeminiClient::from_env()))
    }

    /// Build a service with an explicit analysis backend (tests swap in a
    /// scripted one to avoid live API calls).
    pub fn with_backend(
        database_path: PathBuf,
        database: Database,
        backend: Arc<dyn ReportBackend>,
    ) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path))),
            database,
            backend,
            tool_router: Self::tool_router(),
        }
    }
}

fn parse_status_param(s: &str) -> Result<BatchStatus, McpError> {
    BatchStatus::from_str(s).ok_or_else(|| {
        McpError::internal_error(
            format!(
                "Invalid status: {}. Valid values: preparing, fermenting, completed",
                s
            ),
            None,
        )
    })
}

// ============================================================================
// Batch Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateBatchParams {
    /// Name of the batch (e.g., "Merlot Experimental 2025")
    pub name: String,
    /// Creation date as YYYY-MM-DD; defaults to today
    pub creation_date: Option<String>,
    /// Yeast strain (e.g., "EC-1118")
    #[serde(default)]
    pub yeast: String,
    /// Fruit pulp mass in kg (numeric text; decimal comma accepted)
    #[serde(default)]
    pub pulp_mass_kg: String,
    /// Sugar content of the pulp in Brix degrees
    #[serde(default)]
    pub pulp_brix: String,
    /// Added water volume in liters
    #[serde(default)]
    pub water_volume_l: String,
    /// Must pH
    #[serde(default)]
    pub ph: String,
    /// Added sugar in kg
    #[serde(default)]
    pub added_sugar_kg: String,
    /// Initial specific gravity (e.g., "1.090")
    #[serde(default)]
    pub initial_sg: String,
    /// Initial Brix reading
    #[serde(default)]
    pub initial_brix: String,
    /// Initial must temperature in Celsius
    #[serde(default)]
    pub initial_temp_c: String,
    /// Lifecycle status; defaults to preparing
    pub status: Option<String>,
    /// Initial ingredient list; rows with a blank name are skipped
    #[serde(default)]
    pub ingredients: Vec<InlineIngredientParam>,
}

/// Single ingredient row for create_batch
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InlineIngredientParam {
    /// Ingredient name; an exact inventory match supplies the unit
    pub name: String,
    /// Quantity as numeric text (decimal comma accepted)
    #[serde(default)]
    pub quantity: String,
    /// Unit override; omit to inherit from the inventory (default "g")
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetBatchParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListBatchesParams {
    /// Case-insensitive name search
    pub query: Option<String>,
    /// Filter by lifecycle status (preparing, fermenting, completed)
    pub status: Option<String>,
    /// Sort field: name, creation_date, created_at, or status
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// Sort direction: asc or desc
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_sort_by() -> String { "name".to_string() }
fn default_sort_order() -> String { "asc".to_string() }
fn default_list_limit() -> i64 { 50 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateBatchParams {
    pub id: i64,
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
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetBatchStatusParams {
    pub id: i64,
    /// New status: preparing, fermenting, or completed (Spanish display
    /// names are accepted too)
    pub status: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteBatchParams {
    /// Batch ID to delete (ingredients and log entries cascade)
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetBatchFormulationParams {
    pub id: i64,
}

// ============================================================================
// Ingredient Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddBatchIngredientParams {
    pub batch_id: i64,
    /// Ingredient name; when it matches an inventory item that item's unit
    /// is inherited unless one is given here
    pub name: String,
    /// Quantity as numeric text
    #[serde(default)]
    pub quantity: String,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateBatchIngredientParams {
    pub id: i64,
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RemoveBatchIngredientParams {
    pub id: i64,
}

// ============================================================================
// Fermentation Log Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddLogEntryParams {
    pub batch_id: i64,
    /// Reading date as YYYY-MM-DD; defaults to today
    pub date: Option<String>,
    /// Specific gravity reading
    pub sg: Option<f64>,
    /// Brix reading
    pub brix: Option<f64>,
    /// Temperature in Celsius
    pub temp_c: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListLogEntriesParams {
    pub batch_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateLogEntryParams {
    pub id: i64,
    pub date: Option<String>,
    pub sg: Option<f64>,
    pub brix: Option<f64>,
    pub temp_c: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteLogEntryParams {
    pub id: i64,
}

// ============================================================================
// Inventory Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddInventoryItemParams {
    pub name: String,
    pub brand: Option<String>,
    /// Quantity on hand (default 0)
    #[serde(default)]
    pub quantity: f64,
    /// Unit of measure (default "g")
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Expiry date as YYYY-MM-DD
    pub expiry_date: Option<String>,
}

fn default_unit() -> String { "g".to_string() }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetInventoryItemParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchInventoryParams {
    /// Matches against item name and brand
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 { 20 }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListInventoryParams {
    /// Sort field: name, quantity, expiry_date, or created_at
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateInventoryItemParams {
    pub id: i64,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteInventoryItemParams {
    /// Inventory item ID to delete (batch ingredients keep their copied
    /// name and unit)
    pub id: i64,
}

// ============================================================================
// Analysis and Chart Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AnalyzeBatchParams {
    pub batch_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SectionizeReportParams {
    /// Raw report text with **Estado Actual** style headings
    pub report: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateFermentationChartParams {
    pub batch_id: i64,
    /// Primary metric: "sg" or "brix" (temperature rides the secondary axis)
    #[serde(default = "default_chart_metric")]
    pub metric: String,
    /// Image width in pixels
    #[serde(default = "default_chart_width")]
    pub width: u32,
    /// Image height in pixels
    #[serde(default = "default_chart_height")]
    pub height: u32,
    /// Path for the output PNG file
    pub output_path: String,
}

fn default_chart_metric() -> String { "sg".to_string() }
fn default_chart_width() -> u32 { 900 }
fn default_chart_height() -> u32 { 500 }

// ============================================================================
// Vinopedia Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GlossaryParams {
    /// Case-insensitive term filter; omit to list every term
    pub term: Option<String>,
}

// ============================================================================
// Backup / Restore Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportDataParams {
    /// Path for the output JSON file
    pub output_path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImportDataParams {
    /// Path to a previously exported JSON file. Import replaces existing
    /// data wholesale for each section present in the file.
    pub file_path: String,
}

// ============================================================================
// Tool Implementations
// ============================================================================

#[tool_router]
impl VinotecaService {
    // --- Status ---

    #[tool(description = "Get the current status of the Vinoteca service including build info, database status, and process information")]
    async fn vinoteca_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(&self.database);
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get step-by-step instructions for tracking winemaking batches. Call this when starting a tracking session or when unsure how to use the batch tools.")]
    fn batch_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::BATCH_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(BATCH_INSTRUCTIONS)]))
    }

    // --- Batches ---

    #[tool(description = "Create a new winemaking batch, optionally with its initial ingredient list. Numeric fields take text; decimal commas are normalized and unparseable values become empty.")]
    fn create_batch(&self, Parameters(p): Parameters<CreateBatchParams>) -> Result<CallToolResult, McpError> {
        use crate::tools::batches::InlineIngredient;
        let status = p.status.as_deref().map(parse_status_param).transpose()?;
        let data = BatchCreate {
            name: p.name,
            creation_date: p.creation_date,
            yeast: p.yeast,
            must: MustComposition {
                pulp_mass_kg: p.pulp_mass_kg,
                pulp_brix: p.pulp_brix,
                water_volume_l: p.water_volume_l,
                ph: p.ph,
            },
            adjustments: Adjustments {
                added_sugar_kg: p.added_sugar_kg,
                initial_sg: p.initial_sg,
                initial_brix: p.initial_brix,
                initial_temp_c: p.initial_temp_c,
            },
            status,
        };
        let ingredients: Vec<InlineIngredient> = p.ingredients.into_iter().map(|i| InlineIngredient {
            name: i.name,
            quantity: i.quantity,
            unit: i.unit,
        }).collect();
        let result = batches::create_batch(&self.database, data, ingredients).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get full batch details with ingredients, fermentation log, and calculated formulation")]
    fn get_batch(&self, Parameters(p): Parameters<GetBatchParams>) -> Result<CallToolResult, McpError> {
        let result = batches::get_batch(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(batch) => serde_json::to_string_pretty(&batch),
            None => Ok(format!(r#"{{"error": "Batch not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List batches with optional name search, status filter, sorting, and pagination")]
    fn list_batches(&self, Parameters(p): Parameters<ListBatchesParams>) -> Result<CallToolResult, McpError> {
        let result = batches::list_batches(&self.database, p.query.as_deref(), p.status.as_deref(), &p.sort_by, &p.sort_order, p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Update batch fields. Only provided fields change; numeric text is normalized.")]
    fn update_batch(&self, Parameters(p): Parameters<UpdateBatchParams>) -> Result<CallToolResult, McpError> {
        let status = p.status.as_deref().map(parse_status_param).transpose()?;
        let data = BatchUpdate {
            name: p.name,
            creation_date: p.creation_date,
            yeast: p.yeast,
            pulp_mass_kg: p.pulp_mass_kg,
            pulp_brix: p.pulp_brix,
            water_volume_l: p.water_volume_l,
            ph: p.ph,
            added_sugar_kg: p.added_sugar_kg,
            initial_sg: p.initial_sg,
            initial_brix: p.initial_brix,
            initial_temp_c: p.initial_temp_c,
            status,
        };
        let result = batches::update_batch(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(batch) => serde_json::to_string_pretty(&batch),
            None => Ok(format!(r#"{{"error": "Batch not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Set the lifecycle status of a batch (preparing, fermenting, completed)")]
    fn set_batch_status(&self, Parameters(p): Parameters<SetBatchStatusParams>) -> Result<CallToolResult, McpError> {
        let result = batches::set_batch_status(&self.database, p.id, &p.status)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(updated) => serde_json::to_string_pretty(&updated),
            None => Ok(format!(r#"{{"error": "Batch not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a batch along with its ingredients and fermentation log")]
    fn delete_batch(&self, Parameters(p): Parameters<DeleteBatchParams>) -> Result<CallToolResult, McpError> {
        let result = batches::delete_batch(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the estimated formulation for a batch: volume, total mass, pulp fraction, and per-ingredient concentrations in g/L")]
    fn get_batch_formulation(&self, Parameters(p): Parameters<GetBatchFormulationParams>) -> Result<CallToolResult, McpError> {
        let result = batches::get_batch_formulation(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(view) => serde_json::to_string_pretty(&view),
            None => Ok(format!(r#"{{"error": "Batch not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Batch Ingredients ---

    #[tool(description = "Add an ingredient to a batch. When the name matches an inventory item and no unit is given, the item's unit is inherited.")]
    fn add_batch_ingredient(&self, Parameters(p): Parameters<AddBatchIngredientParams>) -> Result<CallToolResult, McpError> {
        let data = IngredientUsageCreate { batch_id: p.batch_id, name: p.name, quantity: p.quantity, unit: p.unit };
        let result = batches::add_batch_ingredient(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Update a batch ingredient's name, quantity, or unit. A name change re-resolves the unit from inventory unless a unit is also given.")]
    fn update_batch_ingredient(&self, Parameters(p): Parameters<UpdateBatchIngredientParams>) -> Result<CallToolResult, McpError> {
        let data = IngredientUsageUpdate { name: p.name, quantity: p.quantity, unit: p.unit };
        let result = batches::update_batch_ingredient(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(ing) => serde_json::to_string_pretty(&ing),
            None => Ok(format!(r#"{{"error": "Ingredient not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Remove an ingredient from a batch")]
    fn remove_batch_ingredient(&self, Parameters(p): Parameters<RemoveBatchIngredientParams>) -> Result<CallToolResult, McpError> {
        let deleted = batches::remove_batch_ingredient(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::json!({"success": deleted, "id": p.id}).to_string();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Fermentation Log ---

    #[tool(description = "Add a fermentation log entry (SG, Brix, temperature, notes) to a batch. Omitted readings stay absent rather than zero.")]
    fn add_log_entry(&self, Parameters(p): Parameters<AddLogEntryParams>) -> Result<CallToolResult, McpError> {
        let data = LogEntryCreate { batch_id: p.batch_id, date: p.date, sg: p.sg, brix: p.brix, temp_c: p.temp_c, notes: p.notes };
        let result = batches::add_log_entry(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List the fermentation log for a batch, oldest entry first")]
    fn list_log_entries(&self, Parameters(p): Parameters<ListLogEntriesParams>) -> Result<CallToolResult, McpError> {
        let result = batches::list_log_entries(&self.database, p.batch_id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Update a fermentation log entry's date, readings, or notes")]
    fn update_log_entry(&self, Parameters(p): Parameters<UpdateLogEntryParams>) -> Result<CallToolResult, McpError> {
        let data = LogEntryUpdate { date: p.date, sg: p.sg, brix: p.brix, temp_c: p.temp_c, notes: p.notes };
        let result = batches::update_log_entry(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(entry) => serde_json::to_string_pretty(&entry),
            None => Ok(format!(r#"{{"error": "Log entry not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a fermentation log entry")]
    fn delete_log_entry(&self, Parameters(p): Parameters<DeleteLogEntryParams>) -> Result<CallToolResult, McpError> {
        let deleted = batches::delete_log_entry(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::json!({"success": deleted, "id": p.id}).to_string();
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Inventory ---

    #[tool(description = "Add an item to the winemaking inventory (fruit, sugar, yeast, nutrients, etc.)")]
    fn add_inventory_item(&self, Parameters(p): Parameters<AddInventoryItemParams>) -> Result<CallToolResult, McpError> {
        let data = InventoryItemCreate { name: p.name, brand: p.brand, quantity: p.quantity, unit: p.unit, expiry_date: p.expiry_date };
        let result = inventory::add_inventory_item(&self.database, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get an inventory item with the batches that use it")]
    fn get_inventory_item(&self, Parameters(p): Parameters<GetInventoryItemParams>) -> Result<CallToolResult, McpError> {
        let result = inventory::get_inventory_item(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(item) => serde_json::to_string_pretty(&item),
            None => Ok(format!(r#"{{"error": "Inventory item not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Search inventory items by name or brand")]
    fn search_inventory(&self, Parameters(p): Parameters<SearchInventoryParams>) -> Result<CallToolResult, McpError> {
        let result = inventory::search_inventory(&self.database, &p.query, p.limit)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List inventory items with sorting and pagination")]
    fn list_inventory(&self, Parameters(p): Parameters<ListInventoryParams>) -> Result<CallToolResult, McpError> {
        let result = inventory::list_inventory(&self.database, &p.sort_by, &p.sort_order, p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Update an inventory item. Only provided fields change.")]
    fn update_inventory_item(&self, Parameters(p): Parameters<UpdateInventoryItemParams>) -> Result<CallToolResult, McpError> {
        let data = InventoryItemUpdate { name: p.name, brand: p.brand, quantity: p.quantity, unit: p.unit, expiry_date: p.expiry_date };
        let result = inventory::update_inventory_item(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(item) => serde_json::to_string_pretty(&item),
            None => Ok(format!(r#"{{"error": "Inventory item not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete an inventory item. Batch ingredients that referenced it keep their copied name and unit.")]
    fn delete_inventory_item(&self, Parameters(p): Parameters<DeleteInventoryItemParams>) -> Result<CallToolResult, McpError> {
        let result = inventory::delete_inventory_item(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Analysis ---

    #[tool(description = "Generate an AI tasting report for a batch and return it split into sections (Estado Actual, Notas de Cata, Próximos Pasos, Consejo del Enólogo). Requires GEMINI_API_KEY; backend failures are reported inside the report text.")]
    async fn analyze_batch(&self, Parameters(p): Parameters<AnalyzeBatchParams>) -> Result<CallToolResult, McpError> {
        let result = analysis::analyze_batch(&self.database, self.backend.as_ref(), p.batch_id)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(report) => serde_json::to_string_pretty(&report),
            None => Ok(format!(r#"{{"error": "Batch not found", "id": {}}}"#, p.batch_id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Split raw tasting-report text into the four standard sections without calling the AI backend")]
    fn sectionize_report(&self, Parameters(p): Parameters<SectionizeReportParams>) -> Result<CallToolResult, McpError> {
        let result = analysis::sectionize_text(&p.report);
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Charts ---

    #[tool(description = "Render a fermentation curve as a PNG file: SG or Brix on the left axis, temperature on the right. Needs at least 2 readings of the chosen metric.")]
    fn generate_fermentation_chart(&self, Parameters(p): Parameters<GenerateFermentationChartParams>) -> Result<CallToolResult, McpError> {
        let result = charts::generate_fermentation_chart(&self.database, p.batch_id, &p.metric, p.width, p.height, &p.output_path)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Vinopedia ---

    #[tool(description = "Look up winemaking terms in the Vinopedia glossary, optionally filtered by a case-insensitive term substring")]
    fn glossary(&self, Parameters(p): Parameters<GlossaryParams>) -> Result<CallToolResult, McpError> {
        let result = glossary::get_glossary(p.term.as_deref());
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the wine classification tables: by sugar content, by sparkling-wine sugar dosage, and by alcohol strength")]
    fn wine_classifications(&self) -> Result<CallToolResult, McpError> {
        let result = glossary::wine_classifications();
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Backup / Restore ---

    #[tool(description = "Export all batches and inventory to a JSON backup file")]
    fn export_data(&self, Parameters(p): Parameters<ExportDataParams>) -> Result<CallToolResult, McpError> {
        let result = portability::export_data(&self.database, &p.output_path)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Import batches and inventory from a JSON backup file. WARNING: each section present in the file replaces the existing data wholesale.")]
    fn import_data(&self, Parameters(p): Parameters<ImportDataParams>) -> Result<CallToolResult, McpError> {
        let result = portability::import_data(&self.database, &p.file_path)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for VinotecaService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "vinoteca".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Vinoteca - Winemaking Batch Tracker".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Vinoteca - Home winemaking batch, inventory, and tasting-report tracking. \
                 IMPORTANT: Call batch_instructions when starting a tracking session. \
                 Batches: create/get/list/update/delete_batch, set_batch_status, get_batch_formulation. \
                 Ingredients: add/update/remove_batch_ingredient (unit inherited from inventory when omitted). \
                 Fermentation log: add_log_entry/list_log_entries/update_log_entry/delete_log_entry. \
                 Inventory: add/get/search/list/update/delete_inventory_item. \
                 Analysis: analyze_batch (tasting report in Spanish), sectionize_report, generate_fermentation_chart. \
                 Vinopedia: glossary, wine_classifications. \
                 Backup: export_data/import_data; import replaces data wholesale for each section present."
                    .into(),
            ),
        }
    }
}
