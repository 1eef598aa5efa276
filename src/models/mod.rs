//! Data models
//!
//! Rust structs representing database entities.

mod batch;
mod ingredient;
mod inventory_item;
mod log_entry;

pub use batch::{Adjustments, Batch, BatchCreate, BatchStatus, BatchUpdate, MustComposition};
pub use ingredient::{
    IngredientUsage, IngredientUsageCreate, IngredientUsageUpdate, resolve_unit,
};
pub use inventory_item::{InventoryItem, InventoryItemCreate, InventoryItemUpdate};
pub use log_entry::{LogEntry, LogEntryCreate, LogEntryUpdate};
