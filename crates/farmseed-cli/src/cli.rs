use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "farmseed")]
#[command(about = "Record plantings, fields, and seed inventory from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local data directory
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage planting entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },
    /// Manage fields
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Manage seed inventory
    Inventory {
        #[command(subcommand)]
        command: InventoryCommands,
    },
    /// Create, join, and administer the shared farm workspace
    Farm {
        #[command(subcommand)]
        command: FarmCommands,
    },
    /// Synchronize with the farm's remote store
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Administrative recovery operations
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Record a new planting entry
    Add {
        /// Seed producer
        #[arg(long)]
        producer: String,
        /// Variety name
        #[arg(long)]
        variety: String,
        /// Lot number
        #[arg(long, default_value = "")]
        lot: String,
        /// Field name (free text, not a field id)
        #[arg(long, default_value = "")]
        field: String,
        /// Latitude of the planting location
        #[arg(long, default_value_t = 0.0)]
        lat: f64,
        /// Longitude of the planting location
        #[arg(long, default_value_t = 0.0)]
        lon: f64,
        /// Planting date (free text, e.g. 2026-05-01)
        #[arg(long, default_value = "")]
        planting_date: String,
        /// Seeding rate
        #[arg(long, default_value = "")]
        rate: String,
        /// Germination percentage
        #[arg(long, default_value = "")]
        germination: String,
        /// Trait (repeatable)
        #[arg(long = "trait", value_name = "TRAIT")]
        traits: Vec<String>,
        /// Treatment (repeatable)
        #[arg(long = "treatment", value_name = "TREATMENT")]
        treatments: Vec<String>,
        /// Photo reference (repeatable)
        #[arg(long = "photo", value_name = "URI")]
        photos: Vec<String>,
        /// Map label
        #[arg(long, default_value = "")]
        map_label: String,
        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List entries, newest first
    List {
        /// Filter by variety, producer, field name, or map label
        #[arg(long)]
        search: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update fields of an existing entry
    Update {
        /// Entry id
        id: String,
        #[arg(long)]
        variety: Option<String>,
        #[arg(long)]
        rate: Option<String>,
        #[arg(long)]
        germination: Option<String>,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum FieldCommands {
    /// Add a field
    Add {
        /// Field name
        #[arg(long)]
        name: String,
        /// Latitude of the representative point
        #[arg(long, default_value_t = 0.0)]
        lat: f64,
        /// Longitude of the representative point
        #[arg(long, default_value_t = 0.0)]
        lon: f64,
        /// Acreage
        #[arg(long, default_value = "")]
        acreage: String,
        /// Crop type
        #[arg(long, default_value = "")]
        crop: String,
        /// Display color tag
        #[arg(long, default_value = "")]
        color: String,
        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List fields
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a field
    Delete {
        /// Field id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum InventoryCommands {
    /// Add an inventory item
    Add {
        /// Item name
        #[arg(long)]
        name: String,
        /// Seed producer
        #[arg(long, default_value = "")]
        producer: String,
        /// Variety name
        #[arg(long, default_value = "")]
        variety: String,
        /// Lot number
        #[arg(long, default_value = "")]
        lot: String,
        /// Stock quantity
        #[arg(long)]
        quantity: f64,
        /// Stock unit
        #[arg(long, value_parser = crate::commands::inventory::parse_unit, default_value = "bags")]
        unit: farmseed_core::models::InventoryUnit,
        /// Seeds per unit
        #[arg(long, default_value_t = 0.0)]
        seeds_per_unit: f64,
        /// Germination percentage
        #[arg(long, default_value = "")]
        germination: String,
        /// Free-text notes
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List inventory items with usage totals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Consume stock from an item against an entry
    Consume {
        /// Inventory item id
        #[arg(long)]
        item: String,
        /// Entry id the seed went into
        #[arg(long)]
        entry: String,
        /// Quantity to consume
        #[arg(long)]
        quantity: f64,
    },
    /// Delete an inventory item
    Delete {
        /// Inventory item id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum FarmCommands {
    /// Create a farm and become its admin
    Create {
        /// Farm id (shared with other devices)
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Your display name
        #[arg(long)]
        user: String,
        /// Optional join password
        #[arg(long)]
        password: Option<String>,
    },
    /// Join an existing farm
    Join {
        /// Farm id
        id: String,
        /// Your display name
        #[arg(long)]
        user: String,
        /// Farm password, if set
        #[arg(long)]
        password: Option<String>,
    },
    /// Leave the current farm (local records are kept)
    Leave,
    /// List farm members
    Members {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a member row (admin only)
    RemoveMember {
        /// Membership row id
        member_id: String,
    },
    /// Delete a farm outright
    Delete {
        /// Farm id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Run one sync cycle now
    Now,
    /// Show connection and last-sync status
    Status,
    /// Keep syncing on a timer until interrupted
    Watch {
        /// Seconds between sync attempts
        #[arg(long, default_value = "120")]
        interval_secs: u64,
    },
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Drop all local data and rebuild it from the remote
    PurgeResync,
    /// Delete all inventory and usage records, remotely and locally
    ClearInventory,
}
