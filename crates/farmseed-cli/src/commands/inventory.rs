use std::path::Path;

use serde::Serialize;

use farmseed_core::models::{InventoryItem, InventoryItemDraft, InventoryUnit};

use crate::cli::InventoryCommands;
use crate::commands::common::{open_store, parse_record_id};
use crate::error::CliError;

/// clap value parser for stock units
pub fn parse_unit(raw: &str) -> Result<InventoryUnit, String> {
    match raw.trim().to_lowercase().as_str() {
        "bags" => Ok(InventoryUnit::Bags),
        "boxes" => Ok(InventoryUnit::Boxes),
        "units" => Ok(InventoryUnit::Units),
        other => Err(format!("unknown unit '{other}' (expected bags, boxes, or units)")),
    }
}

pub async fn run(command: InventoryCommands, data_dir: &Path) -> Result<(), CliError> {
    match command {
        InventoryCommands::Add {
            name,
            producer,
            variety,
            lot,
            quantity,
            unit,
            seeds_per_unit,
            germination,
            notes,
        } => {
            let store = open_store(data_dir).await?;
            let item = store
                .add_inventory_item(InventoryItemDraft {
                    name,
                    producer,
                    variety_name: variety,
                    lot_number: lot,
                    quantity,
                    unit,
                    seeds_per_unit,
                    germination_percent: germination,
                    notes,
                    ..InventoryItemDraft::default()
                })
                .await;
            println!("{}", item.id);
            Ok(())
        }
        InventoryCommands::List { json } => run_list(json, data_dir).await,
        InventoryCommands::Consume {
            item,
            entry,
            quantity,
        } => {
            let store = open_store(data_dir).await?;
            let item_id = parse_record_id(&item)?;
            let entry_id = parse_record_id(&entry)?;
            let usage = store.consume(item_id, entry_id, quantity).await?;
            println!("{}", usage.id);
            Ok(())
        }
        InventoryCommands::Delete { id } => {
            let store = open_store(data_dir).await?;
            let id = parse_record_id(&id)?;
            if store.delete_inventory_item(id).await {
                println!("{id}");
                Ok(())
            } else {
                Err(CliError::RecordNotFound(id.to_string()))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct InventoryListItem {
    id: String,
    name: String,
    variety_name: String,
    quantity: f64,
    unit: String,
    total_used: f64,
}

async fn run_list(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir).await?;
    let items = store.inventory().await;

    let mut listed = Vec::with_capacity(items.len());
    for item in &items {
        listed.push(inventory_to_list_item(
            item,
            store.total_used_for_item(item.id).await,
        ));
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
    } else {
        for item in &listed {
            let short_id: String = item.id.chars().take(13).collect();
            println!(
                "{short_id:<13}  {:<24}  {:>8} {:<6}  used {}",
                item.name, item.quantity, item.unit, item.total_used
            );
        }
    }
    Ok(())
}

fn inventory_to_list_item(item: &InventoryItem, total_used: f64) -> InventoryListItem {
    InventoryListItem {
        id: item.id.to_string(),
        name: item.name.clone(),
        variety_name: item.variety_name.clone(),
        quantity: item.quantity,
        unit: item.unit.to_string(),
        total_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_unit_accepts_known_units() {
        assert_eq!(parse_unit("bags").unwrap(), InventoryUnit::Bags);
        assert_eq!(parse_unit(" Boxes ").unwrap(), InventoryUnit::Boxes);
        assert!(parse_unit("pallets").is_err());
    }
}
