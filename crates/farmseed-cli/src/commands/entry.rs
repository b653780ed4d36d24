use std::path::Path;

use serde::Serialize;

use farmseed_core::models::{Coordinates, EntryDraft, EntryPatch, SeedEntry};

use crate::cli::EntryCommands;
use crate::commands::common::{open_store, parse_record_id};
use crate::error::CliError;

pub async fn run(command: EntryCommands, data_dir: &Path) -> Result<(), CliError> {
    match command {
        EntryCommands::Add {
            producer,
            variety,
            lot,
            field,
            lat,
            lon,
            planting_date,
            rate,
            germination,
            traits,
            treatments,
            photos,
            map_label,
            notes,
        } => {
            let store = open_store(data_dir).await?;
            let entry = store
                .add_entry(EntryDraft {
                    photos,
                    coordinates: Coordinates {
                        latitude: lat,
                        longitude: lon,
                    },
                    producer,
                    variety_name: variety,
                    lot_number: lot,
                    planting_date,
                    rate,
                    traits,
                    treatments,
                    germination_percent: germination,
                    notes,
                    field_name: field,
                    map_label,
                })
                .await;
            println!("{}", entry.id);
            Ok(())
        }
        EntryCommands::List {
            search,
            limit,
            json,
        } => run_list(search.as_deref(), limit, json, data_dir).await,
        EntryCommands::Update {
            id,
            variety,
            rate,
            germination,
            field,
            notes,
        } => {
            let store = open_store(data_dir).await?;
            let id = parse_record_id(&id)?;
            let patch = EntryPatch {
                variety_name: variety,
                rate,
                germination_percent: germination,
                field_name: field,
                notes,
                ..EntryPatch::default()
            };
            match store.update_entry(id, patch).await {
                Some(updated) => {
                    println!("{}", updated.id);
                    Ok(())
                }
                None => Err(CliError::RecordNotFound(id.to_string())),
            }
        }
        EntryCommands::Delete { id } => {
            let store = open_store(data_dir).await?;
            let id = parse_record_id(&id)?;
            if store.delete_entry(id).await {
                println!("{id}");
                Ok(())
            } else {
                Err(CliError::RecordNotFound(id.to_string()))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EntryListItem {
    id: String,
    variety_name: String,
    producer: String,
    field_name: String,
    planting_date: String,
    updated_at: String,
}

async fn run_list(
    search: Option<&str>,
    limit: usize,
    as_json: bool,
    data_dir: &Path,
) -> Result<(), CliError> {
    let store = open_store(data_dir).await?;
    let mut entries = match search {
        Some(query) => store.search_entries(query).await,
        None => store.entries().await,
    };
    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    entries.truncate(limit);

    if as_json {
        let items: Vec<EntryListItem> = entries.iter().map(entry_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }
    Ok(())
}

fn entry_to_list_item(entry: &SeedEntry) -> EntryListItem {
    EntryListItem {
        id: entry.id.to_string(),
        variety_name: entry.variety_name.clone(),
        producer: entry.producer.clone(),
        field_name: entry.field_name.clone(),
        planting_date: entry.planting_date.clone(),
        updated_at: entry.updated_at.to_rfc3339(),
    }
}

fn format_entry_lines(entries: &[SeedEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let short_id: String = entry.id.to_string().chars().take(13).collect();
            let field = if entry.field_name.is_empty() {
                "-"
            } else {
                &entry.field_name
            };
            format!(
                "{short_id:<13}  {:<20}  {:<16}  {field}",
                entry.variety_name, entry.producer
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_entry_lines_pads_columns() {
        let entry = SeedEntry::new(EntryDraft {
            variety_name: "P1197".to_string(),
            producer: "Pioneer".to_string(),
            ..EntryDraft::default()
        });
        let lines = format_entry_lines(std::slice::from_ref(&entry));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("P1197"));
        assert!(lines[0].ends_with('-'));
    }
}
