use std::path::Path;

use serde::Serialize;

use farmseed_core::models::{Coordinates, Field, FieldDraft};

use crate::cli::FieldCommands;
use crate::commands::common::{open_store, parse_record_id};
use crate::error::CliError;

pub async fn run(command: FieldCommands, data_dir: &Path) -> Result<(), CliError> {
    match command {
        FieldCommands::Add {
            name,
            lat,
            lon,
            acreage,
            crop,
            color,
            notes,
        } => {
            let store = open_store(data_dir).await?;
            let field = store
                .add_field(FieldDraft {
                    name,
                    coordinates: Coordinates {
                        latitude: lat,
                        longitude: lon,
                    },
                    acreage,
                    crop_type: crop,
                    notes,
                    color,
                })
                .await;
            println!("{}", field.id);
            Ok(())
        }
        FieldCommands::List { json } => run_list(json, data_dir).await,
        FieldCommands::Delete { id } => {
            let store = open_store(data_dir).await?;
            let id = parse_record_id(&id)?;
            if store.delete_field(id).await {
                println!("{id}");
                Ok(())
            } else {
                Err(CliError::RecordNotFound(id.to_string()))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldListItem {
    id: String,
    name: String,
    acreage: String,
    crop_type: String,
    updated_at: String,
}

async fn run_list(as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir).await?;
    let fields = store.fields().await;

    if as_json {
        let items: Vec<FieldListItem> = fields.iter().map(field_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for field in &fields {
            let short_id: String = field.id.to_string().chars().take(13).collect();
            let crop = if field.crop_type.is_empty() {
                "-"
            } else {
                &field.crop_type
            };
            println!("{short_id:<13}  {:<24}  {crop}", field.name);
        }
    }
    Ok(())
}

fn field_to_list_item(field: &Field) -> FieldListItem {
    FieldListItem {
        id: field.id.to_string(),
        name: field.name.clone(),
        acreage: field.acreage.clone(),
        crop_type: field.crop_type.clone(),
        updated_at: field.updated_at.to_rfc3339(),
    }
}
