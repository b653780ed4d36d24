use std::path::Path;

use serde::Serialize;

use farmseed_core::models::FarmMember;

use crate::cli::FarmCommands;
use crate::commands::common::open_engine;
use crate::error::CliError;

pub async fn run(command: FarmCommands, data_dir: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_dir).await?;
    match command {
        FarmCommands::Create {
            id,
            name,
            user,
            password,
        } => {
            engine.create_farm(&id, &name, &user, password).await?;
            println!("Created farm '{id}' and uploaded local data");
            Ok(())
        }
        FarmCommands::Join { id, user, password } => {
            engine.join_farm(&id, &user, password).await?;
            println!("Joined farm '{id}'");
            Ok(())
        }
        FarmCommands::Leave => {
            let farm = engine.current_farm_id().await;
            engine.leave_farm().await?;
            match farm {
                Some(id) => println!("Left farm '{id}' (local records kept)"),
                None => println!("Not connected to a farm"),
            }
            Ok(())
        }
        FarmCommands::Members { json } => run_members(&engine, json).await,
        FarmCommands::RemoveMember { member_id } => {
            engine.remove_member(&member_id).await?;
            println!("{member_id}");
            Ok(())
        }
        FarmCommands::Delete { id } => {
            engine.delete_farm(&id).await?;
            println!("Deleted farm '{id}'");
            Ok(())
        }
    }
}

#[derive(Debug, Serialize)]
struct MemberListItem {
    id: String,
    user_name: String,
    device_id: String,
    is_admin: bool,
    joined_at: String,
}

async fn run_members(engine: &farmseed_core::SyncEngine, as_json: bool) -> Result<(), CliError> {
    engine.refresh_members().await?;
    let status = engine.status().await;

    if as_json {
        let items: Vec<MemberListItem> = status.members.iter().map(member_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for member in &status.members {
            let role = if member.is_admin { "admin" } else { "member" };
            println!("{:<12}  {:<20}  {role}", member.id, member.user_name);
        }
    }
    Ok(())
}

fn member_to_list_item(member: &FarmMember) -> MemberListItem {
    MemberListItem {
        id: member.id.clone(),
        user_name: member.user_name.clone(),
        device_id: member.device_id.clone(),
        is_admin: member.is_admin,
        joined_at: member.joined_at.to_rfc3339(),
    }
}
