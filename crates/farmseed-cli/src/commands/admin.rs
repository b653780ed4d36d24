use std::path::Path;

use crate::cli::AdminCommands;
use crate::commands::common::open_engine;
use crate::error::CliError;

pub async fn run(command: AdminCommands, data_dir: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_dir).await?;
    if engine.current_farm_id().await.is_none() {
        println!("Not connected to a farm; nothing to do");
        return Ok(());
    }

    match command {
        AdminCommands::PurgeResync => {
            engine.purge_local_and_resync().await?;
            println!("Purged local data and resynced from the remote");
        }
        AdminCommands::ClearInventory => {
            engine.force_delete_all_inventory().await?;
            println!("Deleted all inventory and usage records");
        }
    }
    Ok(())
}
