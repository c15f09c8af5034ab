// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume transfer commands
//!
//! Commands: list, size, containers, export, import, save, load, push, pull,
//! clone, delete, empty

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use courier_core::application::transfer_service::{
    CloneRequest, ExportRequest, ImageRequest, ImportRequest, RegistryRequest, TransferService,
};
use courier_core::domain::registry::RegistryAuth;

#[derive(Subcommand)]
pub enum VolumeCommand {
    /// List volumes with driver, size and bound containers
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the size of one volume, or of all volumes
    Size {
        #[arg(value_name = "VOLUME")]
        volume: Option<String>,
    },

    /// List containers that have the volume bound
    Containers {
        #[arg(value_name = "VOLUME")]
        volume: String,
    },

    /// Export a volume to a host archive (.tar, .tar.gz, .tar.zst, .tar.bz2)
    Export {
        #[arg(value_name = "VOLUME")]
        volume: String,

        /// Host directory receiving the archive
        #[arg(value_name = "DIR")]
        dir: String,

        /// Archive file name; the extension selects the compression
        #[arg(value_name = "FILE_NAME")]
        file_name: String,
    },

    /// Replace a volume's contents with a host archive
    Import {
        #[arg(value_name = "VOLUME")]
        volume: String,

        /// Absolute path of the archive on the host
        #[arg(value_name = "ARCHIVE")]
        archive: String,
    },

    /// Save a volume into a local image
    Save {
        #[arg(value_name = "VOLUME")]
        volume: String,
        #[arg(value_name = "IMAGE")]
        image: String,
    },

    /// Replace a volume's contents with a saved image
    Load {
        #[arg(value_name = "VOLUME")]
        volume: String,
        #[arg(value_name = "IMAGE")]
        image: String,
    },

    /// Save a volume and push it to a registry
    Push {
        #[arg(value_name = "VOLUME")]
        volume: String,
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Base64 registry credential, as sent in X-Registry-Auth
        #[arg(long, env = "COURIER_REGISTRY_AUTH", hide_env_values = true)]
        auth: Option<String>,
    },

    /// Pull a saved volume from a registry and load it
    Pull {
        #[arg(value_name = "VOLUME")]
        volume: String,
        #[arg(value_name = "REFERENCE")]
        reference: String,

        /// Base64 registry credential, as sent in X-Registry-Auth
        #[arg(long, env = "COURIER_REGISTRY_AUTH", hide_env_values = true)]
        auth: Option<String>,
    },

    /// Copy a volume into a new volume with the same driver and labels
    Clone {
        #[arg(value_name = "VOLUME")]
        volume: String,
        #[arg(value_name = "DESTINATION")]
        destination: String,
    },

    /// Delete a volume
    Delete {
        #[arg(value_name = "VOLUME")]
        volume: String,
    },

    /// Remove every file from a volume
    Empty {
        #[arg(value_name = "VOLUME")]
        volume: String,
    },
}

pub async fn handle_command(command: VolumeCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let service = super::build_service(&config).await?;
    execute(service.as_ref(), command).await
}

/// Runs `command` against `service`.
pub async fn execute(service: &dyn TransferService, command: VolumeCommand) -> Result<()> {
    match command {
        VolumeCommand::List { json } => list(service, json).await,
        VolumeCommand::Size { volume } => size(service, volume).await,
        VolumeCommand::Containers { volume } => {
            for name in service.containers_for_volume(&volume).await? {
                println!("{}", name);
            }
            Ok(())
        }
        VolumeCommand::Export { volume, dir, file_name } => {
            let target = format!("{}/{}", dir.trim_end_matches('/'), file_name);
            service
                .export(ExportRequest {
                    volume: volume.clone(),
                    destination_dir: dir,
                    file_name,
                })
                .await?;
            done(&format!("Exported {} to {}", volume, target));
            Ok(())
        }
        VolumeCommand::Import { volume, archive } => {
            service
                .import(ImportRequest {
                    volume: volume.clone(),
                    archive_path: archive.clone(),
                })
                .await?;
            done(&format!("Imported {} into {}", archive, volume));
            Ok(())
        }
        VolumeCommand::Save { volume, image } => {
            service
                .save(ImageRequest {
                    volume: volume.clone(),
                    image: image.clone(),
                })
                .await?;
            done(&format!("Saved {} as {}", volume, image));
            Ok(())
        }
        VolumeCommand::Load { volume, image } => {
            service
                .load(ImageRequest {
                    volume: volume.clone(),
                    image: image.clone(),
                })
                .await?;
            done(&format!("Loaded {} into {}", image, volume));
            Ok(())
        }
        VolumeCommand::Push { volume, reference, auth } => {
            service
                .push(RegistryRequest {
                    volume: volume.clone(),
                    reference: reference.clone(),
                    auth: RegistryAuth::from_header(auth.as_deref()),
                })
                .await?;
            done(&format!("Pushed {} to {}", volume, reference));
            Ok(())
        }
        VolumeCommand::Pull { volume, reference, auth } => {
            service
                .pull(RegistryRequest {
                    volume: volume.clone(),
                    reference: reference.clone(),
                    auth: RegistryAuth::from_header(auth.as_deref()),
                })
                .await?;
            done(&format!("Pulled {} into {}", reference, volume));
            Ok(())
        }
        VolumeCommand::Clone { volume, destination } => {
            service
                .clone_volume(CloneRequest {
                    volume: volume.clone(),
                    destination_volume: destination.clone(),
                })
                .await?;
            done(&format!("Cloned {} to {}", volume, destination));
            Ok(())
        }
        VolumeCommand::Delete { volume } => {
            service.delete(&volume).await?;
            done(&format!("Deleted {}", volume));
            Ok(())
        }
        VolumeCommand::Empty { volume } => {
            service.empty(&volume).await?;
            done(&format!("Emptied {}", volume));
            Ok(())
        }
    }
}

async fn list(service: &dyn TransferService, json: bool) -> Result<()> {
    let volumes = service.list_volumes().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&volumes)?);
        return Ok(());
    }

    if volumes.is_empty() {
        println!("{}", "No volumes found".dimmed());
        return Ok(());
    }

    println!(
        "{:<32} {:<12} {:>10}  {}",
        "VOLUME".bold(),
        "DRIVER".bold(),
        "SIZE".bold(),
        "CONTAINERS".bold()
    );
    for (name, summary) in &volumes {
        let containers = if summary.containers.is_empty() {
            "-".dimmed().to_string()
        } else {
            summary.containers.join(", ")
        };
        println!(
            "{:<32} {:<12} {:>10}  {}",
            name, summary.driver, summary.size_human, containers
        );
    }

    Ok(())
}

async fn size(service: &dyn TransferService, volume: Option<String>) -> Result<()> {
    match volume {
        Some(volume) => {
            let size = service.volume_size(&volume).await?;
            println!("{} {}", volume.bold(), size.human);
        }
        None => {
            for (name, size) in service.volumes_size().await? {
                println!("{:<32} {:>10}", name, size.human);
            }
        }
    }
    Ok(())
}

fn done(message: &str) {
    println!("{}", format!("✓ {}", message).green());
}
