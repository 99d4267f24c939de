//! CLI commands for the tile compiler.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::compile::{compile_tile, CompileConfig};
use crate::formats::header;

#[derive(Parser)]
#[command(name = "navtile")]
#[command(about = "Routing-tile compiler for embedded navigation maps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a tile description into a binary routing tile
    Compile {
        /// Input tile description (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output tile file
        #[arg(short, long)]
        output: PathBuf,

        /// Target market drives on the left
        #[arg(long)]
        drive_on_left: bool,

        /// Skip turn-restriction attachment and clear the header flag
        #[arg(long)]
        no_restrictions: bool,
    },

    /// Print the header of a compiled tile, verifying its checksum
    Inspect {
        /// Tile file
        file: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Compile {
            input,
            output,
            drive_on_left,
            no_restrictions,
        } => {
            compile_tile(&CompileConfig {
                input,
                output,
                drive_on_left,
                enable_restrictions: !no_restrictions,
            })?;
        }
        Commands::Inspect { file } => {
            let h = header::read(&file)?;
            println!("Tile: {}", file.display());
            println!("  Created:       {}", h.created_unix);
            println!("  Drive on left: {}", h.drive_on_left);
            println!("  Restrictions:  {}", h.restrictions_enabled);
            println!(
                "  Nodes:         pos {:#x}, {} bytes",
                h.nodes_pos, h.nodes_size
            );
            println!(
                "  Roads:         pos {:#x}, {} bytes",
                h.roads_pos, h.roads_size
            );
            println!(
                "  Boundary:      pos {:#x}, {} bytes",
                h.bounds_pos, h.bounds_size
            );
            if let Some(high) = h.high_bounds {
                println!("  High boundary: pos {:#x}, {} bytes", high.pos, high.size);
                println!("  Class bounds:  {:?}", high.class_boundaries);
            }
        }
    }
    Ok(())
}
