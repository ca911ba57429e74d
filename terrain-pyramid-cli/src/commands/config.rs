//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show`, and `config path`.

use std::path::Path;

use clap::Subcommand;
use terrain_pyramid::ConfigFile;

use super::common::{config_path, load_config};
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, explicit: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(explicit, force),
        ConfigCommands::Show => run_show(explicit),
        ConfigCommands::Path => run_path(explicit),
    }
}

fn run_init(explicit: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path(explicit)?;
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }
    ConfigFile::default().save(&path)?;
    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to set source and output directories.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn run_show(explicit: Option<&Path>) -> Result<(), CliError> {
    let file = load_config(explicit)?;
    let p = &file.pyramid;
    let unset = || "(not set)".to_string();

    println!("[input]");
    println!("  elevation_dir   = {}", p.elevation_dir.display());
    println!(
        "  color_dir       = {}",
        p.color_dir.as_ref().map(|d| d.display().to_string()).unwrap_or_else(unset)
    );
    println!("  extensions      = {}", p.source_extensions.join(","));
    println!("  merge_order     = {}", p.merge_order.as_str());
    println!();
    println!("[pyramid]");
    println!("  tile_px         = {}", p.tile_px);
    println!(
        "  max_levels      = {}",
        p.max_levels.map(|l| l.to_string()).unwrap_or_else(unset)
    );
    println!("  seam_overlap_px = {}", p.seam_overlap_px);
    println!("  height_sampling = {}", p.height_sampling);
    println!("  color_filter    = {}", p.color_filter);
    println!(
        "  threads         = {}",
        p.threads.map(|t| t.to_string()).unwrap_or_else(unset)
    );
    println!();
    println!("[elevation]");
    println!("  scale           = {}", p.elevation_encoding.scale);
    println!("  offset          = {}", p.elevation_encoding.offset);
    println!(
        "  nodata          = {}",
        p.elevation_encoding.nodata.map(|n| n.to_string()).unwrap_or_else(unset)
    );
    println!();
    println!("[output]");
    println!("  dir             = {}", p.output_dir.display());
    println!("  color_format    = {}", p.color_format);
    println!("  srs             = {}", p.srs.clone().unwrap_or_else(unset));
    println!();
    println!("[logging]");
    println!("  level           = {}", file.logging.level);
    println!(
        "  file            = {}",
        file.logging
            .file
            .as_ref()
            .map(|f| f.display().to_string())
            .unwrap_or_else(unset)
    );
    Ok(())
}

fn run_path(explicit: Option<&Path>) -> Result<(), CliError> {
    println!("{}", config_path(explicit)?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        run_init(Some(&path), false).unwrap();
        assert!(path.is_file());
        assert!(run_init(Some(&path), false).is_err());
        run_init(Some(&path), true).unwrap();
    }

    #[test]
    fn test_show_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        run_init(Some(&path), false).unwrap();
        run_show(Some(&path)).unwrap();
    }
}
