use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use opsdeck_core::config::{RemoteConfig, RestConfig, SyncConfig, WarnLevel};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Check,

    /// Write a config file with every default spelled out
    Init {
        /// PostgREST base URL; omit for the in-memory remote
        #[arg(long)]
        url: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Check => check(path, json),
        ConfigSubcommand::Init { url, force } => init(path, url, force, json),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn check(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = SyncConfig::load(path).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "remote": config.remote,
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path, url: Option<String>, force: bool, json: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    let config = SyncConfig {
        remote: url.map_or(RemoteConfig::Memory, |u| RemoteConfig::Rest(RestConfig::new(u))),
        ..SyncConfig::default()
    };
    config
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({ "path": path.display().to_string(), "config": config }))?;
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
