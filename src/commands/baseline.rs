use anyhow::{Context as AnyhowContext, Result};
use chrono::{DateTime, Utc};
use hostkit::Toolbox;
use reconcile::{BaselineManifest, BaselineSource};
use std::path::Path;

use crate::Context;
use crate::cli::BaselineArgs;
use crate::config::Config;
use crate::privilege;
use crate::ui;

pub fn run(ctx: &Context, args: BaselineArgs) -> Result<()> {
    let config = Config::load(ctx.config.as_deref())?;
    if args.capture {
        capture(ctx, &config, args.force)
    } else {
        show(&config, args.list)
    }
}

fn show(config: &Config, list: bool) -> Result<()> {
    let root = config.root();
    let release = super::detect_release(&root)?;
    let baseline = super::resolve_baseline(config, release)?;

    ui::header("Baseline");
    ui::kv("Release", &release.to_string());
    ui::kv("Source", &describe(baseline.source()));
    ui::kv("Entries", &baseline.len().to_string());

    if list {
        println!();
        for entry in baseline.entries() {
            println!("  {entry}");
        }
    } else {
        ui::dim("Use --list to print every entry");
    }
    Ok(())
}

fn capture(ctx: &Context, config: &Config, force: bool) -> Result<()> {
    privilege::require_root()?;

    let path = config.snapshot_path();
    if path.exists() && !force {
        anyhow::bail!(
            "Snapshot {} already exists. Use --force to replace it",
            path.display()
        );
    }

    let content = snapshot_text(&Toolbox::system(), Utc::now())?;
    write_snapshot(&path, &content)?;

    let entries = BaselineManifest::parse(&content, BaselineSource::Snapshot(path.clone())).len();
    if !ctx.quiet {
        ui::success(&format!("Captured {entries} entries to {}", path.display()));
    }
    log::info!("Wrote baseline snapshot {}", path.display());
    Ok(())
}

fn describe(source: &BaselineSource) -> String {
    match source {
        BaselineSource::Snapshot(path) => format!("installer snapshot {}", path.display()),
        BaselineSource::Manifest(path) => format!("release manifest {}", path.display()),
        BaselineSource::Inline => "inline".to_string(),
    }
}

/// Manual packages, then `snap:<name>` for every installed snap.
fn snapshot_text(tools: &Toolbox, now: DateTime<Utc>) -> Result<String> {
    let packages = tools
        .apt()
        .list_manual()
        .context("Failed to list manually installed packages")?;

    let snaps = if tools.snap().is_available() {
        tools.snap().list().context("Failed to list snaps")?
    } else {
        Vec::new()
    };

    let mut content = format!("# pristine baseline snapshot, captured {}\n", now.to_rfc3339());
    for package in packages {
        content.push_str(&package);
        content.push('\n');
    }
    for snap in snaps {
        content.push_str(&format!("snap:{}\n", snap.name));
    }
    Ok(content)
}

fn write_snapshot(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    let staging = path.with_extension("tmp");
    std::fs::write(&staging, content)
        .with_context(|| format!("Could not write {}", staging.display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Could not move snapshot into {}", path.display()))?;
    Ok(())
}
