use anyhow::Result;
use hostkit::Toolbox;
use reconcile::{
    AutoConfirm, Orchestrator, ProtectedSet, ReconciliationReport, RunMode, RunOptions,
};
use std::process::ExitCode;

use crate::Context;
use crate::cli::{ResetArgs, ScanArgs};
use crate::config::Config;
use crate::host::Host;
use crate::phases::{self, SshService};
use crate::privilege;
use crate::progress::{PhaseProgress, PromptConfirm};
use crate::render;
use crate::ui;

/// Report what a reset would remove.
pub fn scan(ctx: &Context, args: ScanArgs) -> Result<ExitCode> {
    run(ctx, RunMode::DryRun, args.json, false)
}

/// Remove everything outside the baseline.
pub fn reset(ctx: &Context, args: ResetArgs) -> Result<ExitCode> {
    if args.json && !args.yes {
        anyhow::bail!("reset --json needs --yes, the prompt cannot share stdout with the report");
    }
    run(ctx, RunMode::Execute, args.json, args.yes)
}

fn run(ctx: &Context, mode: RunMode, json: bool, yes: bool) -> Result<ExitCode> {
    let config = Config::load(ctx.config.as_deref())?;
    let skip = config.skipped_phases(&ctx.skip)?;
    privilege::require_root()?;

    let root = config.root();
    let release = super::detect_release(&root)?;
    let baseline = super::resolve_baseline(&config, release)?;
    log::info!(
        "{release}: {} baseline entries from {:?}",
        baseline.len(),
        baseline.source()
    );

    let host = Host::new(Toolbox::system(), &root)
        .with_batch(config.batch())
        .with_filesystem(config.filesystem.roots.clone(), config.filesystem.keep.clone());

    let ssh = SshService::new(
        host.tools().systemd(),
        ProtectedSet::standard().remote_access_unit(),
    );
    let mut orchestrator = Orchestrator::new(release, baseline, Box::new(ssh))?;
    phases::register_all(&mut orchestrator, &host)?;

    let mut options = match mode {
        RunMode::DryRun => RunOptions::dry_run(),
        RunMode::Execute => RunOptions::execute(),
    };
    options.skip = skip;

    if !json && !ctx.quiet {
        ui::header(match mode {
            RunMode::DryRun => "Scanning for changes since provisioning",
            RunMode::Execute => "Resetting to the provisioning baseline",
        });
        ui::kv("Release", &release.to_string());
        ui::kv("Baseline", &format!("{} entries", orchestrator.baseline().len()));
    }

    let mut progress = PhaseProgress::new(json || ctx.quiet);
    let report = if yes {
        orchestrator.run(&options, &mut progress, &mut AutoConfirm)
    } else {
        orchestrator.run(&options, &mut progress, &mut PromptConfirm)
    };

    show(ctx, &report, json)?;
    Ok(render::exit_code(&report))
}

fn show(ctx: &Context, report: &ReconciliationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", render::json(report)?);
    } else {
        render::human(report, ctx.verbose > 0);
    }
    Ok(())
}
