use anyhow::{Context, Result};
use clap::Args;
use gitzip_core::{pack_repository, RepoOptions};
use gitzip_git::SystemRunner;
use tracing::info;

use crate::commands::{print_summary, ArchiveArgs};
use crate::fs_config::GitzipConfig;

#[derive(Args, Debug, Default)]
pub struct PackArgs {
    /// Remote to clone from
    #[arg(long)]
    pub origin: Option<String>,

    /// Branch to check out
    #[arg(long)]
    pub branch: Option<String>,

    /// Directory inside the repository to package
    #[arg(long)]
    pub subdir: Option<String>,

    #[command(flatten)]
    pub archive: ArchiveArgs,
}

pub fn run(cfg: &GitzipConfig, args: PackArgs) -> Result<()> {
    let opts = resolve(cfg, &args)?;
    let mut runner = SystemRunner::detect()?;
    info!(
        "packing {} of {} ({}) into {}",
        opts.subdir, opts.origin, opts.branch, opts.output
    );
    let summary = pack_repository(&opts, &mut runner)?;
    print_summary(&summary, args.archive.json)
}

fn resolve(cfg: &GitzipConfig, args: &PackArgs) -> Result<RepoOptions> {
    let origin = args
        .origin
        .clone()
        .or_else(|| cfg.origin.clone())
        .context("no origin given; pass --origin or set [repo] origin")?;
    let output = args
        .archive
        .output
        .clone()
        .or_else(|| cfg.output.clone())
        .context("no output given; pass --output or set [output] path")?;
    let mut exclude = cfg.exclude.clone();
    exclude.extend(args.archive.exclude.iter().cloned());
    Ok(RepoOptions {
        origin,
        branch: args.branch.clone().unwrap_or_else(|| cfg.branch.clone()),
        subdir: args.subdir.clone().unwrap_or_else(|| cfg.subdir.clone()),
        prefix: args
            .archive
            .prefix
            .clone()
            .unwrap_or_else(|| cfg.prefix.clone()),
        output,
        permission: args.archive.permission.unwrap_or(cfg.permission),
        exclude,
        include_git: args.archive.include_git || cfg.include_git,
    })
}
