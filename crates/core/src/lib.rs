use anyhow::{bail, Context, Result};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use fs_err as fs;
use gitzip_git::{checkout_branch, read_head, CommandRunner, TempRepository};
use gitzip_pkg::{
    deny_git_dir, ArchiveSink, DenyPredicate, DenyPrefixes, PathWalker, Verdict, Visit, WalkError,
    WalkStats, ZipSink,
};
use gitzip_workdir::WorkDir;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

pub const DEFAULT_PERMISSION: u32 = 0o644;

#[derive(Debug, Clone)]
pub struct DirOptions {
    pub source: Utf8PathBuf,
    pub prefix: String,
    pub output: Utf8PathBuf,
    pub permission: u32,
    pub exclude: Vec<String>,
    pub include_git: bool,
}

#[derive(Debug, Clone)]
pub struct RepoOptions {
    pub origin: String,
    pub branch: String,
    pub subdir: String,
    pub prefix: String,
    pub output: Utf8PathBuf,
    pub permission: u32,
    pub exclude: Vec<String>,
    pub include_git: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackSummary {
    pub output: String,
    pub source: String,
    pub prefix: String,
    pub origin: Option<String>,
    pub branch: Option<String>,
    pub head_commit: Option<String>,
    pub files: u64,
    pub directories: u64,
    pub denied: u64,
    pub skipped: u64,
    pub bytes: u64,
    pub packaged_at: DateTime<Utc>,
}

impl PackSummary {
    fn new(source: &str, output: &str, prefix: &str, stats: WalkStats) -> Self {
        Self {
            output: output.to_string(),
            source: source.to_string(),
            prefix: prefix.to_string(),
            origin: None,
            branch: None,
            head_commit: None,
            files: stats.files,
            directories: stats.directories,
            denied: stats.denied,
            skipped: stats.skipped,
            bytes: stats.bytes,
            packaged_at: Utc::now(),
        }
    }
}

/// Zips `opts.source` into `opts.output`. The output file is removed again
/// if anything goes wrong after it was created.
pub fn pack_directory(opts: &DirOptions) -> Result<PackSummary> {
    let source = WorkDir::new(opts.source.as_str())
        .with_context(|| format!("resolving source {}", opts.source))?;
    source
        .metadata()
        .with_context(|| format!("source {} missing", source.absolute()))?;
    let output = WorkDir::new(opts.output.as_str())
        .with_context(|| format!("resolving output {}", opts.output))?;
    if let Some(parent) = output.as_path().parent() {
        fs::create_dir_all(parent.as_std_path())?;
    }

    let pb = progress_spinner("zip");
    pb.set_message(format!("zipping {}", source.absolute()));
    let file = fs::File::create(output.absolute())
        .with_context(|| format!("creating {}", output.absolute()))?;
    let mut policy = PackPolicy {
        output: output.absolute().to_string(),
        include_git: opts.include_git,
        exclude: DenyPrefixes::new(&opts.exclude),
    };

    match write_archive(file, &source, opts, &mut policy) {
        Ok(stats) => {
            pb.finish_with_message(format!("zipped {} files", stats.files));
            info!(
                "wrote {} ({} files, {} directories, {} bytes)",
                output.absolute(),
                stats.files,
                stats.directories,
                stats.bytes
            );
            Ok(PackSummary::new(
                source.absolute(),
                output.absolute(),
                &opts.prefix,
                stats,
            ))
        }
        Err(err) => {
            pb.abandon_with_message("zip failed");
            warn!("discarding partial archive {}", output.absolute());
            if let Err(remove_err) = fs::remove_file(output.absolute()) {
                warn!("could not remove {}: {remove_err}", output.absolute());
            }
            Err(err)
        }
    }
}

/// Checks `opts.branch` of `opts.origin` out into a temporary directory and
/// zips `opts.subdir` of it. The checkout is deleted before returning.
pub fn pack_repository(opts: &RepoOptions, runner: &mut dyn CommandRunner) -> Result<PackSummary> {
    let repo = TempRepository::new(opts.origin.as_str())?;

    let pb = progress_spinner("git");
    pb.set_message(format!("fetching {} ({})", opts.origin, opts.branch));
    if let Err(err) = checkout_branch(&repo, runner, &opts.branch) {
        pb.abandon_with_message("git failed");
        return Err(err).with_context(|| format!("checking out {} from {}", opts.branch, opts.origin));
    }
    let head_commit = match read_head(&repo, runner) {
        Ok(head) => Some(head),
        Err(err) => {
            warn!("unable to read HEAD of {}: {err}", opts.origin);
            None
        }
    };
    pb.finish_with_message("git complete");

    let subdir = WorkDir::relative(repo.workdir(), &[opts.subdir.as_str()])?;
    let root = repo.workdir().absolute();
    if subdir.absolute() != root && !subdir.absolute().starts_with(&format!("{root}/")) {
        bail!("subdirectory {} escapes the repository", opts.subdir);
    }
    let is_dir = subdir
        .is_directory()
        .with_context(|| format!("subdirectory {} missing in {}", opts.subdir, opts.origin))?;
    if !is_dir {
        bail!("{} in {} is not a directory", opts.subdir, opts.origin);
    }

    let mut summary = pack_directory(&DirOptions {
        source: Utf8PathBuf::from(subdir.absolute()),
        prefix: opts.prefix.clone(),
        output: opts.output.clone(),
        permission: opts.permission,
        exclude: opts.exclude.clone(),
        include_git: opts.include_git,
    })?;
    summary.source = opts.subdir.clone();
    summary.origin = Some(opts.origin.clone());
    summary.branch = Some(opts.branch.clone());
    summary.head_commit = head_commit;
    Ok(summary)
}

fn write_archive(
    file: fs::File,
    source: &WorkDir,
    opts: &DirOptions,
    policy: &mut PackPolicy,
) -> Result<WalkStats> {
    let mut sink = ZipSink::new(file);
    let stats = PathWalker::new(source.absolute(), opts.prefix.as_str(), &mut sink, opts.permission)
        .walk(Some(policy as &mut dyn DenyPredicate))?;
    sink.close()?;
    Ok(stats)
}

/// What never goes into the archive: the archive itself, git metadata
/// (unless asked for) and the excluded prefixes.
struct PackPolicy {
    output: String,
    include_git: bool,
    exclude: DenyPrefixes,
}

impl DenyPredicate for PackPolicy {
    fn check(&mut self, visit: &Visit<'_>) -> Result<Verdict, WalkError> {
        if visit.path.as_str() == self.output {
            return Ok(Verdict::Deny);
        }
        if !self.include_git && deny_git_dir(visit)? == Verdict::Deny {
            return Ok(Verdict::Deny);
        }
        self.exclude.check(visit)
    }
}

fn progress_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(label.to_string());
    pb
}
