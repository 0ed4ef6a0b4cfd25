use std::fmt;
use std::io;
use std::ops::Deref;
use std::path::PathBuf;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use gitzip_workdir::{to_slash, WorkDir, WorkDirError};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};
use which::which;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found on PATH: {0}")]
    NotFound(#[source] which::Error),
    #[error("creating temporary repository: {0}")]
    TempDir(#[source] io::Error),
    #[error(transparent)]
    WorkDir(#[from] WorkDirError),
    #[error("running {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("{command} failed with status {status:?}: {output}")]
    Failed {
        command: String,
        status: Option<i32>,
        output: String,
    },
}

/// A git invocation described as data. Nothing runs until a
/// [`CommandRunner`] picks it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Utf8PathBuf,
}

impl GitCommand {
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.current_dir);
        cmd
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A working tree tracking a single `origin` remote.
#[derive(Debug, Clone)]
pub struct Repository {
    workdir: WorkDir,
    origin: String,
}

impl Repository {
    pub fn new(origin: impl Into<String>, workdir: WorkDir) -> Self {
        Self {
            workdir,
            origin: origin.into(),
        }
    }

    pub fn workdir(&self) -> &WorkDir {
        &self.workdir
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn init(&self) -> GitCommand {
        self.cmd(&["init"])
    }

    pub fn remote_add_origin(&self) -> GitCommand {
        self.cmd(&["remote", "add", "origin", &self.origin])
    }

    pub fn fetch(&self, branch: &str) -> GitCommand {
        self.cmd(&["fetch", "--depth", "1", "origin", branch])
    }

    pub fn reset(&self, branch: &str) -> GitCommand {
        let target = format!("origin/{branch}");
        self.cmd(&["reset", "--hard", &target])
    }

    pub fn head_commit(&self) -> GitCommand {
        self.cmd(&["rev-parse", "HEAD"])
    }

    /// Any git subcommand, pinned to this repository with `-C`.
    pub fn cmd(&self, args: &[&str]) -> GitCommand {
        let root = self.workdir.absolute();
        let mut all = vec!["-C".to_string(), root.to_string()];
        all.extend(args.iter().map(|a| a.to_string()));
        GitCommand {
            program: "git".to_string(),
            args: all,
            current_dir: Utf8PathBuf::from(root),
        }
    }
}

/// A repository living in a fresh temporary directory, removed on drop.
#[derive(Debug)]
pub struct TempRepository {
    repo: Repository,
    _dir: TempDir,
}

impl TempRepository {
    pub fn new(origin: impl Into<String>) -> Result<Self, GitError> {
        let dir = tempfile::Builder::new()
            .prefix("gitzip-")
            .tempdir()
            .map_err(GitError::TempDir)?;
        let workdir = WorkDir::new(to_slash(dir.path())?)?;
        debug!("temporary repository at {}", workdir.absolute());
        Ok(Self {
            repo: Repository::new(origin, workdir),
            _dir: dir,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        self.repo.workdir.as_path()
    }
}

impl Deref for TempRepository {
    type Target = Repository;

    fn deref(&self) -> &Repository {
        &self.repo
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !out.is_empty() && !self.stderr.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&self.stderr);
        out
    }
}

/// Executes command descriptors.
pub trait CommandRunner {
    fn run(&mut self, command: &GitCommand) -> Result<CommandOutput, GitError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    binary: PathBuf,
}

impl SystemRunner {
    pub fn detect() -> Result<Self, GitError> {
        let binary = which("git").map_err(GitError::NotFound)?;
        Ok(Self { binary })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &GitCommand) -> Result<CommandOutput, GitError> {
        debug!("running {command}");
        let output = Command::new(&self.binary)
            .args(&command.args)
            .current_dir(&command.current_dir)
            .output()
            .map_err(|source| GitError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let captured = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into(),
            stderr: String::from_utf8_lossy(&output.stderr).into(),
        };
        if !output.status.success() {
            return Err(GitError::Failed {
                command: command.to_string(),
                status: captured.status,
                output: captured.combined(),
            });
        }
        Ok(captured)
    }
}

/// Turns an empty directory into a checkout of `origin/<branch>`: init,
/// add the remote, fetch, hard reset. Stops at the first failing step.
pub fn checkout_branch(
    repo: &Repository,
    runner: &mut dyn CommandRunner,
    branch: &str,
) -> Result<(), GitError> {
    info!("checking out {} ({branch}) into {}", repo.origin(), repo.workdir().absolute());
    for command in [
        repo.init(),
        repo.remote_add_origin(),
        repo.fetch(branch),
        repo.reset(branch),
    ] {
        runner.run(&command)?;
    }
    Ok(())
}

pub fn read_head(repo: &Repository, runner: &mut dyn CommandRunner) -> Result<String, GitError> {
    let output = runner.run(&repo.head_commit())?;
    Ok(output.stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&mut self, command: &GitCommand) -> Result<CommandOutput, GitError> {
            self.seen.push(command.args[2..].to_vec());
            if self.fail_on == Some(command.args[2].as_str()) {
                return Err(GitError::Failed {
                    command: command.to_string(),
                    status: Some(128),
                    output: "fatal: nope".into(),
                });
            }
            Ok(CommandOutput {
                status: Some(0),
                stdout: "abc123\n".into(),
                stderr: String::new(),
            })
        }
    }

    fn repo() -> Repository {
        Repository::new(
            "https://example.com/acme/tools.git",
            WorkDir::new("/work/tools").unwrap(),
        )
    }

    #[test]
    fn descriptors_pin_the_working_directory() {
        let repo = repo();
        let init = repo.init();
        assert_eq!(init.program, "git");
        assert_eq!(init.args, ["-C", "/work/tools", "init"]);
        assert_eq!(init.current_dir, "/work/tools");
        assert_eq!(init.to_string(), "git -C /work/tools init");

        assert_eq!(
            repo.remote_add_origin().args[2..],
            ["remote", "add", "origin", "https://example.com/acme/tools.git"]
        );
        assert_eq!(
            repo.fetch("main").args[2..],
            ["fetch", "--depth", "1", "origin", "main"]
        );
        assert_eq!(repo.reset("release/1.x").args[2..], ["reset", "--hard", "origin/release/1.x"]);
        assert_eq!(repo.head_commit().args[2..], ["rev-parse", "HEAD"]);
        assert_eq!(repo.cmd(&["pull", "origin", "HEAD"]).args.len(), 5);
    }

    #[test]
    fn checkout_runs_steps_in_order() {
        let mut runner = Recorder::default();
        checkout_branch(&repo(), &mut runner, "dev").unwrap();
        let verbs: Vec<&str> = runner.seen.iter().map(|args| args[0].as_str()).collect();
        assert_eq!(verbs, ["init", "remote", "fetch", "reset"]);
    }

    #[test]
    fn checkout_stops_at_first_failure() {
        let mut runner = Recorder {
            fail_on: Some("fetch"),
            ..Default::default()
        };
        let err = checkout_branch(&repo(), &mut runner, "dev").unwrap_err();
        assert!(matches!(err, GitError::Failed { status: Some(128), .. }));
        assert_eq!(runner.seen.len(), 3);
    }

    #[test]
    fn read_head_trims_output() {
        let mut runner = Recorder::default();
        assert_eq!(read_head(&repo(), &mut runner).unwrap(), "abc123");
    }

    #[test]
    fn combined_output_joins_streams() {
        let out = CommandOutput {
            status: Some(1),
            stdout: "out".into(),
            stderr: "err".into(),
        };
        assert_eq!(out.combined(), "out\nerr");
        assert_eq!(CommandOutput::default().combined(), "");
    }

    #[test]
    fn temp_repository_is_removed_on_drop() {
        let temp = TempRepository::new("https://example.com/x.git").unwrap();
        let path = temp.path().to_path_buf();
        assert!(path.is_dir());
        assert_eq!(temp.origin(), "https://example.com/x.git");
        assert_eq!(temp.init().current_dir, path);
        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn system_runner_initialises_a_repository() {
        let Ok(mut runner) = SystemRunner::detect() else {
            return;
        };
        let temp = TempRepository::new("https://example.com/x.git").unwrap();
        runner.run(&temp.init()).unwrap();
        runner.run(&temp.remote_add_origin()).unwrap();
        assert!(temp.path().join(".git").is_dir());

        let err = runner.run(&temp.cmd(&["rev-parse", "no-such-ref"])).unwrap_err();
        assert!(matches!(err, GitError::Failed { .. }));
    }
}
