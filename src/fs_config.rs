use std::fs;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use gitzip_core::DEFAULT_PERMISSION;
use serde::Deserialize;

pub const DEFAULT_CONFIG: &str = "gitzip.toml";

#[derive(Debug, Deserialize, Default)]
struct RepoSection {
    origin: Option<String>,
    branch: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ArchiveSection {
    subdir: Option<String>,
    prefix: Option<String>,
    permission: Option<u32>,
    exclude: Option<Vec<String>>,
    include_git: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputSection {
    path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    repo: Option<RepoSection>,
    archive: Option<ArchiveSection>,
    output: Option<OutputSection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitzipConfig {
    pub origin: Option<String>,
    pub branch: String,
    pub subdir: String,
    pub prefix: String,
    pub permission: u32,
    pub exclude: Vec<String>,
    pub include_git: bool,
    pub output: Option<Utf8PathBuf>,
    /// File the values came from, if any.
    pub source: Option<Utf8PathBuf>,
}

impl Default for GitzipConfig {
    fn default() -> Self {
        Self::from_raw(RawConfig::default(), Utf8Path::new("."), None)
    }
}

impl GitzipConfig {
    /// Reads `gitzip.toml` from the current directory, falling back to the
    /// defaults when there is none.
    pub fn load_default() -> Result<Self> {
        let path = Utf8Path::new(DEFAULT_CONFIG);
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from_path(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let raw: RawConfig = toml::from_str(&data).with_context(|| format!("parsing {path}"))?;
        let config_dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        Ok(Self::from_raw(raw, config_dir, Some(path.to_path_buf())))
    }

    fn from_raw(raw: RawConfig, config_dir: &Utf8Path, source: Option<Utf8PathBuf>) -> Self {
        let repo = raw.repo.unwrap_or_default();
        let archive = raw.archive.unwrap_or_default();
        let output = raw.output.unwrap_or_default();
        Self {
            origin: repo.origin,
            branch: repo.branch.unwrap_or_else(|| "main".to_string()),
            subdir: archive.subdir.unwrap_or_else(|| ".".to_string()),
            prefix: archive.prefix.unwrap_or_default(),
            permission: archive.permission.unwrap_or(DEFAULT_PERMISSION),
            exclude: archive.exclude.unwrap_or_default(),
            include_git: archive.include_git.unwrap_or(false),
            output: output.path.map(|p| resolve_path(config_dir, p)),
            source,
        }
    }
}

fn resolve_path(base: &Utf8Path, value: impl Into<Utf8PathBuf>) -> Utf8PathBuf {
    let candidate = value.into();
    if candidate.is_absolute() || base.as_str() == "." {
        candidate
    } else {
        base.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(DEFAULT_CONFIG)).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_apply_to_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");
        let cfg = GitzipConfig::load_from_path(&path).unwrap();
        assert_eq!(
            cfg,
            GitzipConfig {
                source: Some(path),
                ..GitzipConfig::default()
            }
        );
        assert_eq!(cfg.branch, "main");
        assert_eq!(cfg.subdir, ".");
        assert_eq!(cfg.permission, 0o644);
        assert!(cfg.output.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[repo]
origin = "https://example.com/acme/site.git"
branch = "release"

[archive]
subdir = "public"
prefix = "site"
permission = 0o600
exclude = ["drafts", "tmp/cache"]
include_git = true

[output]
path = "dist/site.zip"
"#,
        );
        let cfg = GitzipConfig::load_from_path(&path).unwrap();
        assert_eq!(cfg.origin.as_deref(), Some("https://example.com/acme/site.git"));
        assert_eq!(cfg.branch, "release");
        assert_eq!(cfg.subdir, "public");
        assert_eq!(cfg.prefix, "site");
        assert_eq!(cfg.permission, 0o600);
        assert_eq!(cfg.exclude, ["drafts", "tmp/cache"]);
        assert!(cfg.include_git);
        assert_eq!(
            cfg.output,
            Some(path.parent().unwrap().join("dist/site.zip"))
        );
    }

    #[test]
    fn invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[repo\norigin = 1");
        let err = GitzipConfig::load_from_path(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nope.toml")).unwrap();
        assert!(GitzipConfig::load_from_path(&path).is_err());
    }
}
