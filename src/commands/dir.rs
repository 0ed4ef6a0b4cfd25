use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Args;
use gitzip_core::{pack_directory, DirOptions};

use crate::commands::{print_summary, ArchiveArgs};
use crate::fs_config::GitzipConfig;

#[derive(Args, Debug, Default)]
pub struct DirArgs {
    /// Directory (or single file) to package
    pub source: Utf8PathBuf,

    #[command(flatten)]
    pub archive: ArchiveArgs,
}

pub fn run(cfg: &GitzipConfig, args: DirArgs) -> Result<()> {
    let opts = resolve(cfg, &args)?;
    let summary = pack_directory(&opts)?;
    print_summary(&summary, args.archive.json)
}

fn resolve(cfg: &GitzipConfig, args: &DirArgs) -> Result<DirOptions> {
    let output = args
        .archive
        .output
        .clone()
        .or_else(|| cfg.output.clone())
        .context("no output given; pass --output or set [output] path")?;
    let mut exclude = cfg.exclude.clone();
    exclude.extend(args.archive.exclude.iter().cloned());
    Ok(DirOptions {
        source: args.source.clone(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_local_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(root.join("build/assets")).unwrap();
        std::fs::write(root.join("build/index.html"), "<p>ok</p>").unwrap();
        std::fs::write(root.join("build/assets/app.js"), "main()").unwrap();

        let args = DirArgs {
            source: root.join("build"),
            archive: ArchiveArgs {
                prefix: Some("app".into()),
                output: Some(root.join("app.zip")),
                ..ArchiveArgs::default()
            },
        };
        run(&GitzipConfig::default(), args).unwrap();
        assert!(root.join("app.zip").is_file());
    }

    #[test]
    fn output_falls_back_to_config() {
        let cfg = GitzipConfig {
            output: Some(Utf8PathBuf::from("out.zip")),
            include_git: true,
            ..GitzipConfig::default()
        };
        let opts = resolve(&cfg, &DirArgs::default()).unwrap();
        assert_eq!(opts.output, "out.zip");
        assert!(opts.include_git);
        assert_eq!(opts.prefix, "");
    }
}
