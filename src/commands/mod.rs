pub mod dir;
pub mod doctor;
pub mod pack;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Args;
use gitzip_core::PackSummary;

pub use dir::DirArgs;
pub use pack::PackArgs;

/// Archive options shared by `pack` and `dir`.
#[derive(Args, Debug, Default)]
pub struct ArchiveArgs {
    /// Path inside the archive that replaces the source root
    #[arg(long)]
    pub prefix: Option<String>,

    /// Where to write the ZIP
    #[arg(long, short)]
    pub output: Option<Utf8PathBuf>,

    /// Relative path to leave out (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Keep .git directories in the archive
    #[arg(long)]
    pub include_git: bool,

    /// Octal mode recorded for archived files, e.g. 644
    #[arg(long, value_parser = parse_mode)]
    pub permission: Option<u32>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_mode(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal mode {value}: {e}"))
}

pub fn print_summary(summary: &PackSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("archive     = {}", summary.output);
    println!("source      = {}", summary.source);
    if let Some(origin) = &summary.origin {
        println!(
            "origin      = {} ({})",
            origin,
            summary.branch.as_deref().unwrap_or("?")
        );
    }
    if let Some(head) = &summary.head_commit {
        println!("head        = {head}");
    }
    println!("prefix      = {:?}", summary.prefix);
    println!(
        "entries     = {} files, {} directories ({} bytes)",
        summary.files, summary.directories, summary.bytes
    );
    if summary.denied > 0 || summary.skipped > 0 {
        println!(
            "left out    = {} denied, {} skipped",
            summary.denied, summary.skipped
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_as_octal() {
        assert_eq!(parse_mode("644").unwrap(), 0o644);
        assert_eq!(parse_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_mode("0o600").unwrap(), 0o600);
        assert!(parse_mode("9").is_err());
    }
}
