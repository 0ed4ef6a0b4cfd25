use anyhow::Result;
use serde::Serialize;
use which::which;

use crate::fs_config::GitzipConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    git: Option<String>,
    config: Option<String>,
    config_error: Option<String>,
    origin: Option<String>,
    branch: Option<String>,
    output: Option<String>,
}

/// Prints the report. A config that fails to load is reported, not fatal.
pub fn run(loaded: Result<GitzipConfig>) -> Result<()> {
    let report = build_report(loaded);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_report(loaded: Result<GitzipConfig>) -> DoctorReport {
    let git = which("git").ok().map(|p| p.display().to_string());
    match loaded {
        Ok(cfg) => DoctorReport {
            git,
            config: cfg.source.as_ref().map(|p| p.to_string()),
            config_error: None,
            origin: cfg.origin.clone(),
            branch: Some(cfg.branch.clone()),
            output: cfg.output.as_ref().map(|p| p.to_string()),
        },
        Err(err) => DoctorReport {
            git,
            config: None,
            config_error: Some(format!("{err:#}")),
            origin: None,
            branch: None,
            output: None,
        },
    }
}
