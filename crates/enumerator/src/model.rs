use crate::Result;
use serde::Serialize;
use serde_json::to_string_pretty;
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

// region:        --- Models

/// A hostname gathered from passive sources, not yet confirmed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub hostname: String,
    /// Names of the source modules that reported this hostname.
    pub sources: BTreeSet<String>,
    /// Deterministic discovery order (registry order, then alphabetical
    /// within one source's output).
    pub first_seen: usize,
}

/// Outcome of resolving one candidate against the wildcard baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Resolved,
    NxDomain,
    WildcardFalsePositive,
    TransientError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    pub candidate: Candidate,
    pub values: Vec<String>,
    pub classification: Classification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    /// Resolved but nothing answered: connection refused or timed out.
    Unreachable,
    /// TLS negotiation failed or the response was malformed.
    ProtocolError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub hostname: String,
    /// Scheme that produced a response, when one did.
    pub scheme: Option<String>,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub server: Option<String>,
    pub failure: Option<ProbeFailure>,
}

/// One verified subdomain, the unit callers consume. Hostname is unique
/// across the final record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalRecord {
    pub hostname: String,
    pub resolved_values: Vec<String>,
    pub alive: bool,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_failure: Option<ProbeFailure>,
    pub sources: Vec<String>,
}

// endregion:     --- Models

// region:        --- Exporting utils

pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        Ok(false)
    } else {
        fs::create_dir_all(dir)?;
        Ok(true)
    }
}

pub fn export_to_json(records: &[FinalRecord], path: &Path) -> Result<()> {
    let json = to_string_pretty(records)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

pub fn export_to_markdown(records: &[FinalRecord], target: &str, path: &Path) -> Result<()> {
    let mut md_content = String::new();
    writeln!(&mut md_content, "# Enumeration result for `{}`", target)?;
    writeln!(&mut md_content, "")?;
    writeln!(&mut md_content, "*Hosts marked alive answered an HTTP(S) probe; the others only resolved over DNS.*")?;

    for record in records {
        writeln!(&mut md_content, "")?;
        writeln!(
            &mut md_content,
            "## {} ({})",
            record.hostname,
            record.resolved_values.join(", ")
        )?;
        writeln!(&mut md_content, "")?;

        if record.alive {
            if let Some(status) = record.status_code {
                writeln!(&mut md_content, "- Status: **{}**", status)?;
            }
            if let Some(title) = &record.title {
                writeln!(&mut md_content, "- Title: {}", title)?;
            }
            if let Some(server) = &record.server {
                writeln!(&mut md_content, "- Server: `{}`", server)?;
            }
        } else {
            writeln!(&mut md_content, "- No HTTP(S) listener answered")?;
        }
        writeln!(
            &mut md_content,
            "- Sources: {}",
            record.sources.join(", ")
        )?;
    }

    let mut file = File::create(path)?;
    file.write_all(md_content.as_bytes())?;
    Ok(())
}

// endregion:     --- Exporting utils
