//! Columnar table parsing for `list` and `ps` output.
//!
//! Both tables are whitespace-aligned with a header line. Column policy:
//! the first token is a non-spaced name, the id is a hex digest, the size
//! is `<number><optional space><unit>`; `ps` rows additionally carry a
//! `<percent>% <word>` processor column and a bare-integer context column;
//! whatever remains up to end-of-line is the free-text last column.
//!
//! A row that does not match is logged at debug and skipped — one garbled
//! line must never lose the rest of the batch.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use ollamadeck_core::{InstalledModel, RunningModel};

// NAME | ID | SIZE | MODIFIED
// qwen2.5:7b    845dbda0ea48    4.7 GB    5 hours ago
static LIST_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\w+)\s+(\d+\.?\d*\s*[KMGT]?B)\s+(.+?)\s*$")
        .expect("list row pattern is valid")
});

// NAME | ID | SIZE | PROCESSOR | CONTEXT | UNTIL
// llama3.2:latest a1b2c3d4e5f6 2.0 GB 100% GPU 4096 4 minutes from now
static PS_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\w+)\s+(\d+\.?\d*\s*[KMGT]?B)\s+(\d+%\s*\w+)\s+(\d+)\s+(.+?)\s*$")
        .expect("ps row pattern is valid")
});

/// Rows of data lines after the header, or an empty iterator when the
/// input has no data lines at all (header-only output is "no models",
/// not an error).
fn data_lines(output: &str) -> impl Iterator<Item = &str> {
    let mut lines: Vec<&str> = output.trim().lines().collect();
    if lines.len() < 2 {
        debug!(lines = lines.len(), "no data rows in tabular output");
        lines.clear();
    } else {
        lines.remove(0);
    }
    lines.into_iter()
}

/// Parse the `list` table into installed-model records.
#[must_use]
pub fn parse_list_output(output: &str) -> Vec<InstalledModel> {
    let models: Vec<InstalledModel> = data_lines(output)
        .filter_map(|line| {
            let caps = LIST_ROW.captures(line).or_else(|| {
                debug!(?line, "skipping unparseable list row");
                None
            })?;
            Some(InstalledModel {
                name: caps[1].to_string(),
                id: caps[2].to_string(),
                size: caps[3].to_string(),
                modified: caps[4].trim().to_string(),
            })
        })
        .collect();
    info!(count = models.len(), "parsed installed models");
    models
}

/// Parse the `ps` table into running-model records.
#[must_use]
pub fn parse_ps_output(output: &str) -> Vec<RunningModel> {
    let models: Vec<RunningModel> = data_lines(output)
        .filter_map(|line| {
            let caps = PS_ROW.captures(line).or_else(|| {
                debug!(?line, "skipping unparseable ps row");
                None
            })?;
            Some(RunningModel {
                name: caps[1].to_string(),
                id: caps[2].to_string(),
                size: caps[3].to_string(),
                processor: caps[4].to_string(),
                context: caps[5].to_string(),
                until: caps[6].trim().to_string(),
            })
        })
        .collect();
    info!(count = models.len(), "parsed running models");
    models
}
