use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::ValueEnum;
use colored::*;
use serde::Serialize;

use engine::{BootstrapOutcome, DiscoveryStats, PipelineOutcome};
use model::Candidate;

use crate::ui::use_colored_output;

/// Supported output formats for discovery reports.
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// One activated candidate as reported to the user.
#[derive(Debug, Serialize)]
pub struct CandidateSummary {
    pub id: String,
    pub version: String,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_filename: Option<String>,
    pub nest_level: u32,
    pub parents: Vec<String>,
    pub entries: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweaker: Option<String>,
}

impl CandidateSummary {
    fn new(candidate: &Candidate, parent_files: Vec<String>) -> Self {
        Self {
            id: candidate.id.clone(),
            version: candidate.version.to_string(),
            file: candidate.file.clone(),
            source_filename: candidate.source_filename.clone(),
            nest_level: candidate.nest_level(),
            parents: parent_files,
            entries: candidate.entries.len(),
            core_plugin: candidate.core_plugin.clone(),
            tweaker: candidate.tweaker.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub activated: Vec<CandidateSummary>,
    pub disabled_files: BTreeSet<String>,
    pub libraries: Vec<PathBuf>,
    pub bootstrap_activated: Vec<String>,
    pub stats: DiscoveryStats,
}

impl ScanReport {
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        let graph = &outcome.discovery.graph;
        // Activation holds clones, so parents are looked up by file.
        let by_file: BTreeMap<&PathBuf, &Candidate> =
            graph.iter().map(|(_, c)| (&c.file, c)).collect();
        let activated = outcome
            .activation
            .iter()
            .map(|c| {
                let parents: Vec<String> = by_file
                    .get(&c.file)
                    .map(|node| node.parents().iter().map(|&p| graph[p].filename()).collect())
                    .unwrap_or_default();
                CandidateSummary::new(c, parents)
            })
            .collect();
        Self {
            activated,
            disabled_files: outcome.disabled_files.clone(),
            libraries: outcome.libraries.clone(),
            bootstrap_activated: outcome.bootstrap.activated.iter().map(|c| c.filename()).collect(),
            stats: outcome.discovery.stats.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BootstrapReport {
    pub activated: Vec<CandidateSummary>,
    pub disabled_files: BTreeSet<String>,
    pub access_lists: Vec<String>,
    pub found: usize,
}

impl BootstrapReport {
    pub fn from_outcome(outcome: &BootstrapOutcome) -> Self {
        Self {
            activated: outcome
                .activated
                .iter()
                .map(|c| CandidateSummary::new(c, Vec::new()))
                .collect(),
            disabled_files: outcome.disabled_files.clone(),
            access_lists: outcome.access_lists.keys().cloned().collect(),
            found: outcome.graph.len(),
        }
    }
}

fn tag(label: &str, color: Color) -> String {
    if use_colored_output() {
        label.color(color).bold().to_string()
    } else {
        label.to_string()
    }
}

fn print_candidate(c: &CandidateSummary) {
    let mut line = format!("[{}] {} {} ({})", tag("PLUGIN", Color::Green), c.id, c.version, c.file.display());
    if c.nest_level > 0 {
        line.push_str(&format!(" nested level {} in {}", c.nest_level, c.parents.join(", ")));
    }
    if let Some(core) = &c.core_plugin {
        line.push_str(&format!(" core plugin {core}"));
    }
    if let Some(tweaker) = &c.tweaker {
        line.push_str(&format!(" tweaker {tweaker}"));
    }
    println!("{line}");
}

fn print_disabled(files: &BTreeSet<String>) {
    for file in files {
        println!("[{}] {file}", tag("DISABLED", Color::Yellow));
    }
}

pub fn print_scan(report: &ScanReport, fmt: Format) -> anyhow::Result<()> {
    match fmt {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => {
            for c in &report.activated {
                print_candidate(c);
            }
            for lib in &report.libraries {
                println!("[{}] {}", tag("LIBRARY", Color::BrightBlue), lib.display());
            }
            print_disabled(&report.disabled_files);
            println!(
                "{} activated, {} disabled, {} libraries, {} archives inspected in {} ms",
                report.activated.len(),
                report.disabled_files.len(),
                report.libraries.len(),
                report.stats.archives_inspected,
                report.stats.elapsed_ms
            );
        }
    }
    Ok(())
}

pub fn print_bootstrap(report: &BootstrapReport, fmt: Format) -> anyhow::Result<()> {
    match fmt {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => {
            for c in &report.activated {
                print_candidate(c);
            }
            for key in &report.access_lists {
                println!("[{}] {key}", tag("ACCESS", Color::BrightBlue));
            }
            print_disabled(&report.disabled_files);
            println!(
                "{} of {} archives activated early, {} disabled",
                report.activated.len(),
                report.found,
                report.disabled_files.len()
            );
        }
    }
    Ok(())
}
