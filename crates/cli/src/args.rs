use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use model::Side;

use crate::output::Format;

fn parse_side(s: &str) -> Result<Side, String> {
    s.parse()
}

fn parse_threads(s: &str) -> Result<usize, String> {
    let v: usize = s
        .parse()
        .map_err(|e: std::num::ParseIntError| e.to_string())?;
    if v == 0 {
        Err("threads must be greater than 0".into())
    } else {
        Ok(v)
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "nestloader - parallel discovery of plugin archives and the archives nested inside them",
    long_about = "nestloader scans a plugin directory, extracts archives declared inside other archives \
into a content-addressed cache, and resolves duplicate plugins into one activation list.

Examples:
  nestloader scan plugins/                 # Full discovery with a text report
  nestloader scan plugins/ --format json   # Machine-readable report
  nestloader bootstrap plugins/            # Core plugins and tweakers only",
    subcommand_required = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Show version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: Option<bool>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bootstrap pass, full discovery and duplicate resolution
    Scan(ScanArgs),
    /// Run only the bootstrap pass over core plugins and tweakers
    Bootstrap(ScanArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ScanArgs {
    /// Plugin directory to scan
    pub dir: PathBuf,
    /// Configuration file (defaults to <config_dir>/nestloader.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory for extracted nested archives
    #[arg(long = "nested-dir")]
    pub nested_dir: Option<PathBuf>,
    /// Classpath roots of the host, comma separated
    #[arg(long, value_delimiter = ',')]
    pub classpath: Vec<PathBuf>,
    /// Number of scan threads
    #[arg(long, value_parser = parse_threads)]
    pub threads: Option<usize>,
    /// Overall discovery timeout in seconds; 0 waits without a bound
    #[arg(long)]
    pub timeout: Option<i64>,
    /// Side the host runs on
    #[arg(long, value_parser = parse_side)]
    pub side: Option<Side>,
    /// Output format for the report
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
    /// Fail when duplicates with equal versions cannot be told apart
    #[arg(long)]
    pub strict: bool,
    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
    /// Suppress non-essential output
    #[arg(long)]
    pub quiet: bool,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_threads_rejects_zero() {
        assert!(parse_threads("0").is_err());
        assert_eq!(parse_threads("3"), Ok(3));
    }

    #[test]
    fn classpath_is_comma_separated() {
        let cli = Cli::try_parse_from([
            "nestloader",
            "scan",
            "plugins",
            "--classpath",
            "a.jar,b.jar",
            "--side",
            "server",
        ])
        .unwrap();
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.classpath, vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")]);
        assert_eq!(args.side, Some(Side::Server));
    }
}
