//! Entry point for the command-line interface.
//! Delegates to dedicated modules for argument handling,
//! the discovery run and output formatting.

use nestloader::args::{parse_cli, Commands};
use nestloader::scan::{run_bootstrap, run_scan};

fn main() -> anyhow::Result<()> {
    let cli = parse_cli();
    match cli.command {
        Commands::Scan(args) => run_scan(args),
        Commands::Bootstrap(args) => run_bootstrap(args),
    }
}
