use std::time::Duration;

use clap::Parser;

use crate::models::CLIConfig;

#[derive(Debug, Parser)]
#[command(name = "archgen-debug", about = "Interactive client for the archgen service")]
struct Args {
    /// Base URL of the archgen service.
    #[arg(long = "base", env = "ARCHGEN_URL", default_value = "http://localhost:8000")]
    base_url: String,

    /// Delay between status polls, in milliseconds.
    #[arg(long = "poll-ms", env = "ARCHGEN_POLL_MS", default_value_t = 1000)]
    poll_ms: u64,

    /// Print the full template instead of a preview.
    #[arg(long, env = "ARCHGEN_VERBOSE", default_value_t = false)]
    verbose: bool,
}

pub fn parse_config() -> CLIConfig {
    Args::parse().into()
}

impl From<Args> for CLIConfig {
    fn from(args: Args) -> Self {
        Self {
            base_url: args.base_url,
            poll_interval: Duration::from_millis(args.poll_ms.max(50)),
            verbose: args.verbose,
        }
    }
}
