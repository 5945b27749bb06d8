//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pkgrisk",
    version,
    about = "Package health scoring and risk classification",
    long_about = "pkgrisk scores open-source packages on security, maintenance, community, \
                  bus factor, documentation and stability, classifies them into risk tiers, \
                  and publishes the results as hash-sharded chunk files for fast lookup."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/pkgrisk/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score and classify one raw metrics bundle
    Score {
        /// Path to a RawMetricsBundle JSON file
        bundle: PathBuf,

        /// Print the full composite score as JSON
        #[arg(long)]
        json: bool,
    },

    /// Explain the factors behind a bundle's score
    Explain {
        /// Path to a RawMetricsBundle JSON file
        bundle: PathBuf,
    },

    /// Score a directory of collected packages and publish the chunk set
    Publish {
        /// Ecosystem being published (e.g., "npm", "pypi")
        #[arg(short, long)]
        ecosystem: String,

        /// Directory of collected package JSON files
        #[arg(short, long, value_name = "DIR")]
        input: PathBuf,

        /// Output data directory (defaults to storage.data_dir)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Look up a published package record
    Lookup {
        /// Ecosystem name
        ecosystem: String,

        /// Exact package name
        name: String,

        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which chunk a package name hashes to
    Chunk {
        /// Package name
        name: String,

        /// Ecosystem used to render the chunk path
        #[arg(short, long)]
        ecosystem: Option<String>,
    },

    /// Verify a published chunk set against its manifest
    Verify {
        /// Ecosystem name
        ecosystem: String,
    },

    /// Resolve a dependency list against the published corpus
    Check {
        /// JSON array of parsed dependencies
        deps: PathBuf,

        /// Registry metadata snapshot used for packages that were never analyzed
        #[arg(short, long, value_name = "FILE")]
        registry: Option<PathBuf>,

        /// Print resolutions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file and scoring policy
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Print the active scoring policy as TOML
    Policy,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_publish() {
        let cli = Cli::try_parse_from([
            "pkgrisk", "publish", "--ecosystem", "npm", "--input", "collected", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Publish {
                ecosystem, output, ..
            } => {
                assert_eq!(ecosystem, "npm");
                assert_eq!(output, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
