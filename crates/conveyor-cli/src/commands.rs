//! CLI command definitions.

use clap::{Subcommand, ValueEnum};

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(default_value = "conveyor.yaml")]
        path: String,
    },

    /// Print the value stream map of a pipeline
    Vsm {
        /// Path to the configuration file
        path: String,

        /// Pipeline at the center of the map
        pipeline: String,

        /// Print the presentation model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Force a pipeline and run one scheduling pass
    Trigger {
        /// Path to the configuration file
        path: String,

        /// Pipeline to trigger
        pipeline: String,

        /// User recorded as the approver
        #[arg(short, long, default_value = "anonymous")]
        user: String,

        /// Variable override, NAME=VALUE
        #[arg(long = "var", value_parser = parse_variable)]
        variables: Vec<(String, String)>,

        /// Message attached to the build cause
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print the JSON schema of the configuration file
    Schema,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogOutput {
    #[default]
    Text,
    Json,
}

pub fn parse_variable(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
