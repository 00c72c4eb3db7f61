//! Conveyor CLI entrypoint.

use clap::Parser;
use conveyor_trace::{TracingConfig, init_tracing};

mod commands;
mod handlers;

use commands::{Commands, LogOutput};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(author, version, about = "Conveyor pipeline scheduling tools", long_about = None)]
struct Cli {
    /// Log line format
    #[arg(long, value_enum, default_value_t = LogOutput::Text, global = true)]
    log_format: LogOutput,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing = TracingConfig::default().with_default_filter("warn");
    if let LogOutput::Json = cli.log_format {
        tracing = tracing.json();
    }
    init_tracing(&tracing)?;

    match cli.command {
        Commands::Validate { path } => handlers::validate(&path)?,
        Commands::Vsm {
            path,
            pipeline,
            json,
        } => handlers::value_stream_map(&path, &pipeline, json)?,
        Commands::Trigger {
            path,
            pipeline,
            user,
            variables,
            message,
        } => handlers::trigger(&path, &pipeline, &user, variables, message.as_deref())?,
        Commands::Schema => handlers::schema()?,
    }

    Ok(())
}
