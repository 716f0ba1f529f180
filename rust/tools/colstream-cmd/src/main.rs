use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "colstream-cmd")]
#[command(about = "Command-line utility for colstream frame streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a stream and display a summary of its frames
    Inspect {
        /// Increase verbosity (-v lists every frame)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Stream file to inspect
        path: String,
    },

    /// Count the rows of a stream
    Count {
        /// Stream file to count
        path: String,
    },

    /// Print decoded rows as CSV
    Dump {
        /// Comma-separated columns to print, `column.subfield` for bit-field
        /// sub-fields (defaults to every column)
        #[arg(short, long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Stop after this many rows
        #[arg(short, long)]
        max_rows: Option<usize>,

        /// Decode each frame on this many threads
        #[arg(short, long, default_value_t = 1)]
        threads: usize,

        /// Stream file to dump
        path: String,
    },

    /// Re-encode a stream with a different number of rows per frame
    Rechunk {
        /// Rows per output frame
        #[arg(short, long)]
        rows_per_frame: usize,

        /// Source stream
        input: String,

        /// Destination stream
        output: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { verbose, path } => commands::inspect::run(verbose, path),
        Commands::Count { path } => commands::count::run(path),
        Commands::Dump {
            columns,
            max_rows,
            threads,
            path,
        } => commands::dump::run(columns, max_rows, threads, path),
        Commands::Rechunk {
            rows_per_frame,
            input,
            output,
        } => commands::rechunk::run(rows_per_frame, input, output),
    }
}
