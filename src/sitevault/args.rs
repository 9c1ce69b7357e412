use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("GIT_COMMIT_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "sitevault", version, long_version = LONG_VERSION)]
#[command(about = "Checksum-verified content store for a small business site", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Data directory (defaults to SITEVAULT_DATA_DIR, then the platform data dir)
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep the document in memory for this run only
    #[arg(long, global = true)]
    pub memory: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the document from local disk, the remote copy or the bundled example
    Init {
        /// Override the remote bootstrap URL
        #[arg(long)]
        remote: Option<String>,
    },

    /// Print a collection, or one record of it
    #[command(alias = "show")]
    Get {
        /// Collection name (team, services, settings, ...)
        collection: String,

        /// Record id
        id: Option<String>,
    },

    /// Merge a partial update into a collection
    Put {
        collection: String,

        /// JSON object or array of objects
        #[arg(long)]
        json: String,

        /// Fields to keep from existing records (comma separated)
        #[arg(long, value_delimiter = ',')]
        preserve: Vec<String>,

        /// Replace the whole collection instead of merging
        #[arg(long)]
        replace: bool,
    },

    /// Delete one record
    #[command(alias = "rm")]
    Delete { collection: String, id: String },

    /// Check the data files and repair from backup if needed
    Doctor,

    /// Compare a local collection with the remote content API
    Drift {
        collection: String,

        /// Base URL of the content API (overrides config)
        #[arg(long)]
        remote: Option<String>,

        /// Take remote values for mismatched records
        #[arg(long, conflicts_with = "push")]
        pull: bool,

        /// Send records missing from the remote
        #[arg(long)]
        push: bool,
    },

    /// Poll the remote content API and report drift until interrupted
    Watch {
        collection: String,

        #[arg(long)]
        remote: Option<String>,

        /// Seconds between polls (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Commit the current document to the configured git repository
    Publish {
        #[arg(short, long, default_value = "content: manual publish")]
        message: String,
    },

    /// Show storage mode, files and record counts
    Status,

    /// Remove all stored data
    Clear {
        /// Required, as this cannot be undone
        #[arg(long)]
        yes: bool,
    },
}
