use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Index (or reindex) a single note document
    Index {
        /// Path to a note json file
        path: PathBuf,
    },
    /// Reindex every note in the notes directory
    Reindex {},
    /// Remove a note from the index
    Delete {
        /// Note id
        note_id: String,
    },
    /// Semantic search over indexed notes
    Search {
        /// Search query
        query: String,

        /// Max number of results. Uses vector_db.default_limit when omitted.
        #[clap(short, long)]
        limit: Option<usize>,
    },
    /// Print index statistics
    Stats {},
    /// Summarize a note from the notes directory
    Summarize {
        /// Note id
        note_id: String,
    },
}
