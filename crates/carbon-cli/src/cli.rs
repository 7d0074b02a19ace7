use std::path::PathBuf;

use carbon_core::sync::StrategyKind;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "carbon")]
#[command(about = "Notes that stay in sync with a repository of Markdown files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage local notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Connect a repository branch and directory
    Connect {
        /// Repository owner (user or organization)
        #[arg(long)]
        owner: String,
        /// Repository name
        #[arg(long)]
        repo: String,
        /// Branch that holds the mirrored files
        #[arg(long, default_value = "main")]
        branch: String,
        /// Directory inside the repository (empty for the root)
        #[arg(long, default_value = "")]
        base_path: String,
    },
    /// Remove a connection with its links and history
    Disconnect {
        /// Connection ID, ID prefix, or owner/repo
        connection: String,
    },
    /// Stop sync passes for a connection
    Pause {
        /// Connection ID, ID prefix, or owner/repo
        connection: String,
    },
    /// Allow sync passes for a paused connection
    Resume {
        /// Connection ID, ID prefix, or owner/repo
        connection: String,
    },
    /// Show connections with their recent sync events
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass
    Sync {
        /// Connection ID, ID prefix, or owner/repo
        connection: String,
        /// Conflict strategy for this pass (local-wins or remote-wins)
        #[arg(long, value_name = "STRATEGY")]
        strategy: Option<StrategyKind>,
        /// Only apply remote changes locally
        #[arg(long)]
        pull_only: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List repositories visible to the configured token
    Repos {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        #[arg(long)]
        title: String,
        /// Note body (read from stdin when omitted and piped)
        body: Vec<String>,
    },
    /// List notes, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note (opens $EDITOR when no field is given)
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete a note; a linked file is removed on the next sync
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
}
