//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rom-steward")]
#[command(about = "Catalog, verify, and organize ROM collections", long_about = None)]
pub(crate) struct Cli {
    /// Data directory override (database, hash cache, checkpoints)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Scan a directory tree for ROM files
    Scan {
        /// Root path to scan
        path: PathBuf,

        /// Only process files that changed since the last scan
        #[arg(long)]
        incremental: bool,

        /// Descend into archive files (zip, 7z, ...)
        #[arg(long)]
        archives: bool,

        /// Maximum parallel I/O operations
        #[arg(long, default_value = "4")]
        parallel: usize,

        /// Skip hash computation (enumerate only)
        #[arg(long)]
        no_hash: bool,

        /// Filename globs to include (repeatable; default all)
        #[arg(long)]
        include: Vec<String>,

        /// Filename globs to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Resume a paused or failed scan job by id
        #[arg(long)]
        resume: Option<String>,

        /// Volume label when the path is not yet registered
        #[arg(long)]
        label: Option<String>,
    },

    /// Import a DAT file into the catalog store
    ImportDat {
        /// Path to the .dat/.xml file
        file: PathBuf,

        /// Slash-delimited category path (e.g. Nintendo/NES)
        #[arg(long)]
        category: Option<String>,
    },

    /// Verify stored files against the imported catalogs
    Verify {
        /// Limit verification to one volume id
        #[arg(long)]
        volume: Option<String>,
    },

    /// Report duplicate files by fingerprint
    Duplicates,

    /// Plan or execute a collection reorganization
    Organize {
        /// Show the plan without executing
        #[arg(long, group = "mode")]
        plan: bool,

        /// Execute the plan
        #[arg(long, group = "mode")]
        execute: bool,

        /// Template name (by-system, by-system-region, by-region, flat)
        #[arg(long)]
        template: String,

        /// Source directory
        #[arg(long)]
        source: PathBuf,

        /// Destination root
        #[arg(long)]
        dest: PathBuf,

        /// Copy instead of move
        #[arg(long)]
        copy: bool,

        /// Keep empty source folders after moving
        #[arg(long)]
        keep_empty_folders: bool,

        /// Filename globs to include (repeatable; default all)
        #[arg(long)]
        include: Vec<String>,

        /// Filename globs to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Undo a previous organize run from its journal
    Rollback {
        /// Operation id printed by `organize --execute`
        operation_id: String,
    },

    /// Pick one preferred variant per logical game in a catalog (1G1R)
    Onegame {
        /// Catalog id (see `status`)
        #[arg(long)]
        catalog: String,

        /// Region priority, best first
        #[arg(long, value_delimiter = ',', default_value = "USA,World,Europe,Japan")]
        regions: Vec<String>,

        /// Drop unlicensed releases from consideration
        #[arg(long)]
        exclude_unlicensed: bool,

        /// Maximum groups to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Manage registered storage volumes
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Show catalog and verification statistics
    Status,
}

#[derive(Subcommand)]
pub(crate) enum VolumeAction {
    /// Register a storage root
    Add {
        /// Root path of the volume
        path: PathBuf,

        /// Display label (defaults to the directory name)
        #[arg(long)]
        label: Option<String>,

        /// Scan this volume automatically when it comes online
        #[arg(long)]
        auto_scan: bool,
    },

    /// List registered volumes
    List,
}
