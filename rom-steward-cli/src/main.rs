//! rom-steward CLI
//!
//! Command-line interface for cataloging, verifying, and organizing
//! ROM collections.

mod cli_types;
mod commands;
mod context;

use std::fs;
use std::io::Write;
use std::sync::Mutex;

use clap::Parser;
use log::LevelFilter;

use cli_types::{Cli, Commands, VolumeAction};

/// Exit codes: 0 success, 1 usage error, 2 runtime error, 3 partial
/// success (some files errored).
pub(crate) const EXIT_OK: i32 = 0;
pub(crate) const EXIT_USAGE: i32 = 1;
pub(crate) const EXIT_RUNTIME: i32 = 2;
pub(crate) const EXIT_PARTIAL: i32 = 3;

// -- Custom logger --

struct CliLogger {
    level: LevelFilter,
    logfile: Option<Mutex<fs::File>>,
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();

        // Terminal: warn/error to stderr, info to stdout
        if record.level() <= log::Level::Warn {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }

        // Logfile: ANSI-stripped
        if let Some(ref file) = self.logfile {
            let stripped = strip_ansi_escapes::strip(&msg);
            let text = String::from_utf8_lossy(&stripped);
            let mut guard = file.lock().unwrap_or_else(|e| e.into_inner());
            let _ = writeln!(guard, "{}", text);
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.logfile {
            let _ = std::io::Write::flush(&mut *file.lock().unwrap_or_else(|e| e.into_inner()));
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are not usage errors
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp
                | clap::error::ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let level = if cli.quiet {
        LevelFilter::Warn
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logfile = cli.logfile.as_ref().map(|p| {
        let file = fs::File::create(p).unwrap_or_else(|e| {
            eprintln!("Error: could not create logfile {}: {}", p.display(), e);
            std::process::exit(EXIT_RUNTIME);
        });
        Mutex::new(file)
    });
    let logger = Box::new(CliLogger { level, logfile });
    if log::set_boxed_logger(logger).is_err() {
        eprintln!("Error: logger already installed");
        std::process::exit(EXIT_RUNTIME);
    }
    log::set_max_level(level);

    let ctx = match context::AppContext::open(cli.data_dir.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("Error: {e}");
            std::process::exit(EXIT_RUNTIME);
        }
    };

    let code = match cli.command {
        Commands::Scan {
            path,
            incremental,
            archives,
            parallel,
            no_hash,
            include,
            exclude,
            resume,
            label,
        } => commands::scan::run(
            &ctx,
            commands::scan::ScanArgs {
                path,
                incremental,
                archives,
                parallel,
                no_hash,
                include,
                exclude,
                resume,
                label,
            },
        ),
        Commands::ImportDat { file, category } => {
            commands::import_dat::run(&ctx, &file, category.as_deref(), cli.quiet)
        }
        Commands::Verify { volume } => commands::verify::run(&ctx, volume.as_deref()),
        Commands::Duplicates => commands::duplicates::run(&ctx),
        Commands::Organize {
            plan,
            execute,
            template,
            source,
            dest,
            copy,
            keep_empty_folders,
            include,
            exclude,
        } => commands::organize::run(
            &ctx,
            commands::organize::OrganizeArgs {
                plan,
                execute,
                template,
                source,
                dest,
                copy,
                keep_empty_folders,
                include,
                exclude,
            },
        ),
        Commands::Rollback { operation_id } => commands::rollback::run(&ctx, &operation_id),
        Commands::Onegame {
            catalog,
            regions,
            exclude_unlicensed,
            limit,
        } => commands::onegame::run(&ctx, &catalog, &regions, exclude_unlicensed, limit),
        Commands::Volume { action } => match action {
            VolumeAction::Add {
                path,
                label,
                auto_scan,
            } => commands::volume::run_add(&ctx, &path, label.as_deref(), auto_scan),
            VolumeAction::List => commands::volume::run_list(&ctx),
        },
        Commands::Status => commands::status::run(&ctx),
    };

    log::logger().flush();
    std::process::exit(code);
}
