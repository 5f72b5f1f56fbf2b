//! The `organize` command.

use std::path::PathBuf;

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use rom_steward_organize::{
    build_plan, execute_plan, OrganizationPlan, OrganizeRequest, OrganizeTemplate,
};

use crate::context::AppContext;
use crate::{EXIT_OK, EXIT_PARTIAL, EXIT_RUNTIME, EXIT_USAGE};

pub(crate) struct OrganizeArgs {
    pub plan: bool,
    pub execute: bool,
    pub template: String,
    pub source: PathBuf,
    pub dest: PathBuf,
    pub copy: bool,
    pub keep_empty_folders: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

pub(crate) fn run(ctx: &AppContext, args: OrganizeArgs) -> i32 {
    if args.plan == args.execute {
        log::error!("Exactly one of --plan or --execute is required");
        return EXIT_USAGE;
    }

    let Some(template) = OrganizeTemplate::builtin(&args.template) else {
        log::error!(
            "Unknown template '{}'; available: by-system, by-system-region, by-region, by-letter, flat",
            args.template
        );
        return EXIT_USAGE;
    };

    let request = OrganizeRequest {
        source_path: args.source.clone(),
        destination_path: args.dest.clone(),
        move_files: !args.copy,
        process_archives: false,
        extract_archives: false,
        delete_empty_folders: !args.keep_empty_folders,
        include_globs: args.include.clone(),
        exclude_globs: args.exclude.clone(),
    };

    let plan = match build_plan(&request, &template) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Planning failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    print_plan(&plan);

    if args.plan {
        return EXIT_OK;
    }

    let result = match execute_plan(&plan, &ctx.conn, &CancellationToken::new()) {
        Ok(r) => r,
        Err(e) => {
            log::error!("Execution failed: {e}");
            return EXIT_RUNTIME;
        }
    };

    log::info!(
        "{} {} processed, {} skipped, {} failed, {} in {:.1?}",
        "Organize:".bold().to_string(),
        result.files_processed,
        result.files_skipped,
        result.files_failed,
        super::format_bytes(result.bytes_processed),
        result.duration
    );
    for error in &result.errors {
        log::warn!("  {} -> {}: {}", error.source_path, error.destination_path, error.message);
    }
    if result.can_rollback {
        log::info!(
            "Undo with: rom-steward rollback {}",
            result.operation_id.bold().to_string()
        );
    }

    if result.success {
        EXIT_OK
    } else if result.files_processed > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_RUNTIME
    }
}

fn print_plan(plan: &OrganizationPlan) {
    log::info!(
        "Plan '{}': {} files, {} from {} to {}",
        plan.template_name,
        plan.file_count,
        super::format_bytes(plan.total_bytes),
        plan.source_root.display(),
        plan.destination_root.display()
    );
    for warning in &plan.warnings {
        log::warn!("  warning: {warning}");
    }
    for op in &plan.operations {
        let marker = if op.would_overwrite { " (collision)" } else { "" };
        log::debug!(
            "  {} {} -> {}{}",
            op.op_type.as_str(),
            op.source_path.display(),
            op.destination_path.display(),
            marker
        );
    }
}
