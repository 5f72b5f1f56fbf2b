//! Organization planning.
//!
//! The planner enumerates source files (sorted, so plans are
//! deterministic), renders the folder and filename templates for each,
//! and records per-file operations with collision information. The plan
//! itself never mutates the filesystem.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::OrganizeError;
use crate::template::{OrganizeTemplate, TemplateContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Move,
    Copy,
    Skip,
    /// Declared for archive expansion; currently executed as a skip.
    Extract,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Move => "move",
            OperationType::Copy => "copy",
            OperationType::Skip => "skip",
            OperationType::Extract => "extract",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOperation {
    pub op_type: OperationType,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub size: u64,
    pub context: TemplateContext,
    pub destination_exists: bool,
    pub would_overwrite: bool,
}

/// Inputs to the planner.
#[derive(Debug, Clone)]
pub struct OrganizeRequest {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub move_files: bool,
    pub process_archives: bool,
    pub extract_archives: bool,
    pub delete_empty_folders: bool,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
}

/// An immutable plan: operations in execution order plus warnings.
#[derive(Debug)]
pub struct OrganizationPlan {
    pub template_name: String,
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub move_files: bool,
    pub delete_empty_folders: bool,
    pub operations: Vec<FileOperation>,
    pub warnings: Vec<String>,
    pub file_count: u64,
    pub total_bytes: u64,
}

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "7z", "rar", "tar", "gz", "tgz", "bz2", "xz", "lz"];

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a plan for moving/copying everything under `request.source_path`
/// into template-derived locations under `request.destination_path`.
pub fn build_plan(
    request: &OrganizeRequest,
    template: &OrganizeTemplate,
) -> Result<OrganizationPlan, OrganizeError> {
    if !request.source_path.is_dir() {
        return Err(OrganizeError::SourceNotFound(request.source_path.clone()));
    }

    let case_insensitive = cfg!(windows) || cfg!(target_os = "macos");
    let include = build_globset(&request.include_globs, case_insensitive)?;
    let exclude = build_globset(&request.exclude_globs, case_insensitive)?;

    let mut warnings = Vec::new();
    for unknown in template
        .folder
        .unknown_placeholders()
        .into_iter()
        .chain(template.filename.unknown_placeholders())
    {
        warnings.push(format!("Unknown placeholder '{{{unknown}}}' renders empty"));
    }

    let mut files = Vec::new();
    collect_files(&request.source_path, &mut files)?;
    files.sort();

    let mut operations = Vec::new();
    let mut total_bytes = 0u64;

    for source in files {
        let name = match source.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if let Some(ref include) = include {
            if !include.is_match(name) {
                continue;
            }
        }
        if let Some(ref exclude) = exclude {
            if exclude.is_match(name) {
                continue;
            }
        }

        let size = std::fs::metadata(&source).map(|m| m.len()).unwrap_or(0);
        let context = TemplateContext::from_path(&source);

        let folder = template.folder.render(&context);
        let mut filename = template.filename.render(&context);
        if filename.is_empty() || filename == "." {
            filename = name.to_string();
        }

        let mut destination = request.destination_path.clone();
        for part in folder.split('/').filter(|p| !p.is_empty()) {
            destination.push(part);
        }
        destination.push(&filename);

        let destination_exists = destination.exists();
        let would_overwrite = destination_exists && destination != source;
        if would_overwrite {
            warnings.push(format!(
                "Destination already exists for {}: {}",
                source.display(),
                destination.display()
            ));
        }

        let op_type = if is_archive(&source) && request.extract_archives {
            OperationType::Extract
        } else if destination == source {
            OperationType::Skip
        } else if request.move_files {
            OperationType::Move
        } else {
            OperationType::Copy
        };

        total_bytes += size;
        operations.push(FileOperation {
            op_type,
            source_path: source,
            destination_path: destination,
            size,
            context,
            destination_exists,
            would_overwrite,
        });
    }

    Ok(OrganizationPlan {
        template_name: template.name.clone(),
        source_root: request.source_path.clone(),
        destination_root: request.destination_path.clone(),
        move_files: request.move_files,
        delete_empty_folders: request.delete_empty_folders,
        file_count: operations.len() as u64,
        total_bytes,
        operations,
        warnings,
    })
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), OrganizeError> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_file() => out.push(path),
            Ok(t) if t.is_dir() => collect_files(&path, out)?,
            _ => {}
        }
    }
    Ok(())
}

fn build_globset(
    patterns: &[String],
    case_insensitive: bool,
) -> Result<Option<GlobSet>, OrganizeError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| OrganizeError::GlobParse {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| OrganizeError::GlobParse {
        pattern: patterns.join(","),
        message: e.to_string(),
    })?;
    Ok(Some(set))
}
