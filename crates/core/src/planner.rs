use crate::config::AppConfig;
use crate::metadata::TrackMetadata;
use crate::sanitize::truncate_segment;
use crate::tags::TagReader;
use crate::template::{
    assemble_path, has_fields, parse_template, RenderOptions, ResolvedPath, DEFAULT_FORMAT,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Append ` (n)` to the file name, `n` being the smallest free number.
    #[default]
    Number,
    /// Leave the file where it is.
    Skip,
}

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub directory: PathBuf,
    pub format: String,
    pub padding: usize,
    pub flatten: bool,
    pub recursive: bool,
    pub include_hidden: bool,
    pub extensions: Vec<String>,
    pub on_collision: CollisionPolicy,
    pub max_filename_len: usize,
}

impl PlanOptions {
    pub fn from_config(directory: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            directory: directory.into(),
            format: config.format.clone(),
            padding: config.padding,
            flatten: config.flatten,
            recursive: config.recursive,
            include_hidden: config.include_hidden,
            extensions: config.extensions.clone(),
            on_collision: config.on_collision,
            max_filename_len: config.max_filename_len,
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from_config(PathBuf::from("."), &AppConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameCandidate {
    pub original_path: PathBuf,
    pub target_path: PathBuf,
    pub resolved: ResolvedPath,
    pub metadata: TrackMetadata,
    pub changed: bool,
    pub disambiguated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    UnreadableMetadata { message: String },
    TargetCollision { target: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RenameStats {
    pub scanned_files: usize,
    pub audio_files: usize,
    pub skipped_unsupported: usize,
    pub skipped_hidden: usize,
    pub skipped_unreadable: usize,
    pub skipped_collision: usize,
    pub planned: usize,
    pub unchanged: usize,
    pub disambiguated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub format: String,
    pub candidates: Vec<RenameCandidate>,
    pub skipped: Vec<SkippedFile>,
    pub stats: RenameStats,
}

impl RenamePlan {
    pub fn changed(&self) -> impl Iterator<Item = &RenameCandidate> {
        self.candidates.iter().filter(|c| c.changed)
    }
}

pub fn generate_plan(options: &PlanOptions, reader: &dyn TagReader) -> Result<RenamePlan> {
    if !options.directory.is_dir() {
        bail!("directory does not exist: {}", options.directory.display());
    }
    let root = fs::canonicalize(&options.directory).with_context(|| {
        format!(
            "could not resolve directory: {}",
            options.directory.display()
        )
    })?;

    let parts = parse_template(&options.format, DEFAULT_FORMAT)?;
    if !has_fields(&parts) {
        warn!(
            format = %options.format,
            "format contains no metadata fields; every file gets the same name"
        );
    }
    let render = RenderOptions {
        padding: options.padding,
        flatten: options.flatten,
    };

    let mut stats = RenameStats::default();
    let files = collect_audio_files(&root, options, &mut stats)?;

    let mut candidates = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    let mut planned_paths = HashSet::<PathBuf>::new();

    for path in files {
        let metadata = match reader.read_tags(&path) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file with unreadable tags");
                stats.skipped_unreadable += 1;
                skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::UnreadableMetadata {
                        message: err.to_string(),
                    },
                });
                continue;
            }
        };

        let resolved = assemble_path(&parts, &metadata, &render, dotted_extension(&path))?;
        let resolved = fit_to_length(resolved, options.max_filename_len);

        let base_dir = if options.flatten {
            root.clone()
        } else {
            path.parent()
                .with_context(|| format!("file has no parent directory: {}", path.display()))?
                .to_path_buf()
        };

        let wanted = base_dir.join(resolved.to_relative_path());
        let Some(assigned) =
            resolve_collision(&path, &base_dir, resolved, &mut planned_paths, options)
        else {
            warn!(
                path = %path.display(),
                target = %wanted.display(),
                "target already taken; leaving file in place"
            );
            stats.skipped_collision += 1;
            skipped.push(SkippedFile {
                path,
                reason: SkipReason::TargetCollision { target: wanted },
            });
            continue;
        };

        if assigned.disambiguated {
            info!(
                path = %path.display(),
                target = %assigned.target.display(),
                "target collided; added a numeric suffix"
            );
            stats.disambiguated += 1;
        }

        let changed = assigned.target != path;
        if !changed {
            stats.unchanged += 1;
        }
        debug!(path = %path.display(), target = %assigned.target.display(), "planned");

        stats.planned += 1;
        candidates.push(RenameCandidate {
            original_path: path,
            target_path: assigned.target,
            resolved: assigned.resolved,
            metadata,
            changed,
            disambiguated: assigned.disambiguated,
        });
    }

    Ok(RenamePlan {
        root,
        format: options.format.clone(),
        candidates,
        skipped,
        stats,
    })
}

fn collect_audio_files(
    root: &Path,
    options: &PlanOptions,
    stats: &mut RenameStats,
) -> Result<Vec<PathBuf>> {
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || options.include_hidden
                || !entry.file_type().is_dir()
                || !is_hidden(entry.path())
        });

    let mut out = Vec::new();
    for entry in walker {
        let entry =
            entry.with_context(|| format!("failed to walk directory: {}", root.display()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        stats.scanned_files += 1;

        if is_hidden(path) && !options.include_hidden {
            stats.skipped_hidden += 1;
            continue;
        }

        if is_audio(path, &options.extensions) {
            stats.audio_files += 1;
            out.push(path.to_path_buf());
        } else {
            stats.skipped_unsupported += 1;
        }
    }

    Ok(out)
}

fn dotted_extension(path: &Path) -> OsString {
    match path.extension() {
        Some(ext) => {
            let mut dotted = OsString::from(".");
            dotted.push(ext);
            dotted
        }
        None => OsString::new(),
    }
}

fn extension_len(resolved: &ResolvedPath) -> usize {
    resolved.extension().to_string_lossy().chars().count()
}

fn fit_to_length(resolved: ResolvedPath, max_len: usize) -> ResolvedPath {
    let ext_len = extension_len(&resolved);
    let stem = truncate_segment(resolved.file_stem(), ext_len, max_len);
    resolved
        .with_file_stem(stem)
        .map_directories(|dir| truncate_segment(dir, 0, max_len))
}

struct Assigned {
    target: PathBuf,
    resolved: ResolvedPath,
    disambiguated: bool,
}

fn resolve_collision(
    original_path: &Path,
    base_dir: &Path,
    resolved: ResolvedPath,
    planned_paths: &mut HashSet<PathBuf>,
    options: &PlanOptions,
) -> Option<Assigned> {
    let candidate = base_dir.join(resolved.to_relative_path());
    if is_available(&candidate, original_path, planned_paths) {
        planned_paths.insert(candidate.clone());
        return Some(Assigned {
            target: candidate,
            resolved,
            disambiguated: false,
        });
    }

    if options.on_collision == CollisionPolicy::Skip {
        return None;
    }

    let ext_len = extension_len(&resolved);
    let mut n = 1usize;
    loop {
        let suffix = format!(" ({n})");
        let stem = truncate_segment(
            resolved.file_stem(),
            ext_len + suffix.chars().count(),
            options.max_filename_len,
        );
        let next = resolved.with_file_stem(format!("{stem}{suffix}"));
        let candidate = base_dir.join(next.to_relative_path());
        if is_available(&candidate, original_path, planned_paths) {
            planned_paths.insert(candidate.clone());
            return Some(Assigned {
                target: candidate,
                resolved: next,
                disambiguated: true,
            });
        }
        n += 1;
    }
}

fn is_available(candidate: &Path, original_path: &Path, planned_paths: &HashSet<PathBuf>) -> bool {
    if planned_paths.contains(candidate) {
        return false;
    }
    if candidate == original_path {
        return true;
    }
    !candidate.exists()
}

fn is_audio(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed.trim_start_matches('.')))
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}
