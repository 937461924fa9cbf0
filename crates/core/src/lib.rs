mod apply;
mod config;
mod confirm;
mod metadata;
mod planner;
mod run;
mod sanitize;
mod tags;
mod template;

pub use apply::{apply_plan, undo_last, ApplyFailure, ApplyOptions, ApplyResult, UndoResult};
pub use config::{
    app_paths, load_config, load_config_from, AppConfig, AppPaths, DEFAULT_EXTENSIONS,
};
pub use confirm::{AutoConfirm, Confirm, LinePrompt};
pub use metadata::{Field, TrackMetadata};
pub use planner::{
    generate_plan, CollisionPolicy, PlanOptions, RenameCandidate, RenamePlan, RenameStats,
    SkipReason, SkippedFile,
};
pub use run::{run_batch, RunOptions, RunOutcome, RunReport};
pub use sanitize::{sanitize_segment, PLACEHOLDER_NAME};
pub use tags::{LoftyTagReader, MetadataError, TagReader};
pub use template::{
    assemble_path, parse_template, resolve_field, validate_template, RenderOptions, ResolvedPath,
    TemplateError, TemplatePart, DEFAULT_FORMAT, SEPARATOR_MARKER,
};
