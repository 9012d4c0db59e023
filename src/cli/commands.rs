//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::Path;

use crate::config::ProcessingConfig;
use crate::deps::DependencyManifest;
use crate::error::BuildError;
use crate::incremental::{ChangedFiles, IncrementalPlanner, ProcessorInfo};
use crate::processing::{BuildReport, Severity, SymbolProcessor};
use crate::processors::{self, BUILTIN_PROCESSORS};
use crate::session::BuildSession;

use super::{BuildArgs, CliError, CliResult, ExitCode, PlanArgs, ProcessArgs};

// ============================================================================
// Shared setup
// ============================================================================

/// Render a fatal build error with its diagnostic code and help text.
fn render_build_error(err: BuildError) -> CliError {
    CliError::failure(format!("{:?}", miette::Report::new(err)))
}

fn load_config(args: &BuildArgs) -> CliResult<ProcessingConfig> {
    let mut config = match &args.config {
        Some(path) => ProcessingConfig::load(path).map_err(|e| render_build_error(e.into()))?,
        None => ProcessingConfig::new(),
    };
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = &args.caches_dir {
        config = config.with_caches_dir(dir);
    }
    if args.no_incremental {
        config = config.with_incremental(false);
    }
    Ok(config)
}

fn load_changes(path: Option<&Path>) -> CliResult<ChangedFiles> {
    match path {
        Some(path) => ChangedFiles::load(path)
            .map_err(|e| CliError::failure(format!("Error reading changes {}: {}", path.display(), e))),
        None => Ok(ChangedFiles::default()),
    }
}

/// Instantiate the requested processors, or every built-in when none are named.
fn select_processors(ids: &[String]) -> CliResult<Vec<Box<dyn SymbolProcessor>>> {
    if ids.is_empty() {
        return Ok(BUILTIN_PROCESSORS.iter().filter_map(|id| processors::builtin(id)).collect());
    }
    ids.iter()
        .map(|id| {
            processors::builtin(id).ok_or_else(|| {
                CliError::failure(format!(
                    "Error: unknown processor `{}` (available: {})",
                    id,
                    BUILTIN_PROCESSORS.join(", ")
                ))
            })
        })
        .collect()
}

// ============================================================================
// process
// ============================================================================

pub fn process(args: &ProcessArgs) -> CliResult<ExitCode> {
    let mut config = load_config(&args.build)?;
    if args.build.changes.is_none() {
        // Without a change description there is nothing to plan against.
        config = config.with_incremental(false);
    }
    if args.parallel {
        config = config.with_parallel(true);
    }
    if let Some(rounds) = args.max_rounds {
        config = config.with_max_rounds(rounds);
    }
    if args.warnings_as_errors {
        config = config.with_all_warnings_as_errors(true);
    }
    if args.incremental_log {
        config = config.with_incremental_log(true);
    }
    if let Some(policy) = args.nullability {
        config = config.with_nullability_policy(policy.into());
    }
    for pair in &args.options {
        config = config
            .with_option_pair(pair)
            .map_err(|e| render_build_error(e.into()))?;
    }

    let changes = load_changes(args.build.changes.as_deref())?;
    let mut processors = select_processors(&args.build.processors)?;
    let session = BuildSession::from_snapshot(&args.snapshot, config).map_err(render_build_error)?;
    let report = session.run(&mut processors, &changes).map_err(render_build_error)?;

    print_report(&report);
    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::BUILD_FAILED)
    }
}

fn print_report(report: &BuildReport) {
    for line in report.plan.explain() {
        println!("plan: {line}");
    }
    for diagnostic in &report.diagnostics {
        match diagnostic.severity {
            Severity::Info => println!("{diagnostic}"),
            Severity::Warning | Severity::Error => eprintln!("{diagnostic}"),
        }
    }
    for path in &report.generated {
        println!("generated {}", path.display());
    }
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    let errors = report.errors().count();
    println!(
        "{} round(s), {} file(s) generated, {} removed, {} error(s), {} unresolved{}",
        report.rounds,
        report.generated.len(),
        report.removed.len(),
        errors,
        report.unresolved.len(),
        if report.committed { "" } else { " (nothing written)" }
    );
}

// ============================================================================
// plan
// ============================================================================

pub fn plan(args: &PlanArgs) -> CliResult<ExitCode> {
    let config = load_config(&args.build)?;
    let mut changes = load_changes(args.build.changes.as_deref())?;
    changes.modified.extend(args.modified.iter().cloned());
    changes.added.extend(args.added.iter().cloned());
    changes.removed.extend(args.removed.iter().cloned());

    let infos: Vec<ProcessorInfo> = select_processors(&args.build.processors)?
        .iter()
        .map(|p| ProcessorInfo {
            id: p.id().to_string(),
            supports_incremental: p.supports_incremental(),
        })
        .collect();
    let previous = DependencyManifest::load(&config.manifest_path());
    let plan = IncrementalPlanner::new(config.incremental).plan(&changes, previous.as_ref(), &infos);
    for line in plan.explain() {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// manifest / processors
// ============================================================================

pub fn show_manifest(path: &Path, json: bool) -> CliResult<ExitCode> {
    let manifest = DependencyManifest::load(path).map_err(|e| render_build_error(e.into()))?;
    if json {
        let text = serde_json::to_string_pretty(&manifest)
            .map_err(|e| CliError::failure(format!("Error encoding manifest: {}", e)))?;
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }
    for (id, record) in &manifest.processors {
        let scope = if record.depends_on_all { " (depends on all sources)" } else { "" };
        println!(
            "processor {id}: {} file(s), {} symbol(s), {} output(s){scope}",
            record.consumed_files.len(),
            record.consumed_symbols.len(),
            manifest.outputs_of(id).count()
        );
    }
    for edge in manifest.edges() {
        println!("{} <- {}", edge.consumer.display(), edge.producer.display());
    }
    Ok(ExitCode::SUCCESS)
}

pub fn list_processors() -> CliResult<ExitCode> {
    for id in BUILTIN_PROCESSORS {
        println!("{id}");
    }
    Ok(ExitCode::SUCCESS)
}
