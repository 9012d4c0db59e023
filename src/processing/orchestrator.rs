use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;

use crate::config::ProcessingConfig;
use crate::deps::{DependencyManifest, DependencyTracker, ReadBuffer};
use crate::error::BuildError;
use crate::frontend::{FileStub, FrontendSeverity};
use crate::incremental::{self, ChangedFiles, IncrementalPlanner, Plan, ProcessorInfo};
use crate::symbols::{Symbol, SymbolFacade, SymbolIdentity};
use crate::types::TypeResolver;

use super::diagnostics::{Diagnostic, Logger, Severity, catalog};
use super::output::OutputStage;
use super::processor::{FinishContext, GeneratedFile, ProcessOutput, ProcessorError, RoundContext, SymbolProcessor};
use super::resolver::Resolver;
use super::{BuildReport, BuildStatus, CancellationToken, DeferredSymbol, RoundState};

type Processors = [Box<dyn SymbolProcessor>];
type DeferredSet = IndexMap<SymbolIdentity, DeferredSymbol>;

/// Drives one build: plan, rounds, `finish`, commit.
pub struct Orchestrator<'a> {
    types: Arc<TypeResolver>,
    config: &'a ProcessingConfig,
    cancel: CancellationToken,
    state: RoundState,
}

/// Per-processor state that lives for the whole build.
struct Lane {
    id: String,
    reads: Arc<ReadBuffer>,
    logger: Logger,
    deferred: DeferredSet,
    /// Sees every file of the build. Processors kept from the previous build only see files new to it.
    stale: bool,
    invoked: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(types: Arc<TypeResolver>, config: &'a ProcessingConfig, cancel: CancellationToken) -> Self {
        Self {
            types,
            config,
            cancel,
            state: RoundState::Idle,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    fn facade(&self) -> &Arc<SymbolFacade> {
        self.types.facade()
    }

    fn transition(&mut self, next: RoundState) {
        tracing::debug!(from = %self.state, to = %next, "round state");
        self.state = next;
    }

    /// Mark the build failed and notify every processor.
    fn fail(&mut self, processors: &mut Processors) {
        self.transition(RoundState::Failed);
        for processor in processors.iter_mut() {
            processor.on_error();
        }
    }

    /// Run a full or incremental build.
    ///
    /// ## Errors
    ///
    /// Fatal conditions (processor failure, invalid output, non-convergence past the round cap, dependency
    /// cycle, cancellation, vanished handles, IO) return `Err` with nothing committed. Error diagnostics
    /// yield a `Failed` report, also with nothing committed.
    #[tracing::instrument(skip_all, fields(processors = processors.len(), frontend = %self.facade().frontend().name()))]
    pub fn run(&mut self, processors: &mut Processors, changes: &ChangedFiles) -> Result<BuildReport, BuildError> {
        let mut seen = HashSet::new();
        for processor in processors.iter() {
            if !seen.insert(processor.id().to_string()) {
                return Err(BuildError::DuplicateProcessor(processor.id().to_string()));
            }
        }

        let manifest_path = self.config.manifest_path();
        let previous = DependencyManifest::load(&manifest_path);
        let infos: Vec<ProcessorInfo> = processors
            .iter()
            .map(|p| ProcessorInfo {
                id: p.id().to_string(),
                supports_incremental: p.supports_incremental(),
            })
            .collect();
        let plan = IncrementalPlanner::new(self.config.incremental).plan(changes, previous.as_ref(), &infos);
        if self.config.incremental_log {
            let log = self.config.incremental_log_path();
            if let Err(err) = incremental::write_log(&log, &plan) {
                tracing::warn!(path = %log.display(), error = %err, "cannot write incremental log");
            }
        }

        let mut tracker = DependencyTracker::new();
        for info in &infos {
            tracker.register_processor(&info.id, info.supports_incremental);
        }
        let all_files = self.facade().all_files()?;
        for file in &all_files {
            if let Some(path) = file.file_path().filter(|_| file.origin().has_source_file()) {
                tracker.record_input(path);
            }
        }

        let (initial, stale) = match (&plan, &previous) {
            (Plan::Full { .. }, _) => {
                let stale: BTreeSet<PathBuf> = previous
                    .as_ref()
                    .map(|m| m.outputs.keys().cloned().collect())
                    .unwrap_or_default();
                let initial: Vec<Symbol> = all_files
                    .into_iter()
                    .filter(|f| f.origin().has_source_file())
                    .collect();
                (initial, stale)
            }
            (Plan::Incremental(work), Ok(prev)) => {
                if work.is_empty() {
                    tracing::info!("nothing to reprocess");
                    self.transition(RoundState::Done);
                    return Ok(BuildReport {
                        status: BuildStatus::Succeeded,
                        plan: plan.clone(),
                        rounds: 0,
                        generated: Vec::new(),
                        removed: Vec::new(),
                        diagnostics: Vec::new(),
                        unresolved: Vec::new(),
                        manifest: prev.clone(),
                        committed: false,
                    });
                }
                tracker.carry_over(prev, &work.processors);
                let mut initial = Vec::new();
                for path in &work.files {
                    match self.facade().file_by_path(path)? {
                        Some(file) => initial.push(file),
                        None => tracing::debug!(path = %path.display(), "file to reprocess is not in the compilation"),
                    }
                }
                (initial, work.stale_outputs.clone())
            }
            (Plan::Incremental(_), Err(err)) => {
                return Err(BuildError::InternalInconsistency(format!(
                    "incremental plan without a usable manifest: {err}"
                )));
            }
        };

        let mut lanes: Vec<Lane> = infos
            .iter()
            .map(|info| Lane {
                id: info.id.clone(),
                reads: Arc::new(ReadBuffer::new()),
                logger: Logger::new(info.id.clone()),
                deferred: DeferredSet::new(),
                stale: match &plan {
                    Plan::Full { .. } => true,
                    Plan::Incremental(work) => work.processors.contains(&info.id),
                },
                invoked: false,
            })
            .collect();
        for lane in lanes.iter().filter(|l| !l.stale) {
            tracing::debug!(processor = %lane.id, "processor kept from the previous build");
        }
        // Files no kept processor has seen: added sources and outputs the previous build did not produce.
        let previous_outputs: BTreeSet<PathBuf> = previous
            .as_ref()
            .map(|m| m.outputs.keys().cloned().collect())
            .unwrap_or_default();
        let is_fresh = |file: &Symbol| {
            file.file_path().is_some_and(|path| {
                if file.origin().has_source_file() {
                    changes.added.contains(path)
                } else {
                    !previous_outputs.contains(path)
                }
            })
        };
        let mut stage = OutputStage::new(&self.config.output_dir);
        let mut diagnostics = self.frontend_diagnostics();

        let mut new_files = initial;
        let mut round = 0;
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(round = round + 1, "build cancelled");
                self.fail(processors);
                return Err(BuildError::Cancelled { round: round + 1 });
            }
            round += 1;
            self.transition(RoundState::RoundRunning(round));

            let mut new_decls = Vec::new();
            let mut fresh_decls = Vec::new();
            for file in &new_files {
                let decls = self.facade().declarations(file)?;
                if is_fresh(file) {
                    fresh_decls.extend(decls.iter().cloned());
                }
                new_decls.extend(decls.iter().cloned());
            }
            let views: Vec<(Vec<Symbol>, Resolver)> = lanes
                .iter()
                .map(|lane| {
                    let mut symbols = if lane.stale { new_decls.clone() } else { fresh_decls.clone() };
                    for deferred in lane.deferred.values() {
                        if !symbols.contains(&deferred.symbol) {
                            symbols.push(Arc::clone(&deferred.symbol));
                        }
                    }
                    let resolver = Resolver::new(
                        Arc::clone(&self.types),
                        Arc::clone(&lane.reads),
                        new_files.clone(),
                        symbols.clone(),
                    );
                    (symbols, resolver)
                })
                .collect();
            tracing::info!(round, files = new_files.len(), symbols = new_decls.len(), "starting round");

            for (lane, view) in lanes.iter_mut().zip(&views) {
                lane.invoked |= lane.stale || !view.0.is_empty();
            }
            let results = self.run_round(processors, &views, &lanes, round);
            let mut outputs = Vec::with_capacity(results.len());
            for (lane, result) in lanes.iter().zip(results) {
                match result {
                    Ok(output) => outputs.push(output),
                    Err(err) => {
                        tracing::error!(processor = %lane.id, error = %err, "processor failed");
                        self.fail(processors);
                        return Err(BuildError::from_processor(&lane.id, err));
                    }
                }
            }

            self.transition(RoundState::RoundFinishing(round));
            for lane in &lanes {
                tracker.merge(&lane.id, lane.reads.take());
            }

            let mut pending = Vec::new();
            let mut next_deferred = Vec::with_capacity(lanes.len());
            for (lane, output) in lanes.iter().zip(outputs) {
                for file in output.files {
                    let full = match self.stage_file(&mut stage, &mut tracker, &lane.id, &file, round) {
                        Ok(full) => full,
                        Err(err) => {
                            self.fail(processors);
                            return Err(err);
                        }
                    };
                    pending.push((full, file));
                }
                let mut deferred = DeferredSet::new();
                for deferral in output.deferred {
                    let key = deferral.symbol.identity().clone();
                    let first = lane.deferred.get(&key).map(|d| d.round).unwrap_or(round);
                    deferred.insert(
                        key,
                        DeferredSymbol {
                            processor: lane.id.clone(),
                            symbol: deferral.symbol,
                            reason: deferral.reason,
                            round: first,
                        },
                    );
                }
                next_deferred.push(deferred);
            }

            let round_diagnostics = self.drain_diagnostics(&lanes);
            let failed = round_diagnostics.iter().any(Diagnostic::is_error);
            diagnostics.extend(round_diagnostics);
            if failed {
                tracing::info!(round, "error diagnostics reported; nothing will be committed");
                self.fail(processors);
                return Ok(failed_report(plan, round, diagnostics, tracker.build_manifest()));
            }

            let mut next_files = Vec::with_capacity(pending.len());
            for (full, file) in pending {
                let stub = FileStub {
                    path: full,
                    package: file.package,
                    origin: symproc_core::Origin::Generated,
                    imports: file.imports,
                    declarations: file.declarations,
                };
                let handle = match self.facade().frontend().add_file(stub) {
                    Ok(handle) => handle,
                    Err(err) => {
                        self.fail(processors);
                        return Err(err.into());
                    }
                };
                next_files.push(self.facade().symbol_for_file(handle)?);
            }

            let entering: usize = lanes.iter().map(|l| l.deferred.len()).sum();
            let remaining: usize = next_deferred.iter().map(IndexMap::len).sum();
            let unchanged = lanes
                .iter()
                .zip(&next_deferred)
                .all(|(lane, next)| lane.deferred.len() == next.len() && next.keys().all(|k| lane.deferred.contains_key(k)));
            for (lane, next) in lanes.iter_mut().zip(next_deferred) {
                lane.deferred = next;
            }

            if next_files.is_empty() && unchanged {
                tracing::info!(round, deferred = remaining, "processing reached a fixed point");
                break;
            }
            if round >= self.config.max_rounds && remaining >= entering {
                tracing::error!(round, deferred = remaining, "round cap reached without progress");
                self.fail(processors);
                return Err(BuildError::NonConvergence {
                    rounds: round,
                    deferred: remaining,
                });
            }
            new_files = next_files;
        }

        for (index, lane) in lanes.iter().enumerate() {
            if !lane.invoked {
                continue;
            }
            let resolver = Resolver::new(Arc::clone(&self.types), Arc::clone(&lane.reads), Vec::new(), Vec::new());
            let ctx = FinishContext {
                rounds: round,
                resolver: &resolver,
                options: &self.config.processor_options,
                logger: &lane.logger,
            };
            let files = match processors[index].finish(&ctx) {
                Ok(files) => files,
                Err(err) => {
                    self.fail(processors);
                    return Err(BuildError::from_processor(&lane.id, err));
                }
            };
            for file in files {
                if let Err(err) = self.stage_file(&mut stage, &mut tracker, &lane.id, &file, round) {
                    self.fail(processors);
                    return Err(err);
                }
            }
            tracker.merge(&lane.id, lane.reads.take());
        }
        let finish_diagnostics = self.drain_diagnostics(&lanes);
        let failed = finish_diagnostics.iter().any(Diagnostic::is_error);
        diagnostics.extend(finish_diagnostics);
        if failed {
            self.fail(processors);
            return Ok(failed_report(plan, round, diagnostics, tracker.build_manifest()));
        }

        let unresolved: Vec<DeferredSymbol> = lanes.iter().flat_map(|l| l.deferred.values().cloned()).collect();
        if !unresolved.is_empty() {
            for deferred in &unresolved {
                diagnostics.push(catalog::still_deferred(
                    &deferred.processor,
                    deferred.symbol.qualified_name().as_str(),
                    &deferred.reason,
                    deferred.round,
                ));
            }
            diagnostics.push(catalog::not_converged(unresolved.len()));
        }

        let manifest = tracker.build_manifest();
        if let Err(cycle) = manifest.check_acyclic() {
            self.fail(processors);
            return Err(BuildError::DependencyCycle { cycle });
        }
        let removed = stage.commit(&stale)?;
        manifest.save(&manifest_path)?;

        let status = if unresolved.is_empty() {
            self.transition(RoundState::Done);
            BuildStatus::Succeeded
        } else {
            self.transition(RoundState::Failed);
            BuildStatus::Failed
        };
        Ok(BuildReport {
            status,
            plan,
            rounds: round,
            generated: stage.paths(),
            removed,
            diagnostics,
            unresolved,
            manifest,
            committed: true,
        })
    }

    fn run_round(
        &self,
        processors: &mut Processors,
        views: &[(Vec<Symbol>, Resolver)],
        lanes: &[Lane],
        round: u32,
    ) -> Vec<Result<ProcessOutput, ProcessorError>> {
        let options = &self.config.processor_options;
        let call = |processor: &mut Box<dyn SymbolProcessor>, view: &(Vec<Symbol>, Resolver), lane: &Lane| {
            if !lane.stale && view.0.is_empty() {
                return Ok(ProcessOutput::new());
            }
            let ctx = RoundContext {
                round,
                symbols: &view.0,
                resolver: &view.1,
                options,
                logger: &lane.logger,
            };
            let _span = tracing::debug_span!("process", processor = %lane.id, round).entered();
            processor.process(&ctx)
        };
        if self.config.parallel {
            processors
                .par_iter_mut()
                .zip(views.par_iter())
                .zip(lanes.par_iter())
                .map(|((processor, view), lane)| call(processor, view, lane))
                .collect()
        } else {
            processors
                .iter_mut()
                .zip(views)
                .zip(lanes)
                .map(|((processor, view), lane)| call(processor, view, lane))
                .collect()
        }
    }

    fn stage_file(
        &self,
        stage: &mut OutputStage,
        tracker: &mut DependencyTracker,
        processor: &str,
        file: &GeneratedFile,
        round: u32,
    ) -> Result<PathBuf, BuildError> {
        let full = stage.stage(&file.path, processor, file.contents.clone())?;
        tracker.record_output(&full, processor, &file.dependencies, round);
        tracing::debug!(path = %full.display(), processor, round, "staged output");
        Ok(full)
    }

    fn drain_diagnostics(&self, lanes: &[Lane]) -> Vec<Diagnostic> {
        lanes
            .iter()
            .flat_map(|lane| lane.logger.drain())
            .map(|d| {
                if self.config.all_warnings_as_errors && d.severity == Severity::Warning {
                    catalog::promoted_warning(d)
                } else {
                    d
                }
            })
            .collect()
    }

    fn frontend_diagnostics(&self) -> Vec<Diagnostic> {
        self.facade()
            .frontend()
            .diagnostics()
            .into_iter()
            .map(|d| {
                let severity = match d.severity {
                    FrontendSeverity::Warning => Severity::Warning,
                    FrontendSeverity::Error => Severity::Error,
                };
                let mut diagnostic = Diagnostic::new(severity, d.message);
                if let Some(file) = d.file {
                    diagnostic = diagnostic.with_note(format!("in {}", file.display()));
                }
                diagnostic
            })
            .collect()
    }
}

fn failed_report(plan: Plan, rounds: u32, diagnostics: Vec<Diagnostic>, manifest: DependencyManifest) -> BuildReport {
    BuildReport {
        status: BuildStatus::Failed,
        plan,
        rounds,
        generated: Vec::new(),
        removed: Vec::new(),
        diagnostics,
        unresolved: Vec::new(),
        manifest,
        committed: false,
    }
}
