//! Multi-round processing scenarios run end to end against the in-memory front-end.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use symproc::deps::Dependencies;
use symproc::error::BuildError;
use symproc::frontend::{DeclStub, FileStub, Frontend, MemoryFrontend, NativeAnnotation, NativeTypeRef};
use symproc::processing::{
    CancellationToken, GeneratedFile, ProcessOutput, ProcessorError, RoundContext, Severity, SymbolProcessor,
};
use symproc::processors::{AnnotationIndexProcessor, ImplStubProcessor};
use symproc::{BuildSession, ChangedFiles, ProcessingConfig};
use symproc_core::{ModifierId, Origin, QualifiedName};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn ty(text: &str) -> NativeTypeRef {
    NativeTypeRef::parse(text).unwrap()
}

/// A compilation with a small library and the given source files.
fn compilation(sources: Vec<FileStub>) -> Arc<MemoryFrontend> {
    let fe = MemoryFrontend::new("memory").with_default_packages([QualifiedName::new("kotlin")]);
    fe.add_file(
        FileStub::new("lib/kotlin.kt", "kotlin")
            .with_origin(Origin::Library)
            .with_declaration(DeclStub::class("Int"))
            .with_declaration(DeclStub::class("String")),
    )
    .unwrap();
    for file in sources {
        fe.add_file(file).unwrap();
    }
    Arc::new(fe)
}

/// `src/A.kt`: interface `Foo` marked for implementation.
fn foo_file() -> FileStub {
    FileStub::new("src/A.kt", "app").with_declaration(
        DeclStub::interface("Foo")
            .with_annotation(NativeAnnotation::new("symproc.GenerateImpl"))
            .with_annotation(NativeAnnotation::new("symproc.Indexed"))
            .with_member(DeclStub::function("greet", Some(ty("String"))).with_parameter("name", ty("String"))),
    )
}

fn config(dir: &TempDir) -> ProcessingConfig {
    ProcessingConfig::new()
        .with_output_dir(dir.path().join("gen"))
        .with_caches_dir(dir.path().join("caches"))
}

fn session(fe: Arc<MemoryFrontend>, config: ProcessingConfig) -> BuildSession {
    BuildSession::new(fe as Arc<dyn Frontend>, config)
}

fn processors(list: Vec<Box<dyn SymbolProcessor>>) -> Vec<Box<dyn SymbolProcessor>> {
    list
}

// ============================================================================
// Test processors
// ============================================================================

/// Generates `app/Later.kt` declaring class `Later`, once.
#[derive(Default)]
struct LaterGenerator {
    done: bool,
}

impl SymbolProcessor for LaterGenerator {
    fn id(&self) -> &str {
        "later"
    }

    fn process(&mut self, _ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        if self.done {
            return Ok(ProcessOutput::new());
        }
        self.done = true;
        Ok(ProcessOutput::new().with_file(
            GeneratedFile::new("app/Later.kt", "app", Dependencies::isolating(Vec::<PathBuf>::new()))
                .with_contents("package app\n\nopen class Later\n")
                .with_declaration(DeclStub::class("Later").with_modifier(ModifierId::Open)),
        ))
    }
}

/// Fails in the first round.
struct Failing {
    notified: Arc<AtomicBool>,
}

impl SymbolProcessor for Failing {
    fn id(&self) -> &str {
        "failing"
    }

    fn process(&mut self, _ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        Err(ProcessorError::msg("boom"))
    }

    fn on_error(&mut self) {
        self.notified.store(true, Ordering::SeqCst);
    }
}

/// Generates one file and reports an error diagnostic.
struct Complaining;

impl SymbolProcessor for Complaining {
    fn id(&self) -> &str {
        "complaining"
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        if ctx.round > 1 {
            return Ok(ProcessOutput::new());
        }
        ctx.logger.error("cannot handle this compilation", None);
        Ok(ProcessOutput::new().with_file(
            GeneratedFile::new("out.txt", QualifiedName::root(), Dependencies::all_sources())
                .with_contents("x"),
        ))
    }
}

/// Generates a new file every round.
struct Endless;

impl SymbolProcessor for Endless {
    fn id(&self) -> &str {
        "endless"
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        Ok(ProcessOutput::new().with_file(GeneratedFile::new(
            format!("round{}.txt", ctx.round),
            QualifiedName::root(),
            Dependencies::all_sources(),
        )))
    }
}

/// Cancels the build during round 1 and keeps producing files.
struct Cancelling {
    token: CancellationToken,
}

impl SymbolProcessor for Cancelling {
    fn id(&self) -> &str {
        "cancelling"
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        self.token.cancel();
        Ok(ProcessOutput::new().with_file(GeneratedFile::new(
            format!("r{}.txt", ctx.round),
            QualifiedName::root(),
            Dependencies::all_sources(),
        )))
    }
}

/// Writes an output whose path escapes the output directory.
struct Escaping;

impl SymbolProcessor for Escaping {
    fn id(&self) -> &str {
        "escaping"
    }

    fn process(&mut self, _ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        Ok(ProcessOutput::new().with_file(GeneratedFile::new(
            "../escape.txt",
            QualifiedName::root(),
            Dependencies::all_sources(),
        )))
    }
}

/// Round 1 writes `a.txt` derived from `b.txt`; round 2 writes `b.txt` derived from `a.txt`.
struct Circular {
    out: PathBuf,
}

impl SymbolProcessor for Circular {
    fn id(&self) -> &str {
        "circular"
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        let (name, source) = match ctx.round {
            1 => ("a.txt", "b.txt"),
            2 => ("b.txt", "a.txt"),
            _ => return Ok(ProcessOutput::new()),
        };
        Ok(ProcessOutput::new().with_file(GeneratedFile::new(
            name,
            QualifiedName::root(),
            Dependencies::isolating([self.out.join(source)]),
        )))
    }
}

// ============================================================================
// Round scenarios
// ============================================================================

#[test]
fn test_generated_implementation_converges_in_two_rounds() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![Box::new(ImplStubProcessor::default())]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert!(report.committed);
    assert_eq!(report.rounds, 2);
    let impl_path = dir.path().join("gen/app/FooImpl.kt");
    assert_eq!(report.generated, vec![impl_path.clone()]);

    let contents = fs::read_to_string(&impl_path).unwrap();
    assert!(contents.starts_with("package app\n"));
    assert!(contents.contains("class FooImpl : Foo {"));
    assert!(contents.contains("override fun greet(name: String): String = error(\"not implemented\")"));

    let record = &report.manifest.outputs[&impl_path];
    assert_eq!(record.processor, "impl-stub");
    assert_eq!(record.round, 1);
    assert!(record.sources.contains(Path::new("src/A.kt")));
    assert!(!record.aggregating);

    // The generated class is visible to later queries.
    let generated = session.facade().class_by_name(&QualifiedName::new("app.FooImpl")).unwrap();
    assert!(generated.is_some());
}

#[test]
fn test_manifest_is_saved_under_caches() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let manifest_path = config.manifest_path();
    let session = session(compilation(vec![foo_file()]), config);
    let mut procs = processors(vec![Box::new(ImplStubProcessor::default())]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    let saved = symproc::deps::DependencyManifest::load(&manifest_path).unwrap();
    assert_eq!(saved, report.manifest);
    assert!(saved.inputs.contains(Path::new("src/A.kt")));
    assert!(!saved.inputs.contains(Path::new("lib/kotlin.kt")));
}

#[test]
fn test_deferred_class_is_processed_once_its_supertype_exists() {
    let dir = TempDir::new().unwrap();
    let bar = FileStub::new("src/B.kt", "app").with_declaration(
        DeclStub::class("Bar")
            .with_modifier(ModifierId::Open)
            .with_annotation(NativeAnnotation::new("symproc.GenerateImpl"))
            .with_super_type(ty("Later")),
    );
    let session = session(compilation(vec![bar]), config(&dir));
    let mut procs = processors(vec![
        Box::new(ImplStubProcessor::default()),
        Box::new(LaterGenerator::default()),
    ]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert!(report.succeeded(), "{:?}", report.diagnostics);
    assert!(report.unresolved.is_empty());
    assert_eq!(report.rounds, 3);
    let bar_impl = dir.path().join("gen/app/BarImpl.kt");
    assert!(report.generated.contains(&bar_impl));
    assert_eq!(report.manifest.outputs[&bar_impl].round, 2);
    assert!(fs::read_to_string(&bar_impl).unwrap().contains("class BarImpl : Bar() {"));
}

#[test]
fn test_symbol_deferred_forever_fails_the_build_but_commits() {
    let dir = TempDir::new().unwrap();
    let baz = FileStub::new("src/Baz.kt", "app").with_declaration(
        DeclStub::class("Baz")
            .with_modifier(ModifierId::Open)
            .with_annotation(NativeAnnotation::new("symproc.GenerateImpl"))
            .with_super_type(ty("Missing")),
    );
    let session = session(compilation(vec![baz, foo_file()]), config(&dir));
    let mut procs = processors(vec![Box::new(ImplStubProcessor::default())]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert!(!report.succeeded());
    assert!(report.committed);
    assert_eq!(report.unresolved.len(), 1);
    let deferred = &report.unresolved[0];
    assert_eq!(deferred.symbol.qualified_name().as_str(), "app.Baz");
    assert_eq!(deferred.round, 1);
    assert!(deferred.reason.contains("Missing"));

    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].symbol.as_deref(), Some("app.Baz"));
    // Work that did converge is still written.
    assert!(dir.path().join("gen/app/FooImpl.kt").exists());
}

#[test]
fn test_processor_failure_aborts_without_writing() {
    let dir = TempDir::new().unwrap();
    let notified = Arc::new(AtomicBool::new(false));
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![
        Box::new(ImplStubProcessor::default()),
        Box::new(Failing {
            notified: Arc::clone(&notified),
        }),
    ]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();

    match err {
        BuildError::Processor { processor, source } => {
            assert_eq!(processor, "failing");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("expected processor failure, got {other:?}"),
    }
    assert!(notified.load(Ordering::SeqCst));
    assert!(!dir.path().join("gen").exists());
    assert!(!dir.path().join("caches").exists());
}

#[test]
fn test_error_diagnostic_fails_without_commit() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![Box::new(Complaining)]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert!(!report.succeeded());
    assert!(!report.committed);
    assert!(report.generated.is_empty());
    let error = report.errors().next().unwrap();
    assert_eq!(error.processor.as_deref(), Some("complaining"));
    assert!(!dir.path().join("gen/out.txt").exists());
}

#[test]
fn test_warnings_as_errors() {
    let dir = TempDir::new().unwrap();
    let final_class = FileStub::new("src/F.kt", "app").with_declaration(
        DeclStub::class("Closed").with_annotation(NativeAnnotation::new("symproc.GenerateImpl")),
    );

    let lenient = session(compilation(vec![final_class.clone()]), config(&dir));
    let report = lenient
        .run(&mut processors(vec![Box::new(ImplStubProcessor::default())]), &ChangedFiles::default())
        .unwrap();
    assert!(report.succeeded());
    assert!(report.diagnostics.iter().any(|d| d.severity == Severity::Warning));

    let strict_dir = TempDir::new().unwrap();
    let strict = session(
        compilation(vec![final_class]),
        config(&strict_dir).with_all_warnings_as_errors(true),
    );
    let report = strict
        .run(&mut processors(vec![Box::new(ImplStubProcessor::default())]), &ChangedFiles::default())
        .unwrap();
    assert!(!report.succeeded());
    assert!(!report.committed);
    assert_eq!(report.errors().count(), 1);
}

#[test]
fn test_round_cap_without_progress_is_fatal() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir).with_max_rounds(3));
    let mut procs = processors(vec![Box::new(Endless)]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();

    assert!(matches!(err, BuildError::NonConvergence { rounds: 3, deferred: 0 }));
    assert!(!dir.path().join("gen").exists());
}

#[test]
fn test_cancellation_between_rounds() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![Box::new(Cancelling {
        token: session.cancellation_token(),
    })]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();

    assert!(matches!(err, BuildError::Cancelled { round: 2 }));
    assert!(!dir.path().join("gen").exists());
}

#[test]
fn test_duplicate_processor_ids() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![
        Box::new(ImplStubProcessor::default()),
        Box::new(ImplStubProcessor::default()),
    ]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();
    assert!(matches!(err, BuildError::DuplicateProcessor(id) if id == "impl-stub"));
}

#[test]
fn test_escaping_output_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let session = session(compilation(vec![foo_file()]), config(&dir));
    let mut procs = processors(vec![Box::new(Escaping)]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();
    assert!(matches!(err, BuildError::InvalidOutput { processor, .. } if processor == "escaping"));
    assert!(!dir.path().join("escape.txt").exists());
}

#[test]
fn test_output_dependency_cycle_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let out = config.output_dir.clone();
    let session = session(compilation(vec![foo_file()]), config);
    let mut procs = processors(vec![Box::new(Circular { out })]);

    let err = session.run(&mut procs, &ChangedFiles::default()).unwrap_err();

    let BuildError::DependencyCycle { cycle } = err else {
        panic!("expected a dependency cycle");
    };
    assert_eq!(cycle.len(), 3);
    assert_eq!(cycle.first(), cycle.last());
    assert!(!dir.path().join("gen").exists());
}

// ============================================================================
// Aggregating outputs
// ============================================================================

#[test]
fn test_annotation_index_lists_classes_from_every_round() {
    let dir = TempDir::new().unwrap();
    let other = FileStub::new("src/Z.kt", "other")
        .with_declaration(DeclStub::class("Zed").with_annotation(NativeAnnotation::new("symproc.Indexed")));
    let session = session(compilation(vec![foo_file(), other]), config(&dir));
    let mut procs = processors(vec![
        Box::new(ImplStubProcessor::default()),
        Box::new(AnnotationIndexProcessor::default()),
    ]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert!(report.succeeded(), "{:?}", report.diagnostics);
    let index = dir.path().join("gen/META-INF/symproc/index.txt");
    assert_eq!(fs::read_to_string(&index).unwrap(), "app.Foo\nother.Zed\n");

    let record = &report.manifest.outputs[&index];
    assert_eq!(record.processor, "annotation-index");
    assert!(record.aggregating);
    assert_eq!(
        record.sources.iter().cloned().collect::<Vec<_>>(),
        vec![PathBuf::from("src/A.kt"), PathBuf::from("src/Z.kt")]
    );
    assert!(report.manifest.processors["annotation-index"].depends_on_all);
}

#[test]
fn test_processor_options_select_the_annotation() {
    let dir = TempDir::new().unwrap();
    let marked = FileStub::new("src/M.kt", "app").with_declaration(
        DeclStub::interface("Marked").with_annotation(NativeAnnotation::new("custom.Gen")),
    );
    let session = session(
        compilation(vec![foo_file(), marked]),
        config(&dir).with_option(ImplStubProcessor::ANNOTATION_OPTION, "custom.Gen"),
    );
    let mut procs = processors(vec![Box::new(ImplStubProcessor::default())]);

    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();

    assert_eq!(report.generated, vec![dir.path().join("gen/app/MarkedImpl.kt")]);
}

// ============================================================================
// Parallel rounds
// ============================================================================

fn relative_outcome(dir: &TempDir, parallel: bool) -> (u32, Vec<PathBuf>, Vec<String>) {
    let bar = FileStub::new("src/B.kt", "app").with_declaration(
        DeclStub::class("Bar")
            .with_modifier(ModifierId::Open)
            .with_annotation(NativeAnnotation::new("symproc.GenerateImpl"))
            .with_annotation(NativeAnnotation::new("symproc.Indexed"))
            .with_super_type(ty("Later")),
    );
    let session = session(compilation(vec![foo_file(), bar]), config(dir).with_parallel(parallel));
    let mut procs = processors(vec![
        Box::new(ImplStubProcessor::default()),
        Box::new(AnnotationIndexProcessor::default()),
        Box::new(LaterGenerator::default()),
    ]);
    let report = session.run(&mut procs, &ChangedFiles::default()).unwrap();
    let generated = report
        .generated
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    let diagnostics = report.diagnostics.iter().map(ToString::to_string).collect();
    (report.rounds, generated, diagnostics)
}

#[test]
fn test_parallel_and_sequential_rounds_agree() {
    let sequential_dir = TempDir::new().unwrap();
    let parallel_dir = TempDir::new().unwrap();

    let sequential = relative_outcome(&sequential_dir, false);
    let parallel = relative_outcome(&parallel_dir, true);

    assert_eq!(sequential, parallel);
    assert_eq!(sequential.0, 3);
}
