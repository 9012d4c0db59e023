//! One build: a front-end, its symbol façade and type resolver, and the configuration to run with.

use std::path::Path;
use std::sync::Arc;

use crate::config::ProcessingConfig;
use crate::error::BuildError;
use crate::frontend::{CompilationSnapshot, Frontend};
use crate::incremental::ChangedFiles;
use crate::processing::{BuildReport, CancellationToken, Orchestrator, SymbolProcessor};
use crate::symbols::SymbolFacade;
use crate::types::TypeResolver;

/// Owns the per-build caches. Create a new session for every build.
pub struct BuildSession {
    facade: Arc<SymbolFacade>,
    types: Arc<TypeResolver>,
    config: ProcessingConfig,
    cancel: CancellationToken,
}

impl BuildSession {
    pub fn new(frontend: Arc<dyn Frontend>, config: ProcessingConfig) -> Self {
        tracing::debug!(frontend = frontend.name(), "new build session");
        let facade = Arc::new(SymbolFacade::new(frontend));
        let types = Arc::new(TypeResolver::new(Arc::clone(&facade), config.nullability_policy));
        Self {
            facade,
            types,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Load a JSON compilation snapshot into the reference front-end.
    pub fn from_snapshot(path: &Path, config: ProcessingConfig) -> Result<Self, BuildError> {
        let frontend = CompilationSnapshot::load(path)?.into_frontend()?;
        Ok(Self::new(Arc::new(frontend), config))
    }

    pub fn facade(&self) -> &Arc<SymbolFacade> {
        &self.facade
    }

    pub fn types(&self) -> &Arc<TypeResolver> {
        &self.types
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// A handle that cancels the build at the next round boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run(
        &self,
        processors: &mut [Box<dyn SymbolProcessor>],
        changes: &ChangedFiles,
    ) -> Result<BuildReport, BuildError> {
        self.config.validate()?;
        let mut orchestrator = Orchestrator::new(Arc::clone(&self.types), &self.config, self.cancel.clone());
        orchestrator.run(processors, changes)
    }
}
