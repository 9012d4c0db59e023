//! Dependency tracking: which inputs each processor read and which inputs each output was derived from.
//!
//! Processors never report reads themselves. Every façade access made through a processor's
//! [`Resolver`](crate::processing::Resolver) view lands in that processor's [`ReadBuffer`]; at round end the
//! orchestrator merges buffers into the [`DependencyTracker`] in registration order.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod manifest;
mod tracker;

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use manifest::{DependencyEdge, DependencyManifest, ManifestError, OutputRecord, ProcessorRecord, MANIFEST_SCHEMA_VERSION};
pub use tracker::{DependencyTracker, ReadBuffer, ReadSet};

/// Declared sources of one generated file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    /// The output depends on every input, including inputs that do not exist yet.
    pub aggregating: bool,
    pub sources: BTreeSet<PathBuf>,
    /// The output depends on all current sources, not only the listed ones.
    pub all_sources: bool,
}

impl Dependencies {
    /// The output is derived only from `sources`.
    pub fn isolating<I, P>(sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            aggregating: false,
            sources: sources.into_iter().map(Into::into).collect(),
            all_sources: false,
        }
    }

    /// The output is derived from `sources` and must be regenerated whenever any input changes.
    pub fn aggregating<I, P>(sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            aggregating: true,
            ..Self::isolating(sources)
        }
    }

    /// The output depends on all sources.
    pub fn all_sources() -> Self {
        Self {
            aggregating: true,
            sources: BTreeSet::new(),
            all_sources: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolating_keeps_sources_sorted() {
        let deps = Dependencies::isolating(["b.kt", "a.kt"]);
        assert!(!deps.aggregating);
        let sources: Vec<_> = deps.sources.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(sources, vec!["a.kt", "b.kt"]);
    }

    #[test]
    fn test_all_sources_is_aggregating() {
        let deps = Dependencies::all_sources();
        assert!(deps.aggregating);
        assert!(deps.all_sources);
        assert!(deps.sources.is_empty());
    }
}
