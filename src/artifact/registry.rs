//! Load-time-verified artifact lookup by protocol hash (spec §4.F).
//!
//! Grounded on `models::ModelRegistry`'s embedded-lookup-table shape,
//! generalized from a single compiled-in model card list to multiple
//! filesystem bundle directories scanned and hash-verified at startup. A
//! bundle that fails verification is logged and skipped; it never poisons
//! lookups for its siblings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::codegen::{InterfaceDescriptor, Program};
use crate::negotiation::ProtocolDocument;

use super::bundle::Bundle;

/// One side's generated artifact, indexed by the protocol's content hash.
#[derive(Debug, Clone)]
pub struct SideArtifact {
    /// Directory the artifact was loaded from.
    pub bundle_dir: PathBuf,
    /// The negotiated protocol document.
    pub document: ProtocolDocument,
    /// Interface description for this side.
    pub descriptor: InterfaceDescriptor,
    /// Dispatch plan for this side.
    pub program: Program,
}

/// In-memory index of on-disk artifact bundles, keyed by protocol hash.
///
/// Built once per process and shared behind `Arc<RwLock<_>>` by the
/// orchestrator; `scan` can be re-run to pick up bundles written after
/// startup.
#[derive(Debug, Default)]
pub struct Registry {
    requesters: HashMap<String, SideArtifact>,
    providers: HashMap<String, SideArtifact>,
}

impl Registry {
    /// Scan `roots` for bundle directories (one level deep) and index every
    /// one that passes hash verification.
    pub fn scan(roots: &[PathBuf]) -> Self {
        let mut registry = Registry::default();
        for root in roots {
            registry.scan_root(root);
        }
        registry
    }

    fn scan_root(&mut self, root: &Path) {
        let Ok(entries) = std::fs::read_dir(root) else {
            tracing::warn!(root = %root.display(), "artifact root not readable, skipping");
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match Bundle::load(&path) {
                Ok(bundle) => self.index(bundle),
                Err(err) => {
                    tracing::warn!(bundle = %path.display(), error = %err, "skipping unverifiable artifact bundle");
                }
            }
        }
    }

    /// Index an already-loaded bundle (used by the orchestrator right after
    /// `codegen::generate` + `Bundle::create`/`write_*`, without a re-scan).
    pub fn index(&mut self, bundle: Bundle) {
        let hash = bundle.protocol_hash();
        if let Some((descriptor, program)) = bundle.requester.clone() {
            self.requesters.insert(
                hash.clone(),
                SideArtifact { bundle_dir: bundle.dir.clone(), document: bundle.document.clone(), descriptor, program },
            );
        }
        if let Some((descriptor, program)) = bundle.provider.clone() {
            self.providers.insert(
                hash.clone(),
                SideArtifact { bundle_dir: bundle.dir.clone(), document: bundle.document.clone(), descriptor, program },
            );
        }
    }

    /// Look up a requester-side artifact by protocol hash.
    pub fn get_requester_by_hash(&self, hash: &str) -> Option<&SideArtifact> {
        self.requesters.get(hash)
    }

    /// Look up a provider-side artifact by protocol hash.
    pub fn get_provider_by_hash(&self, hash: &str) -> Option<&SideArtifact> {
        self.providers.get(hash)
    }

    /// Number of distinct protocol hashes with at least one indexed side.
    pub fn len(&self) -> usize {
        let mut hashes: std::collections::HashSet<&str> =
            self.requesters.keys().map(String::as_str).collect();
        hashes.extend(self.providers.keys().map(String::as_str));
        hashes.len()
    }

    /// `true` if no bundles are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::dsl::Step;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_side() -> crate::codegen::GeneratedSide {
        crate::codegen::GeneratedSide {
            module_name: "echo_protocol".to_string(),
            descriptor: InterfaceDescriptor::new("echo_protocol", json!({"type": "object"}), json!({"type": "object"})),
            program: Program::new(vec![Step::Require { field: "text".to_string() }]),
        }
    }

    #[test]
    fn scan_indexes_verified_bundles_and_skips_bad_ones() {
        let root = tempdir().unwrap();

        let mut good = Bundle::create(root.path(), "good", ProtocolDocument::new("## Requirements\nGood.\n")).unwrap();
        good.write_requester(sample_side()).unwrap();
        let good_hash = good.protocol_hash();

        let mut bad = Bundle::create(root.path(), "bad", ProtocolDocument::new("## Requirements\nBad.\n")).unwrap();
        bad.write_requester(sample_side()).unwrap();
        std::fs::write(bad.dir.join("requester.dsl.json"), "{\"steps\": []}").unwrap();

        let registry = Registry::scan(&[root.path().to_path_buf()]);

        assert!(registry.get_requester_by_hash(&good_hash).is_some());
        assert_eq!(registry.len(), 1);
    }
}
