//! On-disk artifact bundle layout and persistence (spec §4.F).
//!
//! Grounded on `code_generator.py`'s `_create_module_structure` /
//! `_generate_meta_data` / `_update_meta_data_files`: one directory per
//! generated protocol module, a `meta_data.json` manifest tracking every
//! file's content hash, and a millisecond-timestamp suffix on the module
//! name when the directory already exists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codegen::{GeneratedSide, InterfaceDescriptor, Program};
use crate::error::{NegError, Result};
use crate::negotiation::ProtocolDocument;

const META_DATA_SPECIFICATION_VERSION: &str = "1.0";
const PROTOCOL_VERSION: &str = "1.0";

/// One entry in `meta_data.json`'s `files` map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    /// File name relative to the bundle directory.
    pub file: String,
    /// `sha256:`-prefixed content hash at write time.
    pub hash: String,
}

/// The `meta_data.json` manifest for one artifact bundle directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaData {
    /// Schema version of this manifest format itself.
    pub meta_data_specification_version: String,
    /// The module/protocol name (post timestamp-suffix, if any).
    pub protocol_name: String,
    /// Protocol document version tag.
    pub protocol_version: String,
    /// UTC ISO-8601 generation timestamp.
    pub timestamp: String,
    /// Tracked files, keyed by logical name (`protocol_document`,
    /// `requester`, `requester_description`, `provider`, ...).
    pub files: HashMap<String, FileEntry>,
}

/// A fully-materialized artifact bundle directory: a protocol document plus
/// one or both sides' descriptor/program pair.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Directory this bundle was (or will be) written to.
    pub dir: PathBuf,
    /// The manifest, kept in sync with what's on disk.
    pub meta: MetaData,
    /// The negotiated protocol document.
    pub document: ProtocolDocument,
    /// Requester descriptor/program, if generated into this bundle.
    pub requester: Option<(InterfaceDescriptor, Program)>,
    /// Provider descriptor/program, if generated into this bundle.
    pub provider: Option<(InterfaceDescriptor, Program)>,
}

fn hash_bytes(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Pick a module directory under `root`, appending a millisecond-timestamp
/// suffix if `module_name` is already taken (mirrors
/// `_create_module_structure`'s collision handling).
fn resolve_module_dir(root: &Path, module_name: &str, now_millis: i64) -> (String, PathBuf) {
    let candidate = root.join(module_name);
    if !candidate.exists() {
        return (module_name.to_string(), candidate);
    }
    let name = format!("{module_name}_{now_millis}");
    let path = root.join(&name);
    (name, path)
}

impl Bundle {
    /// Create a new bundle directory under `root` for `document`, writing
    /// `protocol_document.md` and an empty `meta_data.json`.
    pub fn create(root: &Path, suggested_module_name: &str, document: ProtocolDocument) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let now_millis = Utc::now().timestamp_millis();
        let (protocol_name, dir) = resolve_module_dir(root, suggested_module_name, now_millis);
        std::fs::create_dir_all(&dir)?;

        std::fs::write(dir.join("protocol_document.md"), &document.body)?;

        let mut files = HashMap::new();
        files.insert(
            "protocol_document".to_string(),
            FileEntry { file: "protocol_document.md".to_string(), hash: hash_bytes(document.body.as_bytes()) },
        );

        let meta = MetaData {
            meta_data_specification_version: META_DATA_SPECIFICATION_VERSION.to_string(),
            protocol_name,
            protocol_version: PROTOCOL_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            files,
        };
        let bundle = Bundle { dir, meta, document, requester: None, provider: None };
        bundle.write_meta_data()?;
        Ok(bundle)
    }

    /// Write `requester.dsl.json` and `requester_description.json`,
    /// tracking both in `meta_data.json`.
    pub fn write_requester(&mut self, side: GeneratedSide) -> Result<()> {
        self.write_side("requester", &side.descriptor, &side.program)?;
        self.requester = Some((side.descriptor, side.program));
        Ok(())
    }

    /// Write `provider.dsl.json` and `provider_description.json`,
    /// tracking both in `meta_data.json`.
    pub fn write_provider(&mut self, side: GeneratedSide) -> Result<()> {
        self.write_side("provider", &side.descriptor, &side.program)?;
        self.provider = Some((side.descriptor, side.program));
        Ok(())
    }

    fn write_side(&mut self, role: &str, descriptor: &InterfaceDescriptor, program: &Program) -> Result<()> {
        let program_file = format!("{role}.dsl.json");
        let program_text = serde_json::to_string_pretty(program)?;
        std::fs::write(self.dir.join(&program_file), &program_text)?;
        self.meta.files.insert(
            role.to_string(),
            FileEntry { file: program_file, hash: hash_bytes(program_text.as_bytes()) },
        );

        let description_file = format!("{role}_description.json");
        let description_text = serde_json::to_string_pretty(descriptor)?;
        std::fs::write(self.dir.join(&description_file), &description_text)?;
        self.meta.files.insert(
            format!("{role}_description"),
            FileEntry { file: description_file, hash: hash_bytes(description_text.as_bytes()) },
        );

        self.write_meta_data()
    }

    fn write_meta_data(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.meta)?;
        std::fs::write(self.dir.join("meta_data.json"), text)?;
        Ok(())
    }

    /// The protocol document's content hash (recomputed, per
    /// [`ProtocolDocument::hash`] invariant).
    pub fn protocol_hash(&self) -> String {
        self.document.hash()
    }

    /// Re-read a bundle directory from disk, verifying every file named in
    /// `meta_data.json` still matches its recorded hash.
    pub fn load(dir: &Path) -> Result<Self> {
        let meta_text = std::fs::read_to_string(dir.join("meta_data.json"))?;
        let meta: MetaData = serde_json::from_str(&meta_text)?;

        for (key, entry) in &meta.files {
            let path = dir.join(&entry.file);
            let bytes = std::fs::read(&path).map_err(|_| {
                NegError::ArtifactHashMismatch {
                    bundle: dir.display().to_string(),
                    detail: format!("{key}: missing file {}", entry.file),
                }
            })?;
            let actual = hash_bytes(&bytes);
            if actual != entry.hash {
                return Err(NegError::ArtifactHashMismatch {
                    bundle: dir.display().to_string(),
                    detail: format!("{key}: expected {}, got {actual}", entry.hash),
                });
            }
        }

        let doc_entry = meta.files.get("protocol_document").ok_or_else(|| NegError::ArtifactHashMismatch {
            bundle: dir.display().to_string(),
            detail: "missing protocol_document entry".to_string(),
        })?;
        let doc_text = std::fs::read_to_string(dir.join(&doc_entry.file))?;
        let document = ProtocolDocument::new(doc_text);

        let requester = load_side(dir, &meta, "requester")?;
        let provider = load_side(dir, &meta, "provider")?;

        Ok(Bundle { dir: dir.to_path_buf(), meta, document, requester, provider })
    }
}

fn load_side(dir: &Path, meta: &MetaData, role: &str) -> Result<Option<(InterfaceDescriptor, Program)>> {
    let (Some(program_entry), Some(description_entry)) =
        (meta.files.get(role), meta.files.get(&format!("{role}_description")))
    else {
        return Ok(None);
    };
    let program: Program = serde_json::from_str(&std::fs::read_to_string(dir.join(&program_entry.file))?)?;
    let descriptor: InterfaceDescriptor =
        serde_json::from_str(&std::fs::read_to_string(dir.join(&description_entry.file))?)?;
    Ok(Some((descriptor, program)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::dsl::Step;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_side() -> GeneratedSide {
        GeneratedSide {
            module_name: "echo_protocol".to_string(),
            descriptor: InterfaceDescriptor::new("echo_protocol", json!({"type": "object"}), json!({"type": "object"})),
            program: Program::new(vec![Step::Require { field: "text".to_string() }]),
        }
    }

    #[test]
    fn create_and_load_roundtrips() {
        let root = tempdir().unwrap();
        let doc = ProtocolDocument::new("## Requirements\nEcho text back.\n");
        let mut bundle = Bundle::create(root.path(), "echo_protocol", doc).unwrap();
        bundle.write_requester(sample_side()).unwrap();
        bundle.write_provider(sample_side()).unwrap();

        let loaded = Bundle::load(&bundle.dir).unwrap();
        assert!(loaded.requester.is_some());
        assert!(loaded.provider.is_some());
        assert_eq!(loaded.protocol_hash(), bundle.protocol_hash());
    }

    #[test]
    fn directory_collision_appends_timestamp_suffix() {
        let root = tempdir().unwrap();
        let doc_a = ProtocolDocument::new("## Requirements\nVersion a.\n");
        let doc_b = ProtocolDocument::new("## Requirements\nVersion b.\n");

        let bundle_a = Bundle::create(root.path(), "dup", doc_a).unwrap();
        let bundle_b = Bundle::create(root.path(), "dup", doc_b).unwrap();

        assert_ne!(bundle_a.dir, bundle_b.dir);
        assert_eq!(bundle_a.meta.protocol_name, "dup");
        assert_ne!(bundle_b.meta.protocol_name, "dup");
    }

    #[test]
    fn tampered_file_fails_load_with_hash_mismatch() {
        let root = tempdir().unwrap();
        let doc = ProtocolDocument::new("## Requirements\nEcho text back.\n");
        let mut bundle = Bundle::create(root.path(), "echo_protocol", doc).unwrap();
        bundle.write_requester(sample_side()).unwrap();

        std::fs::write(bundle.dir.join("requester.dsl.json"), "{\"steps\": []}").unwrap();

        let err = Bundle::load(&bundle.dir).unwrap_err();
        assert!(matches!(err, NegError::ArtifactHashMismatch { .. }));
    }
}
