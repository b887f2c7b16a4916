//! Persistent embedding cache: a JSON metadata file plus a binary vectors file.
//!
//! The two files form one logical cache. They are written together and loaded
//! together; if either is missing, corrupt, or disagrees with the other, the
//! whole cache is discarded and rebuilt on the next indexing run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use ragkit_core::{write_atomic, RagError};
use serde::{Deserialize, Serialize};

pub const METADATA_FILE: &str = "embeddings.json";
pub const VECTORS_FILE: &str = "vectors.bin";

const VECTORS_MAGIC: &[u8; 4] = b"RKV1";
const METADATA_VERSION: u32 = 1;

/// Metadata recorded for every cached vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMeta {
    /// Digest of the exact text that was embedded.
    pub content_hash: String,
    pub model_id: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedEmbedding {
    pub meta: EntryMeta,
    pub vector: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    version: u32,
    documents: BTreeMap<String, EntryMeta>,
}

/// In-memory view of the embedding cache, keyed by document path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingCache {
    entries: BTreeMap<String, CachedEmbedding>,
}

impl EmbeddingCache {
    /// Load the cache stored under `dir`.
    ///
    /// Never fails: an absent cache is empty, and an unreadable one is logged
    /// and treated as empty.
    pub fn load(dir: &Path) -> Self {
        let meta_path = dir.join(METADATA_FILE);
        let vectors_path = dir.join(VECTORS_FILE);
        if !meta_path.exists() && !vectors_path.exists() {
            return Self::default();
        }
        match Self::try_load(&meta_path, &vectors_path) {
            Ok(cache) => cache,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "discarding unreadable embedding cache");
                Self::default()
            }
        }
    }

    fn try_load(meta_path: &Path, vectors_path: &Path) -> Result<Self, RagError> {
        let metadata: MetadataFile = serde_json::from_str(&std::fs::read_to_string(meta_path)?)?;
        if metadata.version != METADATA_VERSION {
            return Err(RagError::Embedding(format!(
                "unsupported cache version {}",
                metadata.version
            )));
        }
        let vectors = decode_vectors(&std::fs::read(vectors_path)?)?;

        let meta_ids: BTreeSet<&String> = metadata.documents.keys().collect();
        let vector_ids: BTreeSet<&String> = vectors.keys().collect();
        if meta_ids != vector_ids {
            return Err(RagError::Embedding(
                "metadata and vectors files disagree".into(),
            ));
        }

        let mut vectors = vectors;
        let entries = metadata
            .documents
            .into_iter()
            .filter_map(|(id, meta)| {
                let vector = vectors.remove(&id)?;
                Some((id, CachedEmbedding { meta, vector }))
            })
            .collect();
        Ok(Self { entries })
    }

    /// Write both files under `dir`, each through a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persist`] if either file cannot be written.
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        std::fs::create_dir_all(dir)?;
        let metadata = MetadataFile {
            version: METADATA_VERSION,
            documents: self
                .entries
                .iter()
                .map(|(id, e)| (id.clone(), e.meta.clone()))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&metadata)?;
        write_atomic(&dir.join(VECTORS_FILE), &encode_vectors(&self.entries))?;
        write_atomic(&dir.join(METADATA_FILE), &json)?;
        Ok(())
    }

    /// The cached vector for `id`, if it was computed from `content_hash` by `model_id`.
    pub fn get(&self, id: &str, content_hash: &str, model_id: &str) -> Option<&[f32]> {
        self.entries
            .get(id)
            .filter(|e| e.meta.content_hash == content_hash && e.meta.model_id == model_id)
            .map(|e| e.vector.as_slice())
    }

    pub fn insert(&mut self, id: String, meta: EntryMeta, vector: Vec<f32>) {
        self.entries.insert(id, CachedEmbedding { meta, vector });
    }

    /// Drop every entry whose id is not in `keep`.
    pub fn retain_ids(&mut self, keep: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| keep.contains(id));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn floats_to_bytes(floats: &[f32], out: &mut Vec<u8>) {
    for f in floats {
        out.extend_from_slice(&f.to_le_bytes());
    }
}

fn encode_vectors(entries: &BTreeMap<String, CachedEmbedding>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(VECTORS_MAGIC);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (id, entry) in entries {
        out.extend_from_slice(&(id.len() as u32).to_le_bytes());
        out.extend_from_slice(id.as_bytes());
        out.extend_from_slice(&(entry.vector.len() as u32).to_le_bytes());
        floats_to_bytes(&entry.vector, &mut out);
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], RagError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| RagError::Embedding("vectors file is truncated".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, RagError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn decode_vectors(bytes: &[u8]) -> Result<BTreeMap<String, Vec<f32>>, RagError> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.take(4)? != VECTORS_MAGIC {
        return Err(RagError::Embedding("vectors file has a bad header".into()));
    }
    let count = reader.u32()?;
    let mut vectors = BTreeMap::new();
    for _ in 0..count {
        let id_len = reader.u32()? as usize;
        let id = String::from_utf8(reader.take(id_len)?.to_vec())
            .map_err(|e| RagError::Embedding(format!("vectors file has a bad id: {e}")))?;
        let dim = reader.u32()? as usize;
        let raw = reader.take(dim.saturating_mul(4))?;
        let vector = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        vectors.insert(id, vector);
    }
    if reader.pos != bytes.len() {
        return Err(RagError::Embedding("vectors file has trailing bytes".into()));
    }
    Ok(vectors)
}
