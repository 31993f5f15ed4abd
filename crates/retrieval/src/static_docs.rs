//! Static retriever — keyword search over an in-memory passage set.
//!
//! Passages are either supplied directly or loaded from a documentation
//! directory of `.md`/`.mdx` files, chunked the same way the vector-store
//! ingestion does it. Scoring is the fraction of distinct query terms a
//! passage contains, so results are deterministic and need no model.

use async_trait::async_trait;
use scholarag_core::error::RetrievalError;
use scholarag_core::retrieval::{PassageSource, RetrievedPassage, Retriever, rank_passages};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum fragment length in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared by consecutive fragments.
pub const CHUNK_OVERLAP: usize = 200;

/// A retriever over a fixed set of passages.
pub struct StaticRetriever {
    passages: Vec<RetrievedPassage>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self { passages }
    }

    /// Load and chunk every `.md`/`.mdx` file under `dir`.
    ///
    /// Unreadable files are skipped with a warning; a missing directory is an
    /// error.
    pub fn load_dir(dir: &Path) -> Result<Self, RetrievalError> {
        let mut files = Vec::new();
        collect_markdown(dir, &mut files).map_err(|e| RetrievalError::Load {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        files.sort();

        let mut passages = Vec::new();
        for file in &files {
            let content = match std::fs::read_to_string(file) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            let rel_path = file
                .strip_prefix(dir)
                .unwrap_or(file)
                .to_string_lossy()
                .into_owned();
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| rel_path.clone());

            for (fragment_index, chunk) in chunk_document(&content, CHUNK_SIZE, CHUNK_OVERLAP)
                .into_iter()
                .enumerate()
            {
                passages.push(RetrievedPassage {
                    content: chunk,
                    source: PassageSource {
                        path: rel_path.clone(),
                        filename: filename.clone(),
                        fragment_index,
                    },
                    similarity: 0.0,
                });
            }
        }

        debug!(
            dir = %dir.display(),
            files = files.len(),
            passages = passages.len(),
            "Static retriever loaded"
        );
        Ok(Self::new(passages))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("md") | Some("mdx")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Split a document into overlapping fragments of at most `chunk_size`
/// characters, preferring to end a fragment at a paragraph break.
///
/// Fragments are trimmed and empty ones dropped. Every step advances, so
/// the loop terminates for any input.
pub fn chunk_document(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            // Only break at a paragraph if the fragment still moves past the overlap
            if let Some(pos) = rfind_paragraph_break(&chars[start..end]) {
                if pos > overlap {
                    end = start + pos;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= len {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

fn rfind_paragraph_break(window: &[char]) -> Option<usize> {
    window.windows(2).rposition(|w| w == ['\n', '\n'])
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let scored = self
            .passages
            .iter()
            .filter_map(|p| {
                let passage_terms = terms(&p.content);
                let hits = query_terms.intersection(&passage_terms).count();
                (hits > 0).then(|| RetrievedPassage {
                    similarity: hits as f32 / query_terms.len() as f32,
                    ..p.clone()
                })
            })
            .collect();

        Ok(rank_passages(scored, top_k))
    }
}
