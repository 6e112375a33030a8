//! Step index: chunked step documents with keyword search.
//!
//! Simple JSON-based index stored under the stepscript home directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::domain::RawEvent;

use super::chunker::TextChunker;

/// Longest element excerpt kept in document metadata
pub const ELEMENT_PREVIEW_CHARS: usize = 100;

/// Longest data or markup excerpt in a document body
const BODY_FIELD_CHARS: usize = 200;

/// Readable document for one recorded event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDocument {
    pub step_index: usize,
    pub event_type: String,
    pub url: String,
    pub timestamp: String,
    pub element_preview: String,
    pub content: String,
}

impl StepDocument {
    pub fn from_event(step_index: usize, event: &RawEvent) -> Self {
        let event_type = if event.event_type.trim().is_empty() {
            "UNKNOWN".to_string()
        } else {
            event.event_type.trim().to_string()
        };

        let content = format!(
            "Step {}:\nEvent Type: {}\nURL: {}\nEvent Data: {}\nElement HTML: {}",
            step_index,
            event_type,
            event.url,
            truncate(&event.event_data, BODY_FIELD_CHARS),
            truncate(&event.element_html, BODY_FIELD_CHARS),
        );

        Self {
            step_index,
            event_type,
            url: event.url.clone(),
            timestamp: event.timestamp.clone(),
            element_preview: truncate(&event.element_html, ELEMENT_PREVIEW_CHARS),
            content,
        }
    }
}

/// One indexed chunk of a step document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub step_index: usize,
    pub chunk_index: usize,
    pub event_type: String,
    pub url: String,
    pub text: String,
}

/// A search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub score: usize,
    pub chunk: &'a Chunk,
}

/// Index over one trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepIndex {
    /// Index format version
    pub version: u32,

    /// Trace the index was built from
    #[serde(default)]
    pub source: Option<String>,

    pub created_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub overlap: usize,
    pub documents: usize,
    pub chunks: Vec<Chunk>,
}

impl StepIndex {
    /// Build an index from raw events
    pub fn build(events: &[RawEvent], chunker: &TextChunker, source: Option<String>) -> Self {
        let mut chunks = Vec::new();
        for (step_index, event) in events.iter().enumerate() {
            let document = StepDocument::from_event(step_index, event);
            for (chunk_index, text) in chunker.split(&document.content).into_iter().enumerate() {
                chunks.push(Chunk {
                    step_index,
                    chunk_index,
                    event_type: document.event_type.clone(),
                    url: document.url.clone(),
                    text,
                });
            }
        }

        Self {
            version: 1,
            source,
            created_at: Utc::now(),
            chunk_size: chunker.chunk_size(),
            overlap: chunker.overlap(),
            documents: events.len(),
            chunks,
        }
    }

    /// Default index file ($STEPSCRIPT_HOME/index.json)
    pub fn default_path() -> Result<PathBuf> {
        crate::config::index_path()
    }

    /// Load an index from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read index: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse index JSON")
    }

    /// Save the index to disk
    pub async fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write index: {}", path.display()))?;

        Ok(())
    }

    /// Rank chunks by how often the query terms occur in them
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit<'_>> {
        let terms = terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let text = chunk.text.to_lowercase();
                let score: usize = terms.iter().map(|t| text.matches(t.as_str()).count()).sum();
                (score > 0).then_some(SearchHit { score, chunk })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.chunk.step_index.cmp(&b.chunk.step_index))
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        hits.truncate(k);
        hits
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn events() -> Vec<RawEvent> {
        vec![
            RawEvent::new(
                "STEPS_FEATURE_CLICK_EVENT",
                "https://shop.test/",
                "<button id=\"checkout\">Checkout</button>",
                "",
            ),
            RawEvent::new(
                "STEPS_FEATURE_TYPE_EVENT",
                "https://shop.test/search",
                "<input name=\"q\">",
                "running shoes",
            ),
            RawEvent::new("", "", "", ""),
        ]
    }

    #[test]
    fn test_document_content() {
        let doc = StepDocument::from_event(1, &events()[1]);
        assert!(doc.content.starts_with("Step 1:\nEvent Type: STEPS_FEATURE_TYPE_EVENT"));
        assert!(doc.content.contains("Event Data: running shoes"));
        assert_eq!(doc.element_preview, "<input name=\"q\">");

        let doc = StepDocument::from_event(2, &events()[2]);
        assert_eq!(doc.event_type, "UNKNOWN");
    }

    #[test]
    fn test_search_ranks_by_term_frequency() {
        let index = StepIndex::build(&events(), &TextChunker::default(), None);
        assert_eq!(index.documents, 3);
        assert_eq!(index.len(), 3);

        let hits = index.search("shoes search", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.step_index, 1);

        let hits = index.search("shop", 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.step_index, 0);

        assert!(index.search("  ", 5).is_empty());
        assert_eq!(index.search("step", 1).len(), 1);
    }

    #[test]
    fn test_small_chunks_keep_step_metadata() {
        let chunker = TextChunker::new(40, 10).unwrap();
        let index = StepIndex::build(&events()[..1], &chunker, Some("trace.json".into()));
        assert!(index.len() > 1);
        assert!(index.chunks.iter().all(|c| c.step_index == 0));
        assert_eq!(index.chunks.last().unwrap().chunk_index, index.len() - 1);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("index.json");

        let index = StepIndex::build(&events(), &TextChunker::default(), Some("t.json".into()));
        index.save(&path).await.unwrap();

        let loaded = StepIndex::load(&path).await.unwrap();
        assert_eq!(loaded.chunks, index.chunks);
        assert_eq!(loaded.source.as_deref(), Some("t.json"));
        assert_eq!(loaded.chunk_size, 500);
    }
}
