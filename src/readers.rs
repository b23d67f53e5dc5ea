//! Format-specific document readers, dispatched by file extension.
//!
//! The registry is an explicit dispatch table: extension string → reader
//! capability. Unrecognized extensions fall back to the plain-text reader,
//! which decodes the file as UTF-8. New formats register a reader variant
//! rather than subclassing anything.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;

use crate::errors::IngestError;
use crate::types::{Document, FILE_NAME_KEY, Metadata};

/// Capability for materializing one file into one or more documents.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Reads `path`, labeling resulting documents with `file_name`.
    ///
    /// Malformed content for the format surfaces as
    /// [`IngestError::Decode`].
    async fn read(&self, file_name: &str, path: &Path) -> Result<Vec<Document>, IngestError>;
}

fn base_metadata(file_name: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(FILE_NAME_KEY.into(), file_name.into());
    metadata
}

async fn read_utf8(file_name: &str, path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).await?;
    String::from_utf8(bytes).map_err(|err| IngestError::decode(file_name, err.to_string()))
}

/// Plain UTF-8 text reader; the registry's fallback for unknown extensions.
pub struct TextReader;

#[async_trait]
impl DocumentReader for TextReader {
    async fn read(&self, file_name: &str, path: &Path) -> Result<Vec<Document>, IngestError> {
        let text = read_utf8(file_name, path).await?;
        Ok(vec![Document::new(text, base_metadata(file_name))])
    }
}

/// JSON reader: one document whose text is the pretty-printed value.
pub struct JsonReader;

#[async_trait]
impl DocumentReader for JsonReader {
    async fn read(&self, file_name: &str, path: &Path) -> Result<Vec<Document>, IngestError> {
        let raw = read_utf8(file_name, path).await?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|err| IngestError::decode(file_name, err.to_string()))?;
        let text = serde_json::to_string_pretty(&value)
            .map_err(|err| IngestError::decode(file_name, err.to_string()))?;
        Ok(vec![Document::new(text, base_metadata(file_name))])
    }
}

/// JSON Lines reader: one document per record line.
///
/// A multi-record format, so a single file expands into multiple documents,
/// each with its own fresh ID.
pub struct JsonLinesReader;

#[async_trait]
impl DocumentReader for JsonLinesReader {
    async fn read(&self, file_name: &str, path: &Path) -> Result<Vec<Document>, IngestError> {
        let raw = read_utf8(file_name, path).await?;
        let mut documents = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line).map_err(|err| {
                IngestError::decode(file_name, format!("line {}: {err}", line_no + 1))
            })?;
            let text = serde_json::to_string_pretty(&value)
                .map_err(|err| IngestError::decode(file_name, err.to_string()))?;
            documents.push(Document::new(text, base_metadata(file_name)));
        }
        Ok(documents)
    }
}

/// Dispatch table from lowercase file extension to reader.
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn DocumentReader>>,
    fallback: Arc<dyn DocumentReader>,
}

impl ReaderRegistry {
    /// Registry with the built-in formats: `txt`/`md`/`markdown` as plain
    /// text, `json`, and `jsonl`/`ndjson`. Everything else falls back to
    /// plain UTF-8 text.
    pub fn with_defaults() -> Self {
        let text: Arc<dyn DocumentReader> = Arc::new(TextReader);
        let json: Arc<dyn DocumentReader> = Arc::new(JsonReader);
        let jsonl: Arc<dyn DocumentReader> = Arc::new(JsonLinesReader);

        let mut registry = Self {
            readers: HashMap::new(),
            fallback: Arc::clone(&text),
        };
        registry.register("txt", Arc::clone(&text));
        registry.register("md", Arc::clone(&text));
        registry.register("markdown", text);
        registry.register("json", json);
        registry.register("jsonl", Arc::clone(&jsonl));
        registry.register("ndjson", jsonl);
        registry
    }

    /// Registers (or replaces) the reader for an extension.
    pub fn register(&mut self, extension: &str, reader: Arc<dyn DocumentReader>) {
        self.readers.insert(extension.to_lowercase(), reader);
    }

    /// Selects the reader for `file_name` by its extension.
    pub fn reader_for(&self, file_name: &str) -> Arc<dyn DocumentReader> {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .and_then(|ext| self.readers.get(&ext).cloned())
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Reads `path` with the reader selected for `file_name`.
    pub async fn read(
        &self,
        file_name: &str,
        path: &Path,
    ) -> Result<Vec<Document>, IngestError> {
        self.reader_for(file_name).read(file_name, path).await
    }
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    #[tokio::test]
    async fn unknown_extension_falls_back_to_plain_text() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "data.xyz", b"just some text").await;

        let registry = ReaderRegistry::with_defaults();
        let docs = registry.read("data.xyz", &path).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "just some text");
        assert_eq!(docs[0].metadata[FILE_NAME_KEY], json!("data.xyz"));
    }

    #[tokio::test]
    async fn jsonl_expands_to_one_document_per_record() {
        let dir = tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "records.jsonl",
            b"{\"a\":1}\n\n{\"b\":2}\n{\"c\":3}\n",
        )
        .await;

        let docs = ReaderRegistry::with_defaults()
            .read("records.jsonl", &path)
            .await
            .unwrap();
        assert_eq!(docs.len(), 3);
        // fresh IDs per record
        assert_ne!(docs[0].doc_id, docs[1].doc_id);
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "bad.json", b"{broken").await;

        let err = ReaderRegistry::with_defaults()
            .read("bad.json", &path)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "note.txt", &[0xff, 0xfe, 0x00]).await;

        let err = ReaderRegistry::with_defaults()
            .read("note.txt", &path)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));
    }
}
