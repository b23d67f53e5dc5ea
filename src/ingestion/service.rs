//! Service layer adapting transport-level inputs (text, byte streams,
//! file paths) to the ingestion pipeline, and exposing best-effort reads.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::warn;

use crate::errors::IngestError;
use crate::ingestion::pipeline::IngestionPipeline;
use crate::metadata::curate_metadata;
use crate::types::{Document, FILE_NAME_KEY, IngestedDoc, RefDocInfo};

/// Thin adaptation layer over [`IngestionPipeline`] for non-file callers.
///
/// Write operations (`ingest_*`, `delete`) propagate errors; listing and
/// lookup operations are advisory reads that degrade to empty results with
/// a logged warning when a store reports an invalid state.
pub struct IngestService {
    pipeline: Arc<IngestionPipeline>,
    scratch_dir: Option<PathBuf>,
}

impl IngestService {
    pub fn new(pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            pipeline,
            scratch_dir: None,
        }
    }

    /// Directory for temporary materialization of text/binary uploads.
    /// Defaults to the system temp dir.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Ingests a file already on disk.
    pub async fn ingest_file(
        &self,
        file_name: &str,
        path: &Path,
    ) -> Result<Vec<IngestedDoc>, IngestError> {
        let documents = self.pipeline.ingest(file_name, path).await?;
        Ok(documents.iter().map(ingested_from_document).collect())
    }

    /// Ingests raw text under a logical file name.
    ///
    /// The text is materialized to a scoped temporary file that is removed
    /// on every exit path, success or error.
    pub async fn ingest_text(
        &self,
        file_name: &str,
        text: &str,
    ) -> Result<Vec<IngestedDoc>, IngestError> {
        self.ingest_bytes(file_name, text.as_bytes()).await
    }

    /// Ingests a binary upload stream under a logical file name.
    ///
    /// The stream is read fully into memory, then follows the same scoped
    /// temp-file path as [`ingest_text`](Self::ingest_text).
    pub async fn ingest_bin_data<R>(
        &self,
        file_name: &str,
        mut data: R,
    ) -> Result<Vec<IngestedDoc>, IngestError>
    where
        R: AsyncRead + Send + Unpin,
    {
        let mut buffer = Vec::new();
        data.read_to_end(&mut buffer).await?;
        self.ingest_bytes(file_name, &buffer).await
    }

    async fn ingest_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<IngestedDoc>, IngestError> {
        let temp = match &self.scratch_dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        tokio::fs::write(temp.path(), bytes).await?;
        // `temp` drops at the end of this scope on every path, removing the
        // file before the call returns.
        self.ingest_file(file_name, temp.path()).await
    }

    /// Lists every ingested document with curated metadata.
    ///
    /// Best-effort: a store in an invalid state yields whatever could be
    /// read (or an empty list) with a warning, never an error.
    pub async fn list_ingested(&self) -> Vec<IngestedDoc> {
        match self.pipeline.storage().get_all_ref_doc_info().await {
            Ok(info) => {
                let mut docs: Vec<IngestedDoc> = info
                    .iter()
                    .map(|(doc_id, ref_doc_info)| ingested_from_ref_doc(doc_id, ref_doc_info))
                    .collect();
                docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
                docs
            }
            Err(err) => {
                warn!(error = %err, "listing ingested documents degraded to empty result");
                Vec::new()
            }
        }
    }

    /// IDs of every document whose nodes carry the given `file_name`
    /// metadata, via a linear scan of the document store's nodes.
    ///
    /// Best-effort like [`list_ingested`](Self::list_ingested).
    pub async fn get_doc_ids_by_filename(&self, file_name: &str) -> HashSet<String> {
        let nodes = match self.pipeline.storage().doc_store().nodes().await {
            Ok(nodes) => nodes,
            Err(err) => {
                warn!(error = %err, file_name, "filename lookup degraded to empty result");
                return HashSet::new();
            }
        };
        nodes
            .iter()
            .filter(|node| {
                node.metadata
                    .get(FILE_NAME_KEY)
                    .and_then(|value| value.as_str())
                    == Some(file_name)
            })
            .filter_map(|node| node.ref_doc_id.clone())
            .collect()
    }

    /// Deletes a document by ID; [`IngestError::NotFound`] passes through
    /// unmodified.
    pub async fn delete(&self, doc_id: &str) -> Result<(), IngestError> {
        self.pipeline.delete(doc_id).await
    }
}

fn ingested_from_document(document: &Document) -> IngestedDoc {
    IngestedDoc {
        doc_id: document.doc_id.clone(),
        doc_metadata: curate_metadata(Some(&document.metadata)),
    }
}

fn ingested_from_ref_doc(doc_id: &str, info: &RefDocInfo) -> IngestedDoc {
    IngestedDoc {
        doc_id: doc_id.to_string(),
        doc_metadata: curate_metadata(Some(&info.metadata)),
    }
}
