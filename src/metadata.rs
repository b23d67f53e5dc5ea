//! Metadata curation for caller-facing document listings.

use crate::types::{DOC_ID_KEY, Metadata, ORIGINAL_TEXT_KEY, WINDOW_KEY};

/// Internal bookkeeping keys stripped before metadata leaves the service.
const INTERNAL_KEYS: [&str; 3] = [DOC_ID_KEY, WINDOW_KEY, ORIGINAL_TEXT_KEY];

/// Returns a copy of `metadata` with internal bookkeeping keys removed.
///
/// The input is never mutated. Missing keys are a no-op and `None` in yields
/// `None` out. Curation is a fixed point: curating an already-curated
/// mapping returns an equal mapping.
pub fn curate_metadata(metadata: Option<&Metadata>) -> Option<Metadata> {
    let mut curated = metadata?.clone();
    for key in INTERNAL_KEYS {
        curated.remove(key);
    }
    Some(curated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), json!("note.txt"));
        metadata.insert("doc_id".into(), json!("abc-123"));
        metadata.insert("window".into(), json!("the cat sat"));
        metadata.insert("original_text".into(), json!("the cat"));
        metadata
    }

    #[test]
    fn strips_internal_keys_without_mutating_input() {
        let original = sample();
        let curated = curate_metadata(Some(&original)).unwrap();

        assert_eq!(curated.len(), 1);
        assert!(curated.contains_key("file_name"));
        // input untouched
        assert_eq!(original.len(), 4);
    }

    #[test]
    fn curation_is_a_fixed_point() {
        let once = curate_metadata(Some(&sample())).unwrap();
        let twice = curate_metadata(Some(&once)).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn tolerates_missing_keys_and_absent_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("file_name".into(), json!("a.txt"));
        let curated = curate_metadata(Some(&metadata)).unwrap();
        assert_eq!(curated, metadata);

        assert!(curate_metadata(None).is_none());
    }
}
