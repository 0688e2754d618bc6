//! Trigger event schema
//!
//! The eventing substrate delivers an object-created notification per
//! manifest write. The shape is validated at the boundary; events missing
//! the bucket name or object key are rejected with a typed error rather
//! than probed dynamically.

use seqfan_common::{Result, SeqfanError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ObjectCreatedEvent {
    detail: EventDetail,
}

#[derive(Debug, Deserialize)]
struct EventDetail {
    bucket: EventBucket,
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    key: String,
}

/// The validated payload a worker acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEvent {
    pub bucket: String,
    pub key: String,
}

impl ManifestEvent {
    /// Parse and validate a raw event document.
    pub fn parse(raw: &str) -> Result<Self> {
        let event: ObjectCreatedEvent = serde_json::from_str(raw)
            .map_err(|e| SeqfanError::InvalidEvent(format!("malformed event: {e}")))?;

        if event.detail.bucket.name.is_empty() || event.detail.object.key.is_empty() {
            return Err(SeqfanError::InvalidEvent(
                "empty bucket name or object key".to_string(),
            ));
        }

        Ok(Self {
            bucket: event.detail.bucket.name,
            key: event.detail.object.key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_event() {
        let raw = r#"{
            "version": "0",
            "source": "aws.s3",
            "detail-type": "Object Created",
            "detail": {
                "bucket": { "name": "manifest-bucket" },
                "object": { "key": "sampleA_L001_p0_input.txt", "size": 142 }
            }
        }"#;
        let event = ManifestEvent::parse(raw).unwrap();
        assert_eq!(event.bucket, "manifest-bucket");
        assert_eq!(event.key, "sampleA_L001_p0_input.txt");
    }

    #[test]
    fn rejects_missing_object_key() {
        let raw = r#"{"detail": {"bucket": {"name": "b"}, "object": {}}}"#;
        let err = ManifestEvent::parse(raw).unwrap_err();
        assert!(matches!(err, SeqfanError::InvalidEvent(_)));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(matches!(
            ManifestEvent::parse("[1, 2, 3]").unwrap_err(),
            SeqfanError::InvalidEvent(_)
        ));
        assert!(matches!(
            ManifestEvent::parse("not json").unwrap_err(),
            SeqfanError::InvalidEvent(_)
        ));
    }

    #[test]
    fn rejects_empty_fields() {
        let raw = r#"{"detail": {"bucket": {"name": ""}, "object": {"key": "k"}}}"#;
        assert!(ManifestEvent::parse(raw).is_err());
    }
}
