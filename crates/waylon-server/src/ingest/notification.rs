//! Object-created notifications
//!
//! Only the first record of an event is used; it must name both a bucket and
//! an object key. Event keys arrive form-url-encoded (`+` for spaces).

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notification carries no records")]
    NoRecords,

    #[error("Notification record has no {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "Records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    s3: Option<S3Entity>,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: Option<BucketEntity>,
    object: Option<ObjectEntity>,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: Option<String>,
}

/// Extract the bucket and key of the first record in `body`
pub fn parse_notification(body: &str) -> Result<ObjectRef, NotificationError> {
    let event: Event = serde_json::from_str(body)?;
    let record = event
        .records
        .into_iter()
        .next()
        .ok_or(NotificationError::NoRecords)?;
    let s3 = record.s3.ok_or(NotificationError::MissingField("s3 entity"))?;

    let bucket = s3
        .bucket
        .and_then(|b| b.name)
        .filter(|n| !n.is_empty())
        .ok_or(NotificationError::MissingField("bucket name"))?;
    let key = s3
        .object
        .and_then(|o| o.key)
        .filter(|k| !k.is_empty())
        .ok_or(NotificationError::MissingField("object key"))?;

    Ok(ObjectRef {
        bucket,
        key: decode_key(&key),
    })
}

fn decode_key(key: &str) -> String {
    let plus_decoded = key.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|s| s.into_owned())
        .unwrap_or(plus_decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_record() {
        let body = r#"{"Records":[
            {"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"rcvs-drop"},"object":{"key":"lib_b1234.tsv","size":2048}}},
            {"s3":{"bucket":{"name":"other"},"object":{"key":"ignored"}}}
        ]}"#;
        assert_eq!(
            parse_notification(body).unwrap(),
            ObjectRef {
                bucket: "rcvs-drop".to_string(),
                key: "lib_b1234.tsv".to_string(),
            }
        );
    }

    #[test]
    fn test_key_is_form_decoded() {
        let body = r#"{"Records":[{"s3":{"bucket":{"name":"rcvs-drop"},"object":{"key":"drop/arc_RCVS%2C+Box+4.tsv"}}}]}"#;
        assert_eq!(parse_notification(body).unwrap().key, "drop/arc_RCVS, Box 4.tsv");
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let body = r#"{"Records":[{"s3":{"bucket":{"name":"rcvs-drop"},"object":{}}}]}"#;
        assert!(matches!(
            parse_notification(body),
            Err(NotificationError::MissingField("object key"))
        ));
    }

    #[test]
    fn test_test_event_has_no_records() {
        let body = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"rcvs-drop"}"#;
        assert!(matches!(parse_notification(body), Err(NotificationError::NoRecords)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_notification("not json"), Err(NotificationError::Json(_))));
    }
}
