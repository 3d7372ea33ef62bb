use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

/// Stream of bytes read from a source object.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Identity of a source object: its container (bucket) and key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(alias = "bucket")]
    pub container: String,
    #[serde(alias = "name")]
    pub key: String,
}

impl ObjectRef {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// A whole-object read: known size plus its content.
pub struct OpenedObject {
    pub size: u64,
    pub stream: ByteStream,
}

impl fmt::Debug for OpenedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenedObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_container_and_key() {
        let obj = ObjectRef::new("uploads", "2024/data.csv");
        assert_eq!(obj.to_string(), "uploads/2024/data.csv");
    }

    #[test]
    fn deserializes_bucket_notification_fields() {
        let obj: ObjectRef =
            serde_json::from_str(r#"{"bucket":"uploads","name":"a/b.nc"}"#).unwrap();
        assert_eq!(obj, ObjectRef::new("uploads", "a/b.nc"));
    }
}
