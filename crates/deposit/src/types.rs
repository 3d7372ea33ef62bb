use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A remote deposition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposition {
    pub id: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub links: DepositionLinks,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub submitted: bool,
}

impl Deposition {
    /// The upload target link, the only field needed to transfer bytes.
    pub fn upload_target(&self) -> Result<&str, Error> {
        self.links
            .upload_target
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(Error::MissingUploadTarget(self.id))
    }
}

/// Capability links of a deposition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositionLinks {
    /// Storage target receiving file PUTs.
    #[serde(rename = "bucket", default, skip_serializing_if = "Option::is_none")]
    pub upload_target: Option<String>,
    /// Human-facing page of the deposition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A file registered on a deposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositionFile {
    #[serde(default)]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub filesize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Community a new deposition is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    pub identifier: String,
}

/// Body of a deposition creation request.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateDeposition<'a> {
    pub metadata: CreateMetadata<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateMetadata<'a> {
    pub upload_type: &'a str,
    pub communities: Vec<Community>,
}

impl<'a> CreateDeposition<'a> {
    pub fn new(upload_type: &'a str, community: &str) -> Self {
        Self {
            metadata: CreateMetadata {
                upload_type,
                communities: vec![Community {
                    identifier: community.to_string(),
                }],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATED: &str = r#"{
        "id": 1234,
        "created": "2024-05-01T12:00:00.000000+00:00",
        "links": {
            "bucket": "https://archive.test/api/files/0b9e-4a1c",
            "html": "https://archive.test/deposit/1234",
            "self": "https://archive.test/api/deposit/depositions/1234",
            "publish": "https://archive.test/api/deposit/depositions/1234/actions/publish"
        },
        "files": [],
        "metadata": {"upload_type": "dataset"},
        "submitted": false,
        "state": "unsubmitted"
    }"#;

    #[test]
    fn parses_created_deposition() {
        let dep: Deposition = serde_json::from_str(CREATED).unwrap();
        assert_eq!(dep.id, 1234);
        assert_eq!(
            dep.upload_target().unwrap(),
            "https://archive.test/api/files/0b9e-4a1c"
        );
        assert_eq!(
            dep.links.html.as_deref(),
            Some("https://archive.test/deposit/1234")
        );
        assert!(dep.links.other.contains_key("publish"));
        assert!(dep.files.is_empty());
        assert!(!dep.submitted);
    }

    #[test]
    fn missing_upload_target_is_error() {
        let dep: Deposition = serde_json::from_str(r#"{"id": 7, "links": {}}"#).unwrap();
        assert!(matches!(dep.upload_target(), Err(Error::MissingUploadTarget(7))));
    }

    #[test]
    fn parses_files() {
        let dep: Deposition = serde_json::from_str(
            r#"{"id": 1, "files": [{"id": "f1", "filename": "a.nc", "filesize": 10, "checksum": "md5:abc"}]}"#,
        )
        .unwrap();
        assert_eq!(dep.files.len(), 1);
        assert_eq!(dep.files[0].filename, "a.nc");
        assert_eq!(dep.files[0].filesize, 10);
    }

    #[test]
    fn create_body_shape() {
        let body = serde_json::to_value(CreateDeposition::new("dataset", "cdrxiv")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "metadata": {
                    "upload_type": "dataset",
                    "communities": [{"identifier": "cdrxiv"}]
                }
            })
        );
    }
}
