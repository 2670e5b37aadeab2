//! Object storage adapter.
//!
//! Logical file paths are resolved against a configured list of public
//! search paths or a single private root. Writes go through the local
//! signing sidecar, which returns a provider-signed PUT URL carrying an
//! owner + visibility ACL policy.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("Object storage is not configured: {0}")]
    Config(&'static str),
    #[error("Invalid object path")]
    InvalidPath,
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Object signing failed with status {status}")]
    Signing { status: u16 },
    #[error("Object upload failed with status {status}")]
    Upload { status: u16 },
}

/// A fully resolved `bucket` + `object` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    pub bucket: String,
    pub object: String,
}

#[derive(Clone)]
pub struct ObjectStoreClient {
    client: reqwest::Client,
    sidecar_endpoint: String,
    public_search_paths: Vec<String>,
    private_dir: Option<String>,
}

impl std::fmt::Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreClient")
            .field("sidecar_endpoint", &self.sidecar_endpoint)
            .field("public_search_paths", &self.public_search_paths)
            .field("private_dir", &self.private_dir)
            .finish()
    }
}

impl ObjectStoreClient {
    pub fn new(
        sidecar_endpoint: String,
        public_search_paths: Vec<String>,
        private_dir: Option<String>,
    ) -> Result<Self, ObjectStoreError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ObjectStoreError::Request)?;

        Ok(Self {
            client,
            sidecar_endpoint: sidecar_endpoint.trim_end_matches('/').to_string(),
            public_search_paths,
            private_dir,
        })
    }

    pub fn is_configured_for_uploads(&self) -> bool {
        self.private_dir.is_some()
    }

    pub fn public_search_paths(&self) -> Result<&[String], ObjectStoreError> {
        if self.public_search_paths.is_empty() {
            return Err(ObjectStoreError::Config(
                "PUBLIC_OBJECT_SEARCH_PATHS is not set",
            ));
        }
        Ok(&self.public_search_paths)
    }

    pub fn private_dir(&self) -> Result<&str, ObjectStoreError> {
        self.private_dir
            .as_deref()
            .ok_or(ObjectStoreError::Config("PRIVATE_OBJECT_DIR is not set"))
    }

    /// Candidate object locations for a public file, in search-path order.
    /// Malformed search paths are skipped.
    pub fn resolve_public(&self, file_path: &str) -> Result<Vec<ObjectPath>, ObjectStoreError> {
        let candidates = self
            .public_search_paths()?
            .iter()
            .filter_map(|search_path| {
                split_object_path(&join_path(search_path, file_path))
            })
            .collect();
        Ok(candidates)
    }

    pub fn resolve_private(&self, file_path: &str) -> Result<ObjectPath, ObjectStoreError> {
        let full = join_path(self.private_dir()?, file_path);
        split_object_path(&full).ok_or(ObjectStoreError::InvalidPath)
    }

    /// Ask the sidecar to sign a PUT for a private object, tagged with the
    /// owner and a private visibility policy.
    pub async fn signed_upload_url(
        &self,
        file_path: &str,
        owner: &str,
    ) -> Result<String, ObjectStoreError> {
        let path = self.resolve_private(file_path)?;

        let acl_policy = json!({ "owner": owner, "visibility": "private" });
        let request_body = json!({
            "bucket": path.bucket,
            "object": path.object,
            "method": "PUT",
            "metadata": { "custom:aclPolicy": acl_policy.to_string() },
        });

        let response = self
            .client
            .post(format!("{}/sign", self.sidecar_endpoint))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ObjectStoreError::Signing {
                status: status.as_u16(),
            });
        }

        #[derive(Deserialize)]
        struct SignResponse {
            #[serde(default)]
            signed_url: String,
        }

        Ok(response.json::<SignResponse>().await?.signed_url)
    }

    /// PUT raw bytes to a previously signed URL.
    pub async fn upload_signed(
        &self,
        signed_url: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), ObjectStoreError> {
        let mut request = self.client.put(signed_url).body(bytes);
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(ObjectStoreError::Upload {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

fn join_path(base: &str, file_path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        file_path.trim_start_matches('/')
    )
}

/// Split `/bucket/a/b.pdf` into bucket `bucket` and object `a/b.pdf`.
fn split_object_path(full_path: &str) -> Option<ObjectPath> {
    let trimmed = full_path.trim_start_matches('/');
    let (bucket, object) = trimmed.split_once('/')?;
    if bucket.is_empty() || object.is_empty() {
        return None;
    }
    Some(ObjectPath {
        bucket: bucket.to_string(),
        object: object.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(paths: Vec<&str>, private: Option<&str>) -> ObjectStoreClient {
        ObjectStoreClient::new(
            "http://127.0.0.1:1106".to_string(),
            paths.into_iter().map(String::from).collect(),
            private.map(String::from),
        )
        .unwrap()
    }

    #[test]
    fn object_paths_split_on_first_slash() {
        let path = split_object_path("/bucket-1/docs/policy.pdf").unwrap();
        assert_eq!(path.bucket, "bucket-1");
        assert_eq!(path.object, "docs/policy.pdf");

        assert!(split_object_path("bucket-only").is_none());
        assert!(split_object_path("/bucket/").is_none());
    }

    #[test]
    fn missing_search_paths_is_a_config_error() {
        let c = client(vec![], None);
        assert!(matches!(
            c.resolve_public("logo.png"),
            Err(ObjectStoreError::Config(_))
        ));
    }

    #[test]
    fn public_resolution_walks_search_paths_in_order() {
        let c = client(vec!["/pub-a/assets", "/pub-b"], None);
        let candidates = c.resolve_public("logo.png").unwrap();
        assert_eq!(
            candidates,
            vec![
                ObjectPath {
                    bucket: "pub-a".to_string(),
                    object: "assets/logo.png".to_string()
                },
                ObjectPath {
                    bucket: "pub-b".to_string(),
                    object: "logo.png".to_string()
                },
            ]
        );
    }

    #[test]
    fn private_resolution_requires_configuration() {
        let c = client(vec![], None);
        assert!(matches!(
            c.resolve_private("slips/jan.pdf"),
            Err(ObjectStoreError::Config(_))
        ));

        let c = client(vec![], Some("/private-bucket/hr"));
        let path = c.resolve_private("slips/jan.pdf").unwrap();
        assert_eq!(path.bucket, "private-bucket");
        assert_eq!(path.object, "hr/slips/jan.pdf");
    }
}
