//! File-object store helpers: upload, public URL, signed URL.
//!
//! Consumed by upload components (employee documents, contract scans);
//! independent of the notification and auto-save subsystems.

use log::debug;
use serde::Deserialize;

use crate::client::BackendClient;
use crate::error::{BackendError, Result};

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl BackendClient {
    /// Build an object URL with every path segment percent-encoded. Object
    /// names carry Arabic text and spaces (e.g. "عقود/عقد 17.pdf"); raw
    /// interpolation would produce invalid request targets.
    fn object_url(&self, prefix: Option<&str>, bucket: &str, path: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(self.base_url())
            .map_err(|_| BackendError::invalid_request("Invalid base URL"))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::invalid_request("Base URL cannot hold a path"))?;
            segments.extend(["storage", "v1", "object"]);
            if let Some(prefix) = prefix {
                segments.push(prefix);
            }
            segments.push(bucket);
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        Ok(url.to_string())
    }

    /// Upload an object into a bucket.
    ///
    /// POST /storage/v1/object/{bucket}/{path}
    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(None, bucket, path)?;
        let mut headers = self.headers()?;
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            content_type
                .parse()
                .map_err(|_| BackendError::invalid_request("Invalid content type"))?,
        );

        let response = self
            .http()
            .post(&url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("uploaded {}/{}", bucket, path);
            return Ok(());
        }
        let body = response.text().await?;
        Err(BackendError::api(
            status.as_u16(),
            format!("Upload failed: {}", body),
        ))
    }

    /// Public URL for an object in a public bucket. No request is made.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<String> {
        self.object_url(Some("public"), bucket, path)
    }

    /// Time-limited URL for an object in a private bucket.
    ///
    /// POST /storage/v1/object/sign/{bucket}/{path}
    pub async fn signed_url(&self, bucket: &str, path: &str, expires_secs: u64) -> Result<String> {
        let url = self.object_url(Some("sign"), bucket, path)?;
        let response = self
            .http()
            .post(&url)
            .headers(self.headers()?)
            .json(&serde_json::json!({ "expiresIn": expires_secs }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BackendError::api(
                status.as_u16(),
                format!("Sign failed: {}", body),
            ));
        }
        let signed: SignedUrlResponse = serde_json::from_str(&body)?;
        Ok(format!("{}/storage/v1{}", self.base_url(), signed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{start_mock_server, ScriptedResponse};
    use crate::config::BackendConfig;

    #[test]
    fn public_url_is_derived_without_a_request() {
        let client = BackendClient::new(BackendConfig::new("http://backend.local", "anon-key"));
        assert_eq!(
            client.public_url("documents", "contracts/2026/c-17.pdf").unwrap(),
            "http://backend.local/storage/v1/object/public/documents/contracts/2026/c-17.pdf"
        );
    }

    #[test]
    fn object_paths_are_percent_encoded_per_segment() {
        let client = BackendClient::new(BackendConfig::new("http://backend.local", "anon-key"));
        // Arabic folder and a file name with a space.
        assert_eq!(
            client.public_url("documents", "عقود/عقد 17.pdf").unwrap(),
            "http://backend.local/storage/v1/object/public/documents/\
             %D8%B9%D9%82%D9%88%D8%AF/%D8%B9%D9%82%D8%AF%2017.pdf"
        );
        // Separators survive; empty segments from doubled slashes do not.
        assert_eq!(
            client.public_url("documents", "/a//b/").unwrap(),
            "http://backend.local/storage/v1/object/public/documents/a/b"
        );
    }

    #[tokio::test]
    async fn signed_url_combines_base_with_returned_path() {
        let (base_url, captured, server) = start_mock_server(vec![ScriptedResponse::json(
            200,
            r#"{"signedURL":"/object/sign/documents/c-17.pdf?token=abc"}"#,
        )])
        .await;

        let client = BackendClient::new(BackendConfig::new(&base_url, "anon-key"));
        let url = client.signed_url("documents", "c-17.pdf", 3_600).await.unwrap();
        assert_eq!(
            url,
            format!("{}/storage/v1/object/sign/documents/c-17.pdf?token=abc", base_url)
        );

        let requests = captured.lock().await.clone();
        assert!(requests[0].body.contains("\"expiresIn\":3600"));

        server.abort();
    }
}
