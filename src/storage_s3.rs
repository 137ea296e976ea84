//! S3-compatible object storage backend.
//!
//! Reads and writes knowledge documents with plain `GetObject`/`PutObject`
//! calls against the S3 REST API, signed with AWS Signature V4 (`hmac` +
//! `sha2`). Works against AWS and against S3-compatible services (Ceph RGW,
//! MinIO, LocalStack) through `endpoint_url`.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "s3"
//! root = "bot_knowledge"
//!
//! [storage.s3]
//! bucket = "thoth"
//! prefix = "data/"
//! region = "us-east-1"
//! # endpoint_url = "https://ceph.example.com"
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional
//!
//! # Object keys
//!
//! A logical path `org/repo/PullRequest.json` is stored under
//! `{prefix}{root}/org/repo/PullRequest.json`. With a custom endpoint,
//! requests use path-style addressing (`/{bucket}/{key}`); otherwise
//! virtual-hosted style (`{bucket}.s3.{region}.amazonaws.com/{key}`).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};

use knowledge_core::{KnowledgeSet, KnowledgeStore};

use crate::config::S3StorageConfig;

type HmacSha256 = Hmac<Sha256>;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// [`KnowledgeStore`] on an S3-compatible bucket.
pub struct S3Store {
    config: S3StorageConfig,
    root: String,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3Store {
    pub fn new(config: S3StorageConfig, root: &str, creds: AwsCredentials) -> Self {
        Self {
            config,
            root: normalize_root(root),
            creds,
            client: reqwest::Client::new(),
        }
    }

    /// Build a store with credentials from the environment.
    pub fn from_env(config: S3StorageConfig, root: &str) -> Result<Self> {
        Ok(Self::new(config, root, AwsCredentials::from_env()?))
    }

    /// Full object key for a logical knowledge path.
    pub fn object_key(&self, path: &str) -> String {
        object_key(&self.config.prefix, &self.root, path)
    }

    /// Fetch an object's body; `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<String>> {
        let resp = self.signed_request(Method::GET, key, Vec::new()).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "S3 GetObject failed (HTTP {}) for s3://{}/{}: {}",
                status,
                self.config.bucket,
                key,
                body.chars().take(500).collect::<String>()
            );
        }

        let bytes = resp.bytes().await?;
        let text = String::from_utf8(bytes.to_vec())
            .with_context(|| format!("s3://{}/{} is not valid UTF-8", self.config.bucket, key))?;
        Ok(Some(text))
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let resp = self.signed_request(Method::PUT, key, body).await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "S3 PutObject failed (HTTP {}) for s3://{}/{}: {}",
                status,
                self.config.bucket,
                key,
                body.chars().take(500).collect::<String>()
            );
        }
        Ok(())
    }

    /// Send a SigV4-signed request for a single object.
    async fn signed_request(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let (scheme, host) = s3_endpoint(&self.config);
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let canonical_uri = if self.config.endpoint_url.is_some() {
            format!("/{}/{}", uri_encode(&self.config.bucket), encoded_key)
        } else {
            format!("/{}", encoded_key)
        };
        let url = format!("{}://{}{}", scheme, host, canonical_uri);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(&body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.config.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            &self.creds.secret_access_key,
            &date_stamp,
            &self.config.region,
            "s3",
        );
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req_builder = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = self.creds.session_token {
            req_builder = req_builder.header("x-amz-security-token", token);
        }
        if method == Method::PUT {
            req_builder = req_builder
                .header("Content-Type", NDJSON_CONTENT_TYPE)
                .body(body);
        }

        req_builder.send().await.with_context(|| {
            format!(
                "S3 {} request failed for s3://{}/{}",
                method, self.config.bucket, key
            )
        })
    }
}

#[async_trait]
impl KnowledgeStore for S3Store {
    fn backend(&self) -> &str {
        "s3"
    }

    fn location(&self, path: &str) -> String {
        format!("s3://{}/{}", self.config.bucket, self.object_key(path))
    }

    async fn load(&self, path: &str) -> Result<KnowledgeSet> {
        let key = self.object_key(path);
        match self.get_object(&key).await? {
            None => Ok(KnowledgeSet::new()),
            Some(body) => KnowledgeSet::from_json_lines(&body)
                .with_context(|| format!("Corrupt knowledge document {}", self.location(path))),
        }
    }

    async fn store(&self, path: &str, knowledge: &KnowledgeSet) -> Result<()> {
        let key = self.object_key(path);
        let body = knowledge.to_json_lines()?;
        self.put_object(&key, body.into_bytes()).await
    }
}

// ============ AWS Credentials ============

/// AWS credentials loaded from environment variables.
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: String, secret_access_key: String, session_token: Option<String>) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            session_token,
        }
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self::new(access_key_id, secret_access_key, session_token))
    }
}

// ============ Keys and endpoints ============

fn normalize_root(root: &str) -> String {
    root.trim_start_matches("./")
        .trim_matches('/')
        .to_string()
}

/// Join prefix, storage root, and logical path into an object key.
///
/// A leading `./` and surrounding slashes are dropped from the root, and
/// empty parts are skipped.
pub fn object_key(prefix: &str, root: &str, path: &str) -> String {
    let root = normalize_root(root);
    let mut key = String::new();
    for part in [prefix, root.as_str(), path] {
        let part = part.trim_matches('/');
        if part.is_empty() {
            continue;
        }
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(part);
    }
    key
}

/// Scheme and host for requests.
///
/// A custom `endpoint_url` keeps its scheme (MinIO is often plain http).
fn s3_endpoint(config: &S3StorageConfig) -> (&'static str, String) {
    match config.endpoint_url {
        Some(ref endpoint) => {
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string();
            (scheme, host)
        }
        None => (
            "https",
            format!("{}.s3.{}.amazonaws.com", config.bucket, config.region),
        ),
    }
}

// ============ AWS SigV4 Helpers ============

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode per RFC 3986, leaving only `A-Z a-z 0-9 - _ . ~` as is.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config(prefix: &str, endpoint_url: Option<&str>) -> S3StorageConfig {
        S3StorageConfig {
            bucket: "thoth".to_string(),
            prefix: prefix.to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: endpoint_url.map(str::to_string),
        }
    }

    fn store(prefix: &str, root: &str) -> S3Store {
        S3Store::new(
            s3_config(prefix, None),
            root,
            AwsCredentials::new("AKID".into(), "secret".into(), None),
        )
    }

    #[test]
    fn signing_key_matches_aws_reference() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn uri_encoding() {
        assert_eq!(uri_encode("amun-api"), "amun-api");
        assert_eq!(uri_encode("a b/c"), "a%20b%2Fc");
        assert_eq!(uri_encode("x~y_z.json"), "x~y_z.json");
    }

    #[test]
    fn object_keys_join_prefix_root_and_path() {
        let s = store("data/", "./bot_knowledge");
        assert_eq!(
            s.object_key("thoth-station/amun-api/PullRequest.json"),
            "data/bot_knowledge/thoth-station/amun-api/PullRequest.json"
        );

        let s = store("", "/");
        assert_eq!(s.object_key("o/r/PullRequest.json"), "o/r/PullRequest.json");
    }

    #[test]
    fn location_is_s3_url() {
        let s = store("", "knowledge");
        assert_eq!(
            s.location("o/r/PullRequest.json"),
            "s3://thoth/knowledge/o/r/PullRequest.json"
        );
    }

    #[test]
    fn endpoints() {
        let (scheme, host) = s3_endpoint(&s3_config("", None));
        assert_eq!(scheme, "https");
        assert_eq!(host, "thoth.s3.us-east-1.amazonaws.com");

        let (scheme, host) = s3_endpoint(&s3_config("", Some("http://localhost:9000/")));
        assert_eq!(scheme, "http");
        assert_eq!(host, "localhost:9000");
    }
}
