//! S3-compatible object storage for uploaded assets.
//!
//! Objects are written with a single signed `PUT`, which replaces any
//! existing object under the same key. Works against AWS S3 and against
//! S3-compatible services through `endpoint_url` (Supabase Storage's S3
//! endpoint, MinIO, LocalStack), which switches to path-style addressing.
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials)
//!
//! # Authentication
//!
//! Requests are signed with
//! [AWS Signature Version 4](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-auth-using-authorization-header.html)
//! using `hmac` + `sha2`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

use crate::config::StorageConfig;
use crate::traits::ObjectStore;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

enum Addressing {
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`
    VirtualHosted { host: String },
    /// `<scheme>://<host>[:port]<base_path>/<bucket>/<key>`
    PathStyle {
        scheme: String,
        host: String,
        base_path: String,
    },
}

struct ObjectLocation {
    url: String,
    host: String,
    canonical_uri: String,
}

pub struct S3ObjectStore {
    bucket: String,
    region: String,
    public_base_url: Option<String>,
    addressing: Addressing,
    creds: AwsCredentials,
    client: reqwest::Client,
}

impl S3ObjectStore {
    pub fn from_env(config: &StorageConfig) -> Result<Self> {
        Self::new(config, AwsCredentials::from_env()?)
    }

    pub fn new(config: &StorageConfig, creds: AwsCredentials) -> Result<Self> {
        let addressing = match &config.endpoint_url {
            Some(endpoint) => {
                let url = reqwest::Url::parse(endpoint)
                    .with_context(|| format!("Invalid storage.endpoint_url: {}", endpoint))?;
                let host = url
                    .host_str()
                    .ok_or_else(|| anyhow::anyhow!("storage.endpoint_url has no host"))?;
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                Addressing::PathStyle {
                    scheme: url.scheme().to_string(),
                    host,
                    base_path: url.path().trim_end_matches('/').to_string(),
                }
            }
            None => Addressing::VirtualHosted {
                host: format!("{}.s3.{}.amazonaws.com", config.bucket, config.region),
            },
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            public_base_url: config.public_base_url.clone(),
            addressing,
            creds,
            client,
        })
    }

    fn location(&self, key: &str) -> ObjectLocation {
        let encoded_key = encode_key(key);
        match &self.addressing {
            Addressing::VirtualHosted { host } => {
                let canonical_uri = format!("/{}", encoded_key);
                ObjectLocation {
                    url: format!("https://{}{}", host, canonical_uri),
                    host: host.clone(),
                    canonical_uri,
                }
            }
            Addressing::PathStyle {
                scheme,
                host,
                base_path,
            } => {
                let canonical_uri =
                    format!("{}/{}/{}", base_path, uri_encode(&self.bucket), encoded_key);
                ObjectLocation {
                    url: format!("{}://{}{}", scheme, host, canonical_uri),
                    host: host.clone(),
                    canonical_uri,
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, content_type: &str, body: Vec<u8>) -> Result<()> {
        let location = self.location(key);
        let payload_hash = hex_sha256(&body);

        let mut headers = vec![
            ("content-type".to_string(), content_type.to_string()),
            ("host".to_string(), location.host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
        ];
        if let Some(ref token) = self.creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let authorization = sign_request(
            &self.creds,
            &self.region,
            "PUT",
            &location.canonical_uri,
            &mut headers,
            &payload_hash,
            Utc::now(),
        )?;

        let mut req = self
            .client
            .put(&location.url)
            .header("Authorization", &authorization);
        for (name, value) in &headers {
            // reqwest derives Host from the URL.
            if name != "host" {
                req = req.header(name.as_str(), value.as_str());
            }
        }

        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to put s3://{}/{}: {}", self.bucket, key, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!(
                "S3 PutObject failed (HTTP {}) for key '{}': {}",
                status,
                key,
                text.chars().take(300).collect::<String>()
            );
        }

        debug!(bucket = %self.bucket, key, "Object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), encode_key(key)),
            None => self.location(key).url,
        }
    }
}

// ============ AWS SigV4 Helpers ============

/// Sign a request and return the `Authorization` header value.
///
/// Adds `x-amz-date` to `headers` and sorts them; every entry in
/// `headers` is signed and must be sent.
fn sign_request(
    creds: &AwsCredentials,
    region: &str,
    method: &str,
    canonical_uri: &str,
    headers: &mut Vec<(String, String)>,
    payload_hash: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    headers.push(("x-amz-date".to_string(), amz_date.clone()));
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, "s3")?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    ))
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn encode_key(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// Percent-encode everything except RFC 3986 unreserved characters
/// (`A-Z a-z 0-9 - _ . ~`).
pub(crate) fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}
