//! S3-compatible object-store backend.
//!
//! Talks to the store over plain HTTP with AWS Signature V4 applied per
//! request. The flat key space carries the `root/bucket/key` hierarchy as
//! path prefixes. Used by the serverless deployment, where the page cache
//! is a direct surface to consumers and bodies are stored raw.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SignatureLocation, SigningSettings, sign};
use aws_sigv4::sign::v4;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use super::entry::ExpiryProbe;
use super::{CacheBackend, CachePath, CacheRecord};
use crate::Error;
use crate::config::StoreEnv;

const LIST_PAGE_SIZE: u32 = 1000;

/// Object-store cache for the serverless deployment.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    http: reqwest::Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
    credentials: Credentials,
}

impl ObjectStore {
    pub fn new(env: &StoreEnv) -> Self {
        Self {
            http: reqwest::Client::new(),
            bucket: env.bucket.clone(),
            region: env.region.clone(),
            endpoint: env.endpoint.clone(),
            credentials: Credentials::new(
                env.access_key_id.clone(),
                env.secret_access_key.clone(),
                env.session_token.clone(),
                None,
                "mirage",
            ),
        }
    }

    /// Object URL for `key`; virtual-host style against AWS, path style
    /// against an endpoint override.
    fn object_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", self.bucket, self.region, key),
        }
    }

    fn bucket_url(&self) -> String {
        self.object_url("")
    }

    /// Sign `method url body` and return the headers to attach.
    fn sign_request(&self, method: &str, url: &str, body: &[u8]) -> Result<Vec<(String, String)>, Error> {
        let parsed = url::Url::parse(url).map_err(|e| Error::Internal(format!("sign: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Internal(format!("sign: no host in {url}")))?;
        let host = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let body_hash = super::key::sha256_hex(body);

        let identity = self.credentials.clone().into();
        let mut settings = SigningSettings::default();
        settings.signature_location = SignatureLocation::Headers;
        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name("s3")
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(|e| Error::Internal(format!("sign: {e}")))?;

        let headers_to_sign = vec![("host", host.clone()), ("x-amz-content-sha256", body_hash.clone())];
        let signable = SignableRequest::new(
            method,
            url,
            headers_to_sign.iter().map(|(k, v)| (*k, v.as_str())),
            SignableBody::Bytes(body),
        )
        .map_err(|e| Error::Internal(format!("sign: {e}")))?;

        let output = sign(signable, &params.into()).map_err(|e| Error::Internal(format!("sign: {e}")))?;

        let mut headers = vec![("x-amz-content-sha256".to_string(), body_hash)];
        for (name, value) in output.output().headers() {
            headers.push((name.to_string(), value.to_string()));
        }
        Ok(headers)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Vec<u8>,
        extra_headers: &[(String, String)],
    ) -> Result<reqwest::Response, Error> {
        let signed = self.sign_request(method.as_str(), url, &body)?;
        let mut request = self.http.request(method, url);
        for (name, value) in signed.iter().chain(extra_headers) {
            request = request.header(name.as_str(), value.as_str());
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        Ok(request.send().await?)
    }

    async fn put_object(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        let url = self.object_url(key);
        let response = self.send(reqwest::Method::PUT, &url, data.to_vec(), &[]).await?;
        if !response.status().is_success() {
            return Err(Error::Backend(format!("put {key}: status {}", response.status())));
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, Error> {
        let url = self.object_url(key);
        let response = self.send(reqwest::Method::GET, &url, Vec::new(), &[]).await?;
        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                if bytes.is_empty() {
                    return Err(Error::CacheNotFound(format!("{key}: empty object")));
                }
                Ok(bytes.to_vec())
            }
            reqwest::StatusCode::NOT_FOUND => Err(Error::CacheNotFound(key.to_string())),
            status => Err(Error::Backend(format!("get {key}: status {status}"))),
        }
    }

    async fn head_object(&self, key: &str) -> Result<bool, Error> {
        let url = self.object_url(key);
        let response = self.send(reqwest::Method::HEAD, &url, Vec::new(), &[]).await?;
        match response.status() {
            status if status.is_success() => Ok(response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .is_some_and(|len| len > 0)),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(Error::Backend(format!("head {key}: status {status}"))),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<(), Error> {
        let url = self.object_url(key);
        let response = self.send(reqwest::Method::DELETE, &url, Vec::new(), &[]).await?;
        // S3 answers 204 for deletes, including of absent keys.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Error::Backend(format!("delete {key}: status {}", response.status())));
        }
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        max_keys: u32,
        continuation: Option<&str>,
    ) -> Result<ListBucketResult, Error> {
        let mut url = url::Url::parse(&self.bucket_url()).map_err(|e| Error::Internal(format!("list: {e}")))?;
        url.query_pairs_mut()
            .append_pair("list-type", "2")
            .append_pair("prefix", prefix)
            .append_pair("max-keys", &max_keys.to_string());
        if let Some(token) = continuation {
            url.query_pairs_mut().append_pair("continuation-token", token);
        }
        let url = url.to_string();

        let response = self.send(reqwest::Method::GET, &url, Vec::new(), &[]).await?;
        if !response.status().is_success() {
            return Err(Error::Backend(format!("list {prefix}: status {}", response.status())));
        }
        let body = response.text().await?;
        quick_xml::de::from_str(&body).map_err(|e| Error::Internal(format!("list {prefix}: {e}")))
    }

    /// Batch delete in quiet mode.
    async fn delete_objects(&self, keys: Vec<String>) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let request = DeleteRequest {
            quiet: true,
            objects: keys.into_iter().map(|key| DeleteObject { key }).collect(),
        };
        let body = quick_xml::se::to_string(&request)
            .map_err(|e| Error::Internal(format!("delete batch: {e}")))?
            .into_bytes();
        let content_md5 = STANDARD.encode(md5::compute(&body).0);

        let mut url = url::Url::parse(&self.bucket_url()).map_err(|e| Error::Internal(format!("delete batch: {e}")))?;
        url.query_pairs_mut().append_pair("delete", "");
        let url = url.to_string();

        let response = self
            .send(
                reqwest::Method::POST,
                &url,
                body,
                &[("content-md5".to_string(), content_md5)],
            )
            .await?;
        if !response.status().is_success() {
            return Err(Error::Backend(format!("delete batch: status {}", response.status())));
        }
        Ok(())
    }

    fn object_key(path: &CachePath) -> String {
        path.as_str()
    }

    fn prefix_key(path: &CachePath, suffix: &str) -> String {
        if suffix.is_empty() {
            path.as_str()
        } else {
            path.join(suffix).as_str()
        }
    }
}

#[async_trait]
impl CacheBackend for ObjectStore {
    async fn update(&self, path: &CachePath, data: &[u8]) -> Result<(), Error> {
        self.put_object(&Self::object_key(path), data).await
    }

    async fn update_at(&self, path: &CachePath, suffix: &str, data: &[u8]) -> Result<(), Error> {
        self.put_object(&Self::object_key(&path.join(suffix)), data).await
    }

    async fn read(&self, path: &CachePath) -> Result<Vec<u8>, Error> {
        self.get_object(&Self::object_key(path)).await
    }

    async fn exists(&self, path: &CachePath) -> Result<bool, Error> {
        self.head_object(&Self::object_key(path)).await
    }

    async fn delete(&self, path: &CachePath) -> Result<(), Error> {
        self.delete_object(&Self::object_key(path)).await
    }

    async fn delete_prefix(&self, path: &CachePath) -> Result<(), Error> {
        if path.bucket_name().is_empty() {
            return Err(Error::InvalidInput(format!("empty bucket in prefix: {path}")));
        }
        let prefix = format!("{}/", path.as_str());

        loop {
            let page = self.list_page(&prefix, LIST_PAGE_SIZE, None).await?;
            if page.contents.is_empty() {
                break;
            }
            let keys = page.contents.into_iter().map(|object| object.key).collect();
            self.delete_objects(keys).await?;
            if !page.is_truncated {
                break;
            }
        }
        Ok(())
    }

    async fn is_empty_prefix(&self, path: &CachePath, suffix: &str) -> Result<bool, Error> {
        let prefix = Self::prefix_key(path, suffix);
        let page = self.list_page(&prefix, 1, None).await?;
        Ok(page.contents.is_empty())
    }

    async fn list(&self, path: &CachePath, suffix: &str) -> Result<Vec<CacheRecord>, Error> {
        let prefix = if path.bucket_name().is_empty() {
            format!("{}/", path.root())
        } else {
            Self::prefix_key(path, suffix)
        };

        let mut records = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .list_page(&prefix, LIST_PAGE_SIZE, continuation.as_deref())
                .await?;
            for object in &page.contents {
                let data = self.get_object(&object.key).await?;
                records.push(CacheRecord { path: object.key.clone(), data });
            }
            if page.is_truncated && page.next_continuation_token.is_some() {
                continuation = page.next_continuation_token;
            } else {
                break;
            }
        }
        Ok(records)
    }

    async fn cleanup(&self, root: &str) -> Result<(), Error> {
        let prefix = format!("{root}/");
        let mut expired = Vec::new();

        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .list_page(&prefix, LIST_PAGE_SIZE, continuation.as_deref())
                .await?;
            for object in &page.contents {
                let data = match self.get_object(&object.key).await {
                    Ok(data) => data,
                    Err(Error::CacheNotFound(_)) => continue,
                    Err(err) => return Err(err),
                };
                let Ok(probe) = serde_json::from_slice::<ExpiryProbe>(&data) else {
                    continue;
                };
                if probe.is_expired() {
                    expired.push(object.key.clone());
                }
            }
            if page.is_truncated && page.next_continuation_token.is_some() {
                continuation = page.next_continuation_token;
            } else {
                break;
            }
        }

        if !expired.is_empty() {
            tracing::debug!(root, removed = expired.len(), "dropping expired cache objects");
            self.delete_objects(expired).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default, rename = "Contents")]
    contents: Vec<ObjectSummary>,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectSummary {
    key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "Delete")]
struct DeleteRequest {
    #[serde(rename = "Quiet")]
    quiet: bool,
    #[serde(rename = "Object")]
    objects: Vec<DeleteObject>,
}

#[derive(Debug, Serialize)]
struct DeleteObject {
    #[serde(rename = "Key")]
    key: String,
}
