//! Docker Registry HTTP API v2 client
//!
//! Implements the upload half of the protocol over `reqwest`: the
//! `/v2/` probe, bearer token authentication, idempotent blob uploads
//! (HEAD, then POST + PUT), and the manifest PUT.

use crate::config::schema::RegistryConfig;
use crate::error::{SkiffError, SkiffResult};
use crate::image::Reference;
use crate::oci::types::MEDIA_TYPE_MANIFEST;
use crate::registry::client::Client;
use crate::ui::PushProgress;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, Response, StatusCode};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Environment variable overriding the configured registry username
pub const ENV_USERNAME: &str = "SKIFF_USERNAME";
/// Environment variable overriding the configured registry password
pub const ENV_PASSWORD: &str = "SKIFF_PASSWORD";

/// HTTP registry client for one destination reference
pub struct HttpClient {
    reference: Reference,
    base: String,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    token: Mutex<Option<String>>,
    progress: Option<PushProgress>,
}

impl HttpClient {
    /// Create a client for the destination reference.
    ///
    /// Hosts listed as insecure in the configuration are reached over
    /// plain HTTP; everything else uses HTTPS.
    pub fn new(reference: Reference, config: &RegistryConfig) -> SkiffResult<Self> {
        let host = reference
            .registry
            .split(':')
            .next()
            .unwrap_or(&reference.registry);
        let scheme = if config.insecure.iter().any(|h| h == host) {
            "http"
        } else {
            "https"
        };
        let base = format!("{scheme}://{}", reference.registry);

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SkiffError::registry("creating HTTP client", e.to_string()))?;

        Ok(Self {
            reference,
            base,
            http,
            credentials: resolve_credentials(config),
            token: Mutex::new(None),
            progress: None,
        })
    }

    /// Attach an upload progress indicator
    pub fn with_progress(mut self, progress: PushProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    fn blob_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{digest}", self.base, self.reference.repository)
    }

    fn upload_start_url(&self) -> String {
        format!("{}/v2/{}/blobs/uploads/", self.base, self.reference.repository)
    }

    fn manifest_url(&self) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            self.base, self.reference.repository, self.reference.tag
        )
    }

    /// Issue a request, acquiring a bearer token on a 401 challenge and
    /// retrying once.
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        context: &str,
    ) -> SkiffResult<Response> {
        let response = self
            .send(method.clone(), url, &headers, body.clone(), context)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer_challenge);
        let Some(challenge) = challenge else {
            return Err(SkiffError::RegistryAuth {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                url: url.to_string(),
            });
        };

        self.fetch_token(&challenge, context).await?;

        let retried = self.send(method, url, &headers, body, context).await?;
        if retried.status() == StatusCode::UNAUTHORIZED
            || retried.status() == StatusCode::FORBIDDEN
        {
            return Err(SkiffError::RegistryAuth {
                status: retried.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(retried)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<Vec<u8>>,
        context: &str,
    ) -> SkiffResult<Response> {
        let mut request = self.http.request(method, url).headers(headers.clone());
        if let Some(token) = self.token.lock().await.as_ref() {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request
            .send()
            .await
            .map_err(|e| SkiffError::registry(context.to_string(), e.to_string()))
    }

    /// Fetch a bearer token from the challenge's realm
    async fn fetch_token(&self, challenge: &BearerChallenge, context: &str) -> SkiffResult<()> {
        let scope = challenge.scope.clone().unwrap_or_else(|| {
            format!("repository:{}:pull,push", self.reference.repository)
        });

        let mut request = self.http.get(&challenge.realm).query(&[
            ("service", challenge.service.as_deref().unwrap_or_default()),
            ("scope", scope.as_str()),
        ]);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SkiffError::registry(context.to_string(), e.to_string()))?;
        if !response.status().is_success() {
            return Err(SkiffError::RegistryAuth {
                status: response.status().as_u16(),
                url: challenge.realm.clone(),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SkiffError::registry(context.to_string(), e.to_string()))?;
        let token = body["token"]
            .as_str()
            .or_else(|| body["access_token"].as_str())
            .ok_or_else(|| SkiffError::registry(context.to_string(), "no token in auth response"))?
            .to_string();

        debug!("Acquired bearer token for {}", self.reference.registry);
        *self.token.lock().await = Some(token);
        Ok(())
    }

    /// Whether the registry already holds a blob
    async fn blob_exists(&self, digest: &str, context: &str) -> SkiffResult<bool> {
        let response = self
            .request(
                Method::HEAD,
                &self.blob_url(digest),
                HeaderMap::new(),
                None,
                context,
            )
            .await?;
        Ok(response.status() == StatusCode::OK)
    }

    /// Monolithic blob upload: POST to open a session, PUT the bytes
    async fn put_blob(&self, digest: &str, bytes: Vec<u8>, context: &str) -> SkiffResult<()> {
        let response = self
            .request(
                Method::POST,
                &self.upload_start_url(),
                HeaderMap::new(),
                None,
                context,
            )
            .await?;
        if response.status() != StatusCode::ACCEPTED {
            return Err(SkiffError::registry(
                context.to_string(),
                format!("upload start returned {}", response.status()),
            ));
        }

        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                SkiffError::registry(context.to_string(), "upload start returned no location")
            })?;
        let location = absolute_location(&self.base, location);
        let separator = if location.contains('?') { '&' } else { '?' };
        let put_url = format!("{location}{separator}digest={digest}");

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        let response = self
            .request(Method::PUT, &put_url, headers, Some(bytes), context)
            .await?;
        if response.status() != StatusCode::CREATED {
            return Err(SkiffError::registry(
                context.to_string(),
                format!("blob put returned {}", response.status()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn probe(&self) -> SkiffResult<()> {
        let url = format!("{}/v2/", self.base);
        debug!("Probing {url}");
        let response = self
            .request(Method::GET, &url, HeaderMap::new(), None, "probing registry")
            .await?;
        if !response.status().is_success() {
            return Err(SkiffError::registry(
                "probing registry",
                format!("{} returned {}", url, response.status()),
            ));
        }
        Ok(())
    }

    async fn upload_blob(&self, digest: &str, path: &Path, label: &str) -> SkiffResult<()> {
        let context = format!("uploading {label}");
        if let Some(ref progress) = self.progress {
            progress.on_layer(label);
        }
        if self.blob_exists(digest, &context).await? {
            info!("{label}: already present, skipping");
            return Ok(());
        }

        info!("{label}: uploading");
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SkiffError::io(format!("reading {}", path.display()), e))?;
        self.put_blob(digest, bytes, &context).await
    }

    async fn upload_config(&self, digest: &str, bytes: &[u8]) -> SkiffResult<()> {
        let context = "uploading config";
        if self.blob_exists(digest, context).await? {
            debug!("Config blob already present");
            return Ok(());
        }
        self.put_blob(digest, bytes.to_vec(), context).await
    }

    async fn upload_manifest(&self, bytes: &[u8]) -> SkiffResult<()> {
        let context = "uploading manifest";
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE_MANIFEST));

        let response = self
            .request(
                Method::PUT,
                &self.manifest_url(),
                headers,
                Some(bytes.to_vec()),
                context,
            )
            .await?;
        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            status => Err(SkiffError::registry(
                context,
                format!("manifest put returned {status}"),
            )),
        }
    }

    async fn close(&self) -> SkiffResult<()> {
        if let Some(ref progress) = self.progress {
            progress.finish();
        }
        // reqwest pools connections internally; dropping the token is
        // all the cleanup this client owns.
        *self.token.lock().await = None;
        Ok(())
    }
}

/// Credentials from environment, falling back to configuration
fn resolve_credentials(config: &RegistryConfig) -> Option<(String, String)> {
    let username = std::env::var(ENV_USERNAME)
        .ok()
        .or_else(|| config.username.clone())?;
    let password = std::env::var(ENV_PASSWORD)
        .ok()
        .or_else(|| config.password.clone())?;
    Some((username, password))
}

/// A parsed `WWW-Authenticate: Bearer` challenge
#[derive(Debug, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

/// Parse a bearer challenge header value.
///
/// Values may be quoted and quoted values may contain commas (the
/// scope parameter usually does), so this walks key=value pairs
/// instead of splitting on commas.
fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let mut rest = header.strip_prefix("Bearer ")?.trim_start();

    let mut realm = None;
    let mut service = None;
    let mut scope = None;
    while !rest.is_empty() {
        let (key, after) = rest.split_once('=')?;
        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            let end = quoted.find('"')?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            match after.find(',') {
                Some(idx) => (&after[..idx], &after[idx..]),
                None => (after, ""),
            }
        };

        match key.trim() {
            "realm" => realm = Some(value.to_string()),
            "service" => service = Some(value.to_string()),
            "scope" => scope = Some(value.to_string()),
            _ => {}
        }
        rest = remainder.strip_prefix(',').unwrap_or(remainder).trim_start();
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
        scope,
    })
}

/// Registries may return relative upload locations
fn absolute_location(base: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!("{base}{location}")
    }
}
