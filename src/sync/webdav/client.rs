use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use thiserror::Error;

use super::multistatus::parse_multistatus;
use super::wire::{decode_note, encode_note};
use crate::storage::Note;
use crate::sync::config::SyncCredentials;

/// Extension of note files in the remote collection
pub const NOTE_EXTENSION: &str = "json";

/// File fetched by [`WebDavClient::test_connection`]
pub const PROBE_PATH: &str = "test.json";

/// Default bound on each request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<propfind xmlns="DAV:"><prop><getlastmodified/><getcontentlength/></prop></propfind>"#;

#[derive(Error, Debug)]
pub enum WebDavError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unexpected status: {status}")]
    Status { status: u16 },
    #[error("XML parse error: {0}")]
    XmlParse(String),
    #[error("Invalid note JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Empty response")]
    EmptyResponse,
}

/// WebDAV client bound to one note collection
pub struct WebDavClient {
    client: Client,
    /// Collection URL, always ending in exactly one '/'
    base_url: String,
    auth_header: String,
    request_timeout: Duration,
}

/// `Basic` authorization header value for the given credentials
pub fn basic_auth_header(username: &str, password: &str) -> String {
    let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", token)
}

fn check_status(response: &Response, resource: &str) -> Result<(), WebDavError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WebDavError::AuthFailed),
        StatusCode::NOT_FOUND => Err(WebDavError::NotFound(resource.to_string())),
        status if !status.is_success() => Err(WebDavError::Status {
            status: status.as_u16(),
        }),
        _ => Ok(()),
    }
}

impl WebDavClient {
    /// Create a client for the collection at `base_url`
    pub fn new(base_url: &str, credentials: &SyncCredentials) -> Result<Self, WebDavError> {
        let trimmed = base_url.trim().trim_end_matches('/');

        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(WebDavError::InvalidUrl(
                "URL must start with http:// or https://".to_string(),
            ));
        }
        if trimmed.split("://").nth(1).map_or(true, str::is_empty) {
            return Err(WebDavError::InvalidUrl("missing host".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/", trimmed),
            auth_header: basic_auth_header(&credentials.username, &credentials.password),
            request_timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, urlencoding::encode(name))
    }

    fn note_url(&self, uuid: &str) -> String {
        self.url(&format!("{}.{}", uuid, NOTE_EXTENSION))
    }

    /// Run one request future under the per-request timeout.
    /// On timeout the future is dropped, which aborts the request.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, WebDavError>
    where
        F: Future<Output = Result<T, reqwest::Error>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WebDavError::Timeout(self.request_timeout)),
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<Response, WebDavError> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_header);

        if method.as_str() == "PROPFIND" {
            request = request
                .header("Depth", "1")
                .header(reqwest::header::CONTENT_TYPE, "application/xml");
        } else if method == Method::PUT {
            request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        self.bounded(request.send()).await
    }

    /// PROPFIND the collection and return the ids of all note files
    pub async fn list_note_ids(&self) -> Result<Vec<String>, WebDavError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| WebDavError::InvalidUrl(e.to_string()))?;
        let response = self
            .send(method, &self.base_url, Some(PROPFIND_BODY.as_bytes().to_vec()))
            .await?;
        check_status(&response, &self.base_url)?;

        let xml = self.bounded(response.text()).await?;
        let ids: Vec<String> = parse_multistatus(&xml)?
            .iter()
            .filter_map(|entry| entry.note_uuid(NOTE_EXTENSION))
            .collect();

        log::debug!("WebDAV: listing found {} note files", ids.len());
        Ok(ids)
    }

    /// GET and decode a single note
    pub async fn get_note(&self, uuid: &str) -> Result<Note, WebDavError> {
        let url = self.note_url(uuid);
        let response = self.send(Method::GET, &url, None).await?;
        check_status(&response, &url)?;

        let data = self.bounded(response.bytes()).await?;
        Ok(decode_note(&data, uuid)?)
    }

    /// List the collection and fetch every note in it.
    ///
    /// Notes that cannot be fetched or decoded are skipped.
    pub async fn list_all(&self) -> Result<Vec<Note>, WebDavError> {
        let ids = self.list_note_ids().await?;
        let mut notes = Vec::with_capacity(ids.len());

        for uuid in ids {
            match self.get_note(&uuid).await {
                Ok(note) => notes.push(note),
                Err(e) => log::warn!("WebDAV: skipping remote note {}: {}", uuid, e),
            }
        }

        Ok(notes)
    }

    /// uuid to last-modified map of the remote collection
    pub async fn fetch_timestamps(&self) -> Result<HashMap<String, DateTime<Utc>>, WebDavError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .map(|note| (note.uuid().to_string(), note.modified()))
            .collect())
    }

    /// PUT a note. Only 201 Created and 204 No Content count as success.
    pub async fn write_note(&self, note: &Note) -> Result<(), WebDavError> {
        let url = self.note_url(note.uuid());
        let body = encode_note(note)?;
        let response = self.send(Method::PUT, &url, Some(body)).await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => {
                log::debug!("WebDAV: uploaded {}", note.uuid());
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WebDavError::AuthFailed),
            status => Err(WebDavError::Status {
                status: status.as_u16(),
            }),
        }
    }

    /// DELETE a note. Only 204 No Content counts as success.
    pub async fn delete_note(&self, uuid: &str) -> Result<(), WebDavError> {
        let url = self.note_url(uuid);
        let response = self.send(Method::DELETE, &url, None).await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WebDavError::AuthFailed),
            StatusCode::NOT_FOUND => Err(WebDavError::NotFound(url)),
            status => Err(WebDavError::Status {
                status: status.as_u16(),
            }),
        }
    }

    /// GET the probe file; any non-empty successful response means reachable
    pub async fn test_connection(&self) -> Result<bool, WebDavError> {
        let url = self.url(PROBE_PATH);
        let response = self.send(Method::GET, &url, None).await?;
        check_status(&response, &url)?;

        let data = self.bounded(response.bytes()).await?;
        if data.is_empty() {
            return Err(WebDavError::EmptyResponse);
        }
        Ok(true)
    }
}
