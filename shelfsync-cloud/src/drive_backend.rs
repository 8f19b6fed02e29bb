//! Google Drive v3 backend.
//!
//! Talks to the Drive REST API with a bearer token supplied by the host
//! application. Token acquisition and refresh live outside this crate; a 401
//! surfaces as `CloudError::AuthRequired` and the caller re-authenticates.

use crate::backend::RemoteFileBackend;
use crate::config::SyncConfig;
use crate::error::{CloudError, CloudResult};
use crate::types::{APP_DATA_FOLDER, FileFilter, NewFile, RemoteFile};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const MULTIPART_BOUNDARY: &str = "shelfsync-part-boundary";
const LIST_FIELDS: &str = "files(id,name,modifiedTime,parents)";

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct FileId {
    id: String,
}

/// HTTP client for the Drive files API.
#[derive(Clone)]
pub struct DriveBackend {
    client: Client,
    api_base_url: String,
    use_private: bool,
    access_token: Arc<RwLock<Option<String>>>,
}

impl DriveBackend {
    pub fn new(config: &SyncConfig) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            use_private: config.use_private,
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Sets the OAuth access token used for every request.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().await = Some(token.into());
    }

    pub async fn clear_access_token(&self) {
        *self.access_token.write().await = None;
    }

    pub async fn has_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    async fn token(&self) -> CloudResult<String> {
        self.access_token
            .read()
            .await
            .clone()
            .ok_or(CloudError::AuthRequired)
    }

    /// Builds the `q` parameter for a files.list call.
    fn query_for(filter: &FileFilter) -> String {
        let mut clauses = Vec::new();
        if let Some(name) = &filter.name {
            clauses.push(format!("name = '{}'", escape_literal(name)));
        }
        if let Some(parent) = &filter.parent {
            clauses.push(format!("'{}' in parents", escape_literal(parent)));
        }
        clauses.push("trashed = false".to_string());
        clauses.join(" and ")
    }

    fn multipart_body(&self, file: &NewFile) -> CloudResult<String> {
        let parents: Vec<&str> = match (&file.folder, self.use_private) {
            (Some(folder), _) => vec![folder.as_str()],
            (None, true) => vec![APP_DATA_FOLDER],
            (None, false) => Vec::new(),
        };
        let metadata = serde_json::json!({
            "name": file.name,
            "mimeType": file.mime_type,
            "parents": parents,
        });

        Ok(format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n\
             --{b}\r\nContent-Type: {mime}\r\n\r\n{content}\r\n--{b}--",
            b = MULTIPART_BOUNDARY,
            meta = serde_json::to_string(&metadata)?,
            mime = file.mime_type,
            content = file.content,
        ))
    }
}

fn escape_literal(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Maps non-success statuses onto crate errors.
fn check_status(resp: Response, what: &str) -> CloudResult<Response> {
    match resp.status() {
        StatusCode::UNAUTHORIZED => Err(CloudError::AuthRequired),
        StatusCode::NOT_FOUND => Err(CloudError::NotFound(what.to_string())),
        _ => resp
            .error_for_status()
            .map_err(|e| CloudError::Backend(e.to_string())),
    }
}

#[async_trait]
impl RemoteFileBackend for DriveBackend {
    async fn list(&self, filter: &FileFilter) -> CloudResult<Vec<RemoteFile>> {
        let token = self.token().await?;
        let query = Self::query_for(filter);
        let mut url = format!(
            "{}/drive/v3/files?q={}&fields={}",
            self.api_base_url,
            urlencoding::encode(&query),
            urlencoding::encode(LIST_FIELDS),
        );
        if self.use_private {
            url.push_str("&spaces=");
            url.push_str(APP_DATA_FOLDER);
        }

        debug!("listing files: {query}");
        let resp = self.client.get(&url).bearer_auth(&token).send().await?;
        let list: FileList = check_status(resp, "file list")?.json().await?;
        Ok(list.files)
    }

    async fn create(&self, file: NewFile) -> CloudResult<String> {
        let token = self.token().await?;
        let url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart",
            self.api_base_url
        );
        let body = self.multipart_body(&file)?;

        debug!("creating file {}", file.name);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;
        let created: FileId = check_status(resp, &file.name)?.json().await?;
        Ok(created.id)
    }

    async fn read(&self, file_id: &str) -> CloudResult<String> {
        let token = self.token().await?;
        let url = format!(
            "{}/drive/v3/files/{}?alt=media",
            self.api_base_url,
            urlencoding::encode(file_id)
        );

        let resp = self.client.get(&url).bearer_auth(&token).send().await?;
        Ok(check_status(resp, file_id)?.text().await?)
    }

    async fn update(&self, file_id: &str, mime_type: &str, content: String) -> CloudResult<String> {
        let token = self.token().await?;
        let url = format!(
            "{}/upload/drive/v3/files/{}?uploadType=media",
            self.api_base_url,
            urlencoding::encode(file_id)
        );

        debug!("updating file {file_id}");
        let resp = self
            .client
            .patch(&url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(content)
            .send()
            .await?;
        let updated: FileId = check_status(resp, file_id)?.json().await?;
        Ok(updated.id)
    }
}
