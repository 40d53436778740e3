use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::config::{ConnectionSettings, SyncPolicy};
use super::webdav::{WebDavClient, WebDavError};
use crate::storage::Note;

/// A remote note replica the sync pass reconciles against
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Every decodable note in the remote collection
    async fn list_all(&self) -> Result<Vec<Note>, WebDavError>;

    /// uuid to last-modified view of [`RemoteStore::list_all`]
    async fn fetch_timestamps(&self) -> Result<HashMap<String, DateTime<Utc>>, WebDavError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .map(|note| (note.uuid().to_string(), note.modified()))
            .collect())
    }

    async fn write(&self, note: &Note) -> Result<(), WebDavError>;

    async fn delete(&self, uuid: &str) -> Result<(), WebDavError>;

    async fn test_connection(&self) -> Result<bool, WebDavError>;
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn list_all(&self) -> Result<Vec<Note>, WebDavError> {
        WebDavClient::list_all(self).await
    }

    async fn fetch_timestamps(&self) -> Result<HashMap<String, DateTime<Utc>>, WebDavError> {
        WebDavClient::fetch_timestamps(self).await
    }

    async fn write(&self, note: &Note) -> Result<(), WebDavError> {
        self.write_note(note).await
    }

    async fn delete(&self, uuid: &str) -> Result<(), WebDavError> {
        self.delete_note(uuid).await
    }

    async fn test_connection(&self) -> Result<bool, WebDavError> {
        WebDavClient::test_connection(self).await
    }
}

/// Builds the remote client for a connection. Called again whenever the
/// server address or credentials change.
pub type RemoteFactory = Arc<
    dyn Fn(&ConnectionSettings, &SyncPolicy) -> Result<Arc<dyn RemoteStore>, WebDavError>
        + Send
        + Sync,
>;

/// Factory producing [`WebDavClient`]s
pub fn webdav_factory() -> RemoteFactory {
    Arc::new(|connection: &ConnectionSettings, policy: &SyncPolicy| {
        let client = WebDavClient::new(&connection.server_address, &connection.credentials)?
            .with_request_timeout(policy.request_timeout);
        Ok(Arc::new(client) as Arc<dyn RemoteStore>)
    })
}
