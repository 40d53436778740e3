//! Fakes shared by the unit tests: an in-memory remote store and a small
//! WebDAV server speaking just enough of the protocol for the client.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::TimeZone;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::storage::{LocalStorage, Note, NoteStorage, NoteStore};
use crate::sync::webdav::{basic_auth_header, WebDavError};
use crate::sync::{
    ConnectionSettings, MemorySettings, RemoteFactory, RemoteStore, SyncManager, SyncPolicy,
    SyncSettings,
};
use tempfile::TempDir;

/// Note with `created == modified == millis`
pub fn note_at(uuid: &str, title: &str, body: &str, millis: i64) -> Note {
    let t = chrono::Utc.timestamp_millis_opt(millis).unwrap();
    Note::with_uuid(uuid.into(), title.into(), body.into(), t, t)
}

/// In-memory [`RemoteStore`] with call counters and injectable failures
#[derive(Default)]
pub struct FakeRemote {
    notes: Mutex<HashMap<String, Note>>,
    fail_listing: AtomicBool,
    failing_writes: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    write_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    builds: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, note: Note) {
        self.notes.lock().unwrap().insert(note.uuid().to_string(), note);
    }

    pub fn get(&self, uuid: &str) -> Option<Note> {
        self.notes.lock().unwrap().get(uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.notes.lock().unwrap().len()
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes_for(&self, uuid: &str) {
        self.failing_writes.lock().unwrap().insert(uuid.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// How many times a factory handed this remote out
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Every call that would have reached the network
    pub fn network_calls(&self) -> usize {
        self.list_calls()
            + self.write_calls()
            + self.delete_calls.load(Ordering::SeqCst)
            + self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn list_all(&self) -> Result<Vec<Note>, WebDavError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(WebDavError::Timeout(Duration::from_secs(10)));
        }
        Ok(self.notes.lock().unwrap().values().cloned().collect())
    }

    async fn write(&self, note: &Note) -> Result<(), WebDavError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes.lock().unwrap().contains(note.uuid()) {
            return Err(WebDavError::Status { status: 500 });
        }
        self.insert(note.clone());
        Ok(())
    }

    async fn delete(&self, uuid: &str) -> Result<(), WebDavError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        match self.notes.lock().unwrap().remove(uuid) {
            Some(_) => Ok(()),
            None => Err(WebDavError::NotFound(uuid.to_string())),
        }
    }

    async fn test_connection(&self) -> Result<bool, WebDavError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

/// Factory that hands out `remote` for any http(s) address
pub fn fake_factory(remote: &Arc<FakeRemote>) -> RemoteFactory {
    let remote = Arc::clone(remote);
    Arc::new(move |connection: &ConnectionSettings, _policy: &SyncPolicy| {
        if !connection.server_address.starts_with("http") {
            return Err(WebDavError::InvalidUrl(connection.server_address.clone()));
        }
        remote.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&remote) as Arc<dyn RemoteStore>)
    })
}

/// A running engine wired to a [`FakeRemote`] and a temporary note directory
pub struct Harness {
    pub _temp_dir: TempDir,
    pub settings: MemorySettings,
    pub storage: Arc<LocalStorage>,
    pub collection: Arc<NoteStore>,
    pub remote: Arc<FakeRemote>,
    pub manager: SyncManager,
}

pub fn enabled_settings(interval_minutes: u32) -> SyncSettings {
    SyncSettings {
        enabled: true,
        server_address: "https://dav.example.com/notes/".into(),
        username: "alice".into(),
        password: "secret".into(),
        sync_interval_minutes: interval_minutes,
    }
}

pub fn harness(settings: SyncSettings) -> Harness {
    harness_with_policy(settings, SyncPolicy::default())
}

pub fn harness_with_policy(settings: SyncSettings, policy: SyncPolicy) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(LocalStorage::new(temp_dir.path().to_path_buf()));
    storage.init().unwrap();
    let collection = Arc::new(NoteStore::new());
    let remote = Arc::new(FakeRemote::new());
    let settings = MemorySettings::new(settings);

    let manager = SyncManager::start_with(
        Arc::new(settings.clone()),
        collection.clone(),
        storage.clone() as Arc<dyn NoteStorage>,
        policy,
        fake_factory(&remote),
    );

    Harness {
        _temp_dir: temp_dir,
        settings,
        storage,
        collection,
        remote,
        manager,
    }
}

const COLLECTION: &str = "/dav/notes";

struct FakeDavState {
    auth_header: String,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
    put_status: Mutex<Option<StatusCode>>,
}

/// WebDAV server on 127.0.0.1 serving one flat collection at `/dav/notes/`
pub struct FakeDavServer {
    pub base_url: String,
    state: Arc<FakeDavState>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeDavServer {
    pub async fn start(username: &str, password: &str) -> Self {
        let state = Arc::new(FakeDavState {
            auth_header: basic_auth_header(username, password),
            files: Mutex::new(BTreeMap::new()),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            put_status: Mutex::new(None),
        });

        let app = Router::new()
            .fallback(handle_dav)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}{}/", port, COLLECTION),
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn put_file(&self, name: &str, data: &[u8]) {
        self.state.files.lock().unwrap().insert(name.to_string(), data.to_vec());
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.state.files.lock().unwrap().get(name).cloned()
    }

    /// "METHOD /path" for every request received
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    pub fn set_put_status(&self, status: StatusCode) {
        *self.state.put_status.lock().unwrap() = Some(status);
    }
}

impl Drop for FakeDavServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn multistatus(files: &BTreeMap<String, Vec<u8>>) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<d:multistatus xmlns:d=\"DAV:\">",
    );
    xml.push_str(&format!(
        "<d:response><d:href>{}/</d:href><d:propstat><d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
        COLLECTION
    ));
    for (name, data) in files {
        xml.push_str(&format!(
            "<d:response><d:href>{}/{}</d:href><d:propstat><d:prop><d:getcontentlength>{}</d:getcontentlength></d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
            COLLECTION,
            urlencoding::encode(name),
            data.len()
        ));
    }
    xml.push_str("</d:multistatus>");
    xml
}

async fn handle_dav(
    State(state): State<Arc<FakeDavState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push(format!("{} {}", method, uri.path()));

    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.auth_header);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let path = uri.path();
    if path.trim_end_matches('/') == COLLECTION {
        if method.as_str() == "PROPFIND" {
            let depth_one = headers.get("Depth").and_then(|v| v.to_str().ok()) == Some("1");
            if !depth_one {
                return StatusCode::BAD_REQUEST.into_response();
            }
            let xml = multistatus(&state.files.lock().unwrap());
            return (
                StatusCode::MULTI_STATUS,
                [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
                xml,
            )
                .into_response();
        }
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let Some(encoded) = path.strip_prefix(&format!("{}/", COLLECTION)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let name = urlencoding::decode(encoded)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| encoded.to_string());

    match method {
        Method::GET => match state.files.lock().unwrap().get(&name) {
            Some(data) => (StatusCode::OK, data.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::PUT => {
            let forced = *state.put_status.lock().unwrap();
            if let Some(status) = forced {
                return status.into_response();
            }
            let existed = state
                .files
                .lock()
                .unwrap()
                .insert(name, body.to_vec())
                .is_some();
            if existed {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CREATED.into_response()
            }
        }
        Method::DELETE => match state.files.lock().unwrap().remove(&name) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
