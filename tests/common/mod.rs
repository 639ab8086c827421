//! Common test utilities for E2E tests
//!
//! `TestEnv` runs a stub ILIAS installation (REST metadata plus archive
//! downloads) on a random port and a session context pointed at it.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pegasus::data::{RemoteObject, TYPE_HTML_LEARNING_MODULE};
use pegasus::{AppContext, config};
use std::io::Write;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const USER_ID: i64 = 1;
pub const OBJ_ID: i64 = 500;
pub const REF_ID: i64 = 501;
pub const API_PATH: &str = "/rest/api.php";
pub const ACCESS_TOKEN: &str = "test-token";

/// What the stub installation serves
pub struct StubIlias {
    pub timestamp: AtomicI64,
    pub archive: Mutex<Vec<u8>>,
    pub archive_status: Mutex<StatusCode>,
    pub metadata_requests: AtomicUsize,
    pub archive_requests: AtomicUsize,
}

impl StubIlias {
    fn new(timestamp: i64, archive: Vec<u8>) -> Self {
        Self {
            timestamp: AtomicI64::new(timestamp),
            archive: Mutex::new(archive),
            archive_status: Mutex::new(StatusCode::OK),
            metadata_requests: AtomicUsize::new(0),
            archive_requests: AtomicUsize::new(0),
        }
    }

    /// Publish a new version of the module
    pub fn publish(&self, timestamp: i64, archive: Vec<u8>) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
        *self.archive.lock().unwrap() = archive;
    }

    pub fn fail_archive_with(&self, status: StatusCode) {
        *self.archive_status.lock().unwrap() = status;
    }
}

/// Stub installation plus a session context using it
pub struct TestEnv {
    pub ctx: AppContext,
    pub stub: Arc<StubIlias>,
    pub _temp_dir: TempDir,
}

impl TestEnv {
    /// Start the stub serving `archive` at `timestamp`
    pub async fn new(timestamp: i64, archive: Vec<u8>) -> Self {
        let stub = Arc::new(StubIlias::new(timestamp, archive));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let app = build_stub_router(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Create temporary directory for database and offline content
        let temp_dir = TempDir::new().unwrap();
        let config = config::AppConfig {
            database: config::DatabaseConfig {
                path: temp_dir.path().join("test.db"),
            },
            storage: config::StorageConfig {
                root: temp_dir.path().join("offline"),
            },
            ilias: config::IliasConfig {
                base_url,
                api_path: API_PATH.to_string(),
                access_token: Some(ACCESS_TOKEN.to_string()),
                timeout_seconds: 10,
                user_agent: "Pegasus/test".to_string(),
            },
            cache: config::CacheConfig {
                max_objects: 1000,
                ttl_seconds: 60,
            },
            logging: config::LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        };

        let ctx = AppContext::new(config).await.unwrap();

        Self {
            ctx,
            stub,
            _temp_dir: temp_dir,
        }
    }

    /// Store the learning module object the stub knows about
    pub async fn seed_learning_module(&self) -> Arc<RemoteObject> {
        let mut object = RemoteObject::new(USER_ID);
        object.obj_id = OBJ_ID;
        object.ref_id = REF_ID;
        object.parent_ref_id = 1;
        object.object_type = TYPE_HTML_LEARNING_MODULE.to_string();
        object.title = "HTML Basics".to_string();
        self.ctx.objects.save(&object).await.unwrap()
    }

    pub fn module_dir(&self) -> std::path::PathBuf {
        self.ctx
            .user_storage
            .paths()
            .learning_module_dir(USER_ID, OBJ_ID)
    }

    pub fn tmp_dir(&self) -> std::path::PathBuf {
        self.ctx
            .user_storage
            .paths()
            .learning_module_tmp_dir(USER_ID, OBJ_ID)
    }
}

fn build_stub_router(stub: Arc<StubIlias>) -> Router {
    Router::new()
        .route(
            &format!("{API_PATH}/v1/learning-module/:ref_id"),
            get(learning_module_metadata),
        )
        .route("/data/lm_data/lm_500.zip", get(learning_module_archive))
        .with_state(stub)
}

async fn learning_module_metadata(
    State(stub): State<Arc<StubIlias>>,
    Path(ref_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    stub.metadata_requests.fetch_add(1, Ordering::SeqCst);

    let expected = format!("Bearer {ACCESS_TOKEN}");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str());
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if ref_id != REF_ID {
        return StatusCode::NOT_FOUND.into_response();
    }

    Json(serde_json::json!({
        "startFile": "index.html",
        "zipFile": "/data/lm_data/lm_500.zip",
        "zipDirName": "lm_500",
        "timestamp": stub.timestamp.load(Ordering::SeqCst),
    }))
    .into_response()
}

async fn learning_module_archive(State(stub): State<Arc<StubIlias>>) -> Response {
    stub.archive_requests.fetch_add(1, Ordering::SeqCst);

    let status = *stub.archive_status.lock().unwrap();
    if status != StatusCode::OK {
        return status.into_response();
    }

    let body = stub.archive.lock().unwrap().clone();
    ([(header::CONTENT_TYPE, "application/zip")], body).into_response()
}

/// Zip archive holding `files` below the `lm_500/` directory
pub fn module_archive(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    writer.add_directory("lm_500/", options).unwrap();
    for (name, content) in files {
        writer.start_file(format!("lm_500/{name}"), options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}
