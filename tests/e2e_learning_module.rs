//! E2E tests for the learning module pipeline against a stub installation

mod common;

use axum::http::StatusCode;
use common::{OBJ_ID, TestEnv, USER_ID, module_archive};
use pegasus::data::LearningModuleRepository;
use pegasus::error::AppError;
use pegasus::service::{LoadOutcome, NoProgress};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_first_load_installs_module() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "<h1>v1</h1>")])).await;
    env.seed_learning_module().await;

    let outcome = env
        .ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        LoadOutcome::Installed {
            start_file: "index.html".to_string(),
            timestamp: 1000,
        }
    );

    let entry = env
        .ctx
        .learning_modules
        .start_file_path(USER_ID, OBJ_ID, outcome.start_file());
    assert_eq!(entry, env.module_dir().join("index.html"));
    assert_eq!(std::fs::read_to_string(&entry).unwrap(), "<h1>v1</h1>");

    // Temporary download area is gone
    assert!(!env.tmp_dir().exists());

    let record = env
        .ctx
        .db
        .find_by_obj_id_and_user_id(OBJ_ID, USER_ID)
        .await
        .unwrap();
    assert_eq!(record.timestamp, 1000);
    assert_eq!(record.relative_start_file, "index.html");
}

#[tokio::test]
async fn test_unchanged_timestamp_downloads_nothing() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;
    env.seed_learning_module().await;

    env.ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();
    let outcome = env
        .ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();

    assert!(matches!(outcome, LoadOutcome::UpToDate { timestamp: 1000, .. }));
    assert_eq!(env.stub.metadata_requests.load(Ordering::SeqCst), 2);
    assert_eq!(env.stub.archive_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_newer_version_replaces_previous_content() {
    let env = TestEnv::new(
        1000,
        module_archive(&[("index.html", "v1"), ("old.html", "gone soon")]),
    )
    .await;
    env.seed_learning_module().await;
    env.ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();

    env.stub
        .publish(2000, module_archive(&[("index.html", "v2"), ("img/logo.svg", "<svg/>")]));
    let outcome = env
        .ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();

    assert!(matches!(outcome, LoadOutcome::Installed { timestamp: 2000, .. }));
    let module_dir = env.module_dir();
    assert_eq!(
        std::fs::read_to_string(module_dir.join("index.html")).unwrap(),
        "v2"
    );
    assert!(module_dir.join("img/logo.svg").exists());
    assert!(!module_dir.join("old.html").exists());

    let record = env
        .ctx
        .db
        .find_by_obj_id_and_user_id(OBJ_ID, USER_ID)
        .await
        .unwrap();
    assert_eq!(record.timestamp, 2000);
}

#[tokio::test]
async fn test_failed_download_leaves_no_trace() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;
    env.seed_learning_module().await;
    env.stub.fail_archive_with(StatusCode::SERVICE_UNAVAILABLE);

    let result = env
        .ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await;

    assert!(matches!(result, Err(AppError::Remote(_))));
    assert!(!env.tmp_dir().exists());
    assert!(!env.module_dir().exists());
    assert!(
        !env.ctx
            .db
            .exists_by_obj_id_and_user_id(OBJ_ID, USER_ID)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_unknown_object_is_not_requested() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;

    let result = env
        .ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await;

    assert!(matches!(result, Err(AppError::NotFound)));
    assert_eq!(env.stub.metadata_requests.load(Ordering::SeqCst), 0);
}
