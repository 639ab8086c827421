//! E2E tests for favorites, offline storage and availability

mod common;

use common::{OBJ_ID, REF_ID, TestEnv, USER_ID, module_archive};
use pegasus::data::{FavoriteStatus, LearningModuleRepository, RemoteObject, TYPE_COURSE};
use pegasus::service::NoProgress;

async fn seed_course(env: &TestEnv) -> std::sync::Arc<RemoteObject> {
    let mut course = RemoteObject::new(USER_ID);
    course.obj_id = 2;
    course.ref_id = 1;
    course.object_type = TYPE_COURSE.to_string();
    course.title = "Web Development".to_string();
    env.ctx.objects.save(&course).await.unwrap()
}

#[tokio::test]
async fn test_removing_course_favorite_deletes_installed_module() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;
    let course = seed_course(&env).await;
    env.seed_learning_module().await;

    let course = env
        .ctx
        .objects
        .set_is_favorite(&course, FavoriteStatus::Downloaded)
        .await
        .unwrap();
    env.ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();
    assert!(env.module_dir().exists());
    assert!(env.ctx.user_storage.used_disk_space(USER_ID).await.unwrap() > 0);

    env.ctx
        .objects
        .remove_from_favorites(&course, env.ctx.user_storage.as_ref(), false)
        .await
        .unwrap();

    assert!(!env.module_dir().exists());
    assert!(
        !env.ctx
            .db
            .exists_by_obj_id_and_user_id(OBJ_ID, USER_ID)
            .await
            .unwrap()
    );
    assert!(env.ctx.objects.favorites_by_user_id(USER_ID, true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_module_favorite_below_course_favorite_keeps_content() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;
    let course = seed_course(&env).await;
    let module = env.seed_learning_module().await;

    env.ctx
        .objects
        .set_is_favorite(&course, FavoriteStatus::Downloaded)
        .await
        .unwrap();
    let module = env
        .ctx
        .objects
        .set_is_favorite(&module, FavoriteStatus::Downloaded)
        .await
        .unwrap();
    env.ctx
        .learning_modules
        .load(USER_ID, OBJ_ID, &NoProgress)
        .await
        .unwrap();

    env.ctx
        .objects
        .remove_from_favorites(&module, env.ctx.user_storage.as_ref(), false)
        .await
        .unwrap();

    assert!(env.module_dir().exists());
    let module = env
        .ctx
        .objects
        .find_by_ref_id_and_user_id(REF_ID, USER_ID)
        .await
        .unwrap();
    assert!(!module.is_favorite());
}

#[tokio::test]
async fn test_end_session_drops_cached_objects() {
    let env = TestEnv::new(1000, module_archive(&[("index.html", "v1")])).await;
    let module = env.seed_learning_module().await;
    let id = module.id.unwrap();
    assert!(env.ctx.objects.cache().get(id).await.is_some());

    env.ctx.end_session().await;

    assert!(env.ctx.objects.cache().get(id).await.is_none());
    let reloaded = env.ctx.objects.find(id).await.unwrap();
    assert_eq!(reloaded.title, "HTML Basics");
}
