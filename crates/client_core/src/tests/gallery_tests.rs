use super::*;
use crate::{
    notice::Notice,
    test_support::{photo, FakePhotoService},
};

async fn loaded(photos: Vec<GalleryPhoto>) -> GalleryWorkflow {
    let mut workflow = GalleryWorkflow::default();
    let service = FakePhotoService::ok().with_photos(photos);
    workflow.load(&service).await;
    workflow
}

#[tokio::test]
async fn successful_listing_is_reported_as_live() {
    let service = FakePhotoService::ok().with_photos(vec![photo("a.jpg"), photo("b.jpg")]);
    let mut workflow = GalleryWorkflow::default();
    assert!(matches!(workflow.state(), GalleryState::Loading));

    let load = workflow.load(&service).await;

    assert_eq!(load, GalleryLoad::Live { count: 2 });
    assert!(matches!(workflow.state(), GalleryState::Loaded));
    assert_eq!(workflow.photos()[1].filename, "b.jpg");
}

#[tokio::test]
async fn listing_failure_substitutes_labelled_fallback_photos() {
    let mut workflow = GalleryWorkflow::new(FallbackPolicy::DemoPhotos);

    let load = workflow.load(&FakePhotoService::failing(500)).await;

    assert_eq!(load, GalleryLoad::Fallback { count: 5 });
    assert!(matches!(workflow.state(), GalleryState::LoadFailed(ServiceError::List(_))));
    assert_eq!(workflow.photos(), fallback_photos().as_slice());
    assert_eq!(workflow.take_notices(), vec![Notice::error(LOAD_FAILED_NOTICE)]);
}

#[tokio::test]
async fn listing_failure_without_fallback_leaves_the_set_empty() {
    let mut workflow = GalleryWorkflow::new(FallbackPolicy::Disabled);

    let load = workflow.load(&FakePhotoService::failing(502)).await;

    assert_eq!(load, GalleryLoad::Failed);
    assert!(workflow.photos().is_empty());
}

#[tokio::test]
async fn confirming_removes_exactly_the_pending_photo() {
    let mut workflow = loaded(vec![photo("a.jpg"), photo("b.jpg"), photo("c.jpg")]).await;
    let target = photo("b.jpg");

    workflow.request_delete(&target).expect("known photo");
    assert_eq!(workflow.delete_flow(), &DeleteFlow::ConfirmPending(target.clone()));

    let removed = workflow.confirm_delete().expect("pending");

    assert_eq!(removed, target);
    assert_eq!(workflow.photos(), &[photo("a.jpg"), photo("c.jpg")]);
    assert_eq!(workflow.delete_flow(), &DeleteFlow::Idle);
    assert_eq!(workflow.take_notices(), vec![Notice::success(PHOTO_DELETED_NOTICE)]);
}

#[tokio::test]
async fn confirming_removes_only_one_of_duplicate_entries() {
    let mut workflow = loaded(vec![photo("dup.jpg"), photo("x.jpg"), photo("dup.jpg")]).await;

    workflow.request_delete(&photo("dup.jpg")).expect("known photo");
    workflow.confirm_delete().expect("pending");

    assert_eq!(workflow.photos(), &[photo("x.jpg"), photo("dup.jpg")]);
}

#[tokio::test]
async fn cancelling_leaves_the_set_unchanged() {
    let mut workflow = loaded(vec![photo("a.jpg"), photo("b.jpg")]).await;

    workflow.request_delete(&photo("a.jpg")).expect("known photo");
    workflow.cancel_delete();

    assert_eq!(workflow.photos().len(), 2);
    assert!(workflow.pending_deletion().is_none());
    assert!(matches!(
        workflow.confirm_delete(),
        Err(DeleteRejected::NothingPending)
    ));
}

#[tokio::test]
async fn delete_requests_are_refused_while_loading_or_for_unknown_photos() {
    let mut loading = GalleryWorkflow::default();
    assert!(matches!(
        loading.request_delete(&photo("a.jpg")),
        Err(DeleteRejected::NotLoaded)
    ));

    let mut workflow = loaded(vec![photo("a.jpg")]).await;
    assert!(matches!(
        workflow.request_delete(&photo("ghost.jpg")),
        Err(DeleteRejected::UnknownPhoto(name)) if name == "ghost.jpg"
    ));
}

#[tokio::test]
async fn fallback_photos_can_be_deleted_locally() {
    let mut workflow = GalleryWorkflow::default();
    workflow.load(&FakePhotoService::failing(500)).await;
    let first = workflow.photos()[0].clone();

    workflow.request_delete(&first).expect("fallback photo");
    workflow.confirm_delete().expect("pending");

    assert_eq!(workflow.photos().len(), 4);
}

#[tokio::test]
async fn remote_confirm_calls_the_service_before_removing() {
    let mut workflow = loaded(vec![photo("a.jpg"), photo("b.jpg")]).await;
    let service = FakePhotoService::ok();

    workflow.request_delete(&photo("a.jpg")).expect("known photo");
    workflow
        .confirm_delete_remote(&service)
        .await
        .expect("deleted");

    assert_eq!(service.calls().await, vec!["delete_photo:a.jpg"]);
    assert_eq!(workflow.photos(), &[photo("b.jpg")]);
}

#[tokio::test]
async fn remote_confirm_failure_keeps_photo_and_pending_state() {
    let mut workflow = loaded(vec![photo("a.jpg")]).await;
    workflow.take_notices();
    let service = FakePhotoService::failing(500);

    workflow.request_delete(&photo("a.jpg")).expect("known photo");
    let err = workflow
        .confirm_delete_remote(&service)
        .await
        .expect_err("service failed");

    assert!(matches!(err, DeleteRejected::Service(ServiceError::Delete(_))));
    assert_eq!(workflow.photos().len(), 1);
    assert_eq!(workflow.pending_deletion(), Some(&photo("a.jpg")));
    assert_eq!(workflow.take_notices(), vec![Notice::error(DELETE_FAILED_NOTICE)]);
}

#[tokio::test]
async fn stale_listing_does_not_overwrite_a_newer_one() {
    let mut workflow = GalleryWorkflow::default();
    let old = workflow.begin_load();
    let new = workflow.begin_load();

    assert!(workflow
        .complete_load(new, Ok(vec![photo("fresh.jpg")]))
        .is_some());
    assert!(workflow
        .complete_load(old, Ok(vec![photo("stale.jpg")]))
        .is_none());

    assert_eq!(workflow.photos(), &[photo("fresh.jpg")]);
}
