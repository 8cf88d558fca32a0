//! Integration tests for the gallery upload fallback path.

mod common;

use dermalens_capture::{
    CaptureError, FacingMode, MediaConstraint, PermissionState, Preview, ScriptedOutcome,
    SyntheticMediaDevices,
};

#[tokio::test]
async fn file_ingestion_tests_grants_after_denial() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new().with_outcome(
        MediaConstraint::Facing(FacingMode::User),
        ScriptedOutcome::Deny,
    ));
    assert!(controller.request_camera_access().await.is_err());
    assert_eq!(controller.permission_state(), PermissionState::Denied);

    let request = controller
        .ingest_file("gallery.png", &common::png_fixture(8, 6))
        .expect("png should ingest");

    assert_eq!(controller.permission_state(), PermissionState::Granted);
    assert_eq!(controller.denial_reason(), None);
    assert_eq!(request.mime_type(), "image/jpeg");
    assert_eq!(&request.image_bytes()[..2], &[0xff, 0xd8]);
}

#[test]
fn file_ingestion_tests_grants_from_prompt_without_camera() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());

    controller
        .ingest_file("gallery.png", &common::png_fixture(2, 2))
        .expect("png should ingest");

    assert_eq!(controller.permission_state(), PermissionState::Granted);
    assert!(devices.attempts().is_empty());
    assert!(matches!(controller.preview(), Preview::Image { .. }));
}

#[tokio::test]
async fn file_ingestion_tests_image_supersedes_live_stream() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller.request_camera_access().await.expect("grant");

    controller
        .ingest_file("gallery.png", &common::png_fixture(3, 3))
        .expect("png should ingest");

    assert!(controller.holds_stream());
    assert!(matches!(controller.preview(), Preview::Image { .. }));
}

#[test]
fn file_ingestion_tests_rejects_non_image_bytes() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());

    let error = controller
        .ingest_file("notes.txt", b"definitely not an image")
        .expect_err("text should not decode");

    assert!(matches!(error, CaptureError::Decode(_)));
    assert_eq!(controller.permission_state(), PermissionState::Prompt);
    assert!(!controller.has_pending_image());
}
