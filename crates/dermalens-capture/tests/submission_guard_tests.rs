//! Integration tests for frame capture and the in-flight submission guard.

mod common;

use dermalens_capture::{
    CaptureError, CaptureSource, DEFAULT_JPEG_QUALITY, LiveStreamSource, MediaConstraint,
    MediaDevices, MediaStream, PermissionState, SyntheticMediaDevices,
};

#[tokio::test]
async fn submission_guard_tests_capture_uses_native_resolution() {
    let (_devices, controller) =
        common::controller_with(SyntheticMediaDevices::new().with_resolution(32, 24));
    controller.request_camera_access().await.expect("grant");

    let request = controller.capture_frame().expect("capture should work");
    let decoded = image::load_from_memory(request.image_bytes()).expect("jpeg should decode");

    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert!(controller.has_pending_image());
}

#[tokio::test]
async fn submission_guard_tests_blocks_overlap_and_clears_on_drop() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller.request_camera_access().await.expect("grant");
    controller.capture_frame().expect("capture should work");

    let guard = controller.begin_submission().expect("first submission");
    assert!(controller.is_analyzing());
    assert!(matches!(controller.capture_frame(), Err(CaptureError::Busy)));
    assert!(matches!(
        controller.begin_submission(),
        Err(CaptureError::Busy)
    ));

    drop(guard);

    assert!(!controller.is_analyzing());
    assert!(!controller.has_pending_image());
    assert_eq!(controller.permission_state(), PermissionState::Granted);
    controller.capture_frame().expect("capture allowed again");
}

#[test]
fn submission_guard_tests_requires_pending_image() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    assert!(matches!(
        controller.begin_submission(),
        Err(CaptureError::NothingPending)
    ));
}

#[tokio::test]
async fn submission_guard_tests_capture_without_stream_fails() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller
        .ingest_file("gallery.png", &common::png_fixture(2, 2))
        .expect("ingest");

    assert!(matches!(
        controller.capture_frame(),
        Err(CaptureError::NoActiveStream)
    ));
}

#[tokio::test]
async fn submission_guard_tests_file_ingestion_blocked_while_in_flight() {
    let (_devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller
        .ingest_file("first.png", &common::png_fixture(3, 3))
        .expect("first ingest");

    let guard = controller.begin_submission().expect("submission starts");
    assert!(matches!(
        controller.ingest_file("second.png", &common::png_fixture(3, 3)),
        Err(CaptureError::Busy)
    ));
    assert!(controller.has_pending_image());

    drop(guard);
    controller
        .ingest_file("second.png", &common::png_fixture(3, 3))
        .expect("ingest allowed after submission");
}

#[tokio::test]
async fn submission_guard_tests_grabbed_frame_encodes_after_stream_stops() {
    let devices = SyntheticMediaDevices::new().with_resolution(8, 6);
    let stream = devices
        .get_user_media(&MediaConstraint::AnyCamera)
        .await
        .expect("synthetic grant");

    let source = LiveStreamSource::grab(stream.as_ref(), 1, DEFAULT_JPEG_QUALITY)
        .expect("frame grabbed");
    stream.stop();

    let payload = source.acquire().expect("encode needs no stream");
    let decoded = image::load_from_memory(payload.bytes()).expect("jpeg should decode");
    assert_eq!((decoded.width(), decoded.height()), (8, 6));
    assert!(matches!(
        LiveStreamSource::grab(stream.as_ref(), 2, DEFAULT_JPEG_QUALITY),
        Err(CaptureError::StreamEnded(_))
    ));
}
