//! Integration tests for exclusive stream ownership and release.

mod common;

use dermalens_capture::{CancelMode, PermissionState, Preview, SyntheticMediaDevices};

#[tokio::test]
async fn stream_ownership_tests_second_acquisition_releases_first() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    let ledger = devices.ledger();

    controller.request_camera_access().await.expect("first grant");
    controller.request_camera_access().await.expect("second grant");

    assert_eq!(ledger.opened(), 2);
    assert_eq!(ledger.stopped(), 1);
    assert_eq!(ledger.live(), 1);
    assert_eq!(
        controller.preview(),
        Preview::LiveStream {
            stream_id: "synthetic-stream-2".to_string()
        }
    );
}

#[tokio::test]
async fn stream_ownership_tests_abandon_stops_tracks() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller.request_camera_access().await.expect("grant");

    controller.cancel(CancelMode::Abandon);
    controller.cancel(CancelMode::Abandon);

    assert_eq!(devices.ledger().live(), 0);
    assert_eq!(devices.ledger().stopped(), 1);
    assert_eq!(controller.permission_state(), PermissionState::Prompt);
}

#[tokio::test]
async fn stream_ownership_tests_retake_keeps_live_feed() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller.request_camera_access().await.expect("grant");
    controller.capture_frame().expect("capture");
    assert!(matches!(controller.preview(), Preview::Image { .. }));

    controller.cancel(CancelMode::Retake);

    assert!(!controller.has_pending_image());
    assert_eq!(devices.ledger().live(), 1);
    assert_eq!(controller.permission_state(), PermissionState::Granted);
    assert!(matches!(controller.preview(), Preview::LiveStream { .. }));
}

#[tokio::test]
async fn stream_ownership_tests_drop_releases_stream() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());
    controller.request_camera_access().await.expect("grant");

    drop(controller);

    assert_eq!(devices.ledger().live(), 0);
}
