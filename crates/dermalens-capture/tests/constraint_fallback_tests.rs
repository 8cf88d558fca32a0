//! Integration tests for ordered camera constraint fallback.

mod common;

use std::sync::Arc;

use dermalens_capture::{
    CaptureController, DenialReason, FacingMode, MediaConstraint, NoCameraDevices,
    PermissionError, PermissionState, ScriptedOutcome, SyntheticMediaDevices,
};

const FRONT: MediaConstraint = MediaConstraint::Facing(FacingMode::User);

#[tokio::test]
async fn constraint_fallback_tests_stops_at_first_success() {
    let (devices, controller) = common::controller_with(SyntheticMediaDevices::new());

    controller
        .request_camera_access()
        .await
        .expect("front camera should be granted");

    assert_eq!(devices.attempts(), vec![FRONT]);
    assert_eq!(controller.permission_state(), PermissionState::Granted);
}

#[tokio::test]
async fn constraint_fallback_tests_no_device_advances_to_any_camera() {
    let (devices, controller) = common::controller_with(
        SyntheticMediaDevices::new().with_outcome(FRONT, ScriptedOutcome::NoDevice),
    );

    controller
        .request_camera_access()
        .await
        .expect("any camera should be granted");

    assert_eq!(devices.attempts(), vec![FRONT, MediaConstraint::AnyCamera]);
    assert_eq!(controller.permission_state(), PermissionState::Granted);
    assert!(controller.holds_stream());
    assert_eq!(devices.ledger().live(), 1);
}

#[tokio::test]
async fn constraint_fallback_tests_denial_stops_immediately() {
    let (devices, controller) = common::controller_with(
        SyntheticMediaDevices::new().with_outcome(FRONT, ScriptedOutcome::Deny),
    );

    let error = controller
        .request_camera_access()
        .await
        .expect_err("denial should fail");

    assert_eq!(error, PermissionError::Refused);
    assert_eq!(devices.attempts(), vec![FRONT]);
    assert_eq!(controller.permission_state(), PermissionState::Denied);
    assert_eq!(controller.denial_reason(), Some(DenialReason::Refused));
    assert!(!controller.holds_stream());
}

#[tokio::test]
async fn constraint_fallback_tests_exhaustion_is_unavailable() {
    let (devices, controller) = common::controller_with(
        SyntheticMediaDevices::new()
            .with_outcome(FRONT, ScriptedOutcome::NoDevice)
            .with_outcome(
                MediaConstraint::AnyCamera,
                ScriptedOutcome::Fail("device busy".to_string()),
            ),
    );

    let error = controller
        .request_camera_access()
        .await
        .expect_err("every constraint fails");

    assert_eq!(error, PermissionError::Unavailable);
    assert_eq!(devices.attempts().len(), 2);
    assert_eq!(controller.permission_state(), PermissionState::Denied);
    assert_eq!(controller.denial_reason(), Some(DenialReason::Unavailable));
}

#[tokio::test]
async fn constraint_fallback_tests_denied_session_may_retry() {
    let (devices, controller) = common::controller_with(
        SyntheticMediaDevices::new().with_outcome(FRONT, ScriptedOutcome::Deny),
    );
    assert!(controller.request_camera_access().await.is_err());
    assert!(controller.request_camera_access().await.is_err());

    assert_eq!(devices.attempts(), vec![FRONT, FRONT]);
    assert_eq!(controller.permission_state(), PermissionState::Denied);
}

#[tokio::test]
async fn constraint_fallback_tests_cameraless_host_is_unavailable() {
    let controller = CaptureController::new(Arc::new(NoCameraDevices));

    let error = controller
        .request_camera_access()
        .await
        .expect_err("no camera to grant");

    assert_eq!(error, PermissionError::Unavailable);
    assert_eq!(controller.denial_reason(), Some(DenialReason::Unavailable));
    assert!(!controller.holds_stream());
}
