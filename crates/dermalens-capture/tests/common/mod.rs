//! Shared fixtures for capture integration tests.

use std::io::Cursor;
use std::sync::Arc;

use dermalens_capture::{CaptureController, SyntheticMediaDevices};

/// Encodes a solid-color PNG used as an uploaded gallery image.
#[allow(dead_code)]
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 150, 120, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png fixture should encode");
    bytes.into_inner()
}

/// Builds a controller over shared synthetic devices.
#[allow(dead_code)]
pub fn controller_with(
    devices: SyntheticMediaDevices,
) -> (Arc<SyntheticMediaDevices>, Arc<CaptureController>) {
    let devices = Arc::new(devices);
    let controller = Arc::new(CaptureController::new(devices.clone()));
    (devices, controller)
}
