// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shared device setup for the GPU tests.
#![allow(dead_code)]

use texture_as_buffer::{DeviceConfig, DeviceContext, PixelFormat, TextureAsBuffer};

/// Opens the default adapter, or returns `None` (after saying why) when the
/// machine has no usable one.
pub fn context() -> Option<DeviceContext> {
    match DeviceContext::init(&DeviceConfig::from_env()) {
        Ok(context) => Some(context),
        Err(e) => {
            println!("skipping GPU test: {e}");
            None
        }
    }
}

/// A buffer with texture and staging allocated.
pub fn staged(
    context: &DeviceContext,
    channels: u32,
    height: u32,
    width: u32,
    format: PixelFormat,
) -> TextureAsBuffer {
    let mut tab = TextureAsBuffer::new(format!("{format} {channels}x{height}x{width}"));
    tab.init(context, channels, height, width, format)
        .expect("init");
    tab.init_staging(context).expect("init_staging");
    tab
}

pub fn shader_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("shaders")
        .join(name)
}
