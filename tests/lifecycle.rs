// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Allocation, failure and release behaviour.

mod common;

use texture_as_buffer::pixel_formats::{Half2, f16};
use texture_as_buffer::{
    ConstantBuffer, DeviceConfig, DeviceContext, Error, PerformanceCounter, PixelFormat,
    TextureAsBuffer, list_adapters,
};

#[test]
fn zero_dimension_leaves_buffer_unallocated() {
    let Some(context) = common::context() else {
        return;
    };
    for (c, h, w) in [(0, 250, 503), (3, 0, 503), (3, 250, 0)] {
        let mut tab = TextureAsBuffer::new("invalid");
        let err = tab.init(&context, c, h, w, PixelFormat::R8Unorm).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }), "{err}");
        assert!(!tab.is_initialized());
        assert!(tab.read_view().is_none());
        assert!(tab.write_view().is_none());
        assert_eq!(tab.shape_descriptor(), "0 0 0");
        tab.release();
        assert!(!tab.is_initialized());
    }
}

#[test]
fn failed_reinit_releases_previous_allocation() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = common::staged(&context, 1, 4, 4, PixelFormat::R32Float);
    assert!(tab.init(&context, 1, 0, 4, PixelFormat::R32Float).is_err());
    assert!(!tab.is_initialized());
    assert!(!tab.has_staging());
}

#[test]
fn staging_requires_texture() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = TextureAsBuffer::new("no texture");
    assert!(matches!(
        tab.init_staging(&context),
        Err(Error::NotInitialized(_))
    ));
}

#[test]
fn transfers_require_staging() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = TextureAsBuffer::new("no staging");
    tab.init(&context, 1, 2, 2, PixelFormat::R8Unorm).unwrap();
    assert!(matches!(tab.to_cpu(&context), Err(Error::NotInitialized(_))));
    assert!(matches!(
        tab.to_gpu(&context, &[0; 4]),
        Err(Error::NotInitialized(_))
    ));
    assert!(matches!(
        tab.fill_bytes(&context, 0),
        Err(Error::NotInitialized(_))
    ));
    assert!(matches!(
        tab.fill_words(&context, 0),
        Err(Error::NotInitialized(_))
    ));
}

#[test]
fn host_data_is_checked() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = common::staged(&context, 2, 2, 3, PixelFormat::R16Float);
    assert!(matches!(tab.to_gpu(&context, &[]), Err(Error::NullInput)));
    match tab.to_gpu(&context, &[0; 5]) {
        Err(Error::SizeMismatch { expected, actual }) => {
            assert_eq!(expected, 24);
            assert_eq!(actual, 5);
        }
        other => panic!("expected SizeMismatch, got {other:?}"),
    }
}

#[test]
fn introspection_reflects_allocation() {
    let Some(context) = common::context() else {
        return;
    };
    let tab = common::staged(&context, 3, 250, 503, PixelFormat::R16G16Float);
    assert_eq!(tab.shape_descriptor(), "3 250 503");
    assert_eq!(tab.format(), Some(PixelFormat::R16G16Float));
    assert_eq!(tab.element_size(), 4);
    assert_eq!(tab.logical_len(), 3 * 250 * 503 * 4);
    let pitch = tab.row_pitch().unwrap();
    assert_eq!(pitch.row_bytes, 2012);
    assert_eq!(pitch.padded_row_bytes, 2048);
    assert_eq!(pitch.rows, 750);
    assert!(tab.read_view().is_some());
    let texture = tab.texture().unwrap();
    assert_eq!(texture.depth_or_array_layers(), 3);
    assert_eq!(texture.format(), wgpu::TextureFormat::Rg16Float);
}

#[test]
fn release_is_idempotent() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = common::staged(&context, 1, 8, 8, PixelFormat::R8G8B8A8Unorm);
    tab.release();
    tab.release();
    assert!(!tab.is_initialized());
    assert!(!tab.has_staging());
    assert_eq!(tab.shape_descriptor(), "0 0 0");
    assert!(matches!(tab.to_cpu(&context), Err(Error::NotInitialized(_))));

    tab.init(&context, 1, 8, 8, PixelFormat::R8G8B8A8Unorm).unwrap();
    tab.init_staging(&context).unwrap();
    tab.fill_words(&context, 0xFF00_00FF).unwrap();
    assert_eq!(&tab.to_cpu(&context).unwrap()[..4], &[0xFF, 0, 0, 0xFF]);
}

#[test]
fn typed_transfers_check_the_format() {
    let Some(context) = common::context() else {
        return;
    };
    let mut tab = common::staged(&context, 1, 1, 2, PixelFormat::R16G16Float);
    assert!(matches!(
        tab.to_gpu_texels(&context, &[1.0f32, 2.0]),
        Err(Error::FormatMismatch { .. })
    ));
    let texels = [Half2::from_f32(0.5, 1.5), Half2::from_f32(-3.0, 65504.0)];
    tab.to_gpu_texels(&context, &texels).unwrap();
    tab.to_cpu(&context).unwrap();
    assert_eq!(tab.texels::<Half2>().unwrap(), texels);
    assert!(matches!(
        tab.texels::<f16>(),
        Err(Error::FormatMismatch { .. })
    ));
}

#[test]
fn out_of_range_adapter_is_not_found() {
    let config = DeviceConfig::from_env();
    let count = list_adapters(&config).len();
    match DeviceContext::init(&config.with_adapter_index(count)) {
        Err(Error::AdapterNotFound { index, count: c }) => {
            assert_eq!(index, count);
            assert_eq!(c, count);
        }
        other => panic!("expected AdapterNotFound, got {other:?}"),
    }
}

#[test]
fn context_describes_its_adapter() {
    let Some(context) = common::context() else {
        return;
    };
    assert_eq!(context.adapter_index(), 0);
    let listed = list_adapters(&DeviceConfig::from_env());
    assert_eq!(listed[0].name, context.adapter_name());
    assert_eq!(listed[0].backend, context.backend());
    context.release();
}

#[test]
fn constant_buffer_lifecycle() {
    let Some(context) = common::context() else {
        return;
    };
    assert!(matches!(
        ConstantBuffer::init(&context, "empty", 0),
        Err(Error::EmptyInput(_))
    ));
    let mut constants = ConstantBuffer::init(&context, "params", 12).unwrap();
    assert_eq!(constants.size(), 12);
    assert_eq!(constants.buffer().unwrap().size(), 16);
    assert!(matches!(
        constants.to_gpu(&context, &[0; 16]),
        Err(Error::SizeMismatch { expected: 12, actual: 16 })
    ));
    constants.to_gpu(&context, &[0; 12]).unwrap();
    constants.release();
    constants.release();
    assert!(matches!(
        constants.to_gpu(&context, &[0; 12]),
        Err(Error::NotInitialized(_))
    ));
}

#[test]
fn performance_counter_measures_transfers() {
    let Some(context) = common::context() else {
        return;
    };
    let mut counter = PerformanceCounter::init(&context).unwrap();
    assert!(matches!(
        counter.stop(&context),
        Err(Error::NotInitialized(_))
    ));
    assert_eq!(counter.uses_timestamps(), context.supports_timestamps());

    let mut tab = common::staged(&context, 3, 250, 503, PixelFormat::R32Float);
    counter.start(&context).unwrap();
    tab.fill_bytes(&context, 0).unwrap();
    let ms = counter.stop(&context).unwrap();
    assert!(ms >= 0.0);
    assert!(ms.is_finite());
}
