// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Kernel compilation and dispatch.

mod common;

use texture_as_buffer::harness::compile_test;
use texture_as_buffer::{
    Binding, ComputeKernel, ConstantBuffer, Error, PixelFormat, Shape, TextureAsBuffer,
    workgroups_for,
};

const FILL_KERNEL: &str = r#"
struct Params {
    value: f32,
    step: f32,
    _pad0: f32,
    _pad1: f32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(1) var output: texture_storage_2d_array<r32float, write>;

@compute @workgroup_size(TILE, TILE, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(output);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    textureStore(output, id.xy, id.z, vec4<f32>(params.value + params.step * f32(id.z), 0.0, 0.0, 0.0));
}
"#;

/// Queries the layer count of a storage texture, which some backends cannot
/// translate.
const LAYER_COUNT_KERNEL: &str = r#"
@group(0) @binding(0) var output: texture_storage_2d_array<r32float, write>;

@compute @workgroup_size(1, 1, 1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let layers = textureNumLayers(output);
    textureStore(output, id.xy, 0u, vec4<f32>(f32(layers), 0.0, 0.0, 0.0));
}
"#;

fn params(value: f32, step: f32) -> Vec<u8> {
    [value, step, 0.0, 0.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

#[test]
fn empty_inputs_are_rejected() {
    let Some(context) = common::context() else {
        return;
    };
    assert!(matches!(
        ComputeKernel::compile(&context, "", "main", &[]),
        Err(Error::EmptyInput(_))
    ));
    assert!(matches!(
        ComputeKernel::compile(&context, "  \n", "main", &[]),
        Err(Error::EmptyInput(_))
    ));
    assert!(matches!(
        ComputeKernel::compile(&context, FILL_KERNEL, "", &[("TILE", "8")]),
        Err(Error::EmptyInput(_))
    ));
}

#[test]
fn syntax_errors_surface_diagnostics() {
    let Some(context) = common::context() else {
        return;
    };
    match ComputeKernel::compile(&context, "@compute fn main( {", "main", &[]) {
        Err(Error::CompileError(diagnostics)) => assert!(!diagnostics.trim().is_empty()),
        other => panic!("expected CompileError, got {other:?}"),
    }
}

#[test]
fn undefined_define_fails_to_compile() {
    let Some(context) = common::context() else {
        return;
    };
    assert!(matches!(
        ComputeKernel::compile(&context, FILL_KERNEL, "main", &[]),
        Err(Error::CompileError(_))
    ));
}

#[test]
fn missing_entry_point_fails_kernel_creation() {
    let Some(context) = common::context() else {
        return;
    };
    assert!(matches!(
        ComputeKernel::compile(&context, FILL_KERNEL, "not_main", &[("TILE", "8")]),
        Err(Error::KernelCreationFailed(_))
    ));
}

#[test]
fn compiled_kernels_are_usable() {
    let Some(context) = common::context() else {
        return;
    };
    match ComputeKernel::compile(&context, LAYER_COUNT_KERNEL, "main", &[]) {
        Err(Error::KernelCreationFailed(reason)) => assert!(!reason.trim().is_empty()),
        Ok(kernel) => {
            let mut output = common::staged(&context, 2, 1, 1, PixelFormat::R32Float);
            if output.write_view().is_none() {
                return;
            }
            kernel
                .dispatch(&context, &[(0, Binding::Write(&output))], (1, 1, 1))
                .unwrap();
            output.to_cpu(&context).unwrap();
            assert_eq!(output.texels::<f32>().unwrap()[0], 2.0);
        }
        Err(other) => panic!("expected a usable kernel or KernelCreationFailed, got {other:?}"),
    }
}

#[test]
fn unreadable_files_are_reported() {
    let Some(context) = common::context() else {
        return;
    };
    let missing = common::shader_path("does_not_exist.wgsl");
    match ComputeKernel::compile_from_file(&context, &missing, "main", &[]) {
        Err(Error::FileReadError { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected FileReadError, got {other:?}"),
    }

    let empty = std::env::temp_dir().join(format!("tab_empty_{}.wgsl", std::process::id()));
    std::fs::write(&empty, "").unwrap();
    let result = ComputeKernel::compile_from_file(&context, &empty, "main", &[]);
    std::fs::remove_file(&empty).unwrap();
    assert!(matches!(result, Err(Error::FileReadError { .. })));
}

#[test]
fn array_sum_compiles_with_defines() {
    let Some(context) = common::context() else {
        return;
    };
    let mut kernel = ComputeKernel::compile_from_file(
        &context,
        common::shader_path("array_sum.wgsl"),
        "main",
        &compile_test::DEFINES,
    )
    .unwrap();
    assert!(kernel.is_compiled());
    assert_eq!(kernel.entry_point(), "main");
    kernel.release();
    kernel.release();
    assert!(!kernel.is_compiled());
    assert!(kernel.pipeline().is_none());
}

#[test]
fn dispatch_writes_through_constants() {
    let Some(context) = common::context() else {
        return;
    };
    let mut output = common::staged(&context, 3, 20, 37, PixelFormat::R32Float);
    if output.write_view().is_none() {
        println!("skipping: R32_FLOAT is not a storage format here");
        return;
    }
    let constants = ConstantBuffer::init(&context, "fill params", 16).unwrap();
    constants.to_gpu(&context, &params(2.5, 10.0)).unwrap();

    let kernel = ComputeKernel::compile(&context, FILL_KERNEL, "main", &[("TILE", "8")]).unwrap();
    kernel
        .dispatch(
            &context,
            &[(0, Binding::Constants(&constants)), (1, Binding::Write(&output))],
            workgroups_for(Shape::new(3, 20, 37), (8, 8)),
        )
        .unwrap();
    output.to_cpu(&context).unwrap();

    let values = output.texels::<f32>().unwrap();
    let per_channel = 20 * 37;
    for (i, v) in values.iter().enumerate() {
        let channel = (i / per_channel) as f32;
        assert_eq!(*v, 2.5 + 10.0 * channel, "texel {i}");
    }
}

#[test]
fn dispatch_checks_its_bindings() {
    let Some(context) = common::context() else {
        return;
    };
    let mut kernel = ComputeKernel::compile(&context, FILL_KERNEL, "main", &[("TILE", "8")]).unwrap();
    let constants = ConstantBuffer::init(&context, "fill params", 16).unwrap();
    let input = common::staged(&context, 1, 4, 4, PixelFormat::R32Float);
    let unallocated = TextureAsBuffer::new("unallocated");

    assert!(matches!(
        kernel.dispatch(
            &context,
            &[(0, Binding::Constants(&constants)), (1, Binding::Write(&unallocated))],
            (1, 1, 1),
        ),
        Err(Error::NotInitialized(_))
    ));

    // a sampled view where the kernel expects a storage texture
    assert!(matches!(
        kernel.dispatch(
            &context,
            &[(0, Binding::Constants(&constants)), (1, Binding::Read(&input))],
            (1, 1, 1),
        ),
        Err(Error::DispatchFailed(_))
    ));

    kernel.release();
    assert!(matches!(
        kernel.dispatch(&context, &[], (1, 1, 1)),
        Err(Error::NotInitialized(_))
    ));
}
