// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Host-side values the harness writes and expects.
//!
//! Everything here is pure so the formulas can be checked without a device.

use crate::pixel_formats::{ChannelLayout, PixelFormat, Rgb10a2, Unorm4, f16};
use crate::texture::Shape;

/// Shape every driver runs on.  503 is not a multiple of the row alignment.
pub const TEST_SHAPE: Shape = Shape::new(3, 250, 503);

/// Scale applied by the R32 write kernel.
pub fn r32_write_scale() -> f32 {
    (1.0f64 + 1.0 / 255.0) as f32
}

/// Scale applied by the R16 write kernel.
pub fn r16_write_scale() -> f32 {
    (0.1f64 + 1.0 / 255.0) as f32
}

/// Divisor the R8 write kernel uses so that unorm rounding lands on `index`.
pub const R8_WRITE_DIVISOR: f32 = 254.9445;

/// Value written at `(channel, row, column)` before the per-format transform.
pub fn write_index(shape: Shape, channel: u32, row: u32, column: u32) -> u32 {
    (shape.index(channel, row, column) % 256) as u32
}

/// WGSL expression, in terms of the `f32` named `idx`, that the write kernel
/// stores for `format`.
pub fn store_expression(format: PixelFormat) -> String {
    match format.traits().channel_layout {
        ChannelLayout::Scalar8 => {
            format!("vec4<f32>(idx / {R8_WRITE_DIVISOR:?}, 0.0, 0.0, 0.0)")
        }
        ChannelLayout::Float => {
            format!("vec4<f32>(idx * {:?}, 0.0, 0.0, 0.0)", r32_write_scale())
        }
        ChannelLayout::Half => {
            format!("vec4<f32>(idx * {:?}, 0.0, 0.0, 0.0)", r16_write_scale())
        }
        ChannelLayout::Half2 => {
            format!("vec4<f32>(idx * {:?}, idx * {:?}, 0.0, 0.0)", 0.1f32, 0.05f32)
        }
        ChannelLayout::Unorm10x3A2 | ChannelLayout::Unorm8x4 => {
            let [_, _, _, alpha] = packed_write_floats(format, 0);
            format!(
                "clamp(vec4<f32>(idx, idx + 23.0, idx + 53.0, {:?}) / 255.0, vec4<f32>(0.0), vec4<f32>(1.0))",
                alpha * 255.0
            )
        }
    }
}

/// `[r, g, b, a]` the RGB10A2 and RGBA8 write kernels produce before
/// quantization.
pub fn packed_write_floats(format: PixelFormat, index: u32) -> [f32; 4] {
    let i = index as f32;
    let alpha = match format.traits().channel_layout {
        ChannelLayout::Unorm8x4 => 1.0,
        _ => 0.0,
    };
    [
        (i / 255.0).clamp(0.0, 1.0),
        ((i + 23.0) / 255.0).clamp(0.0, 1.0),
        ((i + 53.0) / 255.0).clamp(0.0, 1.0),
        alpha,
    ]
}

/// Lanes the host expects to read back where the write kernel stored `index`.
///
/// Integer formats expect the exact quantized value, half float formats the
/// value rounded to half precision.
pub fn write_expected(format: PixelFormat, index: u32) -> [f32; 4] {
    let i = index as f32;
    let half = |v: f32| f16::from_f32(v).to_f32();
    match format.traits().channel_layout {
        ChannelLayout::Scalar8 => [i / 255.0, 0.0, 0.0, 1.0],
        ChannelLayout::Float => [i * r32_write_scale(), 0.0, 0.0, 1.0],
        ChannelLayout::Half => [half(i * r16_write_scale()), 0.0, 0.0, 1.0],
        ChannelLayout::Half2 => [half(i * 0.1), half(i * 0.05), 0.0, 1.0],
        ChannelLayout::Unorm10x3A2 | ChannelLayout::Unorm8x4 => packed_write_floats(format, index),
    }
}

/// `c ^ h ^ w`, the seed of every read-test texel.
pub fn read_seed(channel: u32, row: u32, column: u32) -> u32 {
    channel ^ row ^ column
}

/// Tightly packed host data uploaded by the read test.
pub fn read_input(format: PixelFormat, shape: Shape) -> Vec<u8> {
    let layout = format.traits().channel_layout;
    let half = |v: f32| f16::from_f32(v).to_le_bytes();
    let mut out = Vec::with_capacity(shape.logical_len(format.element_size()));
    for c in 0..shape.channels {
        for h in 0..shape.height {
            for w in 0..shape.width {
                let x = read_seed(c, h, w);
                match layout {
                    ChannelLayout::Float => out.extend_from_slice(&(1.2f32 + x as f32).to_le_bytes()),
                    ChannelLayout::Scalar8 => out.push((x % 255) as u8),
                    ChannelLayout::Half => out.extend_from_slice(&half(1.2 + x as f32)),
                    ChannelLayout::Half2 => {
                        out.extend_from_slice(&half(1.2 + x as f32));
                        out.extend_from_slice(&half(2.8 + x as f32));
                    }
                    ChannelLayout::Unorm10x3A2 => {
                        let word = ((c << 30) ^ (h << 20) ^ (w << 10) ^ (w + h)) | 1;
                        out.extend_from_slice(&word.to_le_bytes());
                    }
                    ChannelLayout::Unorm8x4 => out.extend_from_slice(&[
                        x as u8,
                        x.wrapping_add(23) as u8,
                        x.wrapping_add(53) as u8,
                        255,
                    ]),
                }
            }
        }
    }
    out
}

/// The four source coordinates the read kernel samples for output `(row,
/// column)`, as `(h_in, w_in, h_in_n, w_in_n)`.
pub fn permuted(row: u32, column: u32, height: u32, width: u32) -> (u32, u32, u32, u32) {
    let (h, w) = (row, column);
    (
        ((h + w) ^ h) % height,
        ((w + w) ^ h) % width,
        ((h + w) ^ (h + 1)) % height,
        ((w + w) ^ (h + 1)) % width,
    )
}

/// Lanes a shader sees when it loads one texel of `format` from `bytes`.
/// Missing lanes read as 0, missing alpha as 1.
pub fn sampled_lanes(format: PixelFormat, bytes: &[u8]) -> [f32; 4] {
    let word = |b: &[u8]| u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
    let half = |b: &[u8]| f16::from_le_bytes([b[0], b[1]]).to_f32();
    match format.traits().channel_layout {
        ChannelLayout::Scalar8 => [bytes[0] as f32 / 255.0, 0.0, 0.0, 1.0],
        ChannelLayout::Unorm8x4 => Unorm4 {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
        .to_floats(),
        ChannelLayout::Unorm10x3A2 => Rgb10a2(word(bytes)).to_floats(),
        ChannelLayout::Half => [half(bytes), 0.0, 0.0, 1.0],
        ChannelLayout::Half2 => [half(bytes), half(&bytes[2..]), 0.0, 1.0],
        ChannelLayout::Float => [f32::from_bits(word(bytes)), 0.0, 0.0, 1.0],
    }
}

/// WGSL expression reducing the `vec4<f32>` named `total` to the lanes that
/// carry data for `format`.
pub fn reduce_expression(format: PixelFormat) -> &'static str {
    match format.traits().channel_layout.lanes() {
        1 => "total.x",
        2 => "total.x + total.y",
        _ => "total.x + total.y + total.z + total.w",
    }
}

/// Sums the first `lanes` lanes in the order the read kernel does.
pub fn reduce(total: [f32; 4], lanes: u8) -> f32 {
    total[..lanes as usize].iter().fold(0.0, |sum, lane| sum + lane)
}

/// Expected R32 output of the read kernel for every texel of `shape`.
pub fn read_expected(format: PixelFormat, shape: Shape, input: &[u8]) -> Vec<f32> {
    let size = format.element_size();
    let lanes = format.traits().channel_layout.lanes();
    let texel = |c: u32, h: u32, w: u32| {
        let at = shape.index(c, h, w) * size;
        sampled_lanes(format, &input[at..at + size])
    };
    let mut out = Vec::with_capacity(shape.texel_count());
    for c in 0..shape.channels {
        for h in 0..shape.height {
            for w in 0..shape.width {
                let (h_in, w_in, h_in_n, w_in_n) = permuted(h, w, shape.height, shape.width);
                let s0 = texel(c, h_in, w_in);
                let s1 = texel(c, h_in, w_in_n);
                let s2 = texel(c, h_in_n, w_in);
                let s3 = texel(c, h_in_n, w_in_n);
                let total: [f32; 4] = std::array::from_fn(|l| s0[l] + s1[l] + s2[l] + s3[l]);
                out.push(reduce(total, lanes));
            }
        }
    }
    out
}

/// Mean absolute difference.
pub fn mean_abs_error(actual: &[f32], expected: &[f32]) -> f32 {
    if expected.is_empty() {
        return 0.0;
    }
    let sum: f64 = actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e).abs() as f64)
        .sum();
    (sum / expected.len() as f64) as f32
}
