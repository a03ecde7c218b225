// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The format catalog.
//!
//! Every pixel encoding a [`crate::TextureAsBuffer`] can hold is listed in
//! [`PixelFormat`], and every format-specific fact (byte width, lane packing,
//! backend format, WGSL storage name) comes from the single table in
//! [`PixelFormat::traits`].  Nothing else in the crate matches on formats to
//! recompute these facts.
//!
//! # Available Formats
//!
//! | Format               | Bytes | Lanes                           | Texel type   |
//! |----------------------|-------|---------------------------------|--------------|
//! | `R8_UNORM`           | 1     | one 8-bit unorm                 | `u8`         |
//! | `R8G8B8A8_UNORM`     | 4     | four 8-bit unorm                | [`Unorm4`]   |
//! | `R10G10B10A2_UNORM`  | 4     | three 10-bit + one 2-bit unorm  | [`Rgb10a2`]  |
//! | `R16_FLOAT`          | 2     | one half float                  | [`f16`]      |
//! | `R16G16_FLOAT`       | 4     | two half floats                 | [`Half2`]    |
//! | `R32_FLOAT`          | 4     | one 32-bit float                | `f32`        |
//!
//! # Examples
//!
//! ```
//! use texture_as_buffer::pixel_formats::PixelFormat;
//!
//! let format: PixelFormat = "R10G10B10A2_UNORM".parse().unwrap();
//! assert_eq!(format.element_size(), 4);
//! assert_eq!(format.traits().channel_layout.lanes(), 4);
//! ```

/*
Quick note on type design.  The buffer format is picked at runtime (the harness
loops over every format), so the format itself is an enum with one table lookup.
The typed texels keep the compile-time flavour: `Texel::FORMAT` ties a Rust type to
its format so reading a buffer as the wrong type is caught by a check rather than
by reinterpreting bytes.
 */

use crate::error::{Error, Result};
use std::fmt::{Debug, Display};
use std::str::FromStr;

pub use half::f16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    R8G8B8A8Unorm,
    R10G10B10A2Unorm,
    R16Float,
    R16G16Float,
    R32Float,
}

/// How the bytes of one texel are split into lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// A single 8-bit normalized lane.
    Scalar8,
    /// Four 8-bit normalized lanes, red first.
    Unorm8x4,
    /// Three 10-bit normalized lanes and one 2-bit lane, red in the low bits.
    Unorm10x3A2,
    /// One IEEE 754 half float.
    Half,
    /// Two half floats, red first.
    Half2,
    /// One 32-bit float.
    Float,
}

impl ChannelLayout {
    /// Number of lanes a shader observes when it loads the texel.
    pub const fn lanes(self) -> u8 {
        match self {
            ChannelLayout::Scalar8 | ChannelLayout::Half | ChannelLayout::Float => 1,
            ChannelLayout::Half2 => 2,
            ChannelLayout::Unorm8x4 | ChannelLayout::Unorm10x3A2 => 4,
        }
    }
}

/// Everything format-specific, looked up once per format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTraits {
    pub element_size_bytes: usize,
    pub channel_layout: ChannelLayout,
    pub wgpu_format: wgpu::TextureFormat,
    /// Texel format name inside `texture_storage_2d_array<...>`.
    pub wgsl_storage_name: &'static str,
    pub name: &'static str,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 6] = [
        PixelFormat::R8Unorm,
        PixelFormat::R8G8B8A8Unorm,
        PixelFormat::R10G10B10A2Unorm,
        PixelFormat::R16Float,
        PixelFormat::R16G16Float,
        PixelFormat::R32Float,
    ];

    pub const fn traits(self) -> FormatTraits {
        match self {
            PixelFormat::R8Unorm => FormatTraits {
                element_size_bytes: 1,
                channel_layout: ChannelLayout::Scalar8,
                wgpu_format: wgpu::TextureFormat::R8Unorm,
                wgsl_storage_name: "r8unorm",
                name: "R8_UNORM",
            },
            PixelFormat::R8G8B8A8Unorm => FormatTraits {
                element_size_bytes: 4,
                channel_layout: ChannelLayout::Unorm8x4,
                wgpu_format: wgpu::TextureFormat::Rgba8Unorm,
                wgsl_storage_name: "rgba8unorm",
                name: "R8G8B8A8_UNORM",
            },
            PixelFormat::R10G10B10A2Unorm => FormatTraits {
                element_size_bytes: 4,
                channel_layout: ChannelLayout::Unorm10x3A2,
                wgpu_format: wgpu::TextureFormat::Rgb10a2Unorm,
                wgsl_storage_name: "rgb10a2unorm",
                name: "R10G10B10A2_UNORM",
            },
            PixelFormat::R16Float => FormatTraits {
                element_size_bytes: 2,
                channel_layout: ChannelLayout::Half,
                wgpu_format: wgpu::TextureFormat::R16Float,
                wgsl_storage_name: "r16float",
                name: "R16_FLOAT",
            },
            PixelFormat::R16G16Float => FormatTraits {
                element_size_bytes: 4,
                channel_layout: ChannelLayout::Half2,
                wgpu_format: wgpu::TextureFormat::Rg16Float,
                wgsl_storage_name: "rg16float",
                name: "R16G16_FLOAT",
            },
            PixelFormat::R32Float => FormatTraits {
                element_size_bytes: 4,
                channel_layout: ChannelLayout::Float,
                wgpu_format: wgpu::TextureFormat::R32Float,
                wgsl_storage_name: "r32float",
                name: "R32_FLOAT",
            },
        }
    }

    pub const fn element_size(self) -> usize {
        self.traits().element_size_bytes
    }

    pub const fn wgpu_format(self) -> wgpu::TextureFormat {
        self.traits().wgpu_format
    }

    pub const fn name(self) -> &'static str {
        self.traits().name
    }
}

/// Byte width of a backend format, or `UnsupportedFormat` when the catalog does
/// not cover it.
pub fn element_size(format: wgpu::TextureFormat) -> Result<usize> {
    PixelFormat::try_from(format).map(PixelFormat::element_size)
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PixelFormat::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

impl TryFrom<wgpu::TextureFormat> for PixelFormat {
    type Error = Error;

    fn try_from(format: wgpu::TextureFormat) -> Result<Self> {
        PixelFormat::ALL
            .into_iter()
            .find(|candidate| candidate.wgpu_format() == format)
            .ok_or_else(|| Error::UnsupportedFormat(format!("{format:?}")))
    }
}

/// Sealed traits for texel type safety.
///
/// Only the texel types defined in this module can be used with the typed
/// transfer APIs.
mod sealed {
    /// Marker trait indicating C-compatible memory layout.
    ///
    /// # Safety
    ///
    /// Implementors must have no padding and no uninitialized bytes, so that
    /// a slice of them can be viewed as bytes.
    pub unsafe trait ReprC {}
}

/// A Rust type holding exactly one texel of [`Texel::FORMAT`].
pub trait Texel: Copy + Debug + Send + Sync + sealed::ReprC + 'static {
    const FORMAT: PixelFormat;

    /// Decode one texel from its little-endian device representation.
    ///
    /// `bytes` is exactly `FORMAT.element_size()` long.
    fn from_le_bytes(bytes: &[u8]) -> Self;
}

/// View texels as the bytes the device expects.
///
/// Devices are little-endian, as is every host this crate targets.
pub fn texels_as_bytes<T: Texel>(t: &[T]) -> &[u8] {
    //safe because T: ReprC guarantees no padding or uninitialized bytes
    unsafe { std::slice::from_raw_parts(t.as_ptr() as *const u8, std::mem::size_of_val(t)) }
}

/// Decode a tightly packed byte buffer into texels.  Trailing bytes that do not
/// fill a whole texel are ignored.
pub fn texels_from_bytes<T: Texel>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::FORMAT.element_size())
        .map(T::from_le_bytes)
        .collect()
}

unsafe impl sealed::ReprC for u8 {}
impl Texel for u8 {
    const FORMAT: PixelFormat = PixelFormat::R8Unorm;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

unsafe impl sealed::ReprC for f32 {}
impl Texel for f32 {
    const FORMAT: PixelFormat = PixelFormat::R32Float;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

unsafe impl sealed::ReprC for f16 {}
impl Texel for f16 {
    const FORMAT: PixelFormat = PixelFormat::R16Float;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        f16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// C-compatible RGBA pixel with 8-bit normalized unsigned values.
///
/// Values range from 0-255 and are interpreted as 0.0-1.0 in shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Unorm4 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}
unsafe impl sealed::ReprC for Unorm4 {}
impl Texel for Unorm4 {
    const FORMAT: PixelFormat = PixelFormat::R8G8B8A8Unorm;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        Unorm4 {
            r: bytes[0],
            g: bytes[1],
            b: bytes[2],
            a: bytes[3],
        }
    }
}

impl Unorm4 {
    /// Convert from normalized float values (0.0-1.0) to 8-bit values (0-255).
    ///
    /// Values are clamped to the valid range and rounded to nearest integer.
    pub fn from_floats(rgba: [f32; 4]) -> Self {
        let q = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        Unorm4 {
            r: q(rgba[0]),
            g: q(rgba[1]),
            b: q(rgba[2]),
            a: q(rgba[3]),
        }
    }

    pub fn to_floats(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a].map(|v| v as f32 / 255.0)
    }
}

/// Two half floats, red first.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Half2 {
    pub r: f16,
    pub g: f16,
}
unsafe impl sealed::ReprC for Half2 {}
impl Texel for Half2 {
    const FORMAT: PixelFormat = PixelFormat::R16G16Float;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        Half2 {
            r: f16::from_le_bytes([bytes[0], bytes[1]]),
            g: f16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

impl Half2 {
    pub fn from_f32(r: f32, g: f32) -> Self {
        Half2 {
            r: f16::from_f32(r),
            g: f16::from_f32(g),
        }
    }
}

/// A packed 10/10/10/2 word: red in bits 0-9, green 10-19, blue 20-29,
/// alpha 30-31.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb10a2(pub u32);
unsafe impl sealed::ReprC for Rgb10a2 {}
impl Texel for Rgb10a2 {
    const FORMAT: PixelFormat = PixelFormat::R10G10B10A2Unorm;
    fn from_le_bytes(bytes: &[u8]) -> Self {
        Rgb10a2(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Rgb10a2 {
    const MAX_10: u32 = 0x3ff;
    const MAX_2: u32 = 0x3;

    /// Pack integer lanes; each lane is masked to its width.
    pub const fn pack(r: u32, g: u32, b: u32, a: u32) -> Self {
        Rgb10a2(
            (r & Self::MAX_10)
                | (g & Self::MAX_10) << 10
                | (b & Self::MAX_10) << 20
                | (a & Self::MAX_2) << 30,
        )
    }

    /// Integer lanes `[r, g, b, a]`.
    pub const fn lanes(self) -> [u32; 4] {
        [
            self.0 & Self::MAX_10,
            self.0 >> 10 & Self::MAX_10,
            self.0 >> 20 & Self::MAX_10,
            self.0 >> 30,
        ]
    }

    /// Clamp, quantize and pack normalized floats.
    pub fn from_floats(rgba: [f32; 4]) -> Self {
        let q = |v: f32, max: u32| (v.clamp(0.0, 1.0) * max as f32).round() as u32;
        Self::pack(
            q(rgba[0], Self::MAX_10),
            q(rgba[1], Self::MAX_10),
            q(rgba[2], Self::MAX_10),
            q(rgba[3], Self::MAX_2),
        )
    }

    pub fn to_floats(self) -> [f32; 4] {
        let [r, g, b, a] = self.lanes();
        [
            r as f32 / Self::MAX_10 as f32,
            g as f32 / Self::MAX_10 as f32,
            b as f32 / Self::MAX_10 as f32,
            a as f32 / Self::MAX_2 as f32,
        ]
    }
}
