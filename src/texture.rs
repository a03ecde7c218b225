// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Texture-as-buffer: a `channels × height × width` array stored in a 2D array texture.

Each channel is one array layer.  The host side always sees the data tightly packed,
channel-major then row-major, `channels * height * width * element_size` bytes with no
padding.  The device side copies through staging buffers whose rows are padded to
[`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`]; [`RowPitch`] together with [`pad_rows`] and
[`unpad_rows`] bridge the two.

```no_run
use texture_as_buffer::{DeviceConfig, DeviceContext, PixelFormat, TextureAsBuffer};

let context = DeviceContext::init(&DeviceConfig::from_env())?;
let mut tab = TextureAsBuffer::new("example");
tab.init(&context, 3, 250, 503, PixelFormat::R8Unorm)?;
tab.init_staging(&context)?;
tab.fill_bytes(&context, 0)?;
assert!(tab.to_cpu(&context)?.iter().all(|b| *b == 0));
# Ok::<(), texture_as_buffer::Error>(())
```
*/

use crate::device::DeviceContext;
use crate::error::{Error, Result, describe};
use crate::pixel_formats::{PixelFormat, Texel, texels_as_bytes, texels_from_bytes};
use std::fmt::Display;

/// Logical dimensions of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    pub channels: u32,
    pub height: u32,
    pub width: u32,
}

impl Shape {
    pub const fn new(channels: u32, height: u32, width: u32) -> Self {
        Shape {
            channels,
            height,
            width,
        }
    }

    /// Returns the shape unchanged when every dimension is non-zero.
    pub fn validate(self) -> Result<Self> {
        if self.channels == 0 || self.height == 0 || self.width == 0 {
            Err(Error::InvalidShape {
                channels: self.channels,
                height: self.height,
                width: self.width,
            })
        } else {
            Ok(self)
        }
    }

    pub const fn texel_count(self) -> usize {
        self.channels as usize * self.height as usize * self.width as usize
    }

    pub const fn logical_len(self, element_size: usize) -> usize {
        self.texel_count() * element_size
    }

    /// Flat index of `(channel, row, column)` in the tightly packed host layout.
    pub const fn index(self, channel: u32, row: u32, column: u32) -> usize {
        (channel as usize * self.height as usize + row as usize) * self.width as usize
            + column as usize
    }

    fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: self.channels,
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.channels, self.height, self.width)
    }
}

/// Row geometry of a staging copy.
///
/// Channels are outer-looped rows: the copy moves `height * channels` rows, slice
/// 0 rows first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPitch {
    /// Bytes of payload in one row, `width * element_size`.
    pub row_bytes: usize,
    /// Row stride in the staging buffer.
    pub padded_row_bytes: usize,
    pub rows: usize,
}

impl RowPitch {
    pub fn new(shape: Shape, element_size: usize) -> Self {
        let row_bytes = shape.width as usize * element_size;
        RowPitch {
            row_bytes,
            padded_row_bytes: aligned_bytes_per_row(row_bytes),
            rows: shape.height as usize * shape.channels as usize,
        }
    }

    /// Size of the tightly packed host buffer.
    pub const fn logical_len(&self) -> usize {
        self.row_bytes * self.rows
    }

    /// Size of a staging buffer.
    pub const fn staging_len(&self) -> usize {
        self.padded_row_bytes * self.rows
    }
}

fn aligned_bytes_per_row(row_bytes: usize) -> usize {
    row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize)
}

/// Copies padded staging rows into a tightly packed buffer.
///
/// `padded` holds at least `pitch.staging_len()` bytes and `packed` exactly
/// `pitch.logical_len()`.
pub fn unpad_rows(padded: &[u8], pitch: RowPitch, packed: &mut [u8]) {
    debug_assert!(padded.len() >= pitch.staging_len() - (pitch.padded_row_bytes - pitch.row_bytes));
    debug_assert_eq!(packed.len(), pitch.logical_len());
    if pitch.row_bytes == pitch.padded_row_bytes {
        packed.copy_from_slice(&padded[..pitch.logical_len()]);
        return;
    }
    for (row, dst) in packed.chunks_exact_mut(pitch.row_bytes).enumerate() {
        let src = row * pitch.padded_row_bytes;
        dst.copy_from_slice(&padded[src..src + pitch.row_bytes]);
    }
}

/// Copies a tightly packed buffer into padded staging rows.  Padding bytes are
/// left as they were.
pub fn pad_rows(packed: &[u8], pitch: RowPitch, padded: &mut [u8]) {
    debug_assert_eq!(packed.len(), pitch.logical_len());
    if pitch.row_bytes == pitch.padded_row_bytes {
        padded[..pitch.logical_len()].copy_from_slice(packed);
        return;
    }
    for (row, src) in packed.chunks_exact(pitch.row_bytes).enumerate() {
        let dst = row * pitch.padded_row_bytes;
        padded[dst..dst + pitch.row_bytes].copy_from_slice(src);
    }
}

#[derive(Debug)]
struct DeviceResource {
    texture: wgpu::Texture,
    read_view: wgpu::TextureView,
    write_view: Option<wgpu::TextureView>,
}

#[derive(Debug)]
struct Staging {
    //MAP_READ | COPY_DST
    readback: wgpu::Buffer,
    //MAP_WRITE | COPY_SRC
    upload: wgpu::Buffer,
    pitch: RowPitch,
    host: Box<[u8]>,
}

impl Staging {
    fn destroy(self) {
        self.readback.destroy();
        self.upload.destroy();
    }
}

/// A typed multi-channel 2D array living in a texture.
///
/// Constructed unallocated; [`Self::init`] creates the texture and its views,
/// [`Self::init_staging`] the host-visible staging buffers.  Every failed call
/// leaves the instance as it was before the call, or fully unallocated in the
/// case of `init`.
#[derive(Debug)]
pub struct TextureAsBuffer {
    label: String,
    shape: Shape,
    format: Option<PixelFormat>,
    resource: Option<DeviceResource>,
    staging: Option<Staging>,
}

impl TextureAsBuffer {
    /// An unallocated instance.  `label` names the device objects in
    /// diagnostics.
    pub fn new(label: impl Into<String>) -> Self {
        TextureAsBuffer {
            label: label.into(),
            shape: Shape::default(),
            format: None,
            resource: None,
            staging: None,
        }
    }

    /// Allocates the array texture and its views.
    ///
    /// Any prior allocation is released first.  The read view always exists on
    /// success; the write view exists when the device can bind `format` as a
    /// storage texture.
    pub fn init(
        &mut self,
        context: &DeviceContext,
        channels: u32,
        height: u32,
        width: u32,
        format: PixelFormat,
    ) -> Result<()> {
        self.release();
        let shape = Shape::new(channels, height, width).validate()?;

        let writable = context.supports_storage(format);
        if !writable {
            logwise::warn_sync!(
                "TextureAsBuffer::init {label}: {format} is not a storage format on this device; no write view",
                label = logwise::privacy::LogIt(&self.label),
                format = logwise::privacy::LogIt(&format)
            );
        }
        let mut usage = wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::TEXTURE_BINDING;
        if writable {
            usage |= wgpu::TextureUsages::STORAGE_BINDING;
        }

        let label = self.label.as_str();
        let (resource, error) = context.capture(|device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: shape.extent(),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: format.wgpu_format(),
                usage,
                view_formats: &[],
            });
            let read_view = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(label),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                ..Default::default()
            });
            let write_view = writable.then(|| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    dimension: Some(wgpu::TextureViewDimension::D2Array),
                    ..Default::default()
                })
            });
            DeviceResource {
                texture,
                read_view,
                write_view,
            }
        });
        if let Some(error) = error {
            resource.texture.destroy();
            return Err(Error::DeviceResourceCreationFailed {
                label: self.label.clone(),
                reason: describe(&error),
            });
        }

        logwise::info_sync!(
            "TextureAsBuffer::init {label} {shape} {format}",
            label = logwise::privacy::LogIt(&self.label),
            shape = logwise::privacy::LogIt(&shape),
            format = logwise::privacy::LogIt(&format)
        );
        self.shape = shape;
        self.format = Some(format);
        self.resource = Some(resource);
        Ok(())
    }

    /// Allocates the staging buffers and the host buffer.
    ///
    /// Requires a prior successful [`Self::init`].  Existing staging is replaced.
    /// On failure the texture is kept and staging stays unallocated.
    pub fn init_staging(&mut self, context: &DeviceContext) -> Result<()> {
        let format = match (&self.resource, self.format) {
            (Some(_), Some(format)) => format,
            _ => return Err(Error::NotInitialized("texture")),
        };
        if let Some(old) = self.staging.take() {
            old.destroy();
        }
        let pitch = RowPitch::new(self.shape, format.element_size());
        let size = pitch.staging_len() as u64;
        let readback_label = format!("{} readback", self.label);
        let upload_label = format!("{} upload", self.label);

        let ((readback, upload), error) = context.capture(|device| {
            let readback = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&readback_label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let upload = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&upload_label),
                size,
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            });
            (readback, upload)
        });
        if let Some(error) = error {
            readback.destroy();
            upload.destroy();
            return Err(Error::DeviceResourceCreationFailed {
                label: format!("{} staging", self.label),
                reason: describe(&error),
            });
        }

        logwise::trace_sync!(
            "TextureAsBuffer::init_staging {label}: {rows} rows of {row_bytes} bytes, stride {stride}",
            label = logwise::privacy::LogIt(&self.label),
            rows = pitch.rows,
            row_bytes = pitch.row_bytes,
            stride = pitch.padded_row_bytes
        );
        self.staging = Some(Staging {
            readback,
            upload,
            pitch,
            host: vec![0; pitch.logical_len()].into_boxed_slice(),
        });
        Ok(())
    }

    /// Copies the texture to the host and returns the tightly packed bytes.
    ///
    /// Drains the queue before the copy, so kernel output submitted earlier is
    /// visible.  Each call overwrites the previous contents.
    pub fn to_cpu(&mut self, context: &DeviceContext) -> Result<&[u8]> {
        let (resource, staging) = match (&self.resource, &mut self.staging) {
            (Some(resource), Some(staging)) => (resource, staging),
            _ => return Err(Error::NotInitialized("staging")),
        };
        let _interval = logwise::perfwarn_begin!("TextureAsBuffer::to_cpu");
        context.flush()?;

        let shape = self.shape;
        let pitch = staging.pitch;
        let ((), error) = context.capture(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("TextureAsBuffer::to_cpu"),
            });
            encoder.copy_texture_to_buffer(
                whole_texture(&resource.texture),
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging.readback,
                    layout: staging_layout(pitch, shape),
                },
                shape.extent(),
            );
            context.queue().submit(std::iter::once(encoder.finish()));
        });
        if let Some(error) = error {
            return Err(Error::TransferFailed(describe(&error)));
        }

        context.map(&staging.readback, wgpu::MapMode::Read)?;
        {
            let mapped = staging.readback.slice(..).get_mapped_range();
            unpad_rows(&mapped, pitch, &mut staging.host);
        }
        staging.readback.unmap();
        Ok(&staging.host)
    }

    /// Uploads tightly packed bytes to the texture.
    ///
    /// `data` must hold at least [`Self::logical_len`] bytes; only that many are
    /// used.  Returns once the texture holds the data.
    pub fn to_gpu(&mut self, context: &DeviceContext, data: &[u8]) -> Result<()> {
        let (resource, staging) = match (&self.resource, &self.staging) {
            (Some(resource), Some(staging)) => (resource, staging),
            _ => return Err(Error::NotInitialized("staging")),
        };
        if data.is_empty() {
            return Err(Error::NullInput);
        }
        let pitch = staging.pitch;
        let expected = pitch.logical_len();
        if data.len() < expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let _interval = logwise::perfwarn_begin!("TextureAsBuffer::to_gpu");

        context.map(&staging.upload, wgpu::MapMode::Write)?;
        {
            let mut mapped = staging.upload.slice(..).get_mapped_range_mut();
            pad_rows(&data[..expected], pitch, &mut mapped);
        }
        staging.upload.unmap();
        context.flush()?;

        let shape = self.shape;
        let ((), error) = context.capture(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("TextureAsBuffer::to_gpu"),
            });
            encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging.upload,
                    layout: staging_layout(pitch, shape),
                },
                whole_texture(&resource.texture),
                shape.extent(),
            );
            context.queue().submit(std::iter::once(encoder.finish()));
        });
        if let Some(error) = error {
            return Err(Error::TransferFailed(describe(&error)));
        }
        context.flush()
    }

    /// Fills every byte of the texture with `value`.
    pub fn fill_bytes(&mut self, context: &DeviceContext, value: u8) -> Result<()> {
        let len = self.staged_len()?;
        let data = vec![value; len];
        self.to_gpu(context, &data)
    }

    /// Repeats the little-endian bytes of `value` across the texture.  A
    /// logical size that is not a multiple of four ends mid-word.
    pub fn fill_words(&mut self, context: &DeviceContext, value: u32) -> Result<()> {
        let len = self.staged_len()?;
        let words = len.div_ceil(4);
        let data: Vec<u8> = std::iter::repeat_n(value.to_le_bytes(), words)
            .flatten()
            .collect();
        self.to_gpu(context, &data[..len])
    }

    /// Uploads typed texels.  `T` must encode this buffer's format.
    pub fn to_gpu_texels<T: Texel>(&mut self, context: &DeviceContext, texels: &[T]) -> Result<()> {
        self.check_texel::<T>()?;
        self.to_gpu(context, texels_as_bytes(texels))
    }

    /// Decodes the host buffer filled by the last [`Self::to_cpu`].
    pub fn texels<T: Texel>(&self) -> Result<Vec<T>> {
        self.check_texel::<T>()?;
        let staging = self
            .staging
            .as_ref()
            .ok_or(Error::NotInitialized("staging"))?;
        Ok(texels_from_bytes(&staging.host))
    }

    /// Releases views, texture, staging buffers and host buffer.  Safe to call
    /// any number of times, in any state.
    pub fn release(&mut self) {
        if let Some(staging) = self.staging.take() {
            staging.destroy();
        }
        if let Some(resource) = self.resource.take() {
            logwise::trace_sync!(
                "TextureAsBuffer::release {label}",
                label = logwise::privacy::LogIt(&self.label)
            );
            drop(resource.write_view);
            drop(resource.read_view);
            resource.texture.destroy();
        }
        self.format = None;
        self.shape = Shape::default();
    }

    /// `"channels height width"`; zeros when unallocated.
    pub fn shape_descriptor(&self) -> String {
        self.shape.to_string()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    /// Bytes per texel; 0 when unallocated.
    pub fn element_size(&self) -> usize {
        self.format.map_or(0, PixelFormat::element_size)
    }

    /// Size of the tightly packed host representation.
    pub fn logical_len(&self) -> usize {
        self.shape.logical_len(self.element_size())
    }

    pub fn row_pitch(&self) -> Option<RowPitch> {
        self.format
            .map(|format| RowPitch::new(self.shape, format.element_size()))
    }

    pub fn is_initialized(&self) -> bool {
        self.resource.is_some()
    }

    pub fn has_staging(&self) -> bool {
        self.staging.is_some()
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.resource.as_ref().map(|r| &r.texture)
    }

    pub fn read_view(&self) -> Option<&wgpu::TextureView> {
        self.resource.as_ref().map(|r| &r.read_view)
    }

    pub fn write_view(&self) -> Option<&wgpu::TextureView> {
        self.resource.as_ref().and_then(|r| r.write_view.as_ref())
    }

    fn staged_len(&self) -> Result<usize> {
        self.staging
            .as_ref()
            .map(|s| s.pitch.logical_len())
            .ok_or(Error::NotInitialized("staging"))
    }

    fn check_texel<T: Texel>(&self) -> Result<()> {
        let actual = self.format.ok_or(Error::NotInitialized("texture"))?;
        if actual != T::FORMAT {
            return Err(Error::FormatMismatch {
                requested: T::FORMAT,
                actual,
            });
        }
        Ok(())
    }
}

impl Drop for TextureAsBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

fn whole_texture(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

fn staging_layout(pitch: RowPitch, shape: Shape) -> wgpu::TexelCopyBufferLayout {
    wgpu::TexelCopyBufferLayout {
        offset: 0,
        bytes_per_row: Some(pitch.padded_row_bytes as u32),
        rows_per_image: Some(shape.height),
    }
}
