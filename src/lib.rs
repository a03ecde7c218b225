/*! texture_as_buffer stores typed multi-channel 2D arrays in GPU array textures and moves
them between host and device memory.

A buffer of shape `channels × height × width` lives in one 2D array texture with one
layer per channel.  Kernels read it through a sampled view and write it through a
storage view; the host sees it as a tightly packed byte buffer.

| Type                | Role                                                                 |
|---------------------|----------------------------------------------------------------------|
| [`DeviceContext`]   | Opens one adapter; owns the device and its queue                     |
| [`PixelFormat`]     | The six supported encodings and their [`FormatTraits`]               |
| [`TextureAsBuffer`] | Texture, views, staging and host buffer for one array                |
| [`ComputeKernel`]   | A WGSL kernel compiled with textual defines                          |
| [`ConstantBuffer`]  | Uniform parameters for a kernel                                      |
| [`PerformanceCounter`] | Start/stop timing of device work                                  |

# Transfers

Staging copies pad every row to [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`].  The host
buffer never carries that padding: [`TextureAsBuffer::to_cpu`] and
[`TextureAsBuffer::to_gpu`] copy `height * channels` rows one at a time between the two
layouts.  Both calls drain the queue, so they are also the synchronization points for
kernel dispatches.

# Harness

The [`harness`] module runs the round-trip drivers that the `tab_harness` binary
exposes: a write test and a read test per format, and a kernel compile test.

# Backends

Everything runs on [wgpu](https://wgpu.rs).  Backend selection follows the usual
`WGPU_BACKEND` environment variable, see [`DeviceConfig::from_env`].
*/

pub mod constant_buffer;
pub mod device;
mod entry_point;
pub mod error;
pub mod harness;
pub mod kernel;
pub mod perf;
pub mod pixel_formats;
pub mod texture;

pub use constant_buffer::ConstantBuffer;
pub use device::{AdapterSummary, DeviceConfig, DeviceContext, list_adapters};
pub use error::{Error, Result};
pub use kernel::{Binding, ComputeKernel, apply_defines, workgroups_for};
pub use perf::PerformanceCounter;
pub use pixel_formats::{ChannelLayout, FormatTraits, PixelFormat, Texel};
pub use texture::{RowPitch, Shape, TextureAsBuffer};
