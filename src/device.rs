// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device bring-up.

A [`DeviceContext`] owns the logical device and its submission queue.  Every other
type in the crate borrows one; none of them keeps a global.

```no_run
use texture_as_buffer::{DeviceConfig, DeviceContext};

let config = DeviceConfig::from_env().with_adapter_index(0);
let context = DeviceContext::init(&config)?;
println!("running on {}", context.adapter_name());
# Ok::<(), texture_as_buffer::Error>(())
```
*/

use crate::entry_point::EntryPoint;
use crate::error::{Error, Result};
use crate::pixel_formats::PixelFormat;
use std::fmt::Display;

/// Features requested when the adapter offers them.
///
/// * `TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES` enables storage access for the
///   8 and 16 bit formats and for 10/10/10/2.
/// * `FLOAT32_FILTERABLE` lets kernels sample R32 textures through a filtering
///   sampler.
/// * `TIMESTAMP_QUERY` backs [`crate::PerformanceCounter`].
const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES
    .union(wgpu::Features::FLOAT32_FILTERABLE)
    .union(wgpu::Features::TIMESTAMP_QUERY);

/// Which adapter to open and how to configure the backend instance.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Index into the backend's adapter list.
    pub adapter_index: usize,
    pub backends: wgpu::Backends,
    pub flags: wgpu::InstanceFlags,
}

impl DeviceConfig {
    /// Backend selection and instance flags from `WGPU_BACKEND`, `WGPU_DEBUG`
    /// and `WGPU_VALIDATION`; adapter 0.
    pub fn from_env() -> Self {
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        DeviceConfig {
            adapter_index: 0,
            backends: descriptor.backends,
            flags: descriptor.flags,
        }
    }

    pub fn with_adapter_index(mut self, adapter_index: usize) -> Self {
        self.adapter_index = adapter_index;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// One line of the adapter listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub index: usize,
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl Display for AdapterSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({:?}, {:?})",
            self.index, self.name, self.backend, self.device_type
        )
    }
}

/// Enumerates adapters without opening any of them.
pub fn list_adapters(config: &DeviceConfig) -> Vec<AdapterSummary> {
    let entry_point = EntryPoint::new(config);
    entry_point
        .adapters(config.backends)
        .iter()
        .enumerate()
        .map(|(index, adapter)| {
            let info = adapter.get_info();
            AdapterSummary {
                index,
                name: info.name,
                backend: info.backend,
                device_type: info.device_type,
            }
        })
        .collect()
}

/// The logical device and its queue.
///
/// Dropping the context releases the queue, then the device, then the instance.
#[derive(Debug)]
pub struct DeviceContext {
    queue: wgpu::Queue,
    device: wgpu::Device,
    adapter: wgpu::Adapter,
    info: wgpu::AdapterInfo,
    adapter_index: usize,
    shader_model: wgpu::ShaderModel,
    //instance must be dropped after the device
    _entry_point: EntryPoint,
}

impl DeviceContext {
    /// Opens the adapter at `config.adapter_index`.
    ///
    /// Fails with [`Error::AdapterNotFound`] when the index is past the end of the
    /// adapter list and with [`Error::DeviceCreationFailed`] when the adapter
    /// cannot run compute work or refuses to create a device.
    pub fn init(config: &DeviceConfig) -> Result<Self> {
        let entry_point = EntryPoint::new(config);
        let adapters = entry_point.adapters(config.backends);
        let count = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(Error::AdapterNotFound {
                index: config.adapter_index,
                count,
            })?;
        let info = adapter.get_info();
        logwise::info_sync!(
            "DeviceContext::init selected adapter {index} of {count}: {name} on {backend}",
            index = config.adapter_index,
            count = count,
            name = logwise::privacy::LogIt(&info.name),
            backend = logwise::privacy::LogIt(&info.backend)
        );

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(Error::DeviceCreationFailed(format!(
                "{} does not support compute shaders",
                info.name
            )));
        }

        let required_features = adapter.features() & OPTIONAL_FEATURES;
        let descriptor = wgpu::DeviceDescriptor {
            label: Some("texture_as_buffer device"),
            required_features,
            required_limits: adapter.limits(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        };
        let (device, queue) = test_executors::sleep_on(adapter.request_device(&descriptor))
            .map_err(|e| Error::DeviceCreationFailed(e.to_string()))?;
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            logwise::error_sync!(
                "uncaptured device error: {error}",
                error = logwise::privacy::LogIt(&error)
            );
        }));
        logwise::info_sync!(
            "DeviceContext::init features {features}",
            features = logwise::privacy::LogIt(&required_features)
        );

        Ok(DeviceContext {
            queue,
            device,
            adapter,
            info,
            adapter_index: config.adapter_index,
            shader_model: downlevel.shader_model,
            _entry_point: entry_point,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn adapter_name(&self) -> &str {
        &self.info.name
    }

    pub fn adapter_index(&self) -> usize {
        self.adapter_index
    }

    pub fn backend(&self) -> wgpu::Backend {
        self.info.backend
    }

    /// Capability tier reported by the adapter.
    pub fn shader_model(&self) -> wgpu::ShaderModel {
        self.shader_model
    }

    /// Features actually enabled on the device.
    pub fn features(&self) -> wgpu::Features {
        self.device.features()
    }

    pub fn supports_timestamps(&self) -> bool {
        self.features().contains(wgpu::Features::TIMESTAMP_QUERY)
    }

    /// Whether kernels on this device can write `format` through a storage
    /// texture.
    pub fn supports_storage(&self, format: PixelFormat) -> bool {
        let wgpu_format = format.wgpu_format();
        let format_features = if self
            .features()
            .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        {
            self.adapter.get_texture_format_features(wgpu_format)
        } else {
            wgpu_format.guaranteed_format_features(self.features())
        };
        format_features
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
    }

    /// Blocks until every submitted command has finished.
    pub fn flush(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| Error::TransferFailed(e.to_string()))
    }

    /// Maps all of `buffer` and blocks until the mapping is usable.
    pub(crate) fn map(&self, buffer: &wgpu::Buffer, mode: wgpu::MapMode) -> Result<()> {
        let (s, r) = r#continue::continuation();
        buffer.slice(..).map_async(mode, move |result| {
            s.send(result);
        });
        self.flush()?;
        test_executors::sleep_on(r).map_err(|e| Error::TransferFailed(e.to_string()))
    }

    /// Runs `op` inside out-of-memory, validation and internal error scopes and
    /// returns an error the device reported for it.
    ///
    /// Backends report shader translation failures as internal errors, so a
    /// pipeline that passed validation can still fail here.
    pub(crate) fn capture<T>(&self, op: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::Internal);
        let value = op(&self.device);
        let internal = test_executors::sleep_on(self.device.pop_error_scope());
        let validation = test_executors::sleep_on(self.device.pop_error_scope());
        let out_of_memory = test_executors::sleep_on(self.device.pop_error_scope());
        (value, validation.or(internal).or(out_of_memory))
    }

    /// Releases the queue and then the device.
    pub fn release(self) {
        logwise::info_sync!(
            "DeviceContext::release {name}",
            name = logwise::privacy::LogIt(&self.info.name)
        );
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_index_overrides_environment_default() {
        let config = DeviceConfig::from_env().with_adapter_index(3);
        assert_eq!(config.adapter_index, 3);
        assert_eq!(DeviceConfig::default().adapter_index, 0);
    }

    #[test]
    fn adapter_summary_display() {
        let summary = AdapterSummary {
            index: 1,
            name: "Test GPU".to_string(),
            backend: wgpu::Backend::Vulkan,
            device_type: wgpu::DeviceType::DiscreteGpu,
        };
        assert_eq!(summary.to_string(), "[1] Test GPU (Vulkan, DiscreteGpu)");
    }

    #[test]
    fn out_of_range_adapter_is_not_found() {
        let config = DeviceConfig::from_env().with_adapter_index(usize::MAX);
        match DeviceContext::init(&config) {
            Err(Error::AdapterNotFound { index, .. }) => assert_eq!(index, usize::MAX),
            other => panic!("expected AdapterNotFound, got {other:?}"),
        }
    }
}
