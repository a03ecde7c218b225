// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend instance and adapter enumeration.

use crate::device::DeviceConfig;

/// Owns the backend instance that adapters are enumerated from.
///
/// Devices created from an adapter must not outlive the instance, so
/// [`crate::DeviceContext`] keeps its entry point alive alongside the device.
#[derive(Debug)]
pub struct EntryPoint(pub(crate) wgpu::Instance);

impl EntryPoint {
    pub fn new(config: &DeviceConfig) -> Self {
        let mut descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        descriptor.backends = config.backends;
        descriptor.flags = config.flags;
        logwise::trace_sync!(
            "EntryPoint::new backends={backends}",
            backends = logwise::privacy::LogIt(&config.backends)
        );
        EntryPoint(wgpu::Instance::new(&descriptor))
    }

    /// Physical adapters in the backend's order.  Indices into this list are
    /// what [`DeviceConfig::adapter_index`] selects.
    pub fn adapters(&self, backends: wgpu::Backends) -> Vec<wgpu::Adapter> {
        self.0.enumerate_adapters(backends)
    }
}
