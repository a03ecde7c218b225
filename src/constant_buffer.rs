// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Small uniform buffers for kernel parameters.

use crate::device::DeviceContext;
use crate::error::{Error, Result, describe};

/// Uniform buffer sizes are rounded up to this.
const UNIFORM_ALIGNMENT: usize = 16;

/// A uniform buffer holding `size` bytes of kernel parameters.
#[derive(Debug)]
pub struct ConstantBuffer {
    label: String,
    size: usize,
    buffer: Option<wgpu::Buffer>,
}

impl ConstantBuffer {
    /// Creates a zeroed uniform buffer.  Fails with [`Error::EmptyInput`] when
    /// `size` is 0.
    pub fn init(context: &DeviceContext, label: impl Into<String>, size: usize) -> Result<Self> {
        let label = label.into();
        if size == 0 {
            return Err(Error::EmptyInput("constant buffer"));
        }
        let (buffer, error) = context.capture(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&label),
                size: padded_len(size) as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        if let Some(error) = error {
            buffer.destroy();
            return Err(Error::DeviceResourceCreationFailed {
                label,
                reason: describe(&error),
            });
        }
        Ok(ConstantBuffer {
            label,
            size,
            buffer: Some(buffer),
        })
    }

    /// Queues a write of exactly [`Self::size`] bytes.  The write lands before
    /// the next submitted dispatch.
    pub fn to_gpu(&self, context: &DeviceContext, data: &[u8]) -> Result<()> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or(Error::NotInitialized("constant buffer"))?;
        if data.len() != self.size {
            return Err(Error::SizeMismatch {
                expected: self.size,
                actual: data.len(),
            });
        }
        let mut padded = vec![0; padded_len(self.size)];
        padded[..data.len()].copy_from_slice(data);
        context.queue().write_buffer(buffer, 0, &padded);
        Ok(())
    }

    pub fn release(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            logwise::trace_sync!(
                "ConstantBuffer::release {label}",
                label = logwise::privacy::LogIt(&self.label)
            );
            buffer.destroy();
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffer.as_ref()
    }
}

impl Drop for ConstantBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

fn padded_len(size: usize) -> usize {
    size.next_multiple_of(UNIFORM_ALIGNMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_round_to_sixteen() {
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(20), 32);
    }
}
