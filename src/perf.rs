// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Start/stop timing of device work.
//!
//! With `TIMESTAMP_QUERY` enabled the counter records device timestamps; without
//! it, host wall-clock time between two queue drains.

use crate::device::DeviceContext;
use crate::error::{Error, Result, describe};
use std::time::Instant;

const TIMESTAMP_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

#[derive(Debug)]
enum Timing {
    Timestamps {
        query_set: wgpu::QuerySet,
        //QUERY_RESOLVE | COPY_SRC
        resolve: wgpu::Buffer,
        //MAP_READ | COPY_DST
        readback: wgpu::Buffer,
    },
    WallClock,
}

#[derive(Debug, Clone, Copy)]
enum Started {
    Device,
    Host(Instant),
}

#[derive(Debug)]
pub struct PerformanceCounter {
    timing: Timing,
    started: Option<Started>,
}

impl PerformanceCounter {
    pub fn init(context: &DeviceContext) -> Result<Self> {
        if !context.supports_timestamps() {
            logwise::info_sync!("PerformanceCounter::init using wall-clock timing");
            return Ok(PerformanceCounter {
                timing: Timing::WallClock,
                started: None,
            });
        }
        let (timing, error) = context.capture(|device| Timing::Timestamps {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("PerformanceCounter"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            }),
            resolve: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("PerformanceCounter resolve"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("PerformanceCounter readback"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        });
        if let Some(error) = error {
            return Err(Error::DeviceResourceCreationFailed {
                label: "PerformanceCounter".to_string(),
                reason: describe(&error),
            });
        }
        Ok(PerformanceCounter {
            timing,
            started: None,
        })
    }

    pub fn uses_timestamps(&self) -> bool {
        matches!(self.timing, Timing::Timestamps { .. })
    }

    /// Marks the start of the measured interval.  Restarting discards the
    /// previous start.
    pub fn start(&mut self, context: &DeviceContext) -> Result<()> {
        self.started = Some(match &self.timing {
            Timing::Timestamps { query_set, .. } => {
                write_timestamp(context, query_set, 0)?;
                Started::Device
            }
            Timing::WallClock => {
                context.flush()?;
                Started::Host(Instant::now())
            }
        });
        Ok(())
    }

    /// Milliseconds since [`Self::start`], including all work submitted in
    /// between.  Fails with [`Error::NotInitialized`] when not started.
    pub fn stop(&mut self, context: &DeviceContext) -> Result<f64> {
        let started = self
            .started
            .take()
            .ok_or(Error::NotInitialized("timer"))?;
        match (&self.timing, started) {
            (
                Timing::Timestamps {
                    query_set,
                    resolve,
                    readback,
                },
                Started::Device,
            ) => {
                write_timestamp(context, query_set, 1)?;
                let mut encoder = context
                    .device()
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("PerformanceCounter resolve"),
                    });
                encoder.resolve_query_set(query_set, 0..2, resolve, 0);
                encoder.copy_buffer_to_buffer(resolve, 0, readback, 0, TIMESTAMP_BYTES);
                context.queue().submit(std::iter::once(encoder.finish()));

                context.map(readback, wgpu::MapMode::Read)?;
                let (begin, end) = {
                    let mapped = readback.slice(..).get_mapped_range();
                    let mut words = mapped
                        .chunks_exact(8)
                        .map(|b| u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]));
                    (words.next().unwrap_or(0), words.next().unwrap_or(0))
                };
                readback.unmap();
                let period_ns = context.queue().get_timestamp_period() as f64;
                Ok(ticks_to_ms(begin, end, period_ns))
            }
            (_, Started::Host(at)) => {
                context.flush()?;
                Ok(at.elapsed().as_secs_f64() * 1000.0)
            }
            (Timing::WallClock, Started::Device) => Err(Error::NotInitialized("timer")),
        }
    }
}

/// Records a timestamp after all previously submitted work.
fn write_timestamp(context: &DeviceContext, query_set: &wgpu::QuerySet, index: u32) -> Result<()> {
    let ((), error) = context.capture(|device| {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("PerformanceCounter timestamp"),
        });
        encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("PerformanceCounter timestamp"),
            timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                query_set,
                beginning_of_pass_write_index: Some(index),
                end_of_pass_write_index: None,
            }),
        });
        context.queue().submit(std::iter::once(encoder.finish()));
    });
    match error {
        Some(error) => Err(Error::TransferFailed(describe(&error))),
        None => Ok(()),
    }
}

fn ticks_to_ms(begin: u64, end: u64, period_ns: f64) -> f64 {
    end.saturating_sub(begin) as f64 * period_ns / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_scale_by_period() {
        assert_eq!(ticks_to_ms(1_000, 2_001_000, 1.0), 2.0);
        assert_eq!(ticks_to_ms(0, 1_000_000, 0.5), 0.5);
    }

    #[test]
    fn reversed_ticks_clamp_to_zero() {
        assert_eq!(ticks_to_ms(10, 5, 1.0), 0.0);
    }
}
