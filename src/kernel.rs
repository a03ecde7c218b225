// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Compute kernels.

A [`ComputeKernel`] is compiled from WGSL source with one entry point and optional
defines.  Defines are textual: every whole identifier equal to a define's name is
replaced by its value before compilation, outside `//` comments.  This is how a
single kernel template is specialised per pixel format.

```no_run
use texture_as_buffer::{ComputeKernel, DeviceConfig, DeviceContext};

let context = DeviceContext::init(&DeviceConfig::from_env())?;
let kernel = ComputeKernel::compile(
    &context,
    "@compute @workgroup_size(SIZE) fn main() {}",
    "main",
    &[("SIZE", "64")],
)?;
assert!(kernel.is_compiled());
# Ok::<(), texture_as_buffer::Error>(())
```
*/

use crate::constant_buffer::ConstantBuffer;
use crate::device::DeviceContext;
use crate::error::{Error, Result, describe};
use crate::texture::{Shape, TextureAsBuffer};
use std::path::Path;

/// What a kernel slot is bound to.
#[derive(Debug, Clone, Copy)]
pub enum Binding<'a> {
    /// The buffer's read view, for `texture_2d_array<f32>`.
    Read(&'a TextureAsBuffer),
    /// The buffer's write view, for `texture_storage_2d_array<_, write>`.
    Write(&'a TextureAsBuffer),
    /// A uniform buffer.
    Constants(&'a ConstantBuffer),
}

#[derive(Debug)]
struct Compiled {
    pipeline: wgpu::ComputePipeline,
    //kept for the lifetime of the pipeline
    _module: wgpu::ShaderModule,
}

/// A compiled compute pipeline with a single entry point.
#[derive(Debug)]
pub struct ComputeKernel {
    entry_point: String,
    compiled: Option<Compiled>,
}

impl ComputeKernel {
    /// Compiles `source` after applying `defines`.
    ///
    /// * [`Error::EmptyInput`] when the source or the entry point is empty.
    /// * [`Error::CompileError`] with the compiler's diagnostics when the source
    ///   is rejected.
    /// * [`Error::KernelCreationFailed`] when the source compiles but no pipeline
    ///   can be made from it, e.g. the entry point does not exist.
    pub fn compile(
        context: &DeviceContext,
        source: &str,
        entry_point: &str,
        defines: &[(&str, &str)],
    ) -> Result<Self> {
        if source.trim().is_empty() {
            return Err(Error::EmptyInput("kernel source"));
        }
        if entry_point.is_empty() {
            return Err(Error::EmptyInput("entry point"));
        }
        let source = apply_defines(source, defines);

        let (module, error) = context.capture(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(entry_point),
                source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
            })
        });
        if let Some(error) = error {
            let mut diagnostics = describe(&error);
            if diagnostics.trim().is_empty() {
                diagnostics = "the shader compiler rejected the source".to_string();
            }
            logwise::error_sync!(
                "ComputeKernel::compile {entry}: {diagnostics}",
                entry = logwise::privacy::LogIt(&entry_point),
                diagnostics = logwise::privacy::LogIt(&diagnostics)
            );
            return Err(Error::CompileError(diagnostics));
        }

        let (pipeline, error) = context.capture(|device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: None,
                module: &module,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        });
        if let Some(error) = error {
            return Err(Error::KernelCreationFailed(describe(&error)));
        }

        logwise::info_sync!(
            "ComputeKernel::compile {entry} ok",
            entry = logwise::privacy::LogIt(&entry_point)
        );
        Ok(ComputeKernel {
            entry_point: entry_point.to_string(),
            compiled: Some(Compiled {
                pipeline,
                _module: module,
            }),
        })
    }

    /// Reads WGSL from `path` and compiles it.
    ///
    /// Fails with [`Error::FileReadError`] when the file cannot be read or is
    /// empty.
    pub fn compile_from_file(
        context: &DeviceContext,
        path: impl AsRef<Path>,
        entry_point: &str,
        defines: &[(&str, &str)],
    ) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| Error::FileReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if source.trim().is_empty() {
            return Err(Error::FileReadError {
                path: path.to_path_buf(),
                reason: "file is empty".to_string(),
            });
        }
        Self::compile(context, &source, entry_point, defines)
    }

    /// Binds `bindings` into group 0 at their slot indices and submits one
    /// dispatch of `workgroups`.
    ///
    /// Does not wait for the work to finish; the next transfer drains the queue.
    pub fn dispatch(
        &self,
        context: &DeviceContext,
        bindings: &[(u32, Binding<'_>)],
        workgroups: (u32, u32, u32),
    ) -> Result<()> {
        let compiled = self
            .compiled
            .as_ref()
            .ok_or(Error::NotInitialized("kernel"))?;

        let mut entries = Vec::with_capacity(bindings.len());
        for (slot, binding) in bindings {
            let resource = match binding {
                Binding::Read(tab) => wgpu::BindingResource::TextureView(
                    tab.read_view().ok_or(Error::NotInitialized("texture"))?,
                ),
                Binding::Write(tab) => {
                    if !tab.is_initialized() {
                        return Err(Error::NotInitialized("texture"));
                    }
                    wgpu::BindingResource::TextureView(
                        tab.write_view()
                            .ok_or_else(|| Error::ViewUnavailable(tab.label().to_string()))?,
                    )
                }
                Binding::Constants(constants) => constants
                    .buffer()
                    .ok_or(Error::NotInitialized("constant buffer"))?
                    .as_entire_binding(),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: *slot,
                resource,
            });
        }

        let label = self.entry_point.as_str();
        let ((), error) = context.capture(|device| {
            let layout = compiled.pipeline.get_bind_group_layout(0);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &entries,
            });
            let mut encoder =
                device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(label),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&compiled.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(workgroups.0, workgroups.1, workgroups.2);
            }
            context.queue().submit(std::iter::once(encoder.finish()));
        });
        match error {
            Some(error) => Err(Error::DispatchFailed(describe(&error))),
            None => Ok(()),
        }
    }

    /// Frees the pipeline.  Idempotent.
    pub fn release(&mut self) {
        self.compiled = None;
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn pipeline(&self) -> Option<&wgpu::ComputePipeline> {
        self.compiled.as_ref().map(|c| &c.pipeline)
    }
}

/// Replaces whole identifiers named by `defines` with their values.
///
/// Text after `//` on a line is left alone, as are identifiers that merely
/// contain a define's name.  Replacements are not scanned again.  When a name is
/// defined twice the last definition wins.
pub fn apply_defines(source: &str, defines: &[(&str, &str)]) -> String {
    if defines.is_empty() {
        return source.to_string();
    }
    let mut out = String::with_capacity(source.len());
    for (n, line) in source.split('\n').enumerate() {
        if n > 0 {
            out.push('\n');
        }
        let (code, comment) = match line.find("//") {
            Some(at) => line.split_at(at),
            None => (line, ""),
        };
        substitute_line(code, defines, &mut out);
        out.push_str(comment);
    }
    out
}

fn substitute_line(code: &str, defines: &[(&str, &str)], out: &mut String) {
    let bytes = code.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &code[start..i];
            match defines.iter().rev().find(|(name, _)| *name == word) {
                Some((_, value)) => out.push_str(value),
                None => out.push_str(word),
            }
        } else if b.is_ascii_digit() {
            //numeric literals such as 16u or 1e5 are a single token
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.') {
                i += 1;
            }
            out.push_str(&code[start..i]);
        } else {
            let ch_len = code[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&code[i..i + ch_len]);
            i += ch_len;
        }
    }
}

/// Workgroup counts covering every texel of `shape` with `tile.0 × tile.1 × 1`
/// groups: columns on x, rows on y, one channel per z.
///
/// A zero tile dimension yields an empty grid.
pub fn workgroups_for(shape: Shape, tile: (u32, u32)) -> (u32, u32, u32) {
    if tile.0 == 0 || tile.1 == 0 {
        return (0, 0, 0);
    }
    (
        shape.width.div_ceil(tile.0),
        shape.height.div_ceil(tile.1),
        shape.channels,
    )
}
