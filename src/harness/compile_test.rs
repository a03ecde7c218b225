// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Compiles a kernel from disk with workgroup-size defines.

use super::{Outcome, Report};
use crate::device::DeviceContext;
use crate::error::Result;
use crate::kernel::ComputeKernel;
use std::path::Path;

/// Default location of the kernel, relative to the working directory.
pub const ARRAY_SUM_PATH: &str = "shaders/array_sum.wgsl";

pub const DEFINES: [(&str, &str); 3] = [
    ("THREAD_GROUP_SIZE_X", "16"),
    ("THREAD_GROUP_SIZE_Y", "1"),
    ("THREAD_GROUP_SIZE_Z", "1"),
];

pub fn run(context: &DeviceContext, path: &Path, report: &mut Report) {
    println!("Running shader compile test...");
    report.record("SHADER_COMPILE", run_file(context, path));
}

pub fn run_file(context: &DeviceContext, path: &Path) -> Result<Outcome> {
    let mut kernel = ComputeKernel::compile_from_file(context, path, "main", &DEFINES)?;
    kernel.release();
    Ok(Outcome::Passed)
}
