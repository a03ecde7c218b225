// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! tab_harness
//!
//! Opens one adapter and runs the texture-as-buffer round-trip tests on it.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use texture_as_buffer::harness::{self, compile_test::ARRAY_SUM_PATH};
use texture_as_buffer::{DeviceConfig, DeviceContext, list_adapters};

#[derive(Parser)]
#[command(name = "tab_harness")]
#[command(author, version, about = "Round-trip tests for textures used as buffers", long_about = None)]
struct Cli {
    /// Index of the adapter to run on
    #[arg(value_name = "ADAPTER", default_value_t = 0)]
    adapter: usize,

    /// Print the available adapters and exit
    #[arg(short, long)]
    list_adapters: bool,

    /// Kernel compiled by the shader compile test
    #[arg(long, value_name = "PATH", default_value = ARRAY_SUM_PATH)]
    shader: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = DeviceConfig::from_env().with_adapter_index(cli.adapter);

    if cli.list_adapters {
        for adapter in list_adapters(&config) {
            println!("{adapter}");
        }
        return ExitCode::SUCCESS;
    }

    let context = match DeviceContext::init(&config) {
        Ok(context) => context,
        Err(e) => {
            logwise::error_sync!(
                "device bring-up failed: {e}",
                e = logwise::privacy::LogIt(&e)
            );
            eprintln!("Compute shader execution failed! {e}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "Using adapter {} ({:?}, {:?})",
        context.adapter_name(),
        context.backend(),
        context.shader_model()
    );

    let report = harness::run_all(&context, &cli.shader);
    println!("{report}");
    ExitCode::SUCCESS
}
