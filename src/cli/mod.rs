// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `predict` — loads weights and classifies image files,
//                  printing one JSON object per image
//   2. `convert` — imports PyTorch weights into a Burn record
//   3. `summary` — architecture self-check, no weights needed
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use burn::prelude::*;
use clap::Parser;
use commands::{BackendKind, Commands, ConvertArgs, PredictArgs, SummaryArgs};

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::LeukemiaCvtConfig;

type CpuBackend = burn::backend::NdArray;

#[cfg(feature = "wgpu")]
type GpuBackend = burn::backend::Wgpu;

#[derive(Parser, Debug)]
#[command(
    name = "leukemia-cvt",
    version = "0.1.0",
    about = "Classify microscopic blood-cell images as Healthy or Leukemia with a CvT model."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Run `$body` with `$B` bound to the selected backend type and
/// `$device` to its default device.
macro_rules! with_backend {
    ($kind:expr, |$B:ident, $device:ident| $body:expr) => {
        match $kind {
            BackendKind::Cpu => {
                type $B = CpuBackend;
                let $device = <CpuBackend as Backend>::Device::default();
                $body
            }
            #[cfg(feature = "wgpu")]
            BackendKind::Gpu => {
                type $B = GpuBackend;
                let $device = burn::backend::wgpu::WgpuDevice::default();
                $body
            }
            #[cfg(not(feature = "wgpu"))]
            BackendKind::Gpu => {
                anyhow::bail!("GPU backend not compiled in; rebuild with --features wgpu")
            }
        }
    };
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Predict(args) => run_predict(args),
            Commands::Convert(args) => run_convert(args),
            Commands::Summary(args) => run_summary(args),
        }
    }
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::classify_use_case::{ClassifyConfig, ClassifyUseCase};

    with_backend!(args.backend, |B, device| {
        tracing::info!("Using {:?} backend on {:?}", args.backend, device);
        let use_case = ClassifyUseCase::<B>::start(&ClassifyConfig::from(&args), device)?;

        for image in &args.images {
            let response = use_case.classify_file(image)?;
            let json = if args.pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{json}");
        }
        Ok(())
    })
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    use crate::application::convert_use_case::ConvertUseCase;

    let backend = args.backend;
    let use_case = ConvertUseCase::new(args.into());

    with_backend!(backend, |B, device| {
        let written = use_case.execute::<B>(&device)?;
        println!("Converted weights written to {}", written.display());
        Ok(())
    })
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    use crate::application::summary_use_case::SummaryUseCase;

    let config = match &args.model_config {
        Some(path) => CheckpointManager::read_config(path)?,
        None => LeukemiaCvtConfig::new(),
    };

    let summary = SummaryUseCase::new(config, args.image_size)
        .execute::<CpuBackend>(&Default::default())?;

    println!("{:<6} {:>12} {:>10} {:>8} {:>7}", "stage", "channels", "grid", "tokens", "window");
    for s in &summary.stages {
        println!(
            "{:<6} {:>12} {:>10} {:>8} {:>7}",
            s.index,
            format!("{}→{}", s.channels.0, s.channels.1),
            format!("{}×{}", s.grid.0, s.grid.1),
            s.tokens,
            s.window_size,
        );
    }
    println!("\nParameters:   {}", summary.num_params);
    println!("Logits shape: {:?}", summary.logits_shape);
    Ok(())
}
