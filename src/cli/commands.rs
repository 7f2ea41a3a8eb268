// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `predict`, `convert` and
// `summary`, and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{classify_use_case::ClassifyConfig, convert_use_case::ConvertConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify one or more blood-cell images
    Predict(PredictArgs),

    /// Import PyTorch weights and save them as a Burn record
    Convert(ConvertArgs),

    /// Print the architecture and run a dummy forward pass
    Summary(SummaryArgs),
}

/// Tensor backend to run on.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// NdArray on the CPU
    #[default]
    Cpu,
    /// WGPU (requires the `wgpu` feature)
    Gpu,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Weight file: PyTorch state dict (.pth/.pt) or Burn record (.mpk.gz)
    #[arg(long, default_value = "models/model_weights.pth")]
    pub weights: PathBuf,

    /// Image file(s) to classify (.bmp, .jpeg or .png)
    #[arg(long = "image", required = true, num_args = 1..)]
    pub images: Vec<PathBuf>,

    /// Architecture JSON; defaults to model_config.json next to the weights
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    /// Preprocessing JSON (image size, mean, std); defaults to ImageNet statistics
    #[arg(long)]
    pub preprocess_config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,

    /// Print indented JSON
    #[arg(long)]
    pub pretty: bool,
}

impl From<&PredictArgs> for ClassifyConfig {
    fn from(a: &PredictArgs) -> Self {
        ClassifyConfig {
            weights:           a.weights.clone(),
            model_config:      a.model_config.clone(),
            preprocess_config: a.preprocess_config.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// PyTorch state dict to import
    #[arg(long, default_value = "models/model_weights.pth")]
    pub weights: PathBuf,

    /// Directory to write model.mpk.gz and model_config.json into
    #[arg(long, default_value = "models")]
    pub out_dir: PathBuf,

    /// Architecture JSON; defaults to the built-in architecture
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    pub backend: BackendKind,
}

impl From<ConvertArgs> for ConvertConfig {
    fn from(a: ConvertArgs) -> Self {
        ConvertConfig {
            weights:      a.weights,
            out_dir:      a.out_dir,
            model_config: a.model_config,
        }
    }
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    /// Square input resolution to check against every stage
    #[arg(long, default_value_t = 224)]
    pub image_size: usize,

    /// Architecture JSON; defaults to the built-in architecture
    #[arg(long)]
    pub model_config: Option<PathBuf>,
}
