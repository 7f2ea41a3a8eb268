// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Loads and saves the pretrained CvT parameters.
//
// Two on-disk formats are understood:
//
//   *.pth / *.pt   — the original PyTorch state dict, read
//                    through burn-import's PyTorchFileRecorder
//                    with the key remapping below
//   *.mpk.gz       — Burn's named MessagePack + gzip record
//                    (full precision), written by `convert`
//
// A converted checkpoint directory looks like:
//
//   models/
//     model.mpk.gz        ← weights
//     model_config.json   ← LeukemiaCvtConfig used to build them
//
// Topology check: before anything is loaded, the parameter names
// and shapes the file supplies are compared with those of a
// freshly built model (see manifest.rs). A missing, extra or
// reshaped parameter fails the load, so a checkpoint for a
// different architecture never loads silently.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Burn Book — Importing PyTorch Models

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use regex::Regex;

use crate::domain::error::{ClassifierError, ClassifierResult};
use crate::infra::manifest::{self, ParamManifest};
use crate::ml::model::{LeukemiaCvt, LeukemiaCvtConfig};

/// Burn's compact MessagePack + gzip format, kept at full precision
/// so converted weights reproduce the original logits exactly.
type WeightRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// File names inside a converted checkpoint directory.
const WEIGHTS_STEM:   &str = "model";
const CONFIG_FILE:    &str = "model_config.json";
const COMPACT_SUFFIX: &str = ".mpk.gz";

/// PyTorch parameter names → field paths of `LeukemiaCvt`.
/// Applied in order; the `mlp` rules must run before the stage
/// prefixes are rewritten.
const PYTORCH_KEY_REMAP: [(&str, &str); 7] = [
    (r"^(.+)\.mlp\.0\.(.+)$",          "$1.mlp_in.$2"),
    (r"^(.+)\.mlp\.2\.(.+)$",          "$1.mlp_out.$2"),
    (r"^stage(\d)_embed\.(.+)$",       "stage$1.embed.$2"),
    (r"^stage(\d)_transformer\.(.+)$", "stage$1.transformer.$2"),
    (r"^se(\d)\.(.+)$",                "stage$1.recalibration.$2"),
    (r"^head\.0\.(.+)$",               "head.norm.$1"),
    (r"^head\.1\.(.+)$",               "head.fc.$1"),
];

/// The remap table compiled, in application order.
pub(crate) fn remap_rules() -> Result<Vec<(Regex, &'static str)>, regex::Error> {
    PYTORCH_KEY_REMAP
        .iter()
        .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
        .collect()
}

/// Which recorder a weight file needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFormat {
    PyTorch,
    Compact,
}

impl WeightFormat {
    pub fn detect(path: &Path) -> ClassifierResult<Self> {
        let name = path.to_string_lossy();
        if name.ends_with(COMPACT_SUFFIX) {
            return Ok(Self::Compact);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("pth") | Some("pt") => Ok(Self::PyTorch),
            _ => Err(ClassifierError::load(
                name,
                "unknown weight format, expected .pth, .pt or .mpk.gz",
            )),
        }
    }
}

/// Manages loading and saving of model checkpoints.
pub struct CheckpointManager {
    /// Directory holding converted weights and their config
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(format!("{WEIGHTS_STEM}{COMPACT_SUFFIX}"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Write weights and config into the checkpoint directory.
    pub fn save_model<B: Backend>(
        &self,
        model:  &LeukemiaCvt<B>,
        config: &LeukemiaCvtConfig,
    ) -> ClassifierResult<()> {
        let dir = self.dir.display().to_string();
        fs::create_dir_all(&self.dir).map_err(|e| ClassifierError::load(&dir, e.to_string()))?;

        // Recorder appends its own extension.
        WeightRecorder::new()
            .record(model.clone().into_record(), self.dir.join(WEIGHTS_STEM))
            .map_err(|e| ClassifierError::load(&dir, format!("cannot write weights: {e:?}")))?;

        let config_path = self.config_path();
        config
            .save(&config_path)
            .map_err(|e| ClassifierError::load(config_path.display().to_string(), e.to_string()))?;

        tracing::info!("Saved checkpoint to '{}'", dir);
        Ok(())
    }

    /// Load the config stored next to the weights, or the default
    /// architecture when the directory has none.
    pub fn load_config(&self) -> ClassifierResult<LeukemiaCvtConfig> {
        let path = self.config_path();
        if !path.exists() {
            tracing::debug!("No '{}', using default architecture", path.display());
            return Ok(LeukemiaCvtConfig::new());
        }
        Self::read_config(&path)
    }

    /// Read an architecture JSON and reject one the model cannot be
    /// built from.
    pub fn read_config(path: &Path) -> ClassifierResult<LeukemiaCvtConfig> {
        let shown  = path.display().to_string();
        let config = LeukemiaCvtConfig::load(path)
            .map_err(|e| ClassifierError::load(&shown, format!("{e:?}")))?;
        config
            .validate()
            .map_err(|e| ClassifierError::load(&shown, format!("invalid model config: {e}")))?;
        Ok(config)
    }

    /// Load weights from `path` into a model built from `config`.
    /// The file must supply exactly the parameters the model declares,
    /// with the same shapes.
    pub fn load_model<B: Backend>(
        path:   &Path,
        config: &LeukemiaCvtConfig,
        device: &B::Device,
    ) -> ClassifierResult<LeukemiaCvt<B>> {
        let shown = path.display().to_string();
        if !path.exists() {
            return Err(ClassifierError::load(&shown, "file not found"));
        }
        config
            .validate()
            .map_err(|e| ClassifierError::load(&shown, format!("invalid model config: {e}")))?;

        let format = WeightFormat::detect(path)?;
        tracing::info!("Loading {:?} weights from '{}'", format, shown);

        let reference: LeukemiaCvt<B> = config.init(device);
        let expected = manifest::of_module::<B, _>(&reference).map_err(|e| ClassifierError::load(&shown, e))?;

        let model = match format {
            WeightFormat::PyTorch => {
                let rules = remap_rules().map_err(|e| ClassifierError::load(&shown, e.to_string()))?;
                let supplied = manifest::of_pytorch_file(path, &rules, &expected)
                    .map_err(|e| ClassifierError::load(&shown, format!("cannot read state dict: {e}")))?;
                verify_topology(&shown, &expected, &supplied)?;

                let mut args = LoadArgs::new(path.to_path_buf());
                for (pattern, replacement) in PYTORCH_KEY_REMAP {
                    args = args.with_key_remap(pattern, replacement);
                }
                let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
                    .load(args, device)
                    .map_err(|e| ClassifierError::load(&shown, format!("{e:?}")))?;
                reference.load_record(record)
            }
            WeightFormat::Compact => {
                let supplied = manifest::of_compact_file(path)
                    .map_err(|e| ClassifierError::load(&shown, format!("cannot read record: {e}")))?;
                verify_topology(&shown, &expected, &supplied)?;

                let stem = shown.trim_end_matches(COMPACT_SUFFIX);
                let record = WeightRecorder::new()
                    .load(PathBuf::from(stem), device)
                    .map_err(|e| ClassifierError::load(&shown, format!("{e:?}")))?;
                reference.load_record(record)
            }
        };

        tracing::info!("Loaded {} parameters", model.num_params());
        Ok(model)
    }
}

/// Fail with the first few differences, if any.
fn verify_topology(path: &str, expected: &ParamManifest, supplied: &ParamManifest) -> ClassifierResult<()> {
    let problems = manifest::diff(expected, supplied);
    if problems.is_empty() {
        return Ok(());
    }
    for problem in &problems {
        tracing::debug!("'{}': {}", path, problem);
    }
    let shown: Vec<&str> = problems.iter().take(5).map(String::as_str).collect();
    Err(ClassifierError::load(
        path,
        format!("topology mismatch, {} problem(s): {}", problems.len(), shown.join("; ")),
    ))
}
