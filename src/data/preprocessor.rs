// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns raw encoded bytes into the normalised planar float
// buffer the network expects.
//
// Steps, in order:
//   1. Sniff the container format — only BMP, JPEG and PNG
//      are accepted
//   2. Decode into an image
//   3. Convert to 8-bit RGB (drops alpha, expands grayscale)
//   4. Resize to image_size × image_size (bilinear)
//   5. Scale to [0, 1] then normalise each channel with
//      (value - mean[c]) / std[c]
//   6. Lay out channel-major: [3, H, W]
//
// The mean/std pair MUST be the statistics the parameters
// were learned with. A mismatch does not raise any error,
// it silently degrades accuracy.
//
// Reference: image crate docs (DynamicImage, imageops)

use burn::config::Config;
use image::{imageops::FilterType, DynamicImage, ImageFormat};

use crate::domain::error::{ClassifierError, ClassifierResult};

/// Preprocessing parameters. Defaults are the ImageNet statistics
/// at 224×224, which the pretrained CvT weights expect.
#[derive(Config, Debug)]
pub struct PreprocessConfig {
    #[config(default = 224)]
    pub image_size: u32,
    #[config(default = "[0.485, 0.456, 0.406]")]
    pub mean: [f32; 3],
    #[config(default = "[0.229, 0.224, 0.225]")]
    pub std: [f32; 3],
}

/// A decoded, resized, normalised image in [C, H, W] order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedImage {
    pub data:   Vec<f32>,
    pub height: usize,
    pub width:  usize,
}

impl PreprocessedImage {
    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.height, self.width]
    }
}

/// Formats the classifier accepts.
const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Bmp, ImageFormat::Jpeg, ImageFormat::Png];

pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline on encoded bytes.
    pub fn preprocess(&self, bytes: &[u8]) -> ClassifierResult<PreprocessedImage> {
        let img = self.decode(bytes)?;
        Ok(self.normalise(img))
    }

    /// Decode bytes, rejecting anything outside BMP/JPEG/PNG.
    pub fn decode(&self, bytes: &[u8]) -> ClassifierResult<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifierError::decode("empty input"));
        }

        let format = image::guess_format(bytes)
            .map_err(|e| ClassifierError::decode(format!("unrecognised image format: {e}")))?;

        if !SUPPORTED_FORMATS.contains(&format) {
            tracing::warn!("Rejected image in unsupported format {:?}", format);
            return Err(ClassifierError::decode(format!(
                "unsupported format {format:?}, expected BMP, JPEG or PNG"
            )));
        }

        image::load_from_memory_with_format(bytes, format)
            .map_err(|e| ClassifierError::decode(format!("{format:?}: {e}")))
    }

    /// Convert a decoded image into the network input layout.
    pub fn normalise(&self, img: DynamicImage) -> PreprocessedImage {
        let size = self.config.image_size;
        // Drop alpha and extra bit depth before resampling.
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8())
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();

        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let plane = w * h;
        let mut data = vec![0.0f32; 3 * plane];

        // Planar layout: all R values, then all G, then all B.
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let v = pixel[c] as f32 / 255.0;
                data[c * plane + i] = (v - self.config.mean[c]) / self.config.std[c];
            }
        }

        PreprocessedImage { data, height: h, width: w }
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(PreprocessConfig::new())
    }
}
