//! Image transformation: fetch, recompress, persist, return a locator.
//!
//! The production transform downloads the source image over HTTP,
//! re-encodes it as JPEG at half quality, and writes it to the served
//! output directory. The decode/encode runs on the blocking pool so a
//! large image never stalls the worker's async executor.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use uuid::Uuid;

/// JPEG quality for re-encoded outputs (half of the usual 100 scale).
const OUTPUT_JPEG_QUALITY: u8 = 50;

/// HTTP timeout for fetching a source image.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for a failed unit transform.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The source image could not be fetched (network, DNS, timeout).
    #[error("Failed to fetch source image: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The source URL answered with a non-2xx status.
    #[error("Source image URL returned HTTP {0}")]
    HttpStatus(u16),

    /// The fetched bytes are not a decodable image, or re-encoding
    /// failed.
    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Writing the output file failed.
    #[error("Failed to write output image: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking encode task was cancelled or panicked.
    #[error("Image encode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The per-unit processing capability. Mocked in the pipeline tests.
#[async_trait]
pub trait ImageTransformer: Send + Sync + 'static {
    /// Process one source image and return the public URL of the
    /// transformed output.
    async fn transform(&self, input_url: &str) -> Result<String, TransformError>;
}

// ---------------------------------------------------------------------------
// HTTP transformer
// ---------------------------------------------------------------------------

/// Production [`ImageTransformer`]: HTTP fetch, JPEG recompression at
/// quality 50, output written to a locally served directory.
pub struct HttpImageTransformer {
    client: reqwest::Client,
    output_dir: PathBuf,
    base_url: String,
}

impl HttpImageTransformer {
    /// Create a transformer writing outputs under `output_dir`, served
    /// at `{base_url}/processed/`. Creates the directory if needed.
    pub fn new(output_dir: PathBuf, base_url: &str) -> Result<Self, TransformError> {
        std::fs::create_dir_all(&output_dir)?;
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            output_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageTransformer for HttpImageTransformer {
    async fn transform(&self, input_url: &str) -> Result<String, TransformError> {
        let response = self.client.get(input_url).send().await?;
        if !response.status().is_success() {
            return Err(TransformError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;

        let file_name = format!("{}.jpg", Uuid::new_v4());
        let path = self.output_dir.join(&file_name);

        // Decode and re-encode off the async executor.
        tokio::task::spawn_blocking(move || -> Result<(), TransformError> {
            let decoded = image::load_from_memory(&bytes)?;
            // JPEG has no alpha channel; flatten before encoding.
            let rgb = decoded.into_rgb8();
            let mut file = std::fs::File::create(&path)?;
            let encoder = JpegEncoder::new_with_quality(&mut file, OUTPUT_JPEG_QUALITY);
            rgb.write_with_encoder(encoder)?;
            Ok(())
        })
        .await??;

        Ok(format!("{}/processed/{}", self.base_url, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let dir = std::env::temp_dir().join("batchpix-transform-test");
        let t = HttpImageTransformer::new(dir, "http://localhost:3000/").unwrap();
        assert_eq!(t.base_url, "http://localhost:3000");
    }
}
