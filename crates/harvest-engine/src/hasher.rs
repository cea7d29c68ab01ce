use anyhow::{anyhow, Context};
use async_trait::async_trait;
use image::imageops::FilterType;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;

use harvest_core::models::{FileHashes, FileMetadata, MediaType};
use harvest_core::SourceError;

/// Computes content and perceptual hashes for a file.
///
/// Errors concern one asset and never abort a cycle. A transient error skips
/// the media until the next cycle; a fatal one means the asset cannot be
/// fetched at all and is recorded as a processing failure.
#[async_trait]
pub trait MediaHasher: Send + Sync {
    async fn hash(&self, file: &FileMetadata) -> Result<FileHashes, SourceError>;
}

/// Downloads the asset, computes its SHA-256 digest and, for decodable
/// images, a 64-bit difference hash.
#[derive(Clone, Debug)]
pub struct Sha256Hasher {
    http_client: Client,
}

impl Sha256Hasher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for hashing")?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl MediaHasher for Sha256Hasher {
    #[tracing::instrument(skip(self, file), fields(asset_url = %file.asset_url))]
    async fn hash(&self, file: &FileMetadata) -> Result<FileHashes, SourceError> {
        let response = self
            .http_client
            .get(&file.asset_url)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", file.asset_url))
            .map_err(SourceError::transient)?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::GONE
        ) {
            return Err(SourceError::fatal(anyhow!(
                "Asset {} refused: {}",
                file.asset_url,
                status
            )));
        }
        if !status.is_success() {
            return Err(SourceError::transient(anyhow!(
                "Download of {} returned {}",
                file.asset_url,
                status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Download of {} interrupted", file.asset_url))
            .map_err(SourceError::transient)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = hex::encode(hasher.finalize());

        let phash = if file.resolved_media_type() == Some(MediaType::Image) {
            let content = bytes.clone();
            tokio::task::spawn_blocking(move || difference_hash(&content))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Perceptual hashing task failed");
                    None
                })
        } else {
            None
        };

        tracing::debug!(bytes = bytes.len(), perceptual = phash.is_some(), "Asset hashed");

        Ok(FileHashes {
            sha256: Some(sha256),
            phash,
        })
    }
}

/// Difference hash: the image is shrunk to 9x8 grey pixels and each of the 64
/// bits tells whether a pixel is brighter than its right neighbour. `None`
/// when the bytes are not a decodable image.
pub fn difference_hash(content: &[u8]) -> Option<String> {
    let image = match image::load_from_memory(content) {
        Ok(image) => image,
        Err(e) => {
            tracing::debug!(error = %e, "Not a decodable image, no perceptual hash");
            return None;
        }
    };
    let small = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();

    let mut bits: u64 = 0;
    for y in 0..8 {
        for x in 0..8 {
            bits <<= 1;
            if small.get_pixel(x, y).0[0] > small.get_pixel(x + 1, y).0[0] {
                bits |= 1;
            }
        }
    }
    Some(format!("{:016x}", bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    /// PNG whose brightness follows `shade` along the x axis.
    fn gradient_png(shade: impl Fn(u32) -> u8) -> Vec<u8> {
        let image = GrayImage::from_fn(90, 80, |x, _| Luma([shade(x)]));
        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn hashes_downloaded_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.jpg")
            .with_status(200)
            .with_body("abc")
            .create_async()
            .await;

        let hasher = Sha256Hasher::new(Duration::from_secs(5)).unwrap();
        let file = FileMetadata::new(format!("{}/a.jpg", server.url()));
        let hashes = hasher.hash(&file).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            hashes.sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        // "abc" does not decode as an image
        assert!(hashes.phash.is_none());
    }

    #[tokio::test]
    async fn images_get_a_perceptual_hash() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_body(gradient_png(|x| (x * 2) as u8))
            .create_async()
            .await;
        server
            .mock("GET", "/b.mp4")
            .with_status(200)
            .with_body(gradient_png(|x| (x * 2) as u8))
            .create_async()
            .await;

        let hasher = Sha256Hasher::new(Duration::from_secs(5)).unwrap();
        let image = hasher
            .hash(&FileMetadata::new(format!("{}/a.png", server.url())))
            .await
            .unwrap();
        assert_eq!(image.phash.as_deref(), Some("0000000000000000"));

        let video = hasher
            .hash(&FileMetadata::new(format!("{}/b.mp4", server.url())))
            .await
            .unwrap();
        assert!(video.sha256.is_some());
        assert!(video.phash.is_none());
    }

    #[test]
    fn difference_hash_tells_images_apart() {
        let brightening = difference_hash(&gradient_png(|x| (x * 2) as u8)).unwrap();
        let darkening = difference_hash(&gradient_png(|x| 255 - (x * 2) as u8)).unwrap();
        assert_eq!(brightening.len(), 16);
        assert_ne!(brightening, darkening);
        assert!(difference_hash(b"not an image").is_none());
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.jpg")
            .with_status(503)
            .create_async()
            .await;

        let hasher = Sha256Hasher::new(Duration::from_secs(5)).unwrap();
        let file = FileMetadata::new(format!("{}/a.jpg", server.url()));
        let err = hasher.hash(&file).await.unwrap_err();
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn refused_asset_cannot_be_hashed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/a.jpg")
            .with_status(403)
            .create_async()
            .await;

        let hasher = Sha256Hasher::new(Duration::from_secs(5)).unwrap();
        let file = FileMetadata::new(format!("{}/a.jpg", server.url()));
        let err = hasher.hash(&file).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("refused"));
    }
}
