//! # sm-storage-local
//! Local filesystem implementation of `MediaStore`.
//! Features: Content-addressable storage, directory sharding, and decode checks.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use image::ImageReader;
use sha2::{Digest, Sha256};
use sm_core::traits::MediaStore;
use std::io::Cursor;
use std::path::PathBuf;
use tokio::fs;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Self { root_path: root, url_prefix }
    }

    /// "ab/cd" for a media id starting with "abcd".
    fn shard(media_id: &str) -> anyhow::Result<(&str, &str)> {
        match (media_id.get(0..2), media_id.get(2..4)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(anyhow!("media id '{media_id}' is too short")),
        }
    }

    fn shard_dir(&self, media_id: &str) -> anyhow::Result<PathBuf> {
        let (a, b) = Self::shard(media_id)?;
        Ok(self.root_path.join(a).join(b))
    }

    fn public_path(&self, media_id: &str, file: &str) -> String {
        match Self::shard(media_id) {
            Ok((a, b)) => format!("{}/{a}/{b}/{file}", self.url_prefix),
            Err(_) => format!("{}/{file}", self.url_prefix),
        }
    }
}

/// File extension for an upload's declared content type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    }
}

fn ensure_decodable(data: &[u8]) -> anyhow::Result<()> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .context("upload is not a decodable image")?;
    Ok(())
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Saves an upload under its SHA-256 hash, so identical files share one copy.
    /// The returned media id is `<hash>.<ext>`.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        let hash = format!("{:x}", Sha256::digest(&data));
        let media_id = format!("{hash}.{}", extension_for(content_type));

        let dir = self.shard_dir(&hash)?;
        let target_path = dir.join(&media_id);
        if fs::try_exists(&target_path).await? {
            return Ok(media_id);
        }

        // Decode before writing anything so a bad upload leaves no files behind.
        let data = tokio::task::spawn_blocking(move || {
            ensure_decodable(&data)?;
            anyhow::Ok(data)
        })
        .await??;

        fs::create_dir_all(&dir).await?;
        fs::write(&target_path, &data).await?;
        log::info!("stored media {media_id} ({} bytes)", data.len());
        Ok(media_id)
    }

    async fn get_url(&self, media_id: &str) -> String {
        self.public_path(media_id, media_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn uploads_are_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media/");
        let data = png_bytes(600, 300);

        let media_id = store.save_upload(data.clone(), "image/png").await.unwrap();
        assert!(media_id.ends_with(".png"));
        assert_eq!(store.save_upload(data, "image/png").await.unwrap(), media_id);

        let (a, b) = (&media_id[0..2], &media_id[2..4]);
        assert_eq!(store.get_url(&media_id).await, format!("/media/{a}/{b}/{media_id}"));

        let stored = image::open(dir.path().join(a).join(b).join(&media_id)).unwrap();
        assert_eq!((stored.width(), stored.height()), (600, 300));
        assert_eq!(std::fs::read_dir(dir.path().join(a).join(b)).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn undecodable_uploads_leave_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().to_path_buf(), "/media");
        assert!(store.save_upload(b"not an image".to_vec(), "image/png").await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn extensions_follow_content_type() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("image/webp"), "webp");
        assert_eq!(extension_for("application/x-unknown-thing"), "bin");
    }
}
