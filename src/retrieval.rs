//! Downloading stored place images.
//!
//! Stored image paths carry the bucket name as a prefix (`places/abc.jpg`).
//! The prefix is stripped to get the key inside the bucket, the asset is
//! downloaded, and a file name is suggested from its MIME subtype and the
//! current time: `image_<unix millis>.<subtype>`.
//!
//! Failures are reported to the caller and, through [`Retriever`], as an
//! [`IntakeEvent::RetrievalFailed`] notification. Nothing is written on
//! failure.

use crate::intake::IntakeEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("invalid asset key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded asset as the store returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub bytes: Vec<u8>,
    /// Empty when the store cannot tell.
    pub mime: String,
}

/// Storage bucket the images live in.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn download(&self, key: &str) -> Result<StoredAsset, RetrievalError>;
}

/// Bucket backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to a path under the root, refusing anything that escapes it.
    fn resolve(&self, key: &str) -> Result<PathBuf, RetrievalError> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !is_plain {
            return Err(RetrievalError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn download(&self, key: &str) -> Result<StoredAsset, RetrievalError> {
        let path = self.resolve(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrievalError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mime = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_default();
        debug!(key, bytes = bytes.len(), %mime, "asset downloaded");
        Ok(StoredAsset { bytes, mime })
    }
}

/// An asset ready to be saved under its suggested name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DownloadedImage {
    /// Write the image into `dir` under its suggested name.
    pub async fn save(&self, dir: &Path) -> Result<PathBuf, RetrievalError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Key of a stored image path inside `bucket`: the first `"{bucket}/"` is removed.
pub fn storage_key(image_path: &str, bucket: &str) -> String {
    image_path.replacen(&format!("{bucket}/"), "", 1)
}

/// `image_<unix millis>.<subtype>`, falling back to `jpg` without a subtype.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use place_photos::retrieval::suggested_filename;
///
/// let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
/// assert_eq!(suggested_filename("image/webp", now), "image_1700000000123.webp");
/// assert_eq!(suggested_filename("", now), "image_1700000000123.jpg");
/// ```
pub fn suggested_filename(mime: &str, now: DateTime<Utc>) -> String {
    let subtype = mime
        .split_once('/')
        .map(|(_, sub)| sub.split(';').next().unwrap_or_default().trim())
        .filter(|sub| !sub.is_empty())
        .unwrap_or("jpg");
    format!("image_{}.{subtype}", now.timestamp_millis())
}

/// Download the image at `image_path` from `store`.
pub async fn fetch_image(
    store: &dyn AssetStore,
    image_path: &str,
    bucket: &str,
    now: DateTime<Utc>,
) -> Result<DownloadedImage, RetrievalError> {
    let key = storage_key(image_path, bucket);
    let asset = store.download(&key).await?;
    Ok(DownloadedImage {
        filename: suggested_filename(&asset.mime, now),
        mime: asset.mime,
        bytes: asset.bytes,
    })
}

/// [`fetch_image`] bound to one store and bucket, reporting failures as events.
pub struct Retriever {
    store: Arc<dyn AssetStore>,
    bucket: String,
    events: Option<Sender<IntakeEvent>>,
}

impl Retriever {
    pub fn new(store: Arc<dyn AssetStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Sender<IntakeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn fetch(
        &self,
        image_path: &str,
        now: DateTime<Utc>,
    ) -> Result<DownloadedImage, RetrievalError> {
        let result = fetch_image(self.store.as_ref(), image_path, &self.bucket, now).await;
        if let Err(e) = &result {
            warn!(path = image_path, error = %e, "image download failed");
            if let Some(tx) = &self.events {
                tx.send(IntakeEvent::RetrievalFailed {
                    path: image_path.to_string(),
                    reason: e.to_string(),
                })
                .ok();
            }
        }
        result
    }

    /// Fetch `image_path` and save it into `dir`. Nothing is written on failure.
    pub async fn download_to(
        &self,
        image_path: &str,
        now: DateTime<Utc>,
        dir: &Path,
    ) -> Result<PathBuf, RetrievalError> {
        let image = self.fetch(image_path, now).await?;
        image.save(dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, png_rgba_bytes};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    fn bucket_with(files: &[(&str, Vec<u8>)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (key, bytes) in files {
            let path = tmp.path().join(key);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }
        tmp
    }

    #[test]
    fn storage_key_strips_first_bucket_prefix() {
        assert_eq!(storage_key("places/abc.jpg", "places"), "abc.jpg");
        assert_eq!(storage_key("abc.jpg", "places"), "abc.jpg");
        assert_eq!(
            storage_key("places/2024/places/x.jpg", "places"),
            "2024/places/x.jpg"
        );
    }

    #[test]
    fn suggested_filename_uses_subtype() {
        assert_eq!(suggested_filename("image/png", at(42)), "image_42.png");
        assert_eq!(suggested_filename("image/jpeg", at(42)), "image_42.jpeg");
        assert_eq!(
            suggested_filename("image/avif; q=1", at(42)),
            "image_42.avif"
        );
    }

    #[test]
    fn suggested_filename_falls_back_to_jpg() {
        assert_eq!(suggested_filename("", at(7)), "image_7.jpg");
        assert_eq!(suggested_filename("image/", at(7)), "image_7.jpg");
        assert_eq!(suggested_filename("binary", at(7)), "image_7.jpg");
    }

    #[tokio::test]
    async fn fs_store_detects_mime() {
        let tmp = bucket_with(&[("a.png", png_rgba_bytes(4, 4)), ("b.bin", vec![0u8; 8])]);
        let store = FsAssetStore::new(tmp.path());

        assert_eq!(store.download("a.png").await.unwrap().mime, "image/png");
        assert_eq!(store.download("b.bin").await.unwrap().mime, "");
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_keys() {
        let store = FsAssetStore::new("/tmp");
        for key in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(store.download(key).await, Err(RetrievalError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn fetch_image_strips_bucket_and_names_file() {
        let jpeg = jpeg_bytes(4, 4);
        let tmp = bucket_with(&[("2024/cafe.jpg", jpeg.clone())]);
        let store = FsAssetStore::new(tmp.path());

        let image = fetch_image(&store, "places/2024/cafe.jpg", "places", at(1_000))
            .await
            .unwrap();

        assert_eq!(image.bytes, jpeg);
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(image.filename, "image_1000.jpeg");
    }

    #[tokio::test]
    async fn missing_asset_notifies_and_writes_nothing() {
        let tmp = bucket_with(&[]);
        let out = TempDir::new().unwrap();
        let target = out.path().join("downloads");
        let (tx, rx) = std::sync::mpsc::channel();
        let retriever =
            Retriever::new(Arc::new(FsAssetStore::new(tmp.path())), "places").with_events(tx);

        let err = retriever
            .download_to("places/gone.jpg", at(1), &target)
            .await
            .unwrap_err();

        assert!(matches!(err, RetrievalError::NotFound(ref key) if key == "gone.jpg"));
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![IntakeEvent::RetrievalFailed {
                path: "places/gone.jpg".into(),
                reason: "asset not found: gone.jpg".into(),
            }]
        );
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn download_to_saves_under_suggested_name() {
        let tmp = bucket_with(&[("cafe.png", png_rgba_bytes(4, 4))]);
        let out = TempDir::new().unwrap();
        let target = out.path().join("downloads");
        let retriever = Retriever::new(Arc::new(FsAssetStore::new(tmp.path())), "places");

        let path = retriever
            .download_to("places/cafe.png", at(9), &target)
            .await
            .unwrap();

        assert_eq!(path, target.join("image_9.png"));
        assert_eq!(fs::read_dir(&target).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn save_writes_under_suggested_name() {
        let out = TempDir::new().unwrap();
        let image = DownloadedImage {
            filename: "image_5.png".into(),
            mime: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let path = image.save(&out.path().join("nested")).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "image_5.png");
        assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
