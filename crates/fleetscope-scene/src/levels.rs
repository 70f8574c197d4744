//! Level base images and the bounds they define.
//!
//! Every level's primary image is loaded once to learn its natural size;
//! the size and the image's affine transform give the level's world bounds.
//! A level without bounds cannot be the current level.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fleetscope_core::{AffineImage, CancelToken, Level};

use crate::error::{SceneError, SceneResult};

/// Natural size of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// `[[south, west], [north, east]]` in world coordinates.
pub type LevelBounds = [[f64; 2]; 2];

/// Boxed future alias for image probes.
pub type ImageFuture<'a> = Pin<Box<dyn Future<Output = SceneResult<ImageDimensions>> + Send + 'a>>;

/// Source of level image sizes. Injected for testability.
pub trait ImageSource: Send + Sync {
    fn dimensions<'a>(&'a self, level: &'a str, image: &'a AffineImage) -> ImageFuture<'a>;
}

/// World bounds covered by `image` when drawn at its natural size.
pub fn affine_image_bounds(image: &AffineImage, width: u32, height: u32) -> LevelBounds {
    let w = f64::from(width) * image.scale;
    let h = f64::from(height) * image.scale;
    [
        [image.y_offset - h, image.x_offset],
        [image.y_offset, image.x_offset + w],
    ]
}

/// Sort levels into display order: by name ignoring case, then by exact
/// name so differently cased duplicates stay stable.
pub fn sort_levels(levels: &mut [Level]) {
    levels.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Reads image sizes from PNG headers on disk.
///
/// `data` may be a plain path or a `file://` URI; relative paths resolve
/// against the configured root.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    root: Option<PathBuf>,
}

impl FileImageSource {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn path_of(&self, data: &str) -> PathBuf {
        let raw = Path::new(data.strip_prefix("file://").unwrap_or(data));
        match &self.root {
            Some(root) if raw.is_relative() => root.join(raw),
            _ => raw.to_path_buf(),
        }
    }
}

/// Width and height from the IHDR chunk of a PNG.
pub fn png_dimensions(header: &[u8]) -> Option<ImageDimensions> {
    if header.len() < 24 || header[..8] != PNG_SIGNATURE || &header[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(header[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(header[20..24].try_into().ok()?);
    Some(ImageDimensions { width, height })
}

impl ImageSource for FileImageSource {
    fn dimensions<'a>(&'a self, level: &'a str, image: &'a AffineImage) -> ImageFuture<'a> {
        Box::pin(async move {
            let path = self.path_of(&image.data);
            let bytes = tokio::fs::read(&path).await.map_err(|e| SceneError::Image {
                level: level.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;
            png_dimensions(&bytes).ok_or_else(|| SceneError::Image {
                level: level.to_string(),
                reason: format!("{} is not a PNG image", path.display()),
            })
        })
    }
}

/// Serves declared sizes keyed by level name.
#[derive(Debug, Clone, Default)]
pub struct StaticImageSource {
    sizes: HashMap<String, ImageDimensions>,
}

impl StaticImageSource {
    pub fn new(sizes: HashMap<String, ImageDimensions>) -> Self {
        Self { sizes }
    }

    pub fn with(mut self, level: &str, width: u32, height: u32) -> Self {
        self.sizes.insert(level.to_string(), ImageDimensions { width, height });
        self
    }
}

impl ImageSource for StaticImageSource {
    fn dimensions<'a>(&'a self, level: &'a str, _image: &'a AffineImage) -> ImageFuture<'a> {
        Box::pin(async move {
            self.sizes.get(level).copied().ok_or_else(|| SceneError::Image {
                level: level.to_string(),
                reason: "no declared size".to_string(),
            })
        })
    }
}

/// Loads level images and holds the resulting bounds.
pub struct LevelImageLoader {
    source: Arc<dyn ImageSource>,
    bounds: RwLock<HashMap<String, LevelBounds>>,
}

impl LevelImageLoader {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self {
            source,
            bounds: RwLock::new(HashMap::new()),
        }
    }

    /// Probe the primary image of every level concurrently.
    ///
    /// Results are committed only if `cancel` has not fired. Levels whose
    /// image is missing or fails to load get no bounds. Returns the number of
    /// levels with bounds after the load.
    pub async fn load_all(&self, levels: &[Level], cancel: &CancelToken) -> usize {
        let probes = levels.iter().filter_map(|level| match level.primary_image() {
            Some(image) => Some(self.probe(level, image)),
            None => {
                warn!(level = %level.name, "level has no image");
                None
            }
        });
        let loaded: Vec<(String, LevelBounds)> = join_all(probes).await.into_iter().flatten().collect();

        if cancel.is_cancelled() {
            debug!("image load cancelled, discarding {} results", loaded.len());
            return self.ready_count();
        }

        let mut bounds = self.bounds.write().unwrap_or_else(PoisonError::into_inner);
        bounds.extend(loaded);
        info!(ready = bounds.len(), total = levels.len(), "level images loaded");
        bounds.len()
    }

    async fn probe(&self, level: &Level, image: &AffineImage) -> Option<(String, LevelBounds)> {
        match self.source.dimensions(&level.name, image).await {
            Ok(dims) => {
                let bounds = affine_image_bounds(image, dims.width, dims.height);
                debug!(level = %level.name, width = dims.width, height = dims.height, ?bounds, "level image probed");
                Some((level.name.clone(), bounds))
            }
            Err(e) => {
                warn!(level = %level.name, error = %e, "level image failed to load");
                None
            }
        }
    }

    pub fn bounds(&self, level: &str) -> Option<LevelBounds> {
        self.bounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(level)
            .copied()
    }

    pub fn is_ready(&self, level: &str) -> bool {
        self.bounds(level).is_some()
    }

    fn ready_count(&self) -> usize {
        self.bounds.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Forget every level's bounds.
    pub fn invalidate(&self) {
        self.bounds.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(data: &str) -> AffineImage {
        AffineImage {
            name: "base".to_string(),
            x_offset: 10.0,
            y_offset: 20.0,
            scale: 0.05,
            data: data.to_string(),
            ..Default::default()
        }
    }

    fn level(name: &str, images: Vec<AffineImage>) -> Level {
        Level {
            name: name.to_string(),
            images,
            ..Default::default()
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    #[test]
    fn levels_sort_ignoring_case() {
        let mut levels: Vec<Level> = ["b1", "L2", "a2", "L1", "l1"]
            .into_iter()
            .map(|n| level(n, vec![]))
            .collect();
        sort_levels(&mut levels);
        let names: Vec<&str> = levels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a2", "b1", "L1", "l1", "L2"]);
    }

    #[test]
    fn bounds_follow_affine_transform() {
        let bounds = affine_image_bounds(&image(""), 1000, 400);
        assert_eq!(bounds, [[0.0, 10.0], [20.0, 60.0]]);
    }

    #[test]
    fn png_header_parsing() {
        assert_eq!(
            png_dimensions(&png(640, 480)),
            Some(ImageDimensions { width: 640, height: 480 })
        );
        assert_eq!(png_dimensions(b"GIF89a not a png at all....."), None);
        assert_eq!(png_dimensions(&png(1, 1)[..20]), None);
    }

    #[tokio::test]
    async fn file_source_reads_relative_and_uri_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("l1.png"), png(200, 100)).unwrap();
        let source = FileImageSource::new(Some(dir.path().to_path_buf()));

        let dims = source.dimensions("L1", &image("l1.png")).await.unwrap();
        assert_eq!(dims, ImageDimensions { width: 200, height: 100 });

        let uri = format!("file://{}", dir.path().join("l1.png").display());
        assert_eq!(source.dimensions("L1", &image(&uri)).await.unwrap(), dims);

        let err = source.dimensions("L1", &image("missing.png")).await.unwrap_err();
        assert!(matches!(err, SceneError::Image { level, .. } if level == "L1"));
    }

    #[tokio::test]
    async fn failed_levels_have_no_bounds() {
        let source = StaticImageSource::default().with("L1", 100, 100);
        let loader = LevelImageLoader::new(Arc::new(source));
        let levels = vec![
            level("L1", vec![image("a")]),
            level("L2", vec![image("b")]),
            level("L3", vec![]),
        ];
        assert_eq!(loader.load_all(&levels, &CancelToken::new()).await, 1);
        assert!(loader.is_ready("L1"));
        assert!(!loader.is_ready("L2"));
        assert!(!loader.is_ready("L3"));
        assert_eq!(loader.bounds("L1"), Some([[15.0, 10.0], [20.0, 15.0]]));
    }

    #[tokio::test]
    async fn cancelled_load_commits_nothing() {
        let source = StaticImageSource::default().with("L1", 100, 100);
        let loader = LevelImageLoader::new(Arc::new(source));
        let cancel = CancelToken::new();
        cancel.cancel();
        loader.load_all(&[level("L1", vec![image("a")])], &cancel).await;
        assert!(!loader.is_ready("L1"));
    }

    #[tokio::test]
    async fn invalidate_clears_bounds() {
        let loader = LevelImageLoader::new(Arc::new(StaticImageSource::default().with("L1", 1, 1)));
        loader.load_all(&[level("L1", vec![image("a")])], &CancelToken::new()).await;
        assert!(loader.is_ready("L1"));
        loader.invalidate();
        assert!(!loader.is_ready("L1"));
    }
}
