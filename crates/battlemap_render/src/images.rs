//! Tile image cache keyed by source path

use crate::error::RenderError;
use crate::generation::FrameToken;
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where tile images come from
pub trait ImageSource: Send + Sync {
    fn load(&self, src: &str) -> Result<RgbaImage, RenderError>;
}

/// Loads images from files under a root directory
#[derive(Debug, Clone)]
pub struct FileImageSource {
    root: PathBuf,
}

impl FileImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, src: &str) -> Result<RgbaImage, RenderError> {
        let path = self.root.join(src);
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RenderError::NotFound(src.to_string())
            } else {
                RenderError::Io {
                    src: src.to_string(),
                    source,
                }
            }
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|source| RenderError::Decode {
            src: src.to_string(),
            source,
        })?;
        Ok(decoded.to_rgba8())
    }
}

/// In-memory images, for embedding hosts and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    images: HashMap<String, RgbaImage>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, image: RgbaImage) {
        self.images.insert(src.into(), image);
    }

    pub fn with(mut self, src: impl Into<String>, image: RgbaImage) -> Self {
        self.insert(src, image);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn load(&self, src: &str) -> Result<RgbaImage, RenderError> {
        self.images
            .get(src)
            .cloned()
            .ok_or_else(|| RenderError::NotFound(src.to_string()))
    }
}

/// A cached image; broken sources hold a 1x1 transparent placeholder
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub image: Arc<RgbaImage>,
    pub placeholder: bool,
}

/// Result of a batch prefetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Loaded(usize),
    /// A newer frame started; nothing was written
    Superseded,
}

#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<String, CachedImage>,
}

fn placeholder() -> Arc<RgbaImage> {
    Arc::new(RgbaImage::new(1, 1))
}

fn settle(src: &str, result: Result<RgbaImage, RenderError>) -> CachedImage {
    match result {
        Ok(image) if image.width() > 0 && image.height() > 0 => CachedImage {
            image: Arc::new(image),
            placeholder: false,
        },
        Ok(_) => {
            warn!(src, "tile image is empty, using placeholder");
            CachedImage {
                image: placeholder(),
                placeholder: true,
            }
        }
        Err(err) => {
            warn!(src, error = %err, "tile image failed to load, using placeholder");
            CachedImage {
                image: placeholder(),
                placeholder: true,
            }
        }
    }
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, src: &str) -> Option<&CachedImage> {
        self.entries.get(src)
    }

    pub fn image(&self, src: &str) -> Option<Arc<RgbaImage>> {
        self.entries.get(src).map(|e| Arc::clone(&e.image))
    }

    pub fn contains(&self, src: &str) -> bool {
        self.entries.contains_key(src)
    }

    pub fn is_placeholder(&self, src: &str) -> bool {
        self.entries.get(src).is_some_and(|e| e.placeholder)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an already decoded image
    pub fn insert(&mut self, src: impl Into<String>, image: RgbaImage) {
        let src = src.into();
        let entry = settle(&src, Ok(image));
        self.entries.insert(src, entry);
    }

    /// Load `src` if not cached. Failure caches the placeholder.
    pub fn load(&mut self, src: &str, source: &dyn ImageSource) -> Arc<RgbaImage> {
        if let Some(entry) = self.entries.get(src) {
            return Arc::clone(&entry.image);
        }
        let entry = settle(src, source.load(src));
        let image = Arc::clone(&entry.image);
        self.entries.insert(src.to_string(), entry);
        image
    }

    /// Decode every uncached source in parallel. Results are only stored if
    /// `token` is still the current frame when decoding finishes.
    pub fn prefetch<'a>(
        &mut self,
        srcs: impl IntoIterator<Item = &'a str>,
        source: &dyn ImageSource,
        token: &FrameToken,
    ) -> PrefetchOutcome {
        let missing: Vec<&str> = srcs
            .into_iter()
            .filter(|src| !self.entries.contains_key(*src))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if missing.is_empty() {
            return PrefetchOutcome::Loaded(0);
        }

        let loaded: Vec<(String, CachedImage)> = missing
            .par_iter()
            .map(|src| (src.to_string(), settle(src, source.load(src))))
            .collect();

        if !token.is_current() {
            debug!(
                generation = token.generation(),
                dropped = loaded.len(),
                "image prefetch superseded"
            );
            return PrefetchOutcome::Superseded;
        }
        let count = loaded.len();
        self.entries.extend(loaded);
        PrefetchOutcome::Loaded(count)
    }

    /// Alpha of the pixel at normalized image coordinates `(u, v)`.
    ///
    /// `None` means there is no pixel data to judge by: the image is not
    /// loaded yet, or it failed and holds the placeholder.
    pub fn alpha_at(&self, src: &str, u: f64, v: f64) -> Option<u8> {
        let entry = self.entries.get(src)?;
        if entry.placeholder {
            return None;
        }
        let image = &entry.image;
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return Some(0);
        }
        let x = ((u * image.width() as f64) as u32).min(image.width() - 1);
        let y = ((v * image.height() as f64) as u32).min(image.height() - 1);
        Some(image.get_pixel(x, y)[3])
    }

    pub fn remove(&mut self, src: &str) {
        self.entries.remove(src);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::RenderGeneration;
    use image::Rgba;

    fn half_opaque() -> RgbaImage {
        // Left half opaque, right half transparent
        RgbaImage::from_fn(4, 4, |x, _| {
            if x < 2 {
                Rgba([200, 10, 10, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_missing_image_becomes_placeholder() {
        let source = MemoryImageSource::new();
        let mut cache = ImageCache::new();
        let image = cache.load("missing.png", &source);
        assert_eq!(image.dimensions(), (1, 1));
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert!(cache.is_placeholder("missing.png"));
        assert_eq!(cache.alpha_at("missing.png", 0.5, 0.5), None);
    }

    #[test]
    fn test_alpha_sampling() {
        let source = MemoryImageSource::new().with("half.png", half_opaque());
        let mut cache = ImageCache::new();
        cache.load("half.png", &source);
        assert_eq!(cache.alpha_at("half.png", 0.1, 0.5), Some(255));
        assert_eq!(cache.alpha_at("half.png", 0.9, 0.5), Some(0));
        assert_eq!(cache.alpha_at("half.png", 1.5, 0.5), Some(0));
        assert_eq!(cache.alpha_at("unloaded.png", 0.1, 0.1), None);
    }

    #[test]
    fn test_prefetch_respects_generation() {
        let source = MemoryImageSource::new()
            .with("a.png", half_opaque())
            .with("b.png", half_opaque());
        let generation = RenderGeneration::new();
        let mut cache = ImageCache::new();

        let stale = generation.begin();
        let current = generation.begin();
        assert_eq!(
            cache.prefetch(["a.png", "b.png"], &source, &stale),
            PrefetchOutcome::Superseded
        );
        assert!(cache.is_empty());

        assert_eq!(
            cache.prefetch(["a.png", "b.png", "a.png"], &source, &current),
            PrefetchOutcome::Loaded(2)
        );
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.prefetch(["a.png"], &source, &current),
            PrefetchOutcome::Loaded(0)
        );
    }

    #[test]
    fn test_file_source_reads_png() {
        let dir = tempfile::tempdir().unwrap();
        half_opaque().save(dir.path().join("tile.png")).unwrap();
        let source = FileImageSource::new(dir.path());
        let mut cache = ImageCache::new();
        let image = cache.load("tile.png", &source);
        assert_eq!(image.dimensions(), (4, 4));
        assert!(!cache.is_placeholder("tile.png"));

        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        cache.load("broken.png", &source);
        assert!(cache.is_placeholder("broken.png"));
    }
}
