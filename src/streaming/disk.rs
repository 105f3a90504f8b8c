//! Image serialization and disk I/O
//!
//! The image store keeps precompressed images as rkyv-archived mip chains
//! behind an LZ4 frame (`.rki`). Loose source files (PNG/TGA) next to the
//! store are decoded with the `image` crate on the synchronous path.

use crate::core::error::Error;
use crate::core::types::PixelData;
use rkyv::{Archive, Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Store file extension
pub const STORE_EXTENSION: &str = "rki";

/// Shortest well-formed store file: the LZ4 length prefix
pub const MIN_STORE_LEN: u64 = 4;

/// Source file extensions probed for the synchronous decode path
const SOURCE_EXTENSIONS: [&str; 2] = ["png", "tga"];

/// One mip level of a stored image
#[derive(Archive, Deserialize, Serialize)]
pub struct LevelData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8 bytes
    pub pixels: Vec<u8>,
}

/// Serializable precompressed image: full-size dimensions plus a mip chain,
/// largest level first
#[derive(Archive, Deserialize, Serialize)]
pub struct ImageFileData {
    pub width: u32,
    pub height: u32,
    pub levels: Vec<LevelData>,
}

impl ImageFileData {
    /// Build from an explicit mip chain; header dimensions come from the
    /// first level
    pub fn new(levels: Vec<LevelData>) -> Self {
        let (width, height) = levels
            .first()
            .map(|l| (l.width, l.height))
            .unwrap_or((0, 0));
        Self { width, height, levels }
    }

    /// Build a single-level image from decoded pixels
    pub fn single(pixels: &PixelData) -> Self {
        Self::new(vec![LevelData {
            width: pixels.width,
            height: pixels.height,
            pixels: pixels.pixels.clone(),
        }])
    }
}

/// Serialize an image to bytes (uncompressed)
pub fn serialize_image(data: &ImageFileData) -> Result<Vec<u8>, Error> {
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(data)
        .map_err(|e| Error::Format(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Deserialize an image from bytes (uncompressed)
pub fn deserialize_image(data: &[u8]) -> Result<ImageFileData, Error> {
    let archived = rkyv::access::<ArchivedImageFileData, rkyv::rancor::Error>(data)
        .map_err(|e| Error::Format(e.to_string()))?;

    let image: ImageFileData = rkyv::deserialize::<ImageFileData, rkyv::rancor::Error>(archived)
        .map_err(|e| Error::Format(e.to_string()))?;

    Ok(image)
}

/// Serialize and LZ4-compress an image for the store
pub fn compress_image(data: &ImageFileData) -> Result<Vec<u8>, Error> {
    let serialized = serialize_image(data)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Decompress and deserialize a store payload
pub fn decompress_image(bytes: &[u8]) -> Result<ImageFileData, Error> {
    if (bytes.len() as u64) < MIN_STORE_LEN {
        return Err(Error::Truncated(bytes.len() as u64));
    }
    let decompressed = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| Error::Format(format!("LZ4 decompression failed: {}", e)))?;
    deserialize_image(&decompressed)
}

/// Store file path for a normalized image key
pub fn store_path(base_dir: &Path, key: &str) -> PathBuf {
    base_dir.join(format!("{}.{}", key, STORE_EXTENSION))
}

/// Length of the store file for a key, if one exists
pub fn store_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Write an image to the store (compressed), creating directories as needed
pub fn save_image_sync(base_dir: &Path, key: &str, data: &ImageFileData) -> Result<(), Error> {
    let path = store_path(base_dir, key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let compressed = compress_image(data)?;
    std::fs::write(&path, compressed)?;
    Ok(())
}

/// Read and decompress a store file on the caller's thread
pub fn load_image_sync(path: &Path) -> Result<ImageFileData, Error> {
    let bytes = std::fs::read(path)?;
    decompress_image(&bytes)
}

/// Find a loose source file for a key, preferring PNG
pub fn source_path(base_dir: &Path, key: &str) -> Option<PathBuf> {
    for ext in SOURCE_EXTENSIONS {
        let path = base_dir.join(format!("{}.{}", key, ext));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Decode a loose source file into RGBA8 pixels
pub fn decode_source(path: &Path) -> Result<PixelData, Error> {
    let img = image::open(path)
        .map_err(|e| Error::Decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(PixelData::from_rgba(width, height, img.into_raw()))
}

/// Index of the largest mip level whose tail of the chain still fits
/// `max_bytes`; falls back to the smallest level
pub fn partial_level(data: &ImageFileData, max_bytes: u64) -> usize {
    let count = data.levels.len();
    for i in 0..count {
        let tail: u64 = data.levels[i..]
            .iter()
            .map(|l| l.pixels.len() as u64)
            .sum();
        if tail <= max_bytes {
            return i;
        }
    }
    count.saturating_sub(1)
}

/// Extract one mip level as an uploadable payload
pub fn level_pixels(data: &ImageFileData, index: usize) -> Result<PixelData, Error> {
    let level = data
        .levels
        .get(index)
        .ok_or_else(|| Error::Format(format!("missing mip level {}", index)))?;
    Ok(PixelData::from_rgba(
        level.width,
        level.height,
        level.pixels.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(sizes: &[(u32, u32)]) -> ImageFileData {
        ImageFileData::new(
            sizes
                .iter()
                .map(|&(w, h)| LevelData {
                    width: w,
                    height: h,
                    pixels: vec![7; w as usize * h as usize * 4],
                })
                .collect(),
        )
    }

    #[test]
    fn test_store_path() {
        let base = Path::new("/tmp/images");
        let path = store_path(base, "textures/base/wall01");
        assert_eq!(path, PathBuf::from("/tmp/images/textures/base/wall01.rki"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let data = chain(&[(8, 8), (4, 4)]);
        let serialized = serialize_image(&data).expect("serialization failed");
        let roundtrip = deserialize_image(&serialized).expect("deserialization failed");
        assert_eq!(roundtrip.width, 8);
        assert_eq!(roundtrip.levels.len(), 2);
        assert_eq!(roundtrip.levels[1].pixels, data.levels[1].pixels);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let data = chain(&[(8, 8), (4, 4)]);

        save_image_sync(dir.path(), "textures/rock01", &data).expect("save failed");
        let path = store_path(dir.path(), "textures/rock01");
        assert!(store_len(&path).is_some());

        let loaded = load_image_sync(&path).expect("load failed");
        assert_eq!(loaded.width, 8);
        assert_eq!(loaded.height, 8);
        assert_eq!(loaded.levels.len(), 2);
    }

    #[test]
    fn test_load_truncated() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("short.rki");
        std::fs::write(&path, [0u8; 2]).expect("write failed");

        match load_image_sync(&path) {
            Err(Error::Truncated(2)) => {}
            other => panic!("expected truncated error, got {:?}", other.map(|d| d.levels.len())),
        }
    }

    #[test]
    fn test_load_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("corrupt.rki");
        std::fs::write(&path, [0u8; 32]).expect("write failed");

        assert!(matches!(load_image_sync(&path), Err(Error::Format(_))));
    }

    #[test]
    fn test_partial_level_selection() {
        // tails: [0..] = 16384 + 4096 + 1024, [1..] = 5120, [2..] = 1024
        let data = chain(&[(64, 64), (32, 32), (16, 16)]);
        assert_eq!(partial_level(&data, u64::MAX), 0);
        assert_eq!(partial_level(&data, 5120), 1);
        assert_eq!(partial_level(&data, 2000), 2);
        // nothing fits: fall back to the smallest level
        assert_eq!(partial_level(&data, 100), 2);
    }

    #[test]
    fn test_level_pixels() {
        let data = chain(&[(8, 8), (4, 4)]);
        let level = level_pixels(&data, 1).expect("level extraction failed");
        assert_eq!(level.width, 4);
        assert_eq!(level.size_bytes(), 64);

        assert!(matches!(level_pixels(&data, 5), Err(Error::Format(_))));
    }

    #[test]
    fn test_decode_source_png() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("flat.png");
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).expect("png save failed");

        let pixels = decode_source(&path).expect("decode failed");
        assert_eq!(pixels.width, 4);
        assert_eq!(pixels.height, 2);
        assert_eq!(pixels.get(3, 1), [10, 20, 30, 255]);
    }

    #[test]
    fn test_source_path_probe() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        assert!(source_path(dir.path(), "rock01").is_none());

        let img = image::RgbaImage::new(2, 2);
        img.save(dir.path().join("rock01.png")).expect("png save failed");
        let found = source_path(dir.path(), "rock01").expect("probe failed");
        assert!(found.ends_with("rock01.png"));
    }
}
