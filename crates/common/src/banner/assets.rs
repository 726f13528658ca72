use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid font {path}: {source}")]
    Font {
        path: PathBuf,
        #[source]
        source: ab_glyph::InvalidFont,
    },
}

/// Read-only view of the banner resources directory.
///
/// ```text
/// resources/
///   backgrounds/bg_01.png, backgrounds/avatar_bg_01.png ...
///   avatar_frame.png
///   motif_bar.png
///   normal_bg.png, maxed_bg.png, true_bg.png
///   skill_icons/attack.png ...
///   fonts/GFSArtemisia.otf, fonts/Averia-Regular.ttf
/// ```
#[derive(Debug, Clone)]
pub struct Resources {
    dir: PathBuf,
}

impl Resources {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image(&self, relative: &str) -> Result<RgbaImage, AssetError> {
        let path = self.dir.join(relative);
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        decode(relative, &bytes)
    }

    pub fn font(&self, file: &str) -> Result<FontArc, AssetError> {
        let path = self.dir.join("fonts").join(file);
        let bytes = std::fs::read(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        FontArc::try_from_vec(bytes).map_err(|source| AssetError::Font { path, source })
    }
}

/// Decode PNG (or any enabled format) bytes into RGBA.
pub fn decode(what: &str, bytes: &[u8]) -> Result<RgbaImage, AssetError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|source| AssetError::Decode {
            what: what.to_string(),
            source,
        })
}

/// Resize to exactly `width` x `height`, at least one pixel each way.
pub fn scaled(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(img, width.max(1), height.max(1), FilterType::Triangle)
}

/// Resize by a factor, keeping the aspect ratio.
pub fn scaled_by(img: &RgbaImage, factor: f64) -> RgbaImage {
    let w = (f64::from(img.width()) * factor).round() as u32;
    let h = (f64::from(img.height()) * factor).round() as u32;
    scaled(img, w, h)
}

/// Resize to a target width, keeping the aspect ratio.
pub fn scaled_to_width(img: &RgbaImage, width: u32) -> RgbaImage {
    if img.width() == 0 {
        return img.clone();
    }
    scaled_by(img, f64::from(width) / f64::from(img.width()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        img.save(path).unwrap();
    }

    #[test]
    fn test_missing_image_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let resources = Resources::new(dir.path());
        let err = resources.image("backgrounds/bg_01.png").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn test_garbage_image_is_decode_error() {
        let err = decode("avatar", b"<html>not found</html>").unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
        assert!(err.to_string().contains("avatar"));
    }

    #[test]
    fn test_image_loads_from_resources_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("skill_icons/attack.png"), 4, 2);
        let img = Resources::new(dir.path()).image("skill_icons/attack.png").unwrap();
        assert_eq!(img.dimensions(), (4, 2));
    }

    #[test]
    fn test_invalid_font_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("fonts")).unwrap();
        std::fs::write(dir.path().join("fonts/bad.ttf"), b"nope").unwrap();
        let err = Resources::new(dir.path()).font("bad.ttf").unwrap_err();
        assert!(matches!(err, AssetError::Font { .. }));
    }

    #[test]
    fn test_scaling_keeps_aspect() {
        let img = RgbaImage::new(180, 20);
        assert_eq!(scaled_to_width(&img, 90).dimensions(), (90, 10));
        assert_eq!(scaled_by(&img, 0.5).dimensions(), (90, 10));
        assert_eq!(scaled(&img, 0, 0).dimensions(), (1, 1));
    }
}
