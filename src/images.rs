use std::fs;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use image::imageops::{self, FilterType};
use image::{ImageError, ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::error::{IconError, Result};

/// 16x16 green disc, used when a build only needs some icon to exist.
const PLACEHOLDER_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAABAAAAAQCAYAAAAf8/9hAAAAOklEQVR42mNgwAJ81gf8x4YZCAFcGokyiFjNWA0hVTOGIRQZQK5muCGjBlDBgIFPB1RJylTJTORmZwCqGtwwtFUt5wAAAABJRU5ErkJggg==";

/// Write `img` as PNG, creating the parent directory first. Overwrites.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IconError::io(parent, e))?;
    }
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| IconError::image(path, e))?;
    info!(path = %path.display(), width = img.width(), height = img.height(), "wrote png");
    Ok(path.to_path_buf())
}

/// Lanczos3 resample to a `size` x `size` square. Same-size input is copied.
pub fn resample(img: &RgbaImage, size: u32) -> RgbaImage {
    if img.dimensions() == (size, size) {
        img.clone()
    } else {
        imageops::resize(img, size, size, FilterType::Lanczos3)
    }
}

pub fn open_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).map_err(|e| match e {
        ImageError::IoError(io) => IconError::io(path, io),
        other => IconError::image(path, other),
    })?;
    Ok(img.to_rgba8())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeReport {
    pub original: (u32, u32),
    pub target: (u32, u32),
}

/// Resample the PNG at `path` to `size` x `size` and overwrite it.
pub fn resize_in_place(path: &Path, size: u32) -> Result<ResizeReport> {
    let img = open_rgba(path)?;
    let original = img.dimensions();
    debug!(path = %path.display(), width = original.0, height = original.1, "resizing");
    let resized = imageops::resize(&img, size, size, FilterType::Lanczos3);
    save_png(&resized, path)?;
    Ok(ResizeReport { original, target: (size, size) })
}

pub fn placeholder() -> Result<RgbaImage> {
    let bytes = general_purpose::STANDARD.decode(PLACEHOLDER_PNG)?;
    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| IconError::image("<placeholder>", e))?;
    Ok(img.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 128]) }
        })
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build").join("nested").join("icon.png");
        let written = save_png(&checker(8, 8), &path).unwrap();
        assert_eq!(written, path);
        assert_eq!(image::open(&path).unwrap().to_rgba8(), checker(8, 8));
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.png");
        save_png(&checker(8, 8), &path).unwrap();
        save_png(&checker(4, 4), &path).unwrap();
        assert_eq!(image::open(&path).unwrap().width(), 4);
    }

    #[test]
    fn resize_from_any_size_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        for (w, h) in [(16, 16), (300, 200), (2048, 2048)] {
            let path = dir.path().join(format!("src_{w}x{h}.png"));
            save_png(&checker(w, h), &path).unwrap();

            let first = resize_in_place(&path, 1024).unwrap();
            assert_eq!(first.original, (w, h));
            assert_eq!(first.target, (1024, 1024));
            assert_eq!(image::open(&path).unwrap().to_rgba8().dimensions(), (1024, 1024));

            let second = resize_in_place(&path, 1024).unwrap();
            assert_eq!(second.original, (1024, 1024));
            assert_eq!(image::open(&path).unwrap().to_rgba8().dimensions(), (1024, 1024));
        }
    }

    #[test]
    fn resize_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resize_in_place(&dir.path().join("nope.png"), 64).unwrap_err();
        assert!(matches!(err, IconError::Io { .. }), "{err}");
    }

    #[test]
    fn resize_non_image_is_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("icon.png");
        fs::write(&path, b"plain text").unwrap();
        assert!(matches!(resize_in_place(&path, 64), Err(IconError::Image { .. })));
    }

    #[test]
    fn resample_same_size_is_a_copy() {
        let img = checker(32, 32);
        assert_eq!(resample(&img, 32), img);
        assert_eq!(resample(&img, 16).dimensions(), (16, 16));
    }

    #[test]
    fn placeholder_decodes() {
        let img = placeholder().unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(*img.get_pixel(8, 8), image::Rgba([76, 175, 80, 255]));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
    }
}
