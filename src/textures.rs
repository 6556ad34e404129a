// textures.rs — 纹理缓存
//
// The tour core only asks for handles by name. `TextureCatalog` is the
// image-backed cache used by the application; GPU uploads happen in the
// renderer, which can re-upload everything from here after a context loss.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::io::Reader as ImageReader;
use image::{GenericImage, Rgba, RgbaImage};

use crate::error::{Result, TourError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

pub trait ResourceCache {
    fn texture(&self, name: &str) -> Option<TextureHandle>;
}

#[derive(Debug, Default)]
pub struct TextureCatalog {
    names: HashMap<String, TextureHandle>,
    images: Vec<(String, RgbaImage)>,
}

impl TextureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-inserting a name replaces the image and keeps the handle.
    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) -> TextureHandle {
        let name = name.into();
        if let Some(&handle) = self.names.get(&name) {
            self.images[handle.0 as usize].1 = image;
            return handle;
        }
        let handle = TextureHandle(self.images.len() as u32);
        self.names.insert(name.clone(), handle);
        self.images.push((name, image));
        handle
    }

    pub fn image(&self, handle: TextureHandle) -> Option<&RgbaImage> {
        self.images.get(handle.0 as usize).map(|(_, img)| img)
    }

    pub fn name(&self, handle: TextureHandle) -> Option<&str> {
        self.images.get(handle.0 as usize).map(|(n, _)| n.as_str())
    }

    pub fn handles(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        (0..self.images.len() as u32).map(TextureHandle)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Decodes `dir/name` and registers it under `name`.
    pub fn load_file(&mut self, dir: &Path, name: &str) -> Result<TextureHandle> {
        let path = dir.join(name);
        let file = File::open(&path).map_err(|source| TourError::Io {
            path: path.clone(),
            source,
        })?;
        let img = ImageReader::new(BufReader::new(file))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)
            .and_then(|mut r| {
                r.no_limits();
                r.decode()
            })
            .map_err(|source| TourError::Image {
                name: name.to_string(),
                source,
            })?;
        let rgba = pad_to_equirect(img.to_rgba8());
        log::info!(
            "loaded texture {} ({}x{})",
            name,
            rgba.width(),
            rgba.height()
        );
        Ok(self.insert(name, rgba))
    }

    /// Loads every name; the first failure aborts.
    pub fn load_all<'a>(dir: &Path, names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut catalog = Self::new();
        for name in names {
            if catalog.names.contains_key(name) {
                continue;
            }
            catalog.load_file(dir, name)?;
        }
        Ok(catalog)
    }

    /// Like `load_all` but missing files are logged and skipped.
    pub fn load_optional<'a>(&mut self, dir: &Path, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            if self.names.contains_key(name) {
                continue;
            }
            if let Err(e) = self.load_file(dir, name) {
                log::warn!("optional texture {} not loaded: {}", name, e);
            }
        }
    }
}

impl ResourceCache for TextureCatalog {
    fn texture(&self, name: &str) -> Option<TextureHandle> {
        self.names.get(name).copied()
    }
}

/// Non-2:1 panoramas get black padding on top so the image keeps its
/// vertical scale and sits at the bottom of the sphere.
pub fn pad_to_equirect(img: RgbaImage) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();
    let target_h = src_w / 2;
    if target_h == 0 || src_h >= target_h {
        return img;
    }
    let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
    let y_offset = target_h - src_h;
    if let Err(e) = canvas.copy_from(&img, 0, y_offset) {
        log::warn!("equirect padding failed: {}", e);
        return img;
    }
    canvas
}
