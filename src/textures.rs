//! Trail bitmaps and the id table the renderer resolves them through.
//!
//! Effect definitions refer to bitmaps by integer id. [`TextureRegistry`]
//! hands out positive ids as textures are loaded; an unloaded id resolves to
//! "not loaded" and trails using it are skipped until it is loaded again.
//!
//! ```ignore
//! let mut textures = TextureRegistry::new();
//! let exhaust = textures.load(TextureConfig::from_file("fx/exhaust.png")?);
//! let info = TrailInfo::new(exhaust).with_width(0.4, 0.0);
//! ```

use std::path::Path;

use crate::error::TextureError;
use crate::render::{TextureId, TextureLookup};

/// Filter mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Smooth linear filtering (default).
    #[default]
    Linear,
    /// Sharp nearest-neighbor filtering.
    Nearest,
}

/// Address mode along the ribbon.
///
/// Trail `u` coordinates grow past 1.0 on long ribbons, so the default is
/// to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    /// Clamp to edge pixels.
    ClampToEdge,
    /// Tile the texture.
    #[default]
    Repeat,
    /// Mirror the texture at boundaries.
    MirrorRepeat,
}

impl From<FilterMode> for wgpu::FilterMode {
    fn from(mode: FilterMode) -> Self {
        match mode {
            FilterMode::Linear => wgpu::FilterMode::Linear,
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

impl From<AddressMode> for wgpu::AddressMode {
    fn from(mode: AddressMode) -> Self {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

/// RGBA pixels plus sampling options for one bitmap.
#[derive(Debug, Clone)]
pub struct TextureConfig {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Filter mode for magnification and minification.
    pub filter: FilterMode,
    /// Address mode for UVs outside 0-1.
    pub address_mode: AddressMode,
}

impl TextureConfig {
    /// Wrap raw RGBA data.
    ///
    /// Fails if `data` is not exactly `width * height * 4` bytes.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        })
    }

    /// Decode an image file (PNG or JPEG).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TextureError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_encoded(&bytes)
    }

    /// Decode an in-memory PNG or JPEG.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, TextureError> {
        let img = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Self::from_rgba(img.into_raw(), width, height)
    }

    /// A 1x1 texture of one colour.
    pub fn solid(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            data: vec![r, g, b, a],
            width: 1,
            height: 1,
            filter: FilterMode::Nearest,
            address_mode: AddressMode::Repeat,
        }
    }

    /// A horizontal ramp from `start` to `end`, handy as a fade strip.
    pub fn gradient(width: u32, start: [u8; 4], end: [u8; 4]) -> Self {
        let width = width.max(1);
        let mut data = Vec::with_capacity(width as usize * 4);
        for x in 0..width {
            let t = x as f32 / (width - 1).max(1) as f32;
            for c in 0..4 {
                data.push(lerp_u8(start[c], end[c], t));
            }
        }
        Self {
            data,
            width,
            height: 1,
            filter: FilterMode::Linear,
            address_mode: AddressMode::Repeat,
        }
    }

    /// Set the filter mode.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Set the address mode.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    /// Sampler matching this texture's options.
    pub fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        wgpu::SamplerDescriptor {
            label: Some("Trail Sampler"),
            address_mode_u: self.address_mode.into(),
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: self.filter.into(),
            min_filter: self.filter.into(),
            ..Default::default()
        }
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    let a = a as f32;
    let b = b as f32;
    (a + (b - a) * t).round() as u8
}

/// Bitmap id table.
///
/// Ids start at 1 and are never reused, so a stale id stays "not loaded".
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    slots: Vec<Option<TextureConfig>>,
}

impl TextureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a texture and return its id.
    pub fn load(&mut self, config: TextureConfig) -> TextureId {
        self.slots.push(Some(config));
        self.slots.len() as TextureId
    }

    /// Decode and register an image file.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<TextureId, TextureError> {
        let config = TextureConfig::from_file(path)?;
        Ok(self.load(config))
    }

    /// Drop a texture. Its id resolves to "not loaded" from now on.
    pub fn unload(&mut self, id: TextureId) -> Option<TextureConfig> {
        let index = Self::index(id)?;
        self.slots.get_mut(index)?.take()
    }

    /// Put a texture back under an id that was unloaded.
    ///
    /// Returns `false` if the id was never handed out.
    pub fn reload(&mut self, id: TextureId, config: TextureConfig) -> bool {
        match Self::index(id).and_then(|i| self.slots.get_mut(i)) {
            Some(slot) => {
                *slot = Some(config);
                true
            }
            None => false,
        }
    }

    /// Look up a loaded texture.
    pub fn get(&self, id: TextureId) -> Option<&TextureConfig> {
        let index = Self::index(id)?;
        self.slots.get(index)?.as_ref()
    }

    /// Number of loaded textures.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no textures are loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index(id: TextureId) -> Option<usize> {
        (id > 0).then(|| id as usize - 1)
    }
}

impl TextureLookup for TextureRegistry {
    fn bitmap_handle(&self, texture: TextureId) -> i32 {
        if self.get(texture).is_some() {
            texture
        } else {
            -1
        }
    }
}
