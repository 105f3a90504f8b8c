//! Procedural image generators
//!
//! Built-in images that are computed instead of streamed from disk: the
//! defaulted-texture marker, solid colors, the flat normal map and a few
//! lookup ramps. Generation is synchronous, deterministic and infallible,
//! so these images can be (re)built at any time, including before the
//! renderer exists.

use crate::core::types::PixelData;

/// Edge length of the small built-in images
pub const DEFAULT_SIZE: u32 = 16;
/// Edge length of the border clamp image; the border starts fading this far
/// from the edge
pub const BORDER_CLAMP_SIZE: u32 = 32;
/// Width of the ramp lookup images
pub const RAMP_SIZE: u32 = 256;

/// Identifies a procedural image recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorId {
    /// Grey with a white box outline, so mapping errors are visible
    Default,
    White,
    Black,
    /// Flat normal map for default bump mapping
    FlatNormal,
    /// 0-255 grayscale ramp
    Ramp,
    /// Two texels used for alpha test clip planes
    AlphaNotch,
    /// Solid white with a one pixel black border
    BorderClamp,
}

/// Compute the pixel content for a generator
pub fn generate(id: GeneratorId) -> PixelData {
    match id {
        GeneratorId::Default => default_image(),
        GeneratorId::White => solid(DEFAULT_SIZE, [255, 255, 255, 255]),
        GeneratorId::Black => solid(DEFAULT_SIZE, [0, 0, 0, 255]),
        GeneratorId::FlatNormal => solid(DEFAULT_SIZE, [128, 128, 255, 255]),
        GeneratorId::Ramp => ramp_image(),
        GeneratorId::AlphaNotch => alpha_notch_image(),
        GeneratorId::BorderClamp => border_clamp_image(),
    }
}

fn solid(size: u32, rgba: [u8; 4]) -> PixelData {
    let mut p = PixelData::new(size, size);
    for y in 0..size {
        for x in 0..size {
            p.put(x, y, rgba);
        }
    }
    p
}

/// The default image is grey with a white box outline to allow you to see
/// the mapping coordinates on a surface
fn default_image() -> PixelData {
    let mut p = solid(DEFAULT_SIZE, [32, 32, 32, 255]);
    let white = [255, 255, 255, 255];
    for i in 0..DEFAULT_SIZE {
        p.put(i, 0, white);
        p.put(0, i, white);
        p.put(i, DEFAULT_SIZE - 1, white);
        p.put(DEFAULT_SIZE - 1, i, white);
    }
    p
}

fn ramp_image() -> PixelData {
    let mut p = PixelData::new(RAMP_SIZE, 1);
    for x in 0..RAMP_SIZE {
        let v = x as u8;
        p.put(x, 0, [v, v, v, v]);
    }
    p
}

fn alpha_notch_image() -> PixelData {
    let mut p = PixelData::new(2, 1);
    p.put(0, 0, [255, 255, 255, 0]);
    p.put(1, 0, [255, 255, 255, 255]);
    p
}

fn border_clamp_image() -> PixelData {
    let mut p = solid(BORDER_CLAMP_SIZE, [255, 255, 255, 255]);
    let black = [0, 0, 0, 0];
    for i in 0..BORDER_CLAMP_SIZE {
        p.put(i, 0, black);
        p.put(0, i, black);
        p.put(i, BORDER_CLAMP_SIZE - 1, black);
        p.put(BORDER_CLAMP_SIZE - 1, i, black);
    }
    p
}
