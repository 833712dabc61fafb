//! Pure Codec Functions
//!
//! Validierung von Pixelwerten und Serialisierung in den Wire-Buffer.
//! Funktionen ohne Hardware-Dependencies (testbar!)

use rgb::RGB8;

use crate::traits::LedError;
use crate::types::ColorValue;

/// Ausgeschaltetes Pixel (0, 0, 0)
pub const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Bytes pro Pixel auf dem Bus (R, G, B)
pub const BYTES_PER_LED: usize = 3;

/// Größter gültiger gepackter Wert + 1 (2^24)
const PACKED_LIMIT: u32 = 1 << 24;

/// Validiert und normalisiert einen Pixelwert
///
/// # Beispiele
///
/// ```
/// # use ws2801_core::{ColorValue, LedError, RGB8, resolve_color};
/// assert_eq!(
///     resolve_color(ColorValue::Packed(0xAABBCC)),
///     Ok(RGB8 { r: 0xAA, g: 0xBB, b: 0xCC })
/// );
/// assert_eq!(
///     resolve_color(ColorValue::Triple(256, 0, 0)),
///     Err(LedError::InvalidColorValue)
/// );
/// ```
pub fn resolve_color(value: ColorValue) -> Result<RGB8, LedError> {
    match value {
        ColorValue::Packed(packed) if packed < PACKED_LIMIT => Ok(RGB8 {
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }),
        ColorValue::Packed(_) => Err(LedError::InvalidColorValue),
        ColorValue::Triple(r, g, b) => Ok(RGB8 {
            r: channel(r)?,
            g: channel(g)?,
            b: channel(b)?,
        }),
    }
}

fn channel(value: i32) -> Result<u8, LedError> {
    u8::try_from(value).map_err(|_| LedError::InvalidColorValue)
}

/// Packt ein Pixel wieder in `0xRRGGBB`
pub fn pack_color(color: RGB8) -> u32 {
    (u32::from(color.r) << 16) | (u32::from(color.g) << 8) | u32::from(color.b)
}

/// Länge des Wire-Buffers für `num_leds` Pixel
pub const fn wire_len(num_leds: usize) -> usize {
    BYTES_PER_LED * num_leds
}

/// Schreibt ein Pixel an seine Position im Wire-Buffer
///
/// Pixel `i` belegt die Bytes `3*i .. 3*i+3` in der Reihenfolge R, G, B.
/// Der Index muss vorher validiert sein.
pub fn encode_pixel(wire: &mut [u8], index: usize, color: RGB8) {
    let offset = BYTES_PER_LED * index;
    wire[offset..offset + BYTES_PER_LED].copy_from_slice(&[color.r, color.g, color.b]);
}

/// Liest ein Pixel aus dem Wire-Buffer
///
/// Gegenstück zu [`encode_pixel`]. Der Index muss vorher validiert sein.
pub fn decode_pixel(wire: &[u8], index: usize) -> RGB8 {
    let offset = BYTES_PER_LED * index;
    RGB8 {
        r: wire[offset],
        g: wire[offset + 1],
        b: wire[offset + 2],
    }
}
