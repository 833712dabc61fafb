//! Core Types für die LED-Kette
//!
//! Datenstrukturen ohne Hardware-Dependencies

use alloc::vec::Vec;

use rgb::RGB8;

use crate::traits::LedError;

/// Eingabewert für ein Pixel
///
/// Entweder eine gepackte 24-Bit Zahl (`0xRRGGBB`) oder ein Tripel.
/// Das Tripel ist bewusst breiter als `u8`, damit ungültige Kanäle
/// (z.B. 256 oder -1) darstellbar sind und vom Codec abgelehnt werden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorValue {
    /// Rot = Bits 16-23, Grün = Bits 8-15, Blau = Bits 0-7
    Packed(u32),
    /// (rot, grün, blau), jeder Kanal muss in `[0, 255]` liegen
    Triple(i32, i32, i32),
}

impl From<u32> for ColorValue {
    fn from(value: u32) -> Self {
        ColorValue::Packed(value)
    }
}

impl From<(u8, u8, u8)> for ColorValue {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        ColorValue::Triple(r.into(), g.into(), b.into())
    }
}

impl From<RGB8> for ColorValue {
    fn from(color: RGB8) -> Self {
        ColorValue::Triple(color.r.into(), color.g.into(), color.b.into())
    }
}

/// Auswahl von LEDs: ein einzelner Index oder eine Menge von Indizes
///
/// Duplikate sind erlaubt und wirken wie ein einzelner Eintrag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<'a> {
    One(usize),
    Many(&'a [usize]),
}

impl Selection<'_> {
    /// Prüft alle Indizes gegen die Kettenlänge, bevor etwas verändert wird
    pub fn validate(&self, num_leds: usize) -> Result<(), LedError> {
        match self.iter().find(|&index| index >= num_leds) {
            Some(index) => Err(LedError::IndexOutOfRange { index, num_leds }),
            None => Ok(()),
        }
    }

    /// Iteriert über alle ausgewählten Indizes (inklusive Duplikate)
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let slice = match self {
            Selection::One(index) => core::slice::from_ref(index),
            Selection::Many(indices) => *indices,
        };
        slice.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Many(indices) if indices.is_empty())
    }
}

impl From<usize> for Selection<'_> {
    fn from(index: usize) -> Self {
        Selection::One(index)
    }
}

impl<'a> From<&'a [usize]> for Selection<'a> {
    fn from(indices: &'a [usize]) -> Self {
        Selection::Many(indices)
    }
}

impl<'a, const N: usize> From<&'a [usize; N]> for Selection<'a> {
    fn from(indices: &'a [usize; N]) -> Self {
        Selection::Many(indices)
    }
}

impl<'a> From<&'a Vec<usize>> for Selection<'a> {
    fn from(indices: &'a Vec<usize>) -> Self {
        Selection::Many(indices.as_slice())
    }
}

// ============================================================================
// defmt::Format Implementations (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for ColorValue {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ColorValue::Packed(value) => defmt::write!(fmt, "Packed({=u32:#x})", *value),
            ColorValue::Triple(r, g, b) => defmt::write!(fmt, "Triple({}, {}, {})", r, g, b),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Selection<'_> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Selection::One(index) => defmt::write!(fmt, "One({})", index),
            Selection::Many(indices) => defmt::write!(fmt, "Many({=[?]})", *indices),
        }
    }
}
