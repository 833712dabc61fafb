//! Hardware Abstraction Traits
//!
//! Diese Traits definieren die Schnittstelle zum physikalischen Bus
//! (SPI-Kette aus WS2801 Treibern) ohne konkrete Implementierung.

use core::fmt;

/// Fehler-Typ für alle LED-Operationen
///
/// Validierungsfehler (`IndexOutOfRange`, `InvalidColorValue`, ...) werden
/// erkannt, bevor irgendein Pixel verändert wird.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedError {
    /// Index liegt nicht in `[0, num_leds)`
    IndexOutOfRange { index: usize, num_leds: usize },
    /// Kanal außerhalb `[0, 255]` oder gepackter Wert außerhalb `[0, 2^24)`
    InvalidColorValue,
    /// Eine LED-Kette braucht mindestens eine LED
    InvalidLedCount,
    /// Halbperiode eines Flashers muss größer als null sein
    InvalidHalfPeriod,
    /// `write()` oder `flush()` auf dem Transport ist fehlgeschlagen
    TransportFailure,
    /// Hintergrund-Task konnte nicht gestartet werden
    TaskSpawnFailed,
}

impl fmt::Display for LedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedError::IndexOutOfRange { index, num_leds } => {
                write!(f, "LED index {index} out of range (0..{num_leds})")
            }
            LedError::InvalidColorValue => f.write_str(
                "LED value must be three channels in 0..=255 or a packed 24-bit number",
            ),
            LedError::InvalidLedCount => f.write_str("LED count must be at least 1"),
            LedError::InvalidHalfPeriod => f.write_str("flash half period must be non-zero"),
            LedError::TransportFailure => f.write_str("write to LED transport failed"),
            LedError::TaskSpawnFailed => f.write_str("failed to spawn flasher task"),
        }
    }
}

impl core::error::Error for LedError {}

/// Trait für den byte-orientierten LED-Bus
///
/// Abstrahiert die Senke, in die der serialisierte Frame geschrieben wird.
/// Die Latch-Pause nach jedem Frame ist Sache des Aufrufers.
///
/// # Implementierungen
/// - **Production:** SpiTransport (`/dev/spidevX.Y` oder beliebiger `io::Write`)
/// - **Testing:** MockTransport (in-memory Mock)
pub trait Transport: Send {
    /// Schreibt einen kompletten Frame auf den Bus
    ///
    /// # Fehlerbehandlung
    /// Gibt `LedError::TransportFailure` zurück wenn der Bus-Zugriff fehlschlägt
    fn write(&mut self, bytes: &[u8]) -> Result<(), LedError>;

    /// Leert eventuelle Puffer, damit der Frame wirklich auf dem Bus landet
    fn flush(&mut self) -> Result<(), LedError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LedError> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> Result<(), LedError> {
        (**self).flush()
    }
}

// ============================================================================
// defmt::Format Implementation (optional feature)
// ============================================================================

#[cfg(feature = "defmt")]
impl defmt::Format for LedError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            LedError::IndexOutOfRange { index, num_leds } => {
                defmt::write!(fmt, "IndexOutOfRange {{ index: {}, num_leds: {} }}", index, num_leds)
            }
            LedError::InvalidColorValue => defmt::write!(fmt, "InvalidColorValue"),
            LedError::InvalidLedCount => defmt::write!(fmt, "InvalidLedCount"),
            LedError::InvalidHalfPeriod => defmt::write!(fmt, "InvalidHalfPeriod"),
            LedError::TransportFailure => defmt::write!(fmt, "TransportFailure"),
            LedError::TaskSpawnFailed => defmt::write!(fmt, "TaskSpawnFailed"),
        }
    }
}
