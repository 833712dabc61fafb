// SPI Transport und Mock-Implementierung
//
// Kapselt den byte-orientierten Bus zu den WS2801 Treibern
// um Tests mit Mock-Implementierungen zu ermöglichen.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{debug, error};
use ws2801_core::{LedError, Transport};

// ============================================================================
// Real Implementation (Device-File oder beliebiger io::Write)
// ============================================================================

/// Transport über einen `io::Write`, typischerweise `/dev/spidevX.Y`
///
/// Der Kernel-Treiber taktet jeden `write()` als SPI-Transfer heraus;
/// Rahmen oder Header gibt es nicht.
pub struct SpiTransport<W: Write + Send> {
    writer: W,
}

impl SpiTransport<File> {
    /// Öffnet ein SPI Device-File zum Schreiben
    ///
    /// # Parameter
    /// - `path`: z.B. `config::DEFAULT_SPI_DEVICE`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedError> {
        let path = path.as_ref();
        let file = OpenOptions::new().write(true).open(path).map_err(|e| {
            error!("Failed to open {}: {e}", path.display());
            LedError::TransportFailure
        })?;
        debug!("Opened SPI device {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> SpiTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Transport for SpiTransport<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LedError> {
        self.writer.write_all(bytes).map_err(|e| {
            error!("SPI write of {} bytes failed: {e}", bytes.len());
            LedError::TransportFailure
        })
    }

    fn flush(&mut self) -> Result<(), LedError> {
        self.writer.flush().map_err(|e| {
            error!("SPI flush failed: {e}");
            LedError::TransportFailure
        })
    }
}

// ============================================================================
// Mock Implementation (nur für Tests)
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
