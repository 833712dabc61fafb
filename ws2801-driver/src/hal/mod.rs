// Hardware Abstraction Layer (HAL) Module
//
// Dieses Modul kapselt den Bus-Zugriff hinter dem Transport-Trait,
// um Testbarkeit und Wartbarkeit zu verbessern.

pub mod spi_transport;

pub use spi_transport::SpiTransport;
pub use ws2801_core::{LedError, Transport};

#[cfg(test)]
pub(crate) use spi_transport::mock::{MockLog, MockTransport};
