// Library-Root: WS2801 LED-Kette als indexierbarer Framebuffer
//
// Host-Seite (std): Framebuffer mit Batch-Modus, Flash-Tasks und
// konkreter SPI-Transport. Typen und Codec kommen aus ws2801-core.

pub mod config;
pub mod frame_buffer;
pub mod hal;
pub mod tasks;

// Re-exports von ws2801-core
pub use ws2801_core::{ColorValue, LedError, OFF, RGB8, Selection, Transport, resolve_color};

pub use config::{FrameBufferConfig, LatchMode};
pub use frame_buffer::FrameBuffer;
pub use hal::SpiTransport;
pub use tasks::{FlashHandle, FlashOutcome, FlashPattern, Flasher};
