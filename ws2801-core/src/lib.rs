//! WS2801 Core - Platform-agnostic Types, Codec und Traits
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert nur Traits, Typen und Pure Functions.

#![no_std]

extern crate alloc;

pub mod logic;
pub mod traits;
pub mod types;

// Re-exports für einfachen Zugriff
pub use logic::{OFF, decode_pixel, encode_pixel, pack_color, resolve_color, wire_len};
pub use traits::{LedError, Transport};
pub use types::{ColorValue, Selection};

/// Pixel-Typ: drei 8-Bit Kanäle (direkt von rgb crate)
pub use rgb::RGB8;
