// Task-Modul: Hintergrund-Tasks, die den Framebuffer verändern
//
// Jeder Task läuft in einem eigenen Thread und ist unabhängig stoppbar.
// Synchronisiert wird ausschließlich über den Lock des Framebuffers.

pub mod flasher;

// Re-export für einfachen Import
pub use flasher::{FlashHandle, FlashOutcome, FlashPattern, Flasher};
