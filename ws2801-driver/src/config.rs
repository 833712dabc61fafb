// Projekt-Konfiguration: Konstanten und Laufzeit-Konfiguration des Framebuffers

use std::time::Duration;

use log::warn;

// ============================================================================
// LED Konfiguration
// ============================================================================

/// Anzahl der LEDs in der Kette (drei Rauten à 8 LEDs + 1)
pub const DEFAULT_LED_COUNT: usize = 25;

/// SPI Device-File am BeagleBone Black
pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev1.0";

/// Minimale Pause nach jedem Frame, damit die WS2801 Treiber latchen
pub const DEFAULT_LATCH_INTERVAL: Duration = Duration::from_millis(1);

/// Environment Variable für die LED-Anzahl
pub const ENV_LED_COUNT: &str = "WS2801_LED_COUNT";

/// Environment Variable für die Latch-Pause in Mikrosekunden
pub const ENV_LATCH_US: &str = "WS2801_LATCH_US";

// ============================================================================
// Laufzeit-Konfiguration
// ============================================================================

/// Umgang mit der Latch-Pause zwischen zwei Frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchMode {
    /// Jede Emission wartet, bis seit der letzten die Latch-Pause vergangen ist
    #[default]
    Enforced,
    /// Dauer-Update: Frames dürfen direkt aufeinander folgen (verlorene Latches sind ok)
    Relaxed,
}

/// Konfiguration für `FrameBuffer::with_config`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBufferConfig {
    pub num_leds: usize,
    pub latch_interval: Duration,
    pub latch_mode: LatchMode,
}

impl Default for FrameBufferConfig {
    fn default() -> Self {
        Self {
            num_leds: DEFAULT_LED_COUNT,
            latch_interval: DEFAULT_LATCH_INTERVAL,
            latch_mode: LatchMode::Enforced,
        }
    }
}

impl FrameBufferConfig {
    pub fn new(num_leds: usize) -> Self {
        Self {
            num_leds,
            ..Self::default()
        }
    }

    /// Liest `WS2801_LED_COUNT` und `WS2801_LATCH_US`
    ///
    /// Fehlende Variablen ergeben die Defaults, ungültige Werte werden
    /// geloggt und ebenfalls durch Defaults ersetzt.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_LED_COUNT) {
            match raw.trim().parse::<usize>() {
                Ok(count) if count > 0 => config.num_leds = count,
                _ => warn!(
                    "{ENV_LED_COUNT}={raw:?} is not a positive number, using {DEFAULT_LED_COUNT}"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_LATCH_US) {
            match raw.trim().parse::<u64>() {
                Ok(micros) => config.latch_interval = Duration::from_micros(micros),
                Err(_) => warn!(
                    "{ENV_LATCH_US}={raw:?} is not a number, using {:?}",
                    DEFAULT_LATCH_INTERVAL
                ),
            }
        }

        config
    }

    pub fn with_latch_interval(mut self, latch_interval: Duration) -> Self {
        self.latch_interval = latch_interval;
        self
    }

    pub fn with_latch_mode(mut self, latch_mode: LatchMode) -> Self {
        self.latch_mode = latch_mode;
        self
    }
}
