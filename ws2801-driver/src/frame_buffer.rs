//! Framebuffer für eine WS2801 LED-Kette
//!
//! Hält das Pixel-Array und dessen serialisierte Form (Wire-Buffer) und
//! schreibt sie über einen [`Transport`] auf den Bus. Alle Mutationen und
//! Emissionen laufen unter einem einzigen Mutex, damit nie ein halb
//! aktualisierter Frame auf den Bus gelangt.
//!
//! # Batch-Modus
//! Nach [`FrameBuffer::hold`] werden Änderungen nur im Speicher gesammelt;
//! [`FrameBuffer::release`] schreibt den kompletten Frame genau einmal.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use rgb::RGB8;
use smart_leds_trait::SmartLedsWrite;
use ws2801_core::{
    ColorValue, LedError, OFF, Selection, Transport, decode_pixel, encode_pixel, resolve_color,
    wire_len,
};

use crate::config::{FrameBufferConfig, LatchMode};

/// Indexierbarer Pixel-Framebuffer mit atomaren Batch-Updates
pub struct FrameBuffer<T: Transport> {
    num_leds: usize,
    latch_interval: Duration,
    latch_mode: LatchMode,
    state: Mutex<FrameState<T>>,
}

/// Alles, was nur unter dem Lock angefasst werden darf
struct FrameState<T> {
    pixels: Vec<RGB8>,
    wire: Vec<u8>,
    held: bool,
    transport: T,
    last_emit: Option<Instant>,
}

impl<T: Transport> FrameState<T> {
    fn store(&mut self, index: usize, color: RGB8) {
        self.pixels[index] = color;
        encode_pixel(&mut self.wire, index, color);
    }

    /// Schreibt den kompletten Wire-Buffer, nie ein Delta
    ///
    /// Im `Enforced` Modus wird vorher der Rest der Latch-Pause seit der
    /// letzten Emission abgewartet.
    fn emit(&mut self, latch_interval: Duration, latch_mode: LatchMode) -> Result<(), LedError> {
        if latch_mode == LatchMode::Enforced {
            if let Some(remaining) = self
                .last_emit
                .and_then(|last| latch_interval.checked_sub(last.elapsed()))
            {
                thread::sleep(remaining);
            }
        }

        trace!("Emitting frame ({} bytes)", self.wire.len());
        let result = self
            .transport
            .write(&self.wire)
            .and_then(|()| self.transport.flush());
        self.last_emit = Some(Instant::now());
        result
    }
}

impl<T: Transport> FrameBuffer<T> {
    /// Erstellt einen Framebuffer mit Default-Latch-Einstellungen
    pub fn new(transport: T, num_leds: usize) -> Result<Self, LedError> {
        Self::with_config(transport, FrameBufferConfig::new(num_leds))
    }

    /// Erstellt einen Framebuffer und schaltet die Kette einmal komplett aus
    pub fn with_config(transport: T, config: FrameBufferConfig) -> Result<Self, LedError> {
        if config.num_leds == 0 {
            return Err(LedError::InvalidLedCount);
        }

        let mut state = FrameState {
            pixels: vec![OFF; config.num_leds],
            wire: vec![0; wire_len(config.num_leds)],
            held: false,
            transport,
            last_emit: None,
        };
        state.emit(config.latch_interval, config.latch_mode)?;
        debug!(
            "Frame buffer ready: {} LEDs, latch {:?} ({:?})",
            config.num_leds, config.latch_interval, config.latch_mode
        );

        Ok(Self {
            num_leds: config.num_leds,
            latch_interval: config.latch_interval,
            latch_mode: config.latch_mode,
            state: Mutex::new(state),
        })
    }

    pub fn num_leds(&self) -> usize {
        self.num_leds
    }

    // Der Zustand ist bei jedem Unlock konsistent, ein Panic in einem
    // anderen Thread macht ihn nicht unbrauchbar.
    fn lock(&self) -> MutexGuard<'_, FrameState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, state: &mut FrameState<T>) -> Result<(), LedError> {
        state.emit(self.latch_interval, self.latch_mode)
    }

    fn check_index(&self, index: usize) -> Result<(), LedError> {
        if index < self.num_leds {
            Ok(())
        } else {
            Err(LedError::IndexOutOfRange {
                index,
                num_leds: self.num_leds,
            })
        }
    }

    /// Liefert den aktuell gespeicherten Wert einer LED
    pub fn get(&self, index: usize) -> Result<RGB8, LedError> {
        self.check_index(index)?;
        Ok(decode_pixel(&self.lock().wire, index))
    }

    /// Setzt eine oder mehrere LEDs auf `value`
    ///
    /// Index und Farbe werden komplett validiert, bevor etwas verändert wird.
    /// Bei mehreren Indizes gibt es genau eine Emission für den ganzen Satz;
    /// im Batch-Modus (nach `hold()`) gar keine.
    ///
    /// # Beispiele
    ///
    /// ```ignore
    /// leds.set(3, 0xFF0000)?;                 // eine LED, gepackt
    /// leds.set(&[0, 1, 2], (30, 10, 0))?;     // drei LEDs, eine Emission
    /// ```
    pub fn set<'a>(
        &self,
        selection: impl Into<Selection<'a>>,
        value: impl Into<ColorValue>,
    ) -> Result<(), LedError> {
        let selection = selection.into();
        selection.validate(self.num_leds)?;
        let color = resolve_color(value.into())?;

        if selection.is_empty() {
            return Ok(());
        }

        // Der Lock wird über Mutation und Emission gehalten, der Batch-Zustand
        // des Aufrufers bleibt damit unverändert.
        let mut state = self.lock();
        for index in selection.iter() {
            state.store(index, color);
        }
        if state.held {
            return Ok(());
        }
        self.emit(&mut state)
    }

    /// Kurzform für `set(selection, 0)`
    pub fn set_off<'a>(&self, selection: impl Into<Selection<'a>>) -> Result<(), LedError> {
        self.set(selection, ColorValue::Packed(0))
    }

    /// Schreibt Pixel ab Index 0 der Reihe nach, mit einer Emission
    ///
    /// Mehr Pixel als LEDs ergeben `IndexOutOfRange`, ohne dass etwas
    /// verändert wird. Weniger Pixel lassen den Rest unverändert.
    pub fn set_pixels<I>(&self, pixels: I) -> Result<(), LedError>
    where
        I: IntoIterator<Item = RGB8>,
    {
        let pixels: Vec<RGB8> = pixels.into_iter().collect();
        if pixels.len() > self.num_leds {
            return Err(LedError::IndexOutOfRange {
                index: self.num_leds,
                num_leds: self.num_leds,
            });
        }

        let mut state = self.lock();
        for (index, color) in pixels.into_iter().enumerate() {
            state.store(index, color);
        }
        if state.held {
            return Ok(());
        }
        self.emit(&mut state)
    }

    /// Batch-Modus betreten; mehrfacher Aufruf ist ein No-op
    pub fn hold(&self) {
        let mut state = self.lock();
        if !state.held {
            debug!("Holding frame");
            state.held = true;
        }
    }

    /// Batch-Modus verlassen und den Frame genau einmal schreiben
    ///
    /// Ohne vorheriges `hold()` passiert nichts.
    pub fn release(&self) -> Result<(), LedError> {
        let mut state = self.lock();
        if !state.held {
            return Ok(());
        }
        state.held = false;
        debug!("Releasing held frame");
        self.emit(&mut state)
    }

    pub fn is_held(&self) -> bool {
        self.lock().held
    }

    /// Schreibt den kompletten Frame und wartet danach die Latch-Pause ab
    ///
    /// Die Pause läuft außerhalb des Locks; andere Emissionen warten ihren
    /// Abstand ohnehin selbst ab.
    pub fn refresh(&self) -> Result<(), LedError> {
        self.refresh_no_wait()?;
        thread::sleep(self.latch_interval);
        Ok(())
    }

    /// Wie [`refresh`](Self::refresh), aber ohne abschließende Pause
    ///
    /// Für Dauer-Updates, bei denen ein verlorener Latch nicht stört.
    pub fn refresh_no_wait(&self) -> Result<(), LedError> {
        let mut state = self.lock();
        self.emit(&mut state)
    }

    /// Alle LEDs aus, genau eine Emission, auch im Batch-Modus
    pub fn all_off(&self) -> Result<(), LedError> {
        let mut state = self.lock();
        state.pixels.fill(OFF);
        state.wire.fill(0);
        debug!("All LEDs off");
        self.emit(&mut state)
    }

    /// Kopie aller aktuellen Pixelwerte
    pub fn snapshot(&self) -> Vec<RGB8> {
        self.lock().pixels.clone()
    }

    /// Kopie des Wire-Buffers, so wie er auf den Bus geht
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.lock().wire.clone()
    }
}

// ============================================================================
// smart-leds Integration
// ============================================================================

impl<T: Transport> SmartLedsWrite for FrameBuffer<T> {
    type Error = LedError;
    type Color = RGB8;

    fn write<It, I>(&mut self, iterator: It) -> Result<(), Self::Error>
    where
        It: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.set_pixels(iterator.into_iter().map(Into::into))
    }
}

impl<T: Transport> SmartLedsWrite for &FrameBuffer<T> {
    type Error = LedError;
    type Color = RGB8;

    fn write<It, I>(&mut self, iterator: It) -> Result<(), Self::Error>
    where
        It: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.set_pixels(iterator.into_iter().map(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::hal::{MockLog, MockTransport};

    const ORANGE: RGB8 = RGB8 { r: 30, g: 10, b: 0 };

    fn frame_buffer(num_leds: usize) -> (FrameBuffer<MockTransport>, Arc<Mutex<MockLog>>) {
        let (mock, log) = MockTransport::new();
        let config = FrameBufferConfig::new(num_leds).with_latch_interval(Duration::ZERO);
        let leds = FrameBuffer::with_config(mock, config).unwrap();
        (leds, log)
    }

    fn emissions(log: &Arc<Mutex<MockLog>>) -> usize {
        log.lock().unwrap().frames.len()
    }

    #[test]
    fn test_new_emits_initial_off_frame() {
        let (_leds, log) = frame_buffer(4);
        let log = log.lock().unwrap();
        assert_eq!(log.frames, vec![vec![0u8; 12]]);
    }

    #[test]
    fn test_zero_leds_rejected() {
        let (mock, _log) = MockTransport::new();
        assert!(matches!(
            FrameBuffer::new(mock, 0),
            Err(LedError::InvalidLedCount)
        ));
    }

    #[test]
    fn test_set_then_get() {
        let (leds, log) = frame_buffer(4);
        leds.set(2, ORANGE).unwrap();

        assert_eq!(leds.get(2).unwrap(), ORANGE);
        assert_eq!(emissions(&log), 2);
        assert_eq!(
            log.lock().unwrap().last_frame(),
            Some(&[0u8, 0, 0, 0, 0, 0, 30, 10, 0, 0, 0, 0][..])
        );
    }

    #[test]
    fn test_multi_set_single_emission() {
        let (leds, log) = frame_buffer(6);
        leds.set(&[0, 2, 2, 5], 0x102030).unwrap();

        assert_eq!(emissions(&log), 2);
        for index in [0, 2, 5] {
            assert_eq!(leds.get(index).unwrap(), RGB8 { r: 0x10, g: 0x20, b: 0x30 });
        }
        assert_eq!(leds.get(1).unwrap(), OFF);
    }

    #[test]
    fn test_empty_selection_is_noop() {
        let (leds, log) = frame_buffer(3);
        leds.set(&[] as &[usize], ORANGE).unwrap();
        assert_eq!(emissions(&log), 1);
    }

    #[test]
    fn test_multi_set_inside_hold_stays_held() {
        let (leds, log) = frame_buffer(4);
        leds.hold();
        leds.set(&[0, 1], ORANGE).unwrap();

        assert!(leds.is_held());
        assert_eq!(emissions(&log), 1);

        leds.release().unwrap();
        assert_eq!(emissions(&log), 2);
    }

    #[test]
    fn test_hold_is_reentrant_and_release_idempotent() {
        let (leds, log) = frame_buffer(4);
        leds.hold();
        leds.hold();
        leds.set(1, ORANGE).unwrap();
        leds.release().unwrap();
        leds.release().unwrap();

        assert!(!leds.is_held());
        assert_eq!(emissions(&log), 2);
    }

    #[test]
    fn test_invalid_input_leaves_frame_untouched() {
        let (leds, log) = frame_buffer(4);
        leds.set(1, ORANGE).unwrap();

        assert_eq!(
            leds.set(&[0, 4], 0u32),
            Err(LedError::IndexOutOfRange {
                index: 4,
                num_leds: 4
            })
        );
        assert_eq!(
            leds.set(0, ColorValue::Triple(256, 0, 0)),
            Err(LedError::InvalidColorValue)
        );
        assert_eq!(leds.set(0, 1u32 << 24), Err(LedError::InvalidColorValue));

        assert_eq!(leds.get(0).unwrap(), OFF);
        assert_eq!(leds.get(1).unwrap(), ORANGE);
        assert_eq!(emissions(&log), 2);
    }

    #[test]
    fn test_get_out_of_range() {
        let (leds, _log) = frame_buffer(4);
        assert_eq!(
            leds.get(4),
            Err(LedError::IndexOutOfRange {
                index: 4,
                num_leds: 4
            })
        );
    }

    #[test]
    fn test_all_off_ignores_hold() {
        let (leds, log) = frame_buffer(3);
        leds.set(&[0, 1, 2], ORANGE).unwrap();
        leds.hold();
        leds.all_off().unwrap();

        assert_eq!(leds.snapshot(), vec![OFF; 3]);
        assert_eq!(emissions(&log), 3);
        assert_eq!(log.lock().unwrap().last_frame(), Some(&[0u8; 9][..]));
        assert!(leds.is_held());
    }

    #[test]
    fn test_transport_failure_keeps_new_state() {
        let (leds, log) = frame_buffer(2);
        log.lock().unwrap().fail_next_write = true;

        assert_eq!(leds.set(1, ORANGE), Err(LedError::TransportFailure));
        assert_eq!(leds.get(1).unwrap(), ORANGE);

        leds.refresh().unwrap();
        assert_eq!(
            log.lock().unwrap().last_frame(),
            Some(&[0u8, 0, 0, 30, 10, 0][..])
        );
    }

    #[test]
    fn test_wire_bytes_follow_pixels() {
        let (leds, _log) = frame_buffer(2);
        leds.set(0, (1, 2, 3)).unwrap();
        leds.set(1, 0x040506).unwrap();
        assert_eq!(leds.wire_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_smart_leds_write() {
        let (mut leds, log) = frame_buffer(3);
        let colors = [RGB8::new(1, 1, 1), RGB8::new(2, 2, 2)];
        leds.write(colors.iter().copied()).unwrap();

        assert_eq!(leds.snapshot(), vec![colors[0], colors[1], OFF]);
        assert_eq!(emissions(&log), 2);

        let too_many = [ORANGE; 4];
        assert!(leds.write(too_many.iter().copied()).is_err());
        assert_eq!(leds.get(2).unwrap(), OFF);
    }

    #[test]
    fn test_relaxed_latch_skips_gap() {
        let (mock, log) = MockTransport::new();
        let config = FrameBufferConfig::new(1)
            .with_latch_interval(Duration::from_millis(50))
            .with_latch_mode(LatchMode::Relaxed);
        let leds = FrameBuffer::with_config(mock, config).unwrap();

        let start = Instant::now();
        leds.refresh_no_wait().unwrap();
        leds.refresh_no_wait().unwrap();

        assert!(start.elapsed() < Duration::from_millis(25));
        assert_eq!(emissions(&log), 3);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let (leds, log) = frame_buffer(3);
        let leds = Arc::new(leds);

        let poisoner = Arc::clone(&leds);
        let result = thread::spawn(move || {
            let _state = poisoner.lock();
            panic!("writer died while holding the frame");
        })
        .join();
        assert!(result.is_err());
        assert!(leds.state.is_poisoned());

        leds.set(1, ORANGE).unwrap();
        assert_eq!(leds.get(1).unwrap(), ORANGE);
        assert_eq!(emissions(&log), 2);
    }

    #[test]
    fn test_enforced_latch_gap_between_emissions() {
        let (mock, log) = MockTransport::new();
        let config = FrameBufferConfig::new(1).with_latch_interval(Duration::from_millis(20));
        let leds = FrameBuffer::with_config(mock, config).unwrap();

        let start = Instant::now();
        leds.refresh_no_wait().unwrap();
        leds.refresh_no_wait().unwrap();

        // Initialer Frame + 2 Emissionen => mindestens zwei volle Pausen
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(emissions(&log), 3);
    }
}
