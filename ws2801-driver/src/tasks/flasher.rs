// Flasher - lässt eine Gruppe von LEDs im Hintergrund blinken
//
// Jeder Aufruf von `Flasher::start` startet einen eigenen Thread, der die
// LEDs abwechselnd auf die Farbe und auf aus setzt. Der Thread hält nur
// eine `Weak`-Referenz auf den Framebuffer; alle Schreibzugriffe laufen
// über dessen Lock. Überlappende Flasher konkurrieren, der letzte gewinnt.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info};
use ws2801_core::{ColorValue, LedError, Selection, Transport, resolve_color};

use crate::frame_buffer::FrameBuffer;

static NEXT_FLASH_ID: AtomicUsize = AtomicUsize::new(0);

/// Was geblinkt werden soll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPattern {
    pub indices: Vec<usize>,
    pub color: ColorValue,
    /// Dauer einer Phase (an oder aus)
    pub half_period: Duration,
    /// `None` = blinkt bis `stop()`
    pub duration: Option<Duration>,
}

impl FlashPattern {
    pub fn new(
        indices: &[usize],
        color: impl Into<ColorValue>,
        half_period: Duration,
    ) -> Self {
        Self {
            indices: indices.to_vec(),
            color: color.into(),
            half_period,
            duration: None,
        }
    }

    /// Begrenzt die Laufzeit; danach sind die LEDs aus und der Task beendet
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    fn validate(&self, num_leds: usize) -> Result<(), LedError> {
        if self.half_period.is_zero() {
            return Err(LedError::InvalidHalfPeriod);
        }
        Selection::from(self.indices.as_slice()).validate(num_leds)?;
        resolve_color(self.color)?;
        Ok(())
    }
}

/// Wie ein Flash-Task geendet hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOutcome {
    /// Begrenzte Laufzeit abgelaufen
    Expired,
    /// Per `stop()` (oder Drop des Handles) abgebrochen
    Cancelled,
    /// Framebuffer existiert nicht mehr
    Detached,
}

/// Abbruch-Signal, dessen Wartezeit sofort unterbrochen werden kann
#[derive(Default)]
struct CancelToken {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelToken {
    fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wartet höchstens `timeout`; `true` wenn dabei abgebrochen wurde
    fn wait(&self, timeout: Duration) -> bool {
        let cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let (cancelled, _) = self
            .wake
            .wait_timeout_while(cancelled, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled
    }
}

/// Startet Flash-Tasks auf einem geteilten Framebuffer
pub struct Flasher<T: Transport> {
    frame: Arc<FrameBuffer<T>>,
}

impl<T: Transport + 'static> Flasher<T> {
    pub fn new(frame: Arc<FrameBuffer<T>>) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &Arc<FrameBuffer<T>> {
        &self.frame
    }

    /// Startet einen unabhängigen Blink-Task
    ///
    /// Indizes, Farbe und Halbperiode werden geprüft, bevor ein Thread
    /// gestartet wird.
    pub fn start(&self, pattern: FlashPattern) -> Result<FlashHandle, LedError> {
        pattern.validate(self.frame.num_leds())?;

        let id = NEXT_FLASH_ID.fetch_add(1, Ordering::Relaxed);
        let token = Arc::new(CancelToken::default());
        let frame = Arc::downgrade(&self.frame);
        let task_token = Arc::clone(&token);

        info!(
            "Flash #{id} start: {:?} at {:?}, half period {:?}, duration {:?}",
            pattern.indices, pattern.color, pattern.half_period, pattern.duration
        );

        let thread = thread::Builder::new()
            .name(format!("flasher-{id}"))
            .spawn(move || flash_logic(id, &frame, &pattern, &task_token))
            .map_err(|e| {
                error!("Failed to spawn flash #{id}: {e}");
                LedError::TaskSpawnFailed
            })?;

        Ok(FlashHandle {
            id,
            token,
            thread: Some(thread),
        })
    }
}

/// Besitz eines laufenden Flash-Tasks
///
/// `stop()` ist idempotent. Wird das Handle verworfen, wird der Task
/// ebenfalls gestoppt und seine LEDs sind danach aus.
pub struct FlashHandle {
    id: usize,
    token: Arc<CancelToken>,
    thread: Option<JoinHandle<FlashOutcome>>,
}

impl FlashHandle {
    /// Signalisiert den Abbruch und wartet, bis der Task seine LEDs
    /// ausgeschaltet hat und beendet ist
    ///
    /// Gibt `None` zurück, wenn der Task schon vorher gestoppt wurde.
    pub fn stop(&mut self) -> Option<FlashOutcome> {
        let thread = self.thread.take()?;
        self.token.cancel();
        match thread.join() {
            Ok(outcome) => {
                info!("Flash #{} stopped ({outcome:?})", self.id);
                Some(outcome)
            }
            Err(_) => {
                error!("Flash #{} panicked", self.id);
                None
            }
        }
    }

    /// `true` wenn der Task nicht mehr läuft (abgelaufen oder gestoppt)
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for FlashHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Blink-Schleife: Idle -> Running -> {Expired | Cancelled} -> aus
///
/// Der Abbruch wird vor jeder Phase geprüft und unterbricht die laufende
/// Wartezeit sofort. Schreibfehler werden geloggt, der Task läuft weiter.
fn flash_logic<T: Transport>(
    id: usize,
    frame: &Weak<FrameBuffer<T>>,
    pattern: &FlashPattern,
    token: &CancelToken,
) -> FlashOutcome {
    // Ein Deadline jenseits des darstellbaren Bereichs gilt als unbegrenzt
    let deadline = pattern
        .duration
        .and_then(|duration| Instant::now().checked_add(duration));
    let indices = pattern.indices.as_slice();
    let mut lit = false;

    let outcome = loop {
        if token.is_cancelled() {
            break FlashOutcome::Cancelled;
        }

        let phase = match deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) if !remaining.is_zero() => pattern.half_period.min(remaining),
                _ => break FlashOutcome::Expired,
            },
            None => pattern.half_period,
        };

        lit = !lit;
        let value = if lit {
            pattern.color
        } else {
            ColorValue::Packed(0)
        };

        // Arc nur für den Schreibzugriff halten, nicht über die Wartezeit
        let Some(leds) = frame.upgrade() else {
            break FlashOutcome::Detached;
        };
        if let Err(e) = leds.set(indices, value) {
            error!("Flash #{id}: failed to write LEDs: {e}");
        }
        drop(leds);

        if token.wait(phase) {
            break FlashOutcome::Cancelled;
        }
    };

    match frame.upgrade() {
        Some(leds) => {
            if let Err(e) = leds.set_off(indices) {
                error!("Flash #{id}: failed to switch LEDs off: {e}");
            }
        }
        None => debug!("Flash #{id}: frame buffer gone, skipping final off"),
    }

    outcome
}

#[cfg(test)]
mod tests {
    use ws2801_core::{OFF, RGB8};

    use super::*;
    use crate::config::FrameBufferConfig;
    use crate::hal::{MockLog, MockTransport};

    const AMBER: RGB8 = RGB8 { r: 80, g: 15, b: 0 };

    fn flasher(num_leds: usize) -> (Flasher<MockTransport>, Arc<Mutex<MockLog>>) {
        let (mock, log) = MockTransport::new();
        let config = FrameBufferConfig::new(num_leds).with_latch_interval(Duration::ZERO);
        let leds = FrameBuffer::with_config(mock, config).unwrap();
        (Flasher::new(Arc::new(leds)), log)
    }

    #[test]
    fn test_cancel_token_wait_times_out() {
        let token = CancelToken::default();
        let start = Instant::now();
        assert!(!token.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancel_token_interrupts_wait() {
        let token = Arc::new(CancelToken::default());
        let waiter = Arc::clone(&token);
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        token.cancel();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_start_validates_before_spawning() {
        let (flasher, log) = flasher(4);

        let bad_index = FlashPattern::new(&[1, 4], AMBER, Duration::from_millis(10));
        assert!(matches!(
            flasher.start(bad_index),
            Err(LedError::IndexOutOfRange { index: 4, .. })
        ));

        let bad_color = FlashPattern::new(
            &[1],
            ColorValue::Packed(1 << 24),
            Duration::from_millis(10),
        );
        assert!(matches!(
            flasher.start(bad_color),
            Err(LedError::InvalidColorValue)
        ));

        let zero_period = FlashPattern::new(&[1], AMBER, Duration::ZERO);
        assert!(matches!(
            flasher.start(zero_period),
            Err(LedError::InvalidHalfPeriod)
        ));

        assert_eq!(log.lock().unwrap().frames.len(), 1);
    }

    #[test]
    fn test_flash_turns_on_then_stop_turns_off() {
        let (flasher, _log) = flasher(4);
        let pattern = FlashPattern::new(&[0, 1], AMBER, Duration::from_millis(200));
        let mut handle = flasher.start(pattern).unwrap();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(flasher.frame().get(0).unwrap(), AMBER);
        assert_eq!(flasher.frame().get(1).unwrap(), AMBER);

        let start = Instant::now();
        assert_eq!(handle.stop(), Some(FlashOutcome::Cancelled));
        assert!(start.elapsed() < Duration::from_millis(200));

        assert_eq!(flasher.frame().get(0).unwrap(), OFF);
        assert_eq!(flasher.frame().get(1).unwrap(), OFF);
        assert!(handle.is_finished());
        assert_eq!(handle.stop(), None);
    }

    #[test]
    fn test_bounded_flash_expires() {
        let (flasher, _log) = flasher(2);
        let pattern = FlashPattern::new(&[1], AMBER, Duration::from_millis(10))
            .with_duration(Duration::from_millis(45));
        let mut handle = flasher.start(pattern).unwrap();

        thread::sleep(Duration::from_millis(200));
        assert!(handle.is_finished());
        assert_eq!(flasher.frame().get(1).unwrap(), OFF);
        assert_eq!(handle.stop(), Some(FlashOutcome::Expired));
    }

    #[test]
    fn test_unrepresentable_duration_runs_until_stopped() {
        let (flasher, _log) = flasher(2);
        let pattern = FlashPattern::new(&[0], AMBER, Duration::from_millis(40))
            .with_duration(Duration::MAX);
        let mut handle = flasher.start(pattern).unwrap();

        // Phase 1 (an): 0-40 ms, Phase 2 (aus): 40-80 ms
        thread::sleep(Duration::from_millis(20));
        assert_eq!(flasher.frame().get(0).unwrap(), AMBER);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(flasher.frame().get(0).unwrap(), OFF);
        assert!(!handle.is_finished());

        assert_eq!(handle.stop(), Some(FlashOutcome::Cancelled));
        assert_eq!(flasher.frame().get(0).unwrap(), OFF);
    }

    #[test]
    fn test_drop_handle_stops_task() {
        let (flasher, _log) = flasher(3);
        let handle = flasher
            .start(FlashPattern::new(&[2], AMBER, Duration::from_secs(5)))
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(flasher.frame().get(2).unwrap(), AMBER);

        drop(handle);
        assert_eq!(flasher.frame().get(2).unwrap(), OFF);
    }

    #[test]
    fn test_task_detaches_when_frame_dropped() {
        let (mock, _log) = MockTransport::new();
        let config = FrameBufferConfig::new(1).with_latch_interval(Duration::ZERO);
        let frame = Arc::new(FrameBuffer::with_config(mock, config).unwrap());
        let mut handle = Flasher::new(Arc::clone(&frame))
            .start(FlashPattern::new(&[0], AMBER, Duration::from_millis(10)))
            .unwrap();

        drop(frame);
        thread::sleep(Duration::from_millis(50));
        assert!(handle.is_finished());
        assert_eq!(handle.stop(), Some(FlashOutcome::Detached));
    }
}
