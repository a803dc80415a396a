use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::event::{ButtonEvent, ButtonId};
use crate::task::TaskHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const STEP_INTERVAL: Duration = Duration::from_millis(160);

/// Source of raw button levels.  The GPIO driver lives outside this crate.
pub trait PinReader: Send + Sync + 'static {
    fn is_pressed(&self, button: ButtonId) -> bool;
}

/// In-memory pin levels, written by whatever drives the buttons.
#[derive(Clone, Default)]
pub struct SharedPins {
    levels: Arc<[AtomicBool; 12]>,
}

impl SharedPins {
    pub fn set(&self, button: ButtonId, pressed: bool) {
        self.levels[button.index()].store(pressed, Ordering::Relaxed);
    }
}

impl PinReader for SharedPins {
    fn is_pressed(&self, button: ButtonId) -> bool {
        self.levels[button.index()].load(Ordering::Relaxed)
    }
}

/// Turns the level of one button into press-steps.
#[derive(Debug)]
pub struct PressTracker {
    button: ButtonId,
    step_count: u32,
    last_step: Option<Instant>,
}

impl PressTracker {
    pub fn new(button: ButtonId) -> Self {
        Self {
            button,
            step_count: 0,
            last_step: None,
        }
    }

    pub fn refresh(&mut self, pressed: bool, now: Instant) -> Option<ButtonEvent> {
        if pressed {
            let due = self
                .last_step
                .map_or(true, |last| now.duration_since(last) >= STEP_INTERVAL);
            if !due {
                return None;
            }
            self.step_count += 1;
            self.last_step = Some(now);
            Some(ButtonEvent::press(self.button, self.step_count))
        } else if self.step_count > 0 {
            let event = ButtonEvent::release(self.button, self.step_count);
            self.step_count = 0;
            self.last_step = None;
            Some(event)
        } else {
            None
        }
    }
}

pub fn spawn<R: PinReader>(reader: R, tx: mpsc::Sender<ButtonEvent>) -> TaskHandle {
    TaskHandle::spawn("buttons", move |token| async move {
        let mut trackers: Vec<PressTracker> =
            ButtonId::ALL.iter().map(|b| PressTracker::new(*b)).collect();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    for tracker in trackers.iter_mut() {
                        let pressed = reader.is_pressed(tracker.button);
                        if let Some(event) = tracker.refresh(pressed, now) {
                            debug!("Button {:?} {:?} {}", event.button, event.phase, event.step_count);
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    })
}

/// Key typed on the console for each button, in simulation mode.
fn console_button(key: &str) -> Option<ButtonId> {
    let button = match key {
        "1" => ButtonId::Digit1,
        "2" => ButtonId::Digit2,
        "3" => ButtonId::Digit3,
        "4" => ButtonId::Digit4,
        "5" => ButtonId::Digit5,
        "6" => ButtonId::Digit6,
        "p" => ButtonId::Playlist,
        "a" => ButtonId::AlarmSetting,
        "+" => ButtonId::More,
        "-" => ButtonId::Less,
        "s" => ButtonId::Snooze,
        "n" => ButtonId::NextPowerOff,
        _ => return None,
    };
    Some(button)
}

/// Parses `<key> [held_ms]`; a bare key is a short tap.
fn parse_console_line(line: &str) -> Option<(ButtonId, Duration)> {
    let mut parts = line.split_whitespace();
    let button = console_button(parts.next()?)?;
    let held = match parts.next() {
        Some(ms) => Duration::from_millis(ms.parse().ok()?),
        None => Duration::from_millis(100),
    };
    Some((button, held))
}

/// Drives `pins` from stdin so the daemon can be used without hardware.
pub fn spawn_console(pins: SharedPins) -> TaskHandle {
    TaskHandle::spawn("console buttons", move |token| async move {
        info!("Console buttons: 1-6 p a + - s n, optionally followed by a hold time in ms");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = tokio::select! {
                _ = token.cancelled() => break,
                line = lines.next_line() => line,
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Console read failed: {}", e);
                    break;
                }
            };
            let Some((button, held)) = parse_console_line(&line) else {
                warn!("Unknown console input: {:?}", line.trim());
                continue;
            };
            pins.set(button, true);
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(held) => {}
            }
            pins.set(button, false);
        }
    })
}
