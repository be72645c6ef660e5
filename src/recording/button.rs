use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Electrical level of the button pin
///
/// The pin is pulled up, so a pressed button reads `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn is_pressed(self) -> bool {
        self == Level::Low
    }
}

/// A confirmed button transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// High → Low
    Pressed,
    /// Low → High
    Released,
}

/// Anything that can report the current pin level
pub trait ButtonInput {
    fn level(&self) -> Level;
}

/// Button whose level is set by another party (keyboard thread, tests)
///
/// Clones share the same pin.
#[derive(Debug, Clone)]
pub struct ManualButton {
    pressed: Arc<AtomicBool>,
}

impl ManualButton {
    pub fn new() -> Self {
        Self {
            pressed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn press(&self) {
        self.pressed.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.pressed.store(false, Ordering::SeqCst);
    }

    /// Flip the pin and return whether it is now pressed
    pub fn toggle(&self) -> bool {
        !self.pressed.fetch_xor(true, Ordering::SeqCst)
    }
}

impl Default for ManualButton {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonInput for ManualButton {
    fn level(&self) -> Level {
        if self.pressed.load(Ordering::SeqCst) {
            Level::Low
        } else {
            Level::High
        }
    }
}

/// Button that follows a timeline of levels relative to its creation
///
/// Uses the tokio clock, so it can be driven with a paused runtime.
#[derive(Debug, Clone)]
pub struct ScriptedButton {
    origin: Instant,
    steps: Vec<(Duration, Level)>,
}

impl ScriptedButton {
    /// `steps` are `(offset, level)` pairs; the pin reads `High` before the first one
    pub fn new(mut steps: Vec<(Duration, Level)>) -> Self {
        steps.sort_by_key(|(offset, _)| *offset);
        Self {
            origin: Instant::now(),
            steps,
        }
    }
}

impl ButtonInput for ScriptedButton {
    fn level(&self) -> Level {
        let elapsed = self.origin.elapsed();
        self.steps
            .iter()
            .take_while(|(offset, _)| *offset <= elapsed)
            .last()
            .map(|(_, level)| *level)
            .unwrap_or(Level::High)
    }
}

/// Keyboard stand-in for the hardware button: every Enter on stdin toggles it
pub struct KeyboardButton;

impl KeyboardButton {
    /// Spawn the stdin reader thread and return the pin it drives
    pub fn spawn() -> ManualButton {
        let button = ManualButton::new();
        let pin = button.clone();

        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if line.is_err() {
                    break;
                }
                let pressed = pin.toggle();
                info!("Button {}", if pressed { "pressed" } else { "released" });
            }
            debug!("Keyboard button reader stopped");
        });

        button
    }
}

/// Edge detector with a fixed settle-and-reconfirm window
pub struct Debouncer {
    last: Level,
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            last: Level::High,
            window,
        }
    }

    pub fn last_level(&self) -> Level {
        self.last
    }

    /// Sample the pin; on a change wait out the window and re-read it
    ///
    /// Only a change that is still present after the window is reported.
    pub async fn poll(&mut self, input: &impl ButtonInput) -> Option<Edge> {
        let level = input.level();
        if level == self.last {
            return None;
        }

        tokio::time::sleep(self.window).await;
        let confirmed = input.level();
        self.last = confirmed;

        if confirmed != level {
            debug!("Ignoring button glitch ({:?} did not hold)", level);
            return None;
        }

        Some(match confirmed {
            Level::Low => Edge::Pressed,
            Level::High => Edge::Released,
        })
    }
}
