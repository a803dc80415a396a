use tracing::{debug, info};

use crate::screen::Screen;

/// Where composed screens go.  Pixel rendering lives behind this seam.
pub trait DisplaySink: Send + Sync {
    fn show(&mut self, screen: &Screen);
    /// Turns the panel on or off; returns whether it is now on.
    fn switch(&mut self) -> bool;
    fn stop(&mut self);
}

/// Writes frames to the log.  Repeated identical frames are skipped.
pub struct LogDisplay {
    on: bool,
    last: Option<Screen>,
    simulation: bool,
}

impl LogDisplay {
    pub fn new(simulation: bool) -> Self {
        Self {
            on: true,
            last: None,
            simulation,
        }
    }

    fn emit(&self, screen: &Screen) {
        if self.simulation {
            info!("Display: {}", screen);
        } else {
            debug!("Display: {}", screen);
        }
    }
}

impl DisplaySink for LogDisplay {
    fn show(&mut self, screen: &Screen) {
        if self.last.as_ref() == Some(screen) {
            return;
        }
        if self.on {
            self.emit(screen);
        }
        self.last = Some(screen.clone());
    }

    fn switch(&mut self) -> bool {
        self.on = !self.on;
        info!("Display {}", if self.on { "on" } else { "off" });
        if self.on {
            if let Some(screen) = &self.last {
                self.emit(screen);
            }
        }
        self.on
    }

    fn stop(&mut self) {
        self.on = false;
        info!("Display stopped");
    }
}
