//! Presentation of the current selection: a console status line plus the
//! optional physical displays.

mod console;
mod display;

pub use console::{ConsoleSink, NO_ARRIVALS, format_countdown, format_line};
pub use display::{
    LineDisplay, NoDisplay, PLACEHOLDER, PhysicalOutput, SegmentDisplay, SlotDisplays,
    glyphs_for, probe,
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::io::Write;
use tracing::{info, warn};

use crate::arrivals::StopId;
use crate::config::MonitorConfig;
use crate::select::DisplaySelection;

/// Renders each tick's selection to every available surface.
pub struct Presenter {
    console: ConsoleSink<Box<dyn Write + Send>>,
    physical: Box<dyn PhysicalOutput>,
    stop_id: StopId,
    tz: Tz,
    console_failing: bool,
}

impl Presenter {
    pub fn new(
        config: &MonitorConfig,
        console: ConsoleSink<Box<dyn Write + Send>>,
        physical: Box<dyn PhysicalOutput>,
    ) -> Self {
        Self {
            console,
            physical,
            stop_id: config.stop_id.clone(),
            tz: config.timezone,
            console_failing: false,
        }
    }

    /// Stdout console plus whichever display capability [`probe`] finds.
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config, ConsoleSink::stdout(), probe(config))
    }

    pub fn displays_active(&self) -> bool {
        self.physical.is_active()
    }

    pub fn render_text(&mut self, selection: &DisplaySelection, now: DateTime<Utc>) {
        let line = format_line(selection, &self.stop_id, now, self.tz);
        match self.console.write_line(&line) {
            Ok(()) if self.console_failing => {
                self.console_failing = false;
                info!("Console output recovered");
            }
            Ok(()) => {}
            Err(e) if !self.console_failing => {
                self.console_failing = true;
                warn!(error = %e, "Console write failed");
            }
            Err(_) => {}
        }
    }

    pub async fn render_display(&mut self, selection: &DisplaySelection) {
        self.physical.render(selection, self.tz).await;
    }

    pub async fn render(&mut self, selection: &DisplaySelection, now: DateTime<Utc>) {
        self.render_display(selection).await;
        self.render_text(selection, now);
    }

    pub fn finish(&mut self) {
        if let Err(e) = self.console.finish() {
            warn!(error = %e, "Could not finish console output");
        }
    }
}
