//! Text rendering of the overall selection.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};

use crate::arrivals::StopId;
use crate::select::DisplaySelection;

pub const NO_ARRIVALS: &str = "no upcoming arrivals";

/// `"42s"` under a minute, `"3m 7s"` otherwise. Negative input reads as `"0s"`.
pub fn format_countdown(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Builds the single status line for one tick.
///
/// ```text
/// [15:04:05] Next arrivals at stop 2783: | Route 7: 03:15 PM (2m 5s) | Route 12: 03:18 PM (5m 40s)
/// ```
pub fn format_line(
    selection: &DisplaySelection,
    stop_id: &StopId,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    let mut line = format!(
        "[{}] Next arrivals at stop {stop_id}:",
        now.with_timezone(&tz).format("%H:%M:%S")
    );

    if selection.overall.is_empty() {
        line.push(' ');
        line.push_str(NO_ARRIVALS);
        return line;
    }

    for arrival in &selection.overall {
        let _ = write!(
            line,
            " | Route {}: {} ({})",
            arrival.route_id,
            arrival.scheduled.with_timezone(&tz).format("%I:%M %p"),
            format_countdown(arrival.scheduled - now)
        );
    }
    line
}

/// Writes status lines to a terminal or log-friendly stream.
pub struct ConsoleSink<W> {
    out: W,
    /// Redraw one line with `\r` instead of appending lines.
    in_place: bool,
}

impl ConsoleSink<Box<dyn Write + Send>> {
    pub fn stdout() -> Self {
        let stdout = io::stdout();
        let in_place = stdout.is_terminal();
        Self::new(Box::new(stdout), in_place)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, in_place: bool) -> Self {
        Self { out, in_place }
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.in_place {
            write!(self.out, "\r{line}\x1b[K")?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }

    /// Ends an in-place line so the shell prompt starts on a fresh one.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.in_place {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}
