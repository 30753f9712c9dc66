use crate::report::{ProgressEvent, ProgressObserver, ProgressStage};
use crate::ReportFormat;
use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

pub(crate) const SPINNER_FRAMES: [&str; 4] = ["·", "˚", "•", "˚"];

const GREEN: &str = "\x1b[38;5;82m";
const RED: &str = "\x1b[38;5;196m";
const GRAY: &str = "\x1b[38;5;240m";
const CYAN: &str = "\x1b[38;5;51m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone)]
struct FormatLine {
    stage: ProgressStage,
    percent: u8,
    message: String,
}

struct RenderState<W> {
    out: W,
    lines: BTreeMap<ReportFormat, FormatLine>,
    rendered_lines: usize,
    frame: usize,
}

/// Terminal renderer for report generation progress
///
/// On a terminal every format gets its own bar, redrawn in place. Otherwise
/// one plain line is written per stage change, which keeps CI logs readable.
pub struct TerminalProgress<W: Write + Send> {
    width: usize,
    interactive: bool,
    start: Instant,
    state: Mutex<RenderState<W>>,
}

impl TerminalProgress<io::Stderr> {
    /// Render to stderr, redrawing in place when stderr is a terminal
    pub fn stderr(width: usize) -> Self {
        let interactive = io::stderr().is_terminal();
        Self::with_writer(io::stderr(), width, interactive)
    }
}

impl<W: Write + Send> TerminalProgress<W> {
    /// width = number of bar character slots (not including the brackets)
    pub fn with_writer(out: W, width: usize, interactive: bool) -> Self {
        Self {
            width,
            interactive,
            start: Instant::now(),
            state: Mutex::new(RenderState {
                out,
                lines: BTreeMap::new(),
                rendered_lines: 0,
                frame: 0,
            }),
        }
    }

    pub fn into_writer(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .out
    }

    fn redraw(&self, state: &mut RenderState<W>) -> io::Result<()> {
        state.frame = (state.frame + 1) % SPINNER_FRAMES.len();

        if state.rendered_lines > 0 {
            // \x1b[{n}A moves up n lines
            write!(state.out, "\x1b[{}A", state.rendered_lines)?;
        }

        let spinner = SPINNER_FRAMES[state.frame];
        let elapsed = format_duration(self.start.elapsed().as_secs());
        for (format, line) in &state.lines {
            let color = match line.stage {
                ProgressStage::Failed => RED,
                _ => GREEN,
            };
            let (filled, empty) = bar_cells(self.width, line.percent as f64);
            let tail = if line.stage.is_terminal() {
                line.message.clone()
            } else {
                format!("{}{}{} {}", CYAN, line.message, RESET, spinner)
            };
            writeln!(
                state.out,
                "\x1b[2K\r{:<8} [{}{}{}{}{}{}] {}{:>3}%{}  {}  {}",
                format.to_string(),
                BOLD,
                color,
                "█".repeat(filled),
                GRAY,
                "░".repeat(empty),
                RESET,
                BOLD,
                line.percent,
                RESET,
                elapsed,
                tail
            )?;
        }
        state.rendered_lines = state.lines.len();
        state.out.flush()
    }

    fn log_line(&self, state: &mut RenderState<W>, event: &ProgressEvent) -> io::Result<()> {
        writeln!(
            state.out,
            "[{}] {} {:>3}% {}",
            event.format, event.stage, event.percent, event.message
        )?;
        state.out.flush()
    }
}

impl<W: Write + Send> ProgressObserver for TerminalProgress<W> {
    fn on_progress(&self, event: &ProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.lines.insert(
            event.format,
            FormatLine {
                stage: event.stage,
                percent: event.percent,
                message: event.message.clone(),
            },
        );

        let written = if self.interactive {
            self.redraw(&mut state)
        } else {
            self.log_line(&mut state, event)
        };
        if let Err(e) = written {
            tracing::debug!(error = %e, "Progress output failed");
        }
    }
}

/// Filled and empty cell counts for a bar of `width` cells at `progress` percent
pub(crate) fn bar_cells(width: usize, progress: f64) -> (usize, usize) {
    let pct = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    };
    let filled = ((pct / 100.0) * width as f64).round() as usize;
    (filled, width.saturating_sub(filled))
}

/// Convert a byte count to a readable string
pub fn human_bytes(bytes: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if bytes <= 0.0 {
        return "0B".to_string();
    }
    let mut val = bytes;
    let mut i = 0usize;
    while val >= 1024.0 && i + 1 < units.len() {
        val /= 1024.0;
        i += 1;
    }
    format!("{:.2}{}", val, units[i])
}

/// Format seconds to H:MM:SS or M:SS
pub fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
