use std::cell::Cell;
use std::io::{self, BufRead, Write};

use chrono::{Local, TimeZone};
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Color, Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};

use crate::app::{BatchSummary, EventKind, ListResult, ProgressEvent, ProgressSink, Prompter};
use crate::config::{ColorName, ColorScheme};
use crate::domain::StoryRecord;
use crate::error::TrackerError;

pub fn terminal_color(name: ColorName) -> Color {
    match name {
        ColorName::Black => Color::Black,
        ColorName::Red => Color::DarkRed,
        ColorName::Green => Color::DarkGreen,
        ColorName::Yellow => Color::DarkYellow,
        ColorName::Blue => Color::DarkBlue,
        ColorName::Magenta => Color::DarkMagenta,
        ColorName::Cyan => Color::DarkCyan,
        ColorName::White => Color::Grey,
        ColorName::BrightBlack => Color::DarkGrey,
        ColorName::BrightRed => Color::Red,
        ColorName::BrightGreen => Color::Green,
        ColorName::BrightYellow => Color::Yellow,
        ColorName::BrightBlue => Color::Blue,
        ColorName::BrightMagenta => Color::Magenta,
        ColorName::BrightCyan => Color::Cyan,
        ColorName::BrightWhite => Color::White,
        ColorName::Reset => Color::Reset,
    }
}

/// Colored terminal output and stdin prompts.
pub struct Console {
    colors: ColorScheme,
    progress_active: Cell<bool>,
}

impl Console {
    pub fn new(colors: ColorScheme) -> Self {
        Self {
            colors,
            progress_active: Cell::new(false),
        }
    }

    fn color_for(&self, kind: EventKind) -> Color {
        match kind {
            EventKind::Info | EventKind::Progress => terminal_color(self.colors.info),
            EventKind::Success => terminal_color(self.colors.success),
            EventKind::Warning => Color::Yellow,
            EventKind::Error => terminal_color(self.colors.error),
        }
    }

    /// Drops a pending in-place progress line before regular output.
    fn end_progress(&self, out: &mut impl Write) -> io::Result<()> {
        if self.progress_active.replace(false) {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }

    fn write_event(&self, event: &ProgressEvent) -> io::Result<()> {
        let mut out = io::stdout().lock();
        let styled = event.message.as_str().with(self.color_for(event.kind));
        if event.kind == EventKind::Progress {
            execute!(
                out,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(styled)
            )?;
            self.progress_active.set(true);
            return Ok(());
        }
        self.end_progress(&mut out)?;
        writeln!(out, "{styled}")?;
        out.flush()
    }

    fn highlight(&self, value: &ListValue) -> String {
        match value {
            ListValue::Text(text) => text
                .as_str()
                .with(terminal_color(self.colors.highlight_text))
                .to_string(),
            ListValue::Number(number) => number
                .to_string()
                .with(terminal_color(self.colors.highlight_number))
                .to_string(),
            ListValue::Other(other) => other
                .as_str()
                .with(terminal_color(self.colors.highlight_other))
                .to_string(),
        }
    }

    pub fn print_list(&self, result: &ListResult, short: bool) -> io::Result<()> {
        let mut out = io::stdout().lock();
        if result.stories.is_empty() {
            let styled = "There are no tracked stories.".with(terminal_color(self.colors.error));
            writeln!(out, "{styled}")?;
            return Ok(());
        }

        for record in &result.stories {
            if short {
                writeln!(
                    out,
                    "{} {} ({}, {} chapters)",
                    format!("[{}]", record.id).with(Color::Cyan),
                    record.title.as_str().with(terminal_color(self.colors.highlight_text)),
                    record.completion_status,
                    record.chapter_count
                )?;
                continue;
            }

            writeln!(out, "{}", format!("[ID {}]", record.id).with(Color::Cyan))?;
            for (key, value) in list_fields(record) {
                writeln!(out, "{} = {}", key.with(Color::White), self.highlight(&value))?;
            }
            writeln!(out)?;
        }
        out.flush()
    }

    pub fn print_summary(&self, summary: &BatchSummary) -> io::Result<()> {
        let mut out = io::stdout().lock();
        self.end_progress(&mut out)?;
        let line = format!(
            "Checked {} stories: {} downloaded, {} up to date, {} skipped, {} failed.",
            summary.checked,
            summary.downloaded.len(),
            summary.up_to_date.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        let color = if summary.failed.is_empty() {
            self.colors.success
        } else {
            self.colors.error
        };
        writeln!(out, "{}", line.with(terminal_color(color)))?;
        out.flush()
    }
}

impl ProgressSink for Console {
    fn event(&self, event: ProgressEvent) {
        if let Err(err) = self.write_event(&event) {
            tracing::warn!(error = %err, "failed to write to the terminal");
        }
    }
}

impl Prompter for Console {
    fn confirm(&self, message: &str) -> Result<bool, TrackerError> {
        let mut out = io::stdout().lock();
        self.end_progress(&mut out)
            .map_err(|err| TrackerError::Terminal(err.to_string()))?;
        write!(
            out,
            "{} [y/N]: ",
            message.with(terminal_color(self.colors.confirm))
        )
        .and_then(|_| out.flush())
        .map_err(|err| TrackerError::Terminal(err.to_string()))?;
        drop(out);

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .map_err(|err| TrackerError::Terminal(err.to_string()))?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Sink for non-interactive callers; drops every event.
pub struct SilentSink;

impl ProgressSink for SilentSink {
    fn event(&self, _event: ProgressEvent) {}
}

enum ListValue {
    Text(String),
    Number(u64),
    Other(String),
}

fn list_fields(record: &StoryRecord) -> Vec<(&'static str, ListValue)> {
    let mut fields = vec![
        (
            "last-update-date",
            ListValue::Text(format_date(record.last_update_timestamp)),
        ),
        ("title", ListValue::Text(record.title.clone())),
    ];
    if !record.author.is_empty() {
        fields.push(("author", ListValue::Text(record.author.clone())));
    }
    fields.push(("url", ListValue::Text(record.url.clone())));
    fields.push(("chapter-count", ListValue::Number(record.chapter_count)));
    if let Some(words) = record.words {
        fields.push(("words", ListValue::Number(words)));
    }
    fields.push((
        "completion-status",
        ListValue::Other(record.completion_status.to_string()),
    ));
    fields
}

pub fn format_date(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%d %b %Y").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
