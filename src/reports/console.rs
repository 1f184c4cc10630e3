use crate::Result;
use crate::stats::{ActivityCalendar, BatchResponse, BatchStatus, ProviderOutcome, ProviderResult};
use core::fmt::{self, Write};
use owo_colors::OwoColorize;

const SEPARATOR_WIDTH: usize = 40;

/// Payload fields worth showing on a provider line, in display order.
const HIGHLIGHTS: [(&str, &str); 5] = [
    ("solved", "solved"),
    ("contests", "contests"),
    ("rating", "rating"),
    ("ranking", "ranking"),
    ("followers", "followers"),
];

/// Write a human-readable summary of a batch response.
pub fn generate<W: Write>(response: &BatchResponse, use_colors: bool, writer: &mut W) -> Result<()> {
    ConsoleReporter::new(writer, use_colors).generate_report(response)
}

struct ConsoleReporter<'a, W: Write> {
    writer: &'a mut W,
    colors: ColorScheme,
    provider_width: usize,
}

impl<'a, W: Write> ConsoleReporter<'a, W> {
    const fn new(writer: &'a mut W, use_colors: bool) -> Self {
        Self {
            writer,
            colors: ColorScheme { enabled: use_colors },
            provider_width: 0,
        }
    }

    fn generate_report(&mut self, response: &BatchResponse) -> Result<()> {
        self.provider_width = response.results.keys().map(String::len).max().unwrap_or(0);

        write!(self.writer, "Status         : ")?;
        self.colors.write_status(self.writer, response.status)?;
        writeln!(self.writer)?;
        writeln!(self.writer, "Processing Time: {} ms", response.processing_time_ms)?;

        self.write_section("Providers")?;
        for (name, outcome) in &response.results {
            self.write_provider_line(name, outcome)?;
        }

        let aggregate = &response.aggregate;
        self.write_section("Totals")?;
        writeln!(self.writer, "  Solved      : {}", aggregate.totals.solved)?;
        writeln!(self.writer, "  Contests    : {}", aggregate.totals.contests)?;
        writeln!(self.writer, "  Followers   : {}", aggregate.totals.followers)?;
        writeln!(
            self.writer,
            "  Data Quality: {:.0}% ({} of {} providers)",
            aggregate.data_quality * 100.0,
            aggregate.succeeded.len(),
            aggregate.requested
        )?;

        self.write_activity(&aggregate.activity)?;
        Ok(())
    }

    fn write_section(&mut self, title: &str) -> Result<()> {
        writeln!(self.writer)?;
        self.colors.write_styled_text(self.writer, title, TextStyle::Bold)?;
        writeln!(self.writer)?;
        self.colors.write_styled_line(self.writer, "─", SEPARATOR_WIDTH, TextStyle::Dimmed)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn write_provider_line(&mut self, name: &str, outcome: &ProviderOutcome) -> Result<()> {
        let width = self.provider_width;
        write!(self.writer, "  {name:<width$}  {}  ", outcome.handle)?;
        self.colors.write_result(self.writer, &outcome.result)?;

        match &outcome.result {
            ProviderResult::Ok(payload) => {
                for (field, label) in HIGHLIGHTS {
                    if let Some(value) = payload.get(field).filter(|v| v.is_number()) {
                        write!(self.writer, "  {label}={value}")?;
                    }
                }
            }
            other => {
                if let Some(reason) = other.reason() {
                    write!(self.writer, "  ")?;
                    self.colors.write_styled_text(self.writer, reason, TextStyle::Dimmed)?;
                }
            }
        }

        if let Some(cache) = &outcome.cache {
            write!(self.writer, "  ")?;
            let origin = format!("[{}]", cache.origin);
            self.colors.write_styled_text(self.writer, &origin, TextStyle::Dimmed)?;
        }

        writeln!(self.writer)?;
        Ok(())
    }

    fn write_activity(&mut self, activity: &ActivityCalendar) -> Result<()> {
        self.write_section("Activity")?;
        writeln!(self.writer, "  Window        : {} to {}", activity.start, activity.end)?;
        writeln!(self.writer, "  Submissions   : {}", activity.total)?;
        writeln!(self.writer, "  Active Days   : {}", activity.active_days)?;
        writeln!(self.writer, "  Longest Streak: {}", activity.longest_streak)?;
        writeln!(self.writer, "  Current Streak: {}", activity.current_streak)?;

        if let Some(busiest) = &activity.busiest_day {
            writeln!(self.writer, "  Busiest Day   : {} ({})", busiest.date, busiest.count)?;
        }

        if !activity.estimated_sources.is_empty() {
            writeln!(self.writer, "  Estimated From: {}", activity.estimated_sources.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone)]
enum TextStyle {
    Bold,
    Dimmed,
}

struct ColorScheme {
    enabled: bool,
}

impl ColorScheme {
    fn write_styled_text<W: Write>(&self, writer: &mut W, text: &str, style: TextStyle) -> fmt::Result {
        if !self.enabled {
            return write!(writer, "{text}");
        }
        match style {
            TextStyle::Bold => write!(writer, "{}", text.bold()),
            TextStyle::Dimmed => write!(writer, "{}", text.dimmed()),
        }
    }

    fn write_styled_line<W: Write>(&self, writer: &mut W, ch: &str, width: usize, style: TextStyle) -> fmt::Result {
        self.write_styled_text(writer, &ch.repeat(width), style)
    }

    fn write_status<W: Write>(&self, writer: &mut W, status: BatchStatus) -> fmt::Result {
        if !self.enabled {
            return write!(writer, "{status}");
        }
        match status {
            BatchStatus::Success => write!(writer, "{}", status.green()),
            BatchStatus::Partial => write!(writer, "{}", status.yellow()),
            BatchStatus::Failed => write!(writer, "{}", status.red()),
        }
    }

    fn write_result<W: Write>(&self, writer: &mut W, result: &ProviderResult) -> fmt::Result {
        let status = result.status();
        if !self.enabled {
            return write!(writer, "{status}");
        }
        match result {
            ProviderResult::Ok(_) => write!(writer, "{}", status.green()),
            ProviderResult::RateLimited(_) => write!(writer, "{}", status.yellow()),
            ProviderResult::Failed(_) => write!(writer, "{}", status.red()),
            ProviderResult::Unavailable(_) => write!(writer, "{}", status.dimmed()),
        }
    }
}
