use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthStr;

use crate::board::Board;
use crate::config::Config;
use crate::plan::{CellState, DayCell, PlanWindow};
use crate::schedule::DayDetail;
use crate::theme::ThemeBlock;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    #[tracing::instrument(skip(self, out, cells, window))]
    pub fn print_month<W: Write>(
        &self,
        out: &mut W,
        month: NaiveDate,
        window: &PlanWindow,
        week_start: Weekday,
        cells: &[DayCell],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", month.format("%B %Y"))?;
        writeln!(
            out,
            "plan {} .. {} ({} days)",
            window.start().format("%Y-%m-%d"),
            window.final_day().format("%Y-%m-%d"),
            window.duration_days()
        )?;
        writeln!(out)?;

        let headers = weekday_labels(week_start);
        let mut rows = Vec::new();
        for week in cells.chunks(7) {
            rows.push(week.iter().map(|cell| self.cell_text(cell)).collect());
            rows.push(week.iter().map(caption_text).collect());
        }
        write_table(&mut *out, headers, rows)?;

        writeln!(out)?;
        writeln!(out, "@ today   * work done   + open   ! final day")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, board))]
    pub fn print_board<W: Write>(&self, out: &mut W, board: &Board) -> anyhow::Result<()> {
        self.print_group(&mut *out, "Active", &board.active, false)?;
        self.print_group(&mut *out, "Upcoming", &board.upcoming, true)?;
        self.print_group(&mut *out, "Completed", &board.completed, false)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, block))]
    pub fn print_theme_info<W: Write>(&self, out: &mut W, block: &ThemeBlock) -> anyhow::Result<()> {
        writeln!(out, "id         {}", block.id)?;
        writeln!(out, "title      {}", block.title)?;
        writeln!(out, "status     {}", block.status)?;
        writeln!(out, "order      {}", block.order)?;
        writeln!(out, "days       {}", block.duration_days)?;
        for objective in &block.objectives {
            writeln!(out, "objective  {objective}")?;
        }
        for (idx, group) in block.references.iter().enumerate() {
            let used = if group.used { " (used)" } else { "" };
            writeln!(out, "refs day {}{} {}", idx + 1, used, group.remark)?;
            for link in &group.links {
                writeln!(out, "           {link}")?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, detail, window))]
    pub fn print_day_detail<W: Write>(
        &self,
        out: &mut W,
        detail: &DayDetail,
        window: &PlanWindow,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "{}  day {} of {}",
            detail.date.format("%A, %Y-%m-%d"),
            detail.plan_day_index + 1,
            window.duration_days()
        )?;

        match &detail.theme {
            Some(theme) => {
                writeln!(out, "theme      {} (day {})", theme.title, theme.day_in_theme + 1)?;
                match &theme.references {
                    Some(group) => {
                        if !group.remark.is_empty() {
                            writeln!(out, "remark     {}", group.remark)?;
                        }
                        for link in &group.links {
                            writeln!(out, "reference  {link}")?;
                        }
                    }
                    None => writeln!(out, "reference  -")?,
                }
            }
            None => writeln!(out, "theme      -")?,
        }

        if detail.works.is_empty() {
            writeln!(out, "work       -")?;
        } else {
            for link in &detail.works {
                writeln!(out, "work       {}", self.paint(link, "32"))?;
            }
        }
        Ok(())
    }

    fn print_group<W: Write>(
        &self,
        mut out: W,
        title: &str,
        blocks: &[ThemeBlock],
        with_position: bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "{} ({})", self.paint(title, "1"), blocks.len())?;
        if blocks.is_empty() {
            writeln!(out)?;
            return Ok(());
        }

        let mut headers = Vec::new();
        if with_position {
            headers.push("Pos".to_string());
        }
        headers.extend(
            ["ID", "Order", "Days", "Title", "Objective"]
                .into_iter()
                .map(str::to_string),
        );

        let rows = blocks
            .iter()
            .enumerate()
            .map(|(idx, block)| {
                let mut row = Vec::new();
                if with_position {
                    row.push(self.paint(&(idx + 1).to_string(), "33"));
                }
                row.push(short_id(block));
                row.push(block.order.to_string());
                row.push(block.duration_days.to_string());
                row.push(block.title.clone());
                row.push(block.objectives.first().cloned().unwrap_or_default());
                row
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        Ok(())
    }

    fn cell_text(&self, cell: &DayCell) -> String {
        let mut text = cell.date.day().to_string();
        let (marker, code) = match cell.state() {
            CellState::Outside => ("", "90"),
            CellState::Today => ("@", "34"),
            CellState::Done => ("*", "32"),
            CellState::Open => ("+", "33"),
            CellState::Locked => ("", "2"),
        };
        text.push_str(marker);
        if cell.is_final_day {
            text.push('!');
        }
        self.paint(&text, code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn caption_text(cell: &DayCell) -> String {
    match cell.caption() {
        Some((label, status)) if label.is_empty() => status.to_string(),
        Some((label, status)) => format!("{label} {status}"),
        None => String::new(),
    }
}

pub fn short_id(block: &ThemeBlock) -> String {
    block.id.to_string().chars().take(8).collect()
}

fn weekday_labels(week_start: Weekday) -> Vec<String> {
    let mut day = week_start;
    (0..7)
        .map(|_| {
            let label = format!("{day}");
            day = day.succ();
            label
        })
        .collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
