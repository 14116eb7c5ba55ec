use crate::{
    deck::html::TextLine,
    presentation::{Presentation, chrome::NotificationKind},
};
use crossterm::{
    QueueableCommand, cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    style::{self, Color, PrintStyledContent, Stylize},
    terminal::{self, ClearType},
};
use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const CONTENT_MARGIN: u16 = 4;
const CONTENT_TOP: u16 = 2;
const OVERLAY_WIDTH: u16 = 50;
const ACCENT: Color = Color::Rgb { r: 0x66, g: 0x7e, b: 0xea };
const SUCCESS: Color = Color::Rgb { r: 0x10, g: 0xb9, b: 0x81 };
const ERROR: Color = Color::Rgb { r: 0xef, g: 0x44, b: 0x44 };

/// Something that can be clicked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HitTarget {
    Previous,
    Next,
    Dot(usize),
    Export,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct HitRegion {
    row: u16,
    column: u16,
    width: u16,
    target: HitTarget,
}

/// Where the clickable parts of the last rendered frame are.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct HitMap {
    regions: Vec<HitRegion>,
}

impl HitMap {
    pub(crate) fn add(&mut self, row: u16, column: u16, width: u16, target: HitTarget) {
        self.regions.push(HitRegion { row, column, width, target });
    }

    pub(crate) fn target_at(&self, column: u16, row: u16) -> Option<HitTarget> {
        self.regions
            .iter()
            .find(|region| {
                region.row == row && column >= region.column && column < region.column.saturating_add(region.width)
            })
            .map(|region| region.target)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Tone {
    Plain,
    Emphasis,
    Dim,
    Accent,
    Success,
    Error,
}

/// A piece of text placed somewhere in the screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) row: u16,
    pub(crate) column: u16,
    pub(crate) text: String,
    pub(crate) tone: Tone,
}

/// Everything that's drawn in one go.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) spans: Vec<Span>,
    pub(crate) hits: HitMap,
}

impl Frame {
    fn push<S: Into<String>>(&mut self, row: u16, column: u16, text: S, tone: Tone) {
        self.spans.push(Span { row, column, text: text.into(), tone });
    }
}

/// Lays out a presentation in a screen of the given size.
pub(crate) fn layout(presentation: &Presentation, columns: u16, rows: u16) -> Frame {
    let mut frame = Frame::default();
    if columns == 0 || rows == 0 {
        return frame;
    }
    let chrome = presentation.chrome();
    layout_progress(&mut frame, chrome.progress(), columns);

    let content_bottom = if chrome.is_fullscreen() { rows } else { rows.saturating_sub(2) };
    if let Some(slide) = presentation.current_slide() {
        layout_content(&mut frame, &slide.visible_lines(), columns, content_bottom);
    }
    if !chrome.is_fullscreen() && rows > CONTENT_TOP {
        layout_navigation(&mut frame, presentation, columns, rows - 1);
    }
    for (index, notification) in chrome.notifications().iter().filter(|n| n.visible).enumerate() {
        let (icon, tone) = match notification.kind {
            NotificationKind::Success => ("✓", Tone::Success),
            NotificationKind::Error => ("✗", Tone::Error),
        };
        let text = format!(" {icon} {} ", notification.message);
        let column = columns.saturating_sub(text.width() as u16 + 1);
        frame.push(1 + index as u16, column, text, tone);
    }
    if let Some(overlay) = chrome.overlay() {
        let width = OVERLAY_WIDTH.min(columns.saturating_sub(4)).max(10);
        let column = (columns.saturating_sub(width)) / 2;
        let row = (rows / 2).saturating_sub(2);
        let bar_width = width.saturating_sub(8) as usize;
        let filled = ((overlay.percentage / 100.0) * bar_width as f64).round() as usize;
        let bar = format!(
            "{}{} {:>3.0}%",
            "█".repeat(filled.min(bar_width)),
            "░".repeat(bar_width.saturating_sub(filled)),
            overlay.percentage
        );
        frame.push(row, column, overlay.title, Tone::Emphasis);
        frame.push(row + 1, column, bar, Tone::Accent);
        frame.push(row + 2, column, overlay.text.clone(), Tone::Plain);
        frame.push(row + 3, column, overlay.tip, Tone::Dim);
    }
    frame
}

fn layout_progress(frame: &mut Frame, progress: f64, columns: u16) {
    let filled = ((progress / 100.0) * columns as f64).round().clamp(0.0, columns as f64) as usize;
    frame.push(0, 0, "━".repeat(filled), Tone::Accent);
    frame.push(0, filled as u16, "─".repeat(columns as usize - filled), Tone::Dim);
}

fn layout_content(frame: &mut Frame, lines: &[TextLine], columns: u16, bottom: u16) {
    let width = columns.saturating_sub(CONTENT_MARGIN * 2).max(1) as usize;
    let mut row = CONTENT_TOP;
    for line in lines {
        let tone = if line.emphasis { Tone::Emphasis } else { Tone::Plain };
        for wrapped in wrap(&line.text, width) {
            if row >= bottom {
                return;
            }
            frame.push(row, CONTENT_MARGIN, wrapped, tone);
            row += 1;
        }
        if line.emphasis {
            row += 1;
        }
    }
}

fn layout_navigation(frame: &mut Frame, presentation: &Presentation, columns: u16, row: u16) {
    let chrome = presentation.chrome();
    let previous = "◀ Prev";
    let next = "Next ▶";
    let export = "[Export PDF]";
    let counter = chrome.counter();
    let dots: Vec<_> = chrome.dots().collect();
    let dots_width = dots.len() * 2;
    let fixed_width = previous.width() + next.width() + export.width() + counter.width() + 10;
    let show_dots = fixed_width + dots_width <= columns as usize;
    let total_width = if show_dots { fixed_width + dots_width } else { fixed_width };
    let mut column = (columns as usize).saturating_sub(total_width) as u16 / 2;

    let mut place = |frame: &mut Frame, text: &str, tone: Tone, target: Option<HitTarget>, gap: u16| {
        let width = text.width() as u16;
        frame.push(row, column, text, tone);
        if let Some(target) = target {
            frame.hits.add(row, column, width, target);
        }
        column = column.saturating_add(width + gap);
    };
    let (tone, target) = button(chrome.previous_disabled(), HitTarget::Previous);
    place(frame, previous, tone, target, 2);
    if show_dots {
        let count = dots.len();
        for (index, active) in dots.into_iter().enumerate() {
            let (text, tone) = if active { ("●", Tone::Accent) } else { ("○", Tone::Dim) };
            let gap = if index + 1 == count { 2 } else { 1 };
            place(frame, text, tone, Some(HitTarget::Dot(index + 1)), gap);
        }
    }
    let (tone, target) = button(chrome.next_disabled(), HitTarget::Next);
    place(frame, next, tone, target, 3);
    place(frame, &counter, Tone::Plain, None, 3);
    place(frame, export, Tone::Accent, Some(HitTarget::Export), 0);
}

fn button(disabled: bool, target: HitTarget) -> (Tone, Option<HitTarget>) {
    if disabled { (Tone::Dim, None) } else { (Tone::Plain, Some(target)) }
}

/// Splits text into lines that are at most `width` columns wide.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let separator = if current.is_empty() { 0 } else { 1 };
        if !current.is_empty() && current.width() + separator + word.width() > width {
            lines.push(std::mem::take(&mut current));
        }
        if word.width() > width {
            // words that don't fit anywhere start their own line and get split wherever they need to
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for c in word.chars() {
                if current.width() + c.width().unwrap_or(0) > width {
                    lines.push(std::mem::take(&mut current));
                }
                current.push(c);
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub(crate) trait TerminalWrite: io::Write {
    fn init(&mut self) -> io::Result<()>;
    fn deinit(&mut self);
}

impl TerminalWrite for io::Stdout {
    fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.queue(cursor::Hide)?;
        self.queue(terminal::EnterAlternateScreen)?;
        self.queue(EnableMouseCapture)?;
        self.flush()
    }

    fn deinit(&mut self) {
        let _ = self.queue(DisableMouseCapture);
        let _ = self.queue(terminal::LeaveAlternateScreen);
        let _ = self.queue(cursor::Show);
        let _ = self.flush();
        let _ = terminal::disable_raw_mode();
    }
}

/// Draws frames into the terminal.
pub(crate) struct TerminalDrawer<W: TerminalWrite> {
    writer: W,
}

impl<W: TerminalWrite> TerminalDrawer<W> {
    pub(crate) fn new(mut writer: W) -> io::Result<Self> {
        writer.init()?;
        Ok(Self { writer })
    }

    pub(crate) fn draw(&mut self, frame: &Frame) -> io::Result<()> {
        self.writer.queue(terminal::BeginSynchronizedUpdate)?;
        self.writer.queue(terminal::Clear(ClearType::All))?;
        for span in &frame.spans {
            let content = style::style(span.text.as_str());
            let content = match span.tone {
                Tone::Plain => content,
                Tone::Emphasis => content.bold(),
                Tone::Dim => content.dark_grey(),
                Tone::Accent => content.with(ACCENT),
                Tone::Success => content.white().on(SUCCESS),
                Tone::Error => content.white().on(ERROR),
            };
            self.writer.queue(cursor::MoveTo(span.column, span.row))?;
            self.writer.queue(PrintStyledContent(content))?;
        }
        self.writer.queue(terminal::EndSynchronizedUpdate)?;
        self.writer.flush()
    }
}

impl<W: TerminalWrite> Drop for TerminalDrawer<W> {
    fn drop(&mut self) {
        self.writer.deinit();
    }
}
