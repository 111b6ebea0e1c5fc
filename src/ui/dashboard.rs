use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::history::CandleHistory;
use crate::model::instrument::InstrumentInfo;
use crate::model::tick::Tick;
use crate::stream::PriceStream;

fn change_color(val: f64) -> Color {
    if val > 0.0 {
        Color::Red
    } else if val < 0.0 {
        Color::Green
    } else {
        Color::White
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn or_dash(v: Option<String>) -> String {
    v.unwrap_or_else(|| "---".to_string())
}

pub struct InfoPanel<'a> {
    info: &'a InstrumentInfo,
    latest: Option<&'a Tick>,
}

impl<'a> InfoPanel<'a> {
    pub fn new(info: &'a InstrumentInfo, latest: Option<&'a Tick>) -> Self {
        Self { info, latest }
    }
}

impl Widget for InfoPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // A live tick supersedes the quote snapshot.
        let (price, change) = match self.latest {
            Some(t) => (Some(t.price), Some(t.change_percent)),
            None => (self.info.last_price, self.info.change_pct),
        };
        let name = if self.info.display_name.is_empty() {
            "---"
        } else {
            self.info.display_name.as_str()
        };

        let lines = vec![
            Line::from(vec![
                Span::styled("Name:  ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    name.to_string(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(vec![
                Span::styled("Price: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    or_dash(price.map(|p| format!("{:.2}", p))),
                    Style::default().fg(change_color(change.unwrap_or(0.0))),
                ),
                Span::styled(
                    or_dash(change.map(|c| format!("  {:+.2}%", c))),
                    Style::default().fg(change_color(change.unwrap_or(0.0))),
                ),
            ]),
            Line::from(vec![
                Span::styled("Cap:   ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    or_dash(self.info.total_cap_e8.map(|c| format!("{:.1}e8", c))),
                    Style::default().fg(Color::White),
                ),
            ]),
            Line::from(vec![
                Span::styled("Float: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    or_dash(self.info.float_cap_e8.map(|c| format!("{:.1}e8", c))),
                    Style::default().fg(Color::White),
                ),
            ]),
        ];

        Paragraph::new(lines)
            .block(panel(" Instrument "))
            .render(area, buf);
    }
}

pub struct StatsPanel<'a> {
    pub tick_count: u64,
    pub last_update: Option<DateTime<Local>>,
    pub latency_us: Option<u64>,
    pub history: Option<&'a CandleHistory>,
}

impl Widget for StatsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let label = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));
        let value = |s: String| Span::styled(s, Style::default().fg(Color::White));

        let range = self.history.and_then(|h| h.date_range()).map(|(first, last)| {
            format!("{} ~ {}", first.format("%m-%d"), last.format("%m-%d"))
        });

        let lines = vec![
            Line::from(vec![label("Ticks:   "), value(self.tick_count.to_string())]),
            Line::from(vec![
                label("Updated: "),
                value(or_dash(
                    self.last_update.map(|t| t.format("%H:%M:%S").to_string()),
                )),
            ]),
            Line::from(vec![
                label("Latency: "),
                value(or_dash(self.latency_us.map(|us| format!("{}us", us)))),
            ]),
            Line::from(vec![
                label("Bars:    "),
                value(or_dash(self.history.map(|h| h.len().to_string()))),
            ]),
            Line::from(vec![label("Range:   "), value(or_dash(range))]),
        ];

        Paragraph::new(lines)
            .block(panel(" Stats "))
            .render(area, buf);
    }
}

pub struct PriceStreamPanel<'a> {
    stream: &'a PriceStream,
}

impl<'a> PriceStreamPanel<'a> {
    pub fn new(stream: &'a PriceStream) -> Self {
        Self { stream }
    }
}

impl Widget for PriceStreamPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_height = area.height.saturating_sub(2) as usize;
        let lines: Vec<Line> = self
            .stream
            .iter()
            .take(inner_height)
            .enumerate()
            .map(|(i, line)| {
                let color = if line.contains(" -") {
                    Color::Green
                } else {
                    Color::Red
                };
                let style = if i == 0 {
                    Style::default().fg(color).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(color)
                };
                Line::from(Span::styled(line.to_string(), style))
            })
            .collect();

        Paragraph::new(lines)
            .block(panel(" Price Stream "))
            .render(area, buf);
    }
}

pub struct LogPanel<'a> {
    messages: &'a [String],
}

impl<'a> LogPanel<'a> {
    pub fn new(messages: &'a [String]) -> Self {
        Self { messages }
    }
}

impl Widget for LogPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let visible = area.height.saturating_sub(2) as usize;
        let start = self.messages.len().saturating_sub(visible);
        let lines: Vec<Line> = self.messages[start..]
            .iter()
            .map(|msg| {
                let color = if msg.starts_with("[ERR]") {
                    Color::Red
                } else if msg.starts_with("[WARN]") {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                Line::from(Span::styled(msg.as_str(), Style::default().fg(color)))
            })
            .collect();

        Paragraph::new(lines)
            .block(panel(" Log "))
            .render(area, buf);
    }
}

pub struct StatusBar<'a> {
    pub instrument: &'a str,
    pub provider: &'a str,
    pub sampling: bool,
    pub period_secs: u64,
    pub history_state: &'a str,
    pub clock: Option<DateTime<Local>>,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let sampling_status = if self.sampling {
            Span::styled(" SAMPLING ", Style::default().fg(Color::Green))
        } else {
            Span::styled(
                " STOPPED ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        };
        let clock = self
            .clock
            .map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        let line = Line::from(vec![
            Span::styled(
                " kline-watch ",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("| ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.instrument, Style::default().fg(Color::Cyan)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.provider, Style::default().fg(Color::DarkGray)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            sampling_status,
            Span::styled(
                format!("every {}s", self.period_secs),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(self.history_state, Style::default().fg(Color::DarkGray)),
            Span::styled(" | ", Style::default().fg(Color::DarkGray)),
            Span::styled(clock, Style::default().fg(Color::White)),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}

pub struct KeybindBar;

impl Widget for KeybindBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let key = |s: &'static str| Span::styled(s, Style::default().fg(Color::Yellow));
        let text = |s: &'static str| Span::styled(s, Style::default().fg(Color::DarkGray));
        let line = Line::from(vec![
            key(" [Q]"),
            text("uit  "),
            key("[S]"),
            text("tart/stop  "),
            key("[+/-]"),
            text(" period  "),
            key("[W]"),
            text("indow  "),
            key("[R]"),
            text("efresh  "),
            key("[E]"),
            text("xport  "),
            key("[N/P]"),
            text(" instrument"),
        ]);

        buf.set_line(area.x, area.y, &line, area.width);
    }
}
