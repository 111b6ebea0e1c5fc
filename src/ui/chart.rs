use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Widget},
};

use super::surface::{ChartFrame, DrawCommand, RenderSurface, Tone};
use crate::model::bar::Bar;

pub const DEFAULT_TARGET_LABELS: usize = 8;
pub const DEFAULT_BODY_WIDTH: f64 = 0.8;
pub const DEFAULT_DOJI_EPSILON: f64 = 0.01;

/// Rising bars are red and falling bars green, as on mainland exchanges.
const UP_COLOR: Color = Color::Red;
const DOWN_COLOR: Color = Color::Green;
const WICK_COLOR: Color = Color::Gray;
const OVERLAY_COLOR: Color = Color::Cyan;
const AXIS_COLOR: Color = Color::DarkGray;
const PRICE_MARGIN: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartOptions {
    /// Body width in index units, below 1 so neighbours never touch.
    pub body_width: f64,
    /// Bodies shorter than this are drawn as a flat marker.
    pub doji_epsilon: f64,
    pub target_labels: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            body_width: DEFAULT_BODY_WIDTH,
            doji_epsilon: DEFAULT_DOJI_EPSILON,
            target_labels: DEFAULT_TARGET_LABELS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub drawn: usize,
    pub skipped: usize,
    pub labels: usize,
}

/// Distance between labelled x indices: `max(1, total / target)`.
pub fn label_step(total_bars: usize, target_labels: usize) -> usize {
    (total_bars / target_labels.max(1)).max(1)
}

/// Indices that receive an x-axis label.
pub fn label_positions(total_bars: usize, target_labels: usize) -> Vec<usize> {
    (0..total_bars)
        .step_by(label_step(total_bars, target_labels))
        .collect()
}

pub fn tone_for(bar: &Bar) -> Tone {
    if bar.is_up() {
        Tone::Up
    } else {
        Tone::Down
    }
}

/// Draw candles, volume bars, x labels and the optional live overlay.
/// Malformed bars are skipped and the rest of the frame is still drawn.
pub fn render_chart<S: RenderSurface>(
    surface: &mut S,
    bars: &[Bar],
    overlay: &[f64],
    opts: &ChartOptions,
) -> RenderReport {
    let mut report = RenderReport::default();
    let half = opts.body_width / 2.0;

    for (i, bar) in bars.iter().enumerate() {
        if let Err(e) = bar.validate() {
            tracing::warn!(index = i, error = %e, "Skipping malformed bar");
            report.skipped += 1;
            continue;
        }
        let x = i as f64;
        let tone = tone_for(bar);

        surface.draw_segment((x, bar.low), (x, bar.high), Tone::Wick);
        let body = bar.body_high() - bar.body_low();
        if body < opts.doji_epsilon {
            surface.draw_segment((x - half, bar.close), (x + half, bar.close), tone);
        } else {
            surface.draw_rect(x - half, bar.body_low(), opts.body_width, body, tone);
        }
        surface.draw_bar(x, bar.volume as f64, opts.body_width, tone);
        report.drawn += 1;
    }

    let positions = label_positions(bars.len(), opts.target_labels);
    let labels = positions
        .iter()
        .map(|&i| bars[i].date.format("%m-%d").to_string())
        .collect();
    report.labels = positions.len();
    surface.set_axis_ticks(labels, positions.iter().map(|&i| i as f64).collect());

    let points: Vec<f64> = overlay.iter().copied().filter(|p| p.is_finite()).collect();
    if points.len() >= 2 && !bars.is_empty() {
        let span = (bars.len() - 1) as f64;
        let step = span / (points.len() - 1) as f64;
        for (k, pair) in points.windows(2).enumerate() {
            let x0 = k as f64 * step;
            surface.draw_segment((x0, pair[0]), (x0 + step, pair[1]), Tone::Overlay);
        }
    }

    surface.present();
    report
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Up => UP_COLOR,
        Tone::Down => DOWN_COLOR,
        Tone::Wick => WICK_COLOR,
        Tone::Overlay => OVERLAY_COLOR,
    }
}

/// Terminal widget replaying a [`ChartFrame`] onto character cells: the top
/// part holds prices, the bottom quarter volume, the last row date labels.
pub struct CandleChart<'a> {
    frame: &'a ChartFrame,
    title: String,
}

impl<'a> CandleChart<'a> {
    pub fn new(frame: &'a ChartFrame) -> Self {
        Self {
            frame,
            title: " Chart ".to_string(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Mapping between chart space and a rectangle of cells.
struct Plot {
    area: Rect,
    slots: f64,
    lo: f64,
    hi: f64,
}

impl Plot {
    fn col(&self, x: f64) -> Option<u16> {
        let rel = (x + 0.5) / self.slots;
        if !(0.0..=1.0).contains(&rel) {
            return None;
        }
        let c = (rel * self.area.width as f64).floor() as u16;
        Some(self.area.x + c.min(self.area.width.saturating_sub(1)))
    }

    fn row(&self, y: f64) -> u16 {
        let range = if self.hi - self.lo < f64::EPSILON {
            1.0
        } else {
            self.hi - self.lo
        };
        let rows = self.area.height.saturating_sub(1) as f64;
        let norm = ((y - self.lo) / range).clamp(0.0, 1.0);
        self.area.y + (rows - (norm * rows).round()) as u16
    }
}

fn put(buf: &mut Buffer, x: u16, y: u16, symbol: &str, color: Color) {
    if let Some(cell) = buf.cell_mut((x, y)) {
        cell.set_symbol(symbol).set_style(Style::default().fg(color));
    }
}

fn paint_segment(buf: &mut Buffer, plot: &Plot, from: (f64, f64), to: (f64, f64), color: Color) {
    let (Some(c0), Some(c1)) = (plot.col(from.0), plot.col(to.0)) else {
        return;
    };
    let (r0, r1) = (plot.row(from.1), plot.row(to.1));
    let symbol = if c0 == c1 {
        "│"
    } else if r0 == r1 {
        "─"
    } else {
        "•"
    };
    let steps = c0.abs_diff(c1).max(r0.abs_diff(r1)).max(1);
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        let c = (c0 as f64 + (c1 as f64 - c0 as f64) * t).round() as u16;
        let r = (r0 as f64 + (r1 as f64 - r0 as f64) * t).round() as u16;
        put(buf, c, r, symbol, color);
    }
}

impl Widget for CandleChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(self.title.as_str())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.frame.commands().is_empty() || inner.height < 6 || inner.width < 8 {
            return;
        }
        let Some((lo, hi)) = self.frame.price_range() else {
            return;
        };
        let margin = (hi - lo) * PRICE_MARGIN;
        let (lo, hi) = ((lo - margin).max(0.0), hi + margin);

        // Price labels take the left gutter.
        let gutter = 9u16.min(inner.width / 3);
        let plot_area = Rect {
            x: inner.x + gutter,
            width: inner.width - gutter,
            ..inner
        };
        let label_row = plot_area.y + plot_area.height - 1;
        let volume_rows = (plot_area.height.saturating_sub(1) / 4).max(1);
        let price_rows = plot_area.height - 1 - volume_rows;
        let slots = self.frame.slots().max(1) as f64;

        let price = Plot {
            area: Rect {
                height: price_rows,
                ..plot_area
            },
            slots,
            lo,
            hi,
        };
        let volume = Plot {
            area: Rect {
                y: plot_area.y + price_rows,
                height: volume_rows,
                ..plot_area
            },
            slots,
            lo: 0.0,
            hi: self.frame.max_volume().max(1.0),
        };

        for cmd in self.frame.commands() {
            match *cmd {
                DrawCommand::Segment { from, to, tone } => {
                    paint_segment(buf, &price, from, to, tone_color(tone));
                }
                DrawCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                    tone,
                } => {
                    let (Some(c0), Some(c1)) = (price.col(x), price.col(x + width)) else {
                        continue;
                    };
                    let (top, bottom) = (price.row(y + height), price.row(y));
                    for c in c0..=c1.max(c0) {
                        for r in top..=bottom {
                            put(buf, c, r, "█", tone_color(tone));
                        }
                    }
                }
                DrawCommand::Bar { x, height, tone, .. } => {
                    let Some(c) = volume.col(x) else {
                        continue;
                    };
                    let top = volume.row(height);
                    let bottom = volume.area.y + volume.area.height - 1;
                    for r in top..=bottom {
                        put(buf, c, r, "▆", tone_color(tone));
                    }
                }
            }
        }

        let axis_style = Style::default().fg(AXIS_COLOR);
        buf.set_string(inner.x, price.area.y, format!("{:>8.2}", hi), axis_style);
        buf.set_string(
            inner.x,
            price.area.y + price.area.height.saturating_sub(1),
            format!("{:>8.2}", lo),
            axis_style,
        );
        let mut next_free = plot_area.x;
        for (x, label) in self.frame.axis_ticks() {
            let Some(c) = price.col(x) else {
                continue;
            };
            if c < next_free || c + label.len() as u16 > plot_area.x + plot_area.width {
                continue;
            }
            buf.set_string(c, label_row, label, axis_style);
            next_free = c + label.len() as u16 + 1;
        }
    }
}
