/// Visual role of a primitive. Surfaces map these to concrete colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Up,
    Down,
    Wick,
    Overlay,
}

/// Drawing target of the chart renderer. Coordinates are in chart space:
/// x is the bar index, y is a price (price panel) or a volume (volume panel).
pub trait RenderSurface {
    /// Line in the price panel.
    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), tone: Tone);

    /// Filled rectangle in the price panel; `(x, y)` is the bottom-left corner.
    fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64, tone: Tone);

    /// Volume bar centered on `x`, rising from zero.
    fn draw_bar(&mut self, x: f64, height: f64, width: f64, tone: Tone);

    fn set_axis_ticks(&mut self, labels: Vec<String>, positions: Vec<f64>);

    /// Finish the frame.
    fn present(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Segment {
        from: (f64, f64),
        to: (f64, f64),
        tone: Tone,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        tone: Tone,
    },
    Bar {
        x: f64,
        height: f64,
        width: f64,
        tone: Tone,
    },
}

/// A rendered chart kept as a list of primitives. The terminal widget
/// replays it every frame, so the renderer itself only runs when the
/// chart data changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartFrame {
    commands: Vec<DrawCommand>,
    axis_labels: Vec<String>,
    axis_positions: Vec<f64>,
    slots: usize,
    presented: bool,
}

impl ChartFrame {
    /// Empty frame laid out for `slots` bar positions.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn axis_ticks(&self) -> impl Iterator<Item = (f64, &str)> {
        self.axis_positions
            .iter()
            .copied()
            .zip(self.axis_labels.iter().map(String::as_str))
    }

    pub fn is_presented(&self) -> bool {
        self.presented
    }

    pub fn rects(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Rect { .. }))
    }

    pub fn bars(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Bar { .. }))
    }

    /// Vertical extent of everything in the price panel.
    pub fn price_range(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in &self.commands {
            match *c {
                DrawCommand::Segment { from, to, .. } => {
                    lo = lo.min(from.1).min(to.1);
                    hi = hi.max(from.1).max(to.1);
                }
                DrawCommand::Rect { y, height, .. } => {
                    lo = lo.min(y);
                    hi = hi.max(y + height);
                }
                DrawCommand::Bar { .. } => {}
            }
        }
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    }

    pub fn max_volume(&self) -> f64 {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Bar { height, .. } => Some(*height),
                _ => None,
            })
            .fold(0.0, f64::max)
    }
}

impl RenderSurface for ChartFrame {
    fn draw_segment(&mut self, from: (f64, f64), to: (f64, f64), tone: Tone) {
        self.commands.push(DrawCommand::Segment { from, to, tone });
    }

    fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64, tone: Tone) {
        self.commands.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
            tone,
        });
    }

    fn draw_bar(&mut self, x: f64, height: f64, width: f64, tone: Tone) {
        self.commands.push(DrawCommand::Bar {
            x,
            height,
            width,
            tone,
        });
    }

    fn set_axis_ticks(&mut self, labels: Vec<String>, positions: Vec<f64>) {
        self.axis_labels = labels;
        self.axis_positions = positions;
    }

    fn present(&mut self) {
        self.presented = true;
    }
}
