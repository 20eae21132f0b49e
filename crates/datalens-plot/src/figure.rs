use serde::{Deserialize, Serialize};

/// How many axes a figure holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisLayout {
    /// One axes shared by every series.
    Single,
    /// Two axes next to each other.
    SideBySide,
}

impl AxisLayout {
    #[must_use]
    pub fn num_axes(self) -> usize {
        match self {
            AxisLayout::Single => 1,
            AxisLayout::SideBySide => 2,
        }
    }
}

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLUE: Self = Self::rgb(31, 119, 180);
    pub const ORANGE: Self = Self::rgb(255, 127, 14);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Formats as `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Which axis gets grid lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridAxis {
    X,
    Y,
    Both,
}

/// A categorical bar chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub label: String,
    pub categories: Vec<String>,
    pub values: Vec<f64>,
    pub color: Color,
}

/// A 2-D density heat-map series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapSeries {
    pub label: String,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    /// Cell values, outer index is the row (`y`).
    pub rows: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Series {
    Bar(BarSeries),
    Heatmap(HeatmapSeries),
}

/// One drawing area of a [`Figure`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    title: Option<String>,
    x_label: Option<String>,
    y_label: Option<String>,
    ticks_rotation: f32,
    grid: Option<GridAxis>,
    legend: bool,
    series: Vec<Series>,
    annotations: Vec<String>,
}

impl Axes {
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn set_x_label(&mut self, label: impl Into<String>) {
        self.x_label = Some(label.into());
    }

    pub fn set_y_label(&mut self, label: impl Into<String>) {
        self.y_label = Some(label.into());
    }

    /// Rotation of the x tick labels in degrees.
    pub fn set_ticks_rotation(&mut self, degrees: f32) {
        self.ticks_rotation = degrees;
    }

    pub fn set_grid(&mut self, axis: GridAxis) {
        self.grid = Some(axis);
    }

    pub fn show_legend(&mut self) {
        self.legend = true;
    }

    pub fn bar(&mut self, series: BarSeries) {
        self.series.push(Series::Bar(series));
    }

    pub fn heatmap(&mut self, series: HeatmapSeries) {
        self.series.push(Series::Heatmap(series));
    }

    /// Adds a free-text note drawn in the plot area.
    pub fn annotate(&mut self, text: impl Into<String>) {
        self.annotations.push(text.into());
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn x_label(&self) -> Option<&str> {
        self.x_label.as_deref()
    }

    #[must_use]
    pub fn y_label(&self) -> Option<&str> {
        self.y_label.as_deref()
    }

    #[must_use]
    pub fn ticks_rotation(&self) -> f32 {
        self.ticks_rotation
    }

    #[must_use]
    pub fn grid(&self) -> Option<GridAxis> {
        self.grid
    }

    #[must_use]
    pub fn has_legend(&self) -> bool {
        self.legend
    }

    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    #[must_use]
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }
}

/// A set of axes rendered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    layout: AxisLayout,
    /// Width and height in inches.
    size: (f32, f32),
    tight: bool,
    axes: Vec<Axes>,
}

impl Figure {
    pub const DEFAULT_SIZE: (f32, f32) = (10.0, 5.0);

    #[must_use]
    pub fn new(layout: AxisLayout) -> Self {
        Self::with_size(layout, Self::DEFAULT_SIZE)
    }

    #[must_use]
    pub fn with_size(layout: AxisLayout, size: (f32, f32)) -> Self {
        Self {
            layout,
            size,
            tight: false,
            axes: vec![Axes::default(); layout.num_axes()],
        }
    }

    #[must_use]
    pub fn layout(&self) -> AxisLayout {
        self.layout
    }

    #[must_use]
    pub fn size(&self) -> (f32, f32) {
        self.size
    }

    #[must_use]
    pub fn axes(&self) -> &[Axes] {
        &self.axes
    }

    /// Returns the axes at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`AxisLayout::num_axes`].
    pub fn axes_mut(&mut self, index: usize) -> &mut Axes {
        &mut self.axes[index]
    }

    /// Packs the axes tightly when rendered.
    pub fn tight_layout(&mut self) {
        self.tight = true;
    }

    #[must_use]
    pub fn is_tight(&self) -> bool {
        self.tight
    }
}
