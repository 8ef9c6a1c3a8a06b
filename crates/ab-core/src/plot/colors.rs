//! Grouped colouring for statistic plots

use serde::{Deserialize, Serialize};

use crate::records::{EventRecord, RecordClass};

/// Plain RGB colour, independent of any toolkit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const CYAN: Rgb = Rgb(0, 191, 191);

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Ten-colour cycle; groups beyond ten reuse colours
const PALETTE: [Rgb; 10] = [
    Rgb(250, 100, 100), // Red
    Rgb(100, 150, 250), // Blue
    Rgb(150, 250, 100), // Green
    Rgb(250, 100, 150), // Pink
    Rgb(100, 250, 250), // Cyan
    Rgb(250, 150, 100), // Orange
    Rgb(150, 100, 250), // Purple
    Rgb(250, 250, 100), // Yellow
    Rgb(64, 64, 64),    // Dark gray
    Rgb(191, 191, 191), // Light gray
];

/// Get a categorical colour from the palette
pub fn categorical_color(index: usize) -> Rgb {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorScheme {
    /// Everything in cyan
    Uniform,
    /// One colour per source file
    Filename,
    /// One colour per sample label
    Sample,
}

impl ColorScheme {
    pub fn label(&self) -> &'static str {
        match self {
            ColorScheme::Uniform => "Uniform Cyan",
            ColorScheme::Filename => "Filename",
            ColorScheme::Sample => "Sample",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [ColorScheme::Uniform, ColorScheme::Filename, ColorScheme::Sample]
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }
}

/// Colours for each plotted point
#[derive(Debug, Clone, PartialEq)]
pub enum Coloring {
    Uniform(Rgb),
    Grouped {
        /// One entry per plotted point
        colors: Vec<Rgb>,
        /// Legend entries in first-seen order
        legend: Vec<(Rgb, String)>,
    },
}

impl Coloring {
    /// Assign colours to the points a plot of `class` over `events` produces.
    ///
    /// Segment points inherit the group of their owning event.
    pub fn assign(scheme: ColorScheme, class: RecordClass, events: &[&EventRecord]) -> Coloring {
        let group_of: fn(&EventRecord) -> &str = match scheme {
            ColorScheme::Uniform => return Coloring::Uniform(Rgb::CYAN),
            ColorScheme::Filename => by_filename,
            ColorScheme::Sample => by_sample,
        };

        let mut legend: Vec<(Rgb, String)> = Vec::new();
        let mut color_for = |group: &str| -> Rgb {
            if let Some((color, _)) = legend.iter().find(|(_, name)| name == group) {
                return *color;
            }
            let color = categorical_color(legend.len());
            legend.push((color, group.to_string()));
            color
        };

        let mut colors = Vec::new();
        for event in events {
            let color = color_for(group_of(*event));
            match class {
                RecordClass::Event => colors.push(color),
                RecordClass::Segment => {
                    colors.extend(std::iter::repeat(color).take(event.segments().len()))
                }
            }
        }

        Coloring::Grouped { colors, legend }
    }
}

fn by_filename(event: &EventRecord) -> &str {
    &event.filename
}

fn by_sample(event: &EventRecord) -> &str {
    &event.sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SegmentRecord;

    fn event(file: &str, sample: &str, segments: usize) -> EventRecord {
        let mut e = EventRecord::new(file, 0.0, 1.0, 1.0, 1.0).with_segments(
            (0..segments)
                .map(|i| SegmentRecord { start: i as f64, mean: 1.0, std: 0.1, duration: 0.1 })
                .collect(),
        );
        e.sample = sample.to_string();
        e
    }

    #[test]
    fn test_uniform() {
        let a = event("a", "s", 1);
        assert_eq!(
            Coloring::assign(ColorScheme::Uniform, RecordClass::Event, &[&a]),
            Coloring::Uniform(Rgb::CYAN)
        );
    }

    #[test]
    fn test_group_by_filename() {
        let a = event("a", "s1", 2);
        let b = event("b", "s1", 1);
        let c = event("a", "s2", 0);
        let events = [&a, &b, &c];

        let Coloring::Grouped { colors, legend } =
            Coloring::assign(ColorScheme::Filename, RecordClass::Event, &events)
        else {
            panic!("expected grouped colouring");
        };
        assert_eq!(colors, vec![categorical_color(0), categorical_color(1), categorical_color(0)]);
        assert_eq!(legend.len(), 2);
        assert_eq!(legend[1].1, "b");

        let Coloring::Grouped { colors, legend } =
            Coloring::assign(ColorScheme::Sample, RecordClass::Segment, &events)
        else {
            panic!("expected grouped colouring");
        };
        assert_eq!(colors.len(), 3);
        assert_eq!(legend.len(), 2);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(categorical_color(10), categorical_color(0));
        assert_eq!(Rgb::CYAN.to_hex(), "#00bfbf");
    }

    #[test]
    fn test_scheme_labels() {
        assert_eq!(ColorScheme::from_label("sample"), Some(ColorScheme::Sample));
        assert_eq!(ColorScheme::from_label("uniform cyan"), Some(ColorScheme::Uniform));
        assert_eq!(ColorScheme::from_label("hmm"), None);
    }
}
