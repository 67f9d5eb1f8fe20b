//! A renderer that records drawing calls instead of producing output.

use serde::Serialize;

use crate::config::FontSpec;
use crate::model::{Point, TextAnchor};

use super::{Glyph, Renderer};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DrawCommand {
    Line {
        from: Point,
        to: Point,
        width: f64,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    Curve {
        start: Point,
        cp1: Point,
        cp2: Point,
        end: Point,
        thickness: f64,
    },
    Notehead {
        center: Point,
        filled: bool,
    },
    Dot {
        center: Point,
        radius: f64,
    },
    Glyph {
        glyph: Glyph,
        at: Point,
        size: f64,
    },
    Text {
        at: Point,
        text: String,
        font_size: f64,
        anchor: TextAnchor,
    },
}

#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn noteheads(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Notehead { .. }))
            .count()
    }

    pub fn curves(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Curve { .. }))
            .count()
    }

    /// Glyphs in drawing order.
    pub fn glyphs(&self) -> Vec<Glyph> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Glyph { glyph, .. } => Some(*glyph),
                _ => None,
            })
            .collect()
    }

    /// Text strings in drawing order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Renderer for CommandRecorder {
    fn line(&mut self, from: Point, to: Point, width: f64) {
        self.commands.push(DrawCommand::Line { from, to, width });
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(DrawCommand::Rect {
            x,
            y,
            width,
            height,
        });
    }

    fn curve(&mut self, start: Point, cp1: Point, cp2: Point, end: Point, thickness: f64) {
        self.commands.push(DrawCommand::Curve {
            start,
            cp1,
            cp2,
            end,
            thickness,
        });
    }

    fn notehead(&mut self, center: Point, filled: bool) {
        self.commands.push(DrawCommand::Notehead { center, filled });
    }

    fn dot(&mut self, center: Point, radius: f64) {
        self.commands.push(DrawCommand::Dot { center, radius });
    }

    fn glyph(&mut self, glyph: Glyph, at: Point, size: f64) {
        self.commands.push(DrawCommand::Glyph { glyph, at, size });
    }

    fn text(&mut self, at: Point, text: &str, font: &FontSpec, anchor: TextAnchor) {
        self.commands.push(DrawCommand::Text {
            at,
            text: text.to_string(),
            font_size: font.size,
            anchor,
        });
    }
}
