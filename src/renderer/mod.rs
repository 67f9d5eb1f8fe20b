//! Drawing a [`ScoreLayout`] onto a surface.
//!
//! The layout is renderer-agnostic; [`draw_layout`] walks it in a fixed
//! order (staves, connectors, voices, beams, tuplets, curves, hairpins,
//! text) and issues primitive calls on any [`Renderer`]. Two backends ship
//! with the crate: [`SvgRenderer`] produces a standalone SVG document and
//! [`CommandRecorder`] keeps the calls for inspection.
//!
//! [`ScoreLayout`]: crate::model::ScoreLayout

mod constants;
mod draw;
mod recorder;
mod svg_builder;

use serde::Serialize;

use crate::config::FontSpec;
use crate::model::{Point, TextAnchor};
use crate::staff_info::Clef;
use crate::tables::{Accidental, Articulation, DurationCode};

pub use draw::draw_layout;
pub use recorder::{CommandRecorder, DrawCommand};
pub use svg_builder::SvgRenderer;

/// Symbols a backend draws from its own font or outlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Glyph {
    Clef(Clef),
    Accidental(Accidental),
    Rest(DurationCode),
    Articulation(Articulation),
    /// `count` flags hanging from a stem tip
    Flag { count: u8, stem_up: bool },
    /// Common time ("C") or cut time
    CommonTime,
    CutTime,
}

/// Drawing surface. Coordinates are page units with y growing downwards.
pub trait Renderer {
    fn line(&mut self, from: Point, to: Point, width: f64);

    /// Filled rectangle.
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64);

    /// Cubic curve with the given thickness at its middle.
    fn curve(&mut self, start: Point, cp1: Point, cp2: Point, end: Point, thickness: f64);

    fn notehead(&mut self, center: Point, filled: bool);

    fn dot(&mut self, center: Point, radius: f64);

    /// `at` is the reference point of the glyph: the clef line for clefs,
    /// the notehead centre for accidentals, the stem tip for flags.
    fn glyph(&mut self, glyph: Glyph, at: Point, size: f64);

    fn text(&mut self, at: Point, text: &str, font: &FontSpec, anchor: TextAnchor);
}
