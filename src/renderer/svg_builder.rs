//! SVG backend: accumulates SVG elements and produces the final string.

use crate::config::FontSpec;
use crate::model::{Point, TextAnchor};
use crate::staff_info::Clef;
use crate::tables::DurationCode;

use super::constants::*;
use super::{Glyph, Renderer};

// ═══════════════════════════════════════════════════════════════════════
// SvgRenderer
// ═══════════════════════════════════════════════════════════════════════

pub struct SvgRenderer {
    elements: Vec<String>,
    width: f64,
    height: f64,
}

impl SvgRenderer {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            elements: Vec::new(),
            width,
            height,
        }
    }

    /// Number of elements emitted so far.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn build(self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}" style="font-family: 'Georgia', 'Times New Roman', serif;">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push('\n');
        svg.push_str(&format!(
            r#"  <rect x="0" y="0" width="{}" height="{}" fill="white"/>"#,
            self.width, self.height
        ));
        svg.push('\n');
        for el in &self.elements {
            svg.push_str("  ");
            svg.push_str(el);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }

    fn path(&mut self, d: &str, fill: &str, stroke: &str, stroke_width: f64) {
        self.elements.push(format!(
            r#"<path d="{}" fill="{}" stroke="{}" stroke-width="{:.1}" stroke-linecap="round"/>"#,
            d, fill, stroke, stroke_width
        ));
    }

    fn symbol(&mut self, at: Point, symbol: &str, size: f64) {
        self.elements.push(format!(
            r#"<text x="{:.1}" y="{:.1}" font-family="Bravura Text, Noto Music, serif" font-size="{:.0}" fill="{}" text-anchor="middle">{}</text>"#,
            at.x,
            at.y,
            size,
            NOTE_COLOR,
            escape(symbol)
        ));
    }

    /// Flags hanging from a stem tip, one short curve per flag.
    fn flags(&mut self, tip: Point, count: u8, stem_up: bool) {
        let dir = if stem_up { 1.0 } else { -1.0 };
        for i in 0..count {
            let y = tip.y + dir * i as f64 * 7.0;
            let d = format!(
                "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
                tip.x,
                y,
                tip.x + 2.0,
                y + dir * 8.0,
                tip.x + 10.0,
                y + dir * 10.0,
                tip.x + 7.0,
                y + dir * 20.0,
            );
            self.path(&d, "none", NOTE_COLOR, 1.6);
        }
    }
}

impl Renderer for SvgRenderer {
    fn line(&mut self, from: Point, to: Point, width: f64) {
        let color = if width <= STAFF_LINE_WIDTH {
            STAFF_COLOR
        } else {
            NOTE_COLOR
        };
        self.elements.push(format!(
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="{:.1}" stroke-linecap="butt"/>"#,
            from.x, from.y, to.x, to.y, color, width
        ));
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.elements.push(format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x, y, width, height, NOTE_COLOR
        ));
    }

    /// Filled crescent: the curve itself plus a second one pushed outwards
    /// by the thickness, thin at the endpoints.
    fn curve(&mut self, start: Point, cp1: Point, cp2: Point, end: Point, thickness: f64) {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let len = (dx * dx + dy * dy).sqrt().max(0.1);
        let (mut nx, mut ny) = (-dy / len, dx / len);
        // Normal towards the side the control points bulge to
        if (cp1.x - start.x) * nx + (cp1.y - start.y) * ny < 0.0 {
            nx = -nx;
            ny = -ny;
        }
        let ep = SLUR_ENDPOINT_THICKNESS;
        let cp = thickness;

        let d = format!(
            "M{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} L{:.1},{:.1} C{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} Z",
            start.x, start.y,
            cp1.x, cp1.y,
            cp2.x, cp2.y,
            end.x, end.y,
            end.x + nx * ep, end.y + ny * ep,
            cp2.x + nx * cp, cp2.y + ny * cp,
            cp1.x + nx * cp, cp1.y + ny * cp,
            start.x + nx * ep, start.y + ny * ep,
        );
        self.path(&d, NOTE_COLOR, "none", 0.0);
    }

    fn notehead(&mut self, center: Point, filled: bool) {
        let (cx, cy) = (center.x, center.y);
        if filled {
            self.elements.push(format!(
                r#"<ellipse cx="{:.1}" cy="{:.1}" rx="{:.1}" ry="{:.1}" fill="{}" transform="rotate(-15,{:.1},{:.1})"/>"#,
                cx, cy, NOTEHEAD_RX, NOTEHEAD_RY, NOTE_COLOR, cx, cy
            ));
        } else {
            let sw = 2.0;
            self.elements.push(format!(
                r#"<ellipse cx="{:.1}" cy="{:.1}" rx="{:.1}" ry="{:.1}" fill="none" stroke="{}" stroke-width="{:.1}" transform="rotate(-15,{:.1},{:.1})"/>"#,
                cx,
                cy,
                NOTEHEAD_RX - sw / 2.0,
                NOTEHEAD_RY - sw / 2.0,
                NOTE_COLOR,
                sw,
                cx,
                cy
            ));
        }
    }

    fn dot(&mut self, center: Point, radius: f64) {
        self.elements.push(format!(
            r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#,
            center.x, center.y, radius, NOTE_COLOR
        ));
    }

    fn glyph(&mut self, glyph: Glyph, at: Point, size: f64) {
        match glyph {
            Glyph::Clef(clef) => {
                let (symbol, baseline) = clef_symbol(clef);
                self.symbol(Point::new(at.x, at.y + baseline * size), symbol, size);
            }
            Glyph::Accidental(accid) => {
                self.symbol(Point::new(at.x, at.y + size * 0.3), accid.symbol(), size)
            }
            Glyph::Rest(duration) => {
                self.symbol(Point::new(at.x, at.y + size * 0.3), rest_symbol(duration), size)
            }
            Glyph::Articulation(artic) => {
                self.symbol(Point::new(at.x, at.y + size * 0.3), artic.symbol(), size)
            }
            Glyph::Flag { count, stem_up } => self.flags(at, count, stem_up),
            Glyph::CommonTime => self.symbol(Point::new(at.x, at.y + size * 0.25), "\u{1D134}", size),
            Glyph::CutTime => self.symbol(Point::new(at.x, at.y + size * 0.25), "\u{1D135}", size),
        }
    }

    fn text(&mut self, at: Point, text: &str, font: &FontSpec, anchor: TextAnchor) {
        let anchor = match anchor {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        };
        self.elements.push(format!(
            r#"<text x="{:.1}" y="{:.1}" font-family="{}" font-size="{:.0}" font-weight="{}" font-style="{}" fill="{}" text-anchor="{}">{}</text>"#,
            at.x,
            at.y,
            escape(&font.family),
            font.size,
            font.weight,
            font.style,
            TEXT_COLOR,
            anchor,
            escape(text)
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Symbols
// ═══════════════════════════════════════════════════════════════════════

/// Musical symbol for a clef and the baseline offset (in glyph sizes) from
/// the clef line.
fn clef_symbol(clef: Clef) -> (&'static str, f64) {
    match clef {
        Clef::Treble => ("\u{1D11E}", 0.25),
        Clef::OctaveTreble => ("\u{1D120}", 0.25),
        Clef::Bass => ("\u{1D122}", 0.25),
        Clef::Alto | Clef::Tenor => ("\u{1D121}", 0.25),
    }
}

fn rest_symbol(duration: DurationCode) -> &'static str {
    match duration {
        DurationCode::Breve => "\u{1D13A}",
        DurationCode::Whole => "\u{1D13B}",
        DurationCode::Half => "\u{1D13C}",
        DurationCode::Quarter => "\u{1D13D}",
        DurationCode::Eighth => "\u{1D13E}",
        DurationCode::Sixteenth => "\u{1D13F}",
        DurationCode::ThirtySecond => "\u{1D140}",
        DurationCode::SixtyFourth => "\u{1D141}",
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_wraps_elements() {
        let mut svg = SvgRenderer::new(800.0, 300.0);
        svg.line(Point::new(0.0, 10.0), Point::new(100.0, 10.0), STAFF_LINE_WIDTH);
        svg.text(
            Point::new(5.0, 5.0),
            "Allegro <con brio>",
            &FontSpec::default(),
            TextAnchor::Start,
        );
        assert_eq!(svg.len(), 2);

        let out = svg.build();
        assert!(out.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 800 300\""));
        assert!(out.contains("Allegro &lt;con brio&gt;"));
        assert!(out.contains(STAFF_COLOR));
        assert!(out.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn curve_thickens_away_from_the_chord() {
        let mut svg = SvgRenderer::new(200.0, 100.0);
        // Bulges upwards, so the outer edge moves to smaller y
        svg.curve(
            Point::new(0.0, 50.0),
            Point::new(25.0, 40.0),
            Point::new(75.0, 40.0),
            Point::new(100.0, 50.0),
            SLUR_MID_THICKNESS,
        );
        let out = svg.build();
        assert!(out.contains("C75.0,38.5 25.0,38.5 0.0,49.5 Z"));
    }
}
