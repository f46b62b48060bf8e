//! Glyph advance widths of the standard PDF Helvetica faces, used to center
//! text and size the participant name underline without loading a font file.

use serde::{Deserialize, Serialize};

/// Face of the built-in Helvetica family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

// Advance widths in 1/1000 em for characters 32..=126
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

// Width assumed for characters outside the table
const FALLBACK_WIDTH: u16 = 556;

fn char_width(c: char, style: FontStyle) -> u16 {
    let table = match style {
        FontStyle::Bold => &HELVETICA_BOLD,
        // Oblique shares the regular advances
        FontStyle::Regular | FontStyle::Italic => &HELVETICA,
    };
    match c as u32 {
        code @ 32..=126 => table[(code - 32) as usize],
        _ => FALLBACK_WIDTH,
    }
}

/// Width of `text` in points when set in `style` at `size` points
///
/// # Examples
/// ```
/// use eventeye::metrics::{FontStyle, text_width};
///
/// // "Hi" = H (722) + i (222) at 10pt
/// assert!((text_width("Hi", FontStyle::Regular, 10.0) - 9.44).abs() < 1e-4);
/// ```
pub fn text_width(text: &str, style: FontStyle, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width(c, style) as u32).sum();
    units as f32 * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_is_wider_than_regular() {
        let regular = text_width("Asha Rao", FontStyle::Regular, 42.0);
        let bold = text_width("Asha Rao", FontStyle::Bold, 42.0);
        assert!(bold > regular);
    }

    #[test]
    fn empty_text_has_no_width() {
        assert_eq!(text_width("", FontStyle::Bold, 42.0), 0.0);
    }

    #[test]
    fn non_ascii_uses_fallback_width() {
        assert_eq!(text_width("é", FontStyle::Regular, 1000.0), 556.0);
    }
}
