// A 3x5 bitmap font, just enough for legend values and the fire banner.

use super::image_helper::image_helper::fill_rect;
use image::RgbaImage;

pub const GLYPH_WIDTH: u32 = 3;
pub const GLYPH_HEIGHT: u32 = 5;
const GLYPH_SPACING: u32 = 1;

/// Rows top to bottom, three bits each with the leftmost column in bit 2.
fn glyph(c: char) -> Option<[u8; 5]> {
    let rows = match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
        'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
        ' ' => [0; 5],
        _ => return None,
    };
    Some(rows)
}

/// Width in pixels of `text` at `scale`, counting only drawable characters.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let count = text.chars().filter(|&c| glyph(c).is_some()).count() as u32;
    if count == 0 {
        return 0;
    }
    (count * (GLYPH_WIDTH + GLYPH_SPACING) - GLYPH_SPACING) * scale
}

/// Draws `text` with its top-left corner at `(x, y)`. Unknown characters are skipped.
pub fn draw_text(canvas: &mut RgbaImage, x: u32, y: u32, text: &str, scale: u32, color: [u8; 4]) {
    let mut cursor = x;
    for rows in text.chars().filter_map(glyph) {
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) != 0 {
                    fill_rect(
                        canvas,
                        cursor + col * scale,
                        y + row as u32 * scale,
                        scale,
                        scale,
                        color,
                    );
                }
            }
        }
        cursor += (GLYPH_WIDTH + GLYPH_SPACING) * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_spacing_between_glyphs() {
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("7", 1), 3);
        assert_eq!(text_width("-12", 2), (3 * 4 - 1) * 2);
        assert_eq!(text_width("a1", 1), 3);
    }

    #[test]
    fn draws_the_digit_one() {
        let mut canvas = RgbaImage::new(4, 6);
        draw_text(&mut canvas, 0, 0, "1", 1, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(1, 0).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(canvas.get_pixel(0, 4).0, [255, 0, 0, 255]);
    }
}
