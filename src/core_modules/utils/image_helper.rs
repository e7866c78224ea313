pub mod image_helper {
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use std::io::{BufWriter, Cursor, Write};
    use std::path::Path;

    /// Writes an RGBA canvas to `path` as PNG. The file handle is closed on every path
    /// and a failed final flush is an error, not a truncated file.
    pub fn save_png(path: &Path, canvas: &RgbaImage) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(output);
        canvas.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads any image on disk and re-encodes it as JPEG bytes.
    pub fn jpeg_bytes(path: &Path) -> Result<Vec<u8>, image::ImageError> {
        let rgb = image::open(path)?.to_rgb8();
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(rgb).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)?;
        Ok(bytes)
    }

    /// Fills the axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: [u8; 4]) {
        let x_end = x.saturating_add(width).min(canvas.width());
        let y_end = y.saturating_add(height).min(canvas.height());
        for py in y..y_end {
            for px in x..x_end {
                canvas.put_pixel(px, py, image::Rgba(color));
            }
        }
    }

    /// Draws a `thickness`-pixel frame just inside the rectangle.
    pub fn stroke_rect(
        canvas: &mut RgbaImage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        thickness: u32,
        color: [u8; 4],
    ) {
        let t = thickness.min(width / 2).min(height / 2);
        fill_rect(canvas, x, y, width, t, color);
        fill_rect(canvas, x, y + height - t, width, t, color);
        fill_rect(canvas, x, y, t, height, color);
        fill_rect(canvas, x + width - t, y, t, height, color);
    }
}
