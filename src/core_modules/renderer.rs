// THEORY:
// The `CompositeRenderer` decides *what* each cycle's pictures show and writes them
// to disk. Pixel work is done with the `image` crate directly.
//
// Key architectural principles:
// 1.  **Panels as the Unit**: Every frame is drawn as a self-contained panel: a
//     banner row (red with "FIRE" when the frame is anomalous), the heatmap in the
//     inferno colormap normalised to the frame's own range, and a colorbar with the
//     frame's integer min and max beneath it.
// 2.  **Two Artifacts per Cycle**: `collage_<cycle>.png` stacks one panel per window
//     slot, oldest on top. `thermal_image_window_<cycle>.png` is the newest frame
//     alone, drawn larger; this is the one sent for analysis.
// 3.  **Cycle-Numbered Paths**: File names carry the cycle number, so artifacts of
//     one run never overwrite each other.

use crate::core_modules::anomaly::WindowAnomalies;
use crate::core_modules::frame::Frame;
use crate::core_modules::utils::glyphs::{GLYPH_HEIGHT, draw_text, text_width};
use crate::core_modules::utils::image_helper::image_helper::{fill_rect, save_png, stroke_rect};
use crate::core_modules::utils::palette::{
    COLOR_BACKGROUND, COLOR_FIRE, COLOR_LEGEND_TEXT, inferno, normalise,
};
use image::{Rgba, RgbaImage, imageops};
use std::path::{Path, PathBuf};
use thiserror::Error;

const PAD: u32 = 4;
/// Longest heatmap side in pixels; larger grids get a smaller cell, down to one pixel.
pub const MAX_HEATMAP_SIDE: u32 = 1024;
const PANEL_GAP: u32 = 8;
const FIRE_LABEL: &str = "FIRE";
const FIRE_TEXT: [u8; 4] = [255, 255, 255, 255];

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to create output directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write artifact {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot render an empty window")]
    EmptyWindow,
}

/// Paths written for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub collage: PathBuf,
    pub newest: PathBuf,
}

pub fn collage_path(dir: &Path, cycle: u64) -> PathBuf {
    dir.join(format!("collage_{cycle}.png"))
}

pub fn newest_path(dir: &Path, cycle: u64) -> PathBuf {
    dir.join(format!("thermal_image_window_{cycle}.png"))
}

/// Shrinks `cell` so the heatmap of `frame` stays within `MAX_HEATMAP_SIDE`.
fn fitted_cell(frame: &Frame, cell: u32) -> u32 {
    let longest = frame.rows().max(frame.cols()).max(1) as u32;
    cell.min(MAX_HEATMAP_SIDE / longest).max(1)
}

fn label_scale(cell: u32) -> u32 {
    (cell / 6).max(1)
}

/// Draws one frame as a panel with banner, heatmap and colorbar legend.
pub fn render_panel(frame: &Frame, anomalous: bool, cell: u32) -> RgbaImage {
    let cell = fitted_cell(frame, cell);
    let scale = label_scale(cell);
    let text_h = GLYPH_HEIGHT * scale;
    let heat_w = frame.cols() as u32 * cell;
    let heat_h = frame.rows() as u32 * cell;
    let banner_h = text_h + 2 * PAD;
    let bar_h = (cell / 2).max(4);
    let width = heat_w + 2 * PAD;
    let height = banner_h + heat_h + PAD + bar_h + PAD + text_h + PAD;

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba(COLOR_BACKGROUND));

    // --- 1. Banner ---
    if anomalous {
        fill_rect(&mut canvas, 0, 0, width, banner_h, COLOR_FIRE);
        let label_x = width.saturating_sub(text_width(FIRE_LABEL, scale)) / 2;
        draw_text(&mut canvas, label_x, PAD, FIRE_LABEL, scale, FIRE_TEXT);
    }

    // --- 2. Heatmap ---
    let (min, max) = (frame.min(), frame.max());
    for row in 0..frame.rows() {
        for (col, &value) in frame.row(row).iter().enumerate() {
            fill_rect(
                &mut canvas,
                PAD + col as u32 * cell,
                banner_h + row as u32 * cell,
                cell,
                cell,
                inferno(normalise(value, min, max)),
            );
        }
    }

    // --- 3. Colorbar ---
    let bar_y = banner_h + heat_h + PAD;
    let span = heat_w.saturating_sub(1).max(1) as f64;
    for px in 0..heat_w {
        fill_rect(&mut canvas, PAD + px, bar_y, 1, bar_h, inferno(px as f64 / span));
    }

    // --- 4. Legend ---
    let label_y = bar_y + bar_h + PAD;
    let min_label = format!("{}", min.trunc() as i64);
    let max_label = format!("{}", max.trunc() as i64);
    draw_text(&mut canvas, PAD, label_y, &min_label, scale, COLOR_LEGEND_TEXT);
    let max_x = (PAD + heat_w).saturating_sub(text_width(&max_label, scale));
    draw_text(&mut canvas, max_x, label_y, &max_label, scale, COLOR_LEGEND_TEXT);

    if anomalous {
        stroke_rect(&mut canvas, 0, 0, width, height, 2, COLOR_FIRE);
    }

    canvas
}

/// Stacks panels top to bottom, left aligned, separated by `PANEL_GAP`.
pub fn stack_vertical(panels: &[RgbaImage]) -> RgbaImage {
    let width = panels.iter().map(RgbaImage::width).max().unwrap_or(1);
    let gaps = PANEL_GAP * panels.len().saturating_sub(1) as u32;
    let height = panels.iter().map(RgbaImage::height).sum::<u32>() + gaps;

    let mut canvas = RgbaImage::from_pixel(width, height.max(1), Rgba(COLOR_BACKGROUND));
    let mut y = 0;
    for panel in panels {
        imageops::overlay(&mut canvas, panel, 0, y as i64);
        y += panel.height() + PANEL_GAP;
    }
    canvas
}

/// Lays panels out left to right, top aligned, separated by `PANEL_GAP`.
pub fn stack_horizontal(panels: &[RgbaImage]) -> RgbaImage {
    let height = panels.iter().map(RgbaImage::height).max().unwrap_or(1);
    let gaps = PANEL_GAP * panels.len().saturating_sub(1) as u32;
    let width = panels.iter().map(RgbaImage::width).sum::<u32>() + gaps;

    let mut canvas = RgbaImage::from_pixel(width.max(1), height, Rgba(COLOR_BACKGROUND));
    let mut x = 0;
    for panel in panels {
        imageops::overlay(&mut canvas, panel, x as i64, 0);
        x += panel.width() + PANEL_GAP;
    }
    canvas
}

/// Writes the per-cycle artifacts into a single output directory.
#[derive(Debug, Clone)]
pub struct CompositeRenderer {
    output_dir: PathBuf,
    /// Pixels per grid cell in collage panels.
    cell_size: u32,
    /// Pixels per grid cell in the standalone newest-frame image.
    newest_cell_size: u32,
}

impl CompositeRenderer {
    /// Creates the output directory if it does not exist yet.
    pub fn new(output_dir: impl Into<PathBuf>, cell_size: u32, newest_cell_size: u32) -> Result<Self, RenderError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|source| RenderError::CreateDir {
            path: output_dir.clone(),
            source,
        })?;
        Ok(Self {
            output_dir,
            cell_size: cell_size.max(1),
            newest_cell_size: newest_cell_size.max(1),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn newest_cell_size(&self) -> u32 {
        self.newest_cell_size
    }

    /// Renders both artifacts for `cycle`. `anomalies.flags` lines up with `frames`.
    pub fn render<'a>(
        &self,
        frames: impl IntoIterator<Item = &'a Frame>,
        anomalies: &WindowAnomalies,
        cycle: u64,
    ) -> Result<RenderedArtifacts, RenderError> {
        let frames: Vec<&Frame> = frames.into_iter().collect();
        let (newest, newest_flag) = match (frames.last(), anomalies.flags.last()) {
            (Some(frame), flag) => (*frame, flag.copied().unwrap_or(false)),
            (None, _) => return Err(RenderError::EmptyWindow),
        };

        let panels: Vec<RgbaImage> = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                let flag = anomalies.flags.get(i).copied().unwrap_or(false);
                render_panel(frame, flag, self.cell_size)
            })
            .collect();

        let collage = collage_path(&self.output_dir, cycle);
        write(&collage, &stack_vertical(&panels))?;

        let newest_artifact = newest_path(&self.output_dir, cycle);
        write(
            &newest_artifact,
            &render_panel(newest, newest_flag, self.newest_cell_size),
        )?;

        Ok(RenderedArtifacts {
            collage,
            newest: newest_artifact,
        })
    }
}

pub(crate) fn write(path: &Path, canvas: &RgbaImage) -> Result<(), RenderError> {
    save_png(path, canvas).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64, max: f64) -> Frame {
        Frame::from_rows(sequence, vec![vec![0.0, 10.0, max], vec![5.0, 1.0, 2.0]]).unwrap()
    }

    #[test]
    fn panel_dimensions_follow_grid_and_cell_size() {
        let panel = render_panel(&frame(0, 20.0), false, 12);
        // scale 2: text 10, banner 18, heat 36x24, bar 6
        assert_eq!(panel.width(), 36 + 2 * PAD);
        assert_eq!(panel.height(), 18 + 24 + PAD + 6 + PAD + 10 + PAD);
    }

    #[test]
    fn large_grids_shrink_the_cell() {
        let sensor = Frame::from_rows(0, vec![vec![20.0; 640]; 512]).unwrap();
        let panel = render_panel(&sensor, false, 24);
        // 1024 / 640 leaves one pixel per cell
        assert_eq!(panel.width(), 640 + 2 * PAD);
        assert!(panel.height() < MAX_HEATMAP_SIDE);

        let small = Frame::from_rows(0, vec![vec![20.0; 32]; 24]).unwrap();
        assert_eq!(render_panel(&small, false, 24).width(), 32 * 24 + 2 * PAD);
    }

    #[test]
    fn anomalous_panel_gets_red_banner() {
        let hot = render_panel(&frame(0, 90.0), true, 12);
        let cold = render_panel(&frame(0, 20.0), false, 12);
        assert_eq!(hot.get_pixel(3, 3).0, COLOR_FIRE);
        assert_eq!(cold.get_pixel(3, 3).0, COLOR_BACKGROUND);
    }

    #[test]
    fn hottest_cell_is_brightest_colour() {
        let panel = render_panel(&frame(0, 90.0), false, 10);
        // scale 1: banner 13; hottest cell is row 0, col 2
        let hottest = panel.get_pixel(PAD + 2 * 10 + 5, 13 + 5).0;
        let coldest = panel.get_pixel(PAD + 5, 13 + 5).0;
        assert_eq!(hottest, inferno(1.0));
        assert_eq!(coldest, inferno(0.0));
    }

    #[test]
    fn writes_cycle_numbered_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("nested").join("collages");
        let renderer = CompositeRenderer::new(&out, 4, 8).unwrap();
        let frames = vec![frame(0, 70.0), frame(1, 5.0), frame(2, 90.0)];
        let anomalies = WindowAnomalies::assess(&frames, 60.0);

        let artifacts = renderer.render(&frames, &anomalies, 3).unwrap();
        assert_eq!(artifacts.collage, out.join("collage_3.png"));
        assert_eq!(artifacts.newest, out.join("thermal_image_window_3.png"));

        let collage = image::open(&artifacts.collage).unwrap();
        let panel_h = render_panel(&frames[0], true, 4).height();
        assert_eq!(collage.height(), 3 * panel_h + 2 * PANEL_GAP);
        assert!(artifacts.newest.exists());
    }

    #[test]
    fn empty_window_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = CompositeRenderer::new(dir.path(), 4, 8).unwrap();
        let err = renderer
            .render(std::iter::empty(), &WindowAnomalies::default(), 1)
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyWindow));
    }
}
