// THEORY:
// The display surface is where a finished cycle becomes visible. It receives the
// window, its fire flags, the artifacts and the assessment, and presents them.
//
// `DashboardDisplay` is the file-backed surface: it keeps `dashboard.png` up to
// date (the window panels in a row with the newest frame underneath), writes the
// text panel to `analysis_<cycle>.txt`, and logs the observations. The trait lets
// tests or an interactive front end swap in their own surface.

use crate::core_modules::anomaly::WindowAnomalies;
use crate::core_modules::frame::Frame;
use crate::core_modules::renderer::{
    RenderError, RenderedArtifacts, render_panel, stack_horizontal, stack_vertical, write,
};
use crate::core_modules::scene_analyzer::SceneAssessment;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const DASHBOARD_FILE: &str = "dashboard.png";

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("failed to write analysis summary {path}")]
    WriteSummary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a surface needs to show one completed cycle.
#[derive(Debug, Clone)]
pub struct DisplayView<'a> {
    pub cycle: u64,
    /// Window contents, oldest first.
    pub frames: Vec<&'a Frame>,
    pub anomalies: &'a WindowAnomalies,
    pub artifacts: &'a RenderedArtifacts,
    pub assessment: &'a SceneAssessment,
}

impl DisplayView<'_> {
    /// The text written for this cycle: a short header and the analysis panel.
    pub fn summary_text(&self) -> String {
        let sequences: Vec<String> = self.frames.iter().map(|f| f.sequence().to_string()).collect();
        let mut text = String::new();
        let _ = writeln!(text, "cycle {}", self.cycle);
        let _ = writeln!(text, "frames {}", sequences.join(","));
        let _ = writeln!(
            text,
            "fire {} ({} of {} frames)",
            if self.anomalies.any_anomalous { "yes" } else { "no" },
            self.anomalies.count(),
            self.anomalies.flags.len()
        );
        text.push('\n');
        text.push_str(&self.assessment.render_panel());
        text.push('\n');
        text
    }
}

pub trait DisplaySurface {
    fn present(&mut self, view: &DisplayView<'_>) -> Result<(), DisplayError>;

    /// Called once after the source drains.
    fn finish(&mut self, _cycles_completed: u64) -> Result<(), DisplayError> {
        Ok(())
    }
}

pub fn summary_path(dir: &Path, cycle: u64) -> PathBuf {
    dir.join(format!("analysis_{cycle}.txt"))
}

pub struct DashboardDisplay {
    output_dir: PathBuf,
    cell_size: u32,
    newest_cell_size: u32,
    last_cycle: Option<u64>,
}

impl DashboardDisplay {
    /// `output_dir` must already exist; the renderer creates it.
    pub fn new(output_dir: impl Into<PathBuf>, cell_size: u32, newest_cell_size: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            cell_size: cell_size.max(1),
            newest_cell_size: newest_cell_size.max(1),
            last_cycle: None,
        }
    }

    pub fn dashboard_path(&self) -> PathBuf {
        self.output_dir.join(DASHBOARD_FILE)
    }

    pub fn last_cycle(&self) -> Option<u64> {
        self.last_cycle
    }
}

impl DisplaySurface for DashboardDisplay {
    fn present(&mut self, view: &DisplayView<'_>) -> Result<(), DisplayError> {
        let Some(newest) = view.frames.last() else {
            return Err(RenderError::EmptyWindow.into());
        };

        // --- 1. Window Row + Newest Frame ---
        let row: Vec<_> = view
            .frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                let flag = view.anomalies.flags.get(i).copied().unwrap_or(false);
                render_panel(frame, flag, self.cell_size)
            })
            .collect();
        let newest_flag = view.anomalies.flags.last().copied().unwrap_or(false);
        let dashboard = stack_vertical(&[
            stack_horizontal(&row),
            render_panel(newest, newest_flag, self.newest_cell_size),
        ]);
        write(&self.dashboard_path(), &dashboard)?;

        // --- 2. Text Panel ---
        let path = summary_path(&self.output_dir, view.cycle);
        std::fs::write(&path, view.summary_text())
            .map_err(|source| DisplayError::WriteSummary { path, source })?;

        info!(
            cycle = view.cycle,
            frames = view.frames.len(),
            any_anomalous = view.anomalies.any_anomalous,
            collage = %view.artifacts.collage.display(),
            "cycle displayed"
        );
        for item in view.assessment.items() {
            info!(cycle = view.cycle, "• {item}");
        }

        self.last_cycle = Some(view.cycle);
        Ok(())
    }

    fn finish(&mut self, cycles_completed: u64) -> Result<(), DisplayError> {
        info!(
            cycles_completed,
            dashboard = %self.dashboard_path().display(),
            "frame source drained, holding final dashboard"
        );
        Ok(())
    }
}
