// THEORY:
// The `pipeline` module is the top-level API of the monitor. The `CycleDriver`
// owns every moving part of a run and executes one cycle at a time: read a
// decimated record, slide the window, flag hot frames, render, ask the vision
// service, present, pace.
//
// Key architectural principles:
// 1.  **Explicit Context**: The window, the cycle counter and the RUNNING/DRAINED
//     state live in a `CycleContext` owned by the driver. Nothing is global, so two
//     drivers never share state.
// 2.  **Two States**: RUNNING until the source runs dry inside a decimation group,
//     then DRAINED for good. A partial group is never promoted to a frame and the
//     source is not touched again once it has reported exhaustion.
// 3.  **Failure Containment**: A malformed frame costs one cycle. A failed or
//     unusable analysis costs one assessment. Only source I/O, artifact writes and
//     display failures stop the run.
// 4.  **Cooperative Pacing**: Cycles run strictly one after another on the calling
//     task; the pause between cycles is a `tokio::time::sleep`.

use crate::config::MonitorConfig;
use crate::core_modules::anomaly::WindowAnomalies;
use crate::core_modules::display::{DisplayError, DisplaySurface, DisplayView};
use crate::core_modules::frame::{Frame, FrameError};
use crate::core_modules::frame_source::{FrameRecord, SourceError};
use crate::core_modules::renderer::{CompositeRenderer, RenderError, RenderedArtifacts};
use crate::core_modules::scene_analyzer::{DegradeReason, Extraction, SceneAnalyzer, SceneAssessment};
use crate::core_modules::vision_service::VisionService;
use crate::core_modules::window_buffer::WindowBuffer;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Display(#[from] DisplayError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    /// Terminal: the source is exhausted.
    Drained,
}

/// Number of completed cycles. Starts at zero and only ever goes up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounter(u64);

impl CycleCounter {
    pub fn completed(&self) -> u64 {
        self.0
    }

    /// The number used to name the artifacts of the cycle in progress.
    pub fn next_cycle(&self) -> u64 {
        self.0 + 1
    }

    fn increment(&mut self) {
        self.0 += 1;
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records_read: u64,
    pub frames_admitted: u64,
    pub frames_rejected: u64,
    pub cycles_completed: u64,
    /// Completed cycles whose window contained at least one hot frame.
    pub anomalous_cycles: u64,
    pub analyses_parsed: u64,
    pub analyses_degraded: u64,
    pub analyses_failed: u64,
    pub analyses_skipped: u64,
}

/// How the scene analysis of a cycle went.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisStatus {
    Parsed,
    /// The service replied but nothing usable could be extracted.
    Degraded(DegradeReason),
    /// The service call itself failed.
    Failed(String),
    /// Analysis is disabled.
    Skipped,
}

/// Everything produced by one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Sequence number of the frame admitted this cycle.
    pub frame_sequence: u64,
    /// Sequence numbers of the window contents, oldest first.
    pub window_sequences: Vec<u64>,
    pub anomalies: WindowAnomalies,
    pub artifacts: RenderedArtifacts,
    pub assessment: SceneAssessment,
    pub analysis: AnalysisStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleStep {
    Completed(CycleReport),
    /// The admitted record was malformed; the window is unchanged.
    Rejected(FrameError),
    Drained,
}

/// The mutable state of a run.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub window: WindowBuffer,
    pub counter: CycleCounter,
    pub state: DriverState,
    pub summary: RunSummary,
    prefilled: bool,
}

impl CycleContext {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window: WindowBuffer::new(window_capacity),
            counter: CycleCounter::default(),
            state: DriverState::Running,
            summary: RunSummary::default(),
            prefilled: false,
        }
    }
}

/// Tunables the driver reads on every cycle.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub decimation: usize,
    pub fire_threshold: f64,
    pub pacing: Duration,
    pub prefill_window: bool,
}

impl From<&MonitorConfig> for DriverSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            decimation: config.decimation.max(1),
            fire_threshold: config.fire_threshold,
            pacing: config.pacing(),
            prefill_window: config.prefill_window,
        }
    }
}

pub struct CycleDriver<I, S, D> {
    source: I,
    renderer: CompositeRenderer,
    analyzer: Option<SceneAnalyzer<S>>,
    display: D,
    settings: DriverSettings,
    context: CycleContext,
}

impl<I, S, D> CycleDriver<I, S, D>
where
    I: Iterator<Item = Result<FrameRecord, SourceError>>,
    S: VisionService,
    D: DisplaySurface,
{
    /// `analyzer` is `None` when analysis is disabled.
    pub fn new(
        config: &MonitorConfig,
        source: I,
        renderer: CompositeRenderer,
        analyzer: Option<SceneAnalyzer<S>>,
        display: D,
    ) -> Self {
        Self {
            source,
            renderer,
            analyzer,
            display,
            settings: DriverSettings::from(config),
            context: CycleContext::new(config.window_capacity),
        }
    }

    pub fn context(&self) -> &CycleContext {
        &self.context
    }

    pub fn state(&self) -> DriverState {
        self.context.state
    }

    pub fn summary(&self) -> RunSummary {
        self.context.summary
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// Reads one decimation group and returns its last record.
    /// `None` means the source ran out inside the group.
    fn read_group(&mut self) -> Result<Option<FrameRecord>, DriverError> {
        if self.context.state == DriverState::Drained {
            return Ok(None);
        }

        let mut admitted = None;
        for _ in 0..self.settings.decimation {
            match self.source.next() {
                Some(Ok(record)) => {
                    self.context.summary.records_read += 1;
                    admitted = Some(record);
                }
                Some(Err(err)) => return Err(err.into()),
                None => {
                    self.context.state = DriverState::Drained;
                    info!(
                        records_read = self.context.summary.records_read,
                        "frame source exhausted"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(admitted)
    }

    /// Slides the window, counting admissions and rejections.
    fn admit(&mut self, record: &FrameRecord) -> Result<(), FrameError> {
        match self.context.window.advance(record) {
            Ok(_) => {
                self.context.summary.frames_admitted += 1;
                Ok(())
            }
            Err(err) => {
                self.context.summary.frames_rejected += 1;
                warn!(sequence = err.sequence(), error = %err, "invalid frame, window unchanged");
                Err(err)
            }
        }
    }

    /// Admits frames without rendering until the window is full or the source drains.
    fn prefill(&mut self) -> Result<(), DriverError> {
        while !self.context.window.is_full() {
            let Some(record) = self.read_group()? else {
                break;
            };
            let _ = self.admit(&record);
        }
        self.context.prefilled = true;
        debug!(frames = self.context.window.len(), "window prefilled");
        Ok(())
    }

    /// Runs a single cycle.
    pub async fn step(&mut self) -> Result<CycleStep, DriverError> {
        if self.settings.prefill_window && !self.context.prefilled {
            self.prefill()?;
        }

        // Stage 1: Decimated Read
        let Some(record) = self.read_group()? else {
            return Ok(CycleStep::Drained);
        };

        // Stage 2: Window Update
        if let Err(err) = self.admit(&record) {
            return Ok(CycleStep::Rejected(err));
        }
        let cycle = self.context.counter.next_cycle();

        // Stage 3: Fire Detection
        let frames = self.context.window.frames();
        let anomalies = WindowAnomalies::assess(frames, self.settings.fire_threshold);
        if anomalies.any_anomalous {
            warn!(
                cycle,
                hot_frames = anomalies.count(),
                threshold = self.settings.fire_threshold,
                "possible fire in window"
            );
        }

        // Stage 4: Rendering
        let artifacts = self.renderer.render(frames, &anomalies, cycle)?;

        // Stage 5: Scene Analysis
        let (assessment, analysis) = match &self.analyzer {
            None => (SceneAssessment::default(), AnalysisStatus::Skipped),
            Some(analyzer) => match analyzer.analyze(&artifacts.newest).await {
                Ok(result) => {
                    let assessment = result.assessment();
                    let status = match result.extraction {
                        Extraction::Parsed(_) => AnalysisStatus::Parsed,
                        Extraction::Degraded { reason, .. } => AnalysisStatus::Degraded(reason),
                    };
                    (assessment, status)
                }
                Err(err) => {
                    warn!(cycle, error = %err, "scene analysis failed, continuing without assessment");
                    (SceneAssessment::default(), AnalysisStatus::Failed(err.to_string()))
                }
            },
        };

        // Stage 6: Display
        let view = DisplayView {
            cycle,
            frames: frames.iter().collect(),
            anomalies: &anomalies,
            artifacts: &artifacts,
            assessment: &assessment,
        };
        self.display.present(&view)?;

        // Stage 7: Bookkeeping
        let window_sequences: Vec<u64> = frames.iter().map(Frame::sequence).collect();
        let summary = &mut self.context.summary;
        summary.cycles_completed += 1;
        if anomalies.any_anomalous {
            summary.anomalous_cycles += 1;
        }
        match analysis {
            AnalysisStatus::Parsed => summary.analyses_parsed += 1,
            AnalysisStatus::Degraded(_) => summary.analyses_degraded += 1,
            AnalysisStatus::Failed(_) => summary.analyses_failed += 1,
            AnalysisStatus::Skipped => summary.analyses_skipped += 1,
        }
        self.context.counter.increment();

        Ok(CycleStep::Completed(CycleReport {
            cycle,
            frame_sequence: record.sequence,
            window_sequences,
            anomalies,
            artifacts,
            assessment,
            analysis,
        }))
    }

    /// Runs cycles until the source drains, then hands over to the display's final hold.
    pub async fn run(&mut self) -> Result<RunSummary, DriverError> {
        loop {
            match self.step().await? {
                CycleStep::Completed(report) => {
                    debug!(cycle = report.cycle, frame = report.frame_sequence, "cycle complete");
                    if !self.settings.pacing.is_zero() {
                        tokio::time::sleep(self.settings.pacing).await;
                    }
                }
                CycleStep::Rejected(_) => {}
                CycleStep::Drained => break,
            }
        }

        self.display.finish(self.context.counter.completed())?;
        Ok(self.context.summary)
    }
}
