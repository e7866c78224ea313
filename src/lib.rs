// THEORY:
// This file is the entry point for the `thermal_sentry` library crate. It exposes
// the `CycleDriver` and its configuration as the high-level interface, and the
// building blocks (`core_modules`) for callers that want to assemble their own
// loop: the frame source, the sliding window, the fire detector, the renderer,
// the display surface and the scene analyzer with its vision-service seam.

pub mod config;
pub mod core_modules;
pub mod pipeline;

pub use config::{AnalysisConfig, ConfigError, MonitorConfig, RenderConfig, load_config};
pub use core_modules::anomaly::{WindowAnomalies, is_anomalous};
pub use core_modules::frame::{Frame, FrameError};
pub use core_modules::frame_source::{FrameRecord, JsonLinesSource, SourceError};
pub use core_modules::scene_analyzer::{SceneAnalyzer, SceneAssessment, extract_observations};
pub use core_modules::vision_service::{OpenAiVisionClient, VisionService};
pub use core_modules::window_buffer::WindowBuffer;
pub use pipeline::{CycleDriver, CycleStep, DriverError, DriverState, RunSummary};
