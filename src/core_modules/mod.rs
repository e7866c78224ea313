pub mod anomaly;
pub mod display;
pub mod frame;
pub mod frame_source;
pub mod renderer;
pub mod scene_analyzer;
pub mod utils;
pub mod vision_service;
pub mod window_buffer;
