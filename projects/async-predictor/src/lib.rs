pub mod demo;
pub mod pipeline;
pub mod run_artifacts;
pub mod run_context;
pub mod video;
