pub mod clustering;
pub mod engine;
pub mod levels;
pub mod normalize;
pub mod ratios;
pub mod request;
pub mod tiers;

pub use engine::LevelEngine;
pub use request::{handle_request, AnalysisRequest};
