pub mod bridge;
pub mod cache;
pub mod classify;
pub mod clock;
pub mod concurrent;
pub mod config;
pub mod engine;
pub mod features;
pub mod http_client;
pub mod normalize;
pub mod output;
pub mod probe;
pub mod rules;
pub mod utils;

pub use crate::config::EngineConfig;
pub use crate::engine::{Collaborators, ExtractionReport, FeatureEngine};
pub use crate::features::{Feature, FeatureValue, FeatureVector};
