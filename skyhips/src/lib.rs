//! SkyHiPS - Hierarchical progressive sky survey tile engine
//!
//! This library loads HiPS surveys (all-sky image pyramids indexed by nested
//! HEALPix tiles) from HTTP or local storage, keeps decoded tiles in a shared
//! memory-budgeted cache and resolves, for any tile, the best texture
//! currently available together with the UV transform needed to draw it.
//!
//! # Layout
//!
//! - [`index`]: tile addresses and sphere geometry
//! - [`tile`]: materialized tiles and the decoder seam
//! - [`cache`]: the shared LRU tile cache
//! - [`fetch`]: byte fetchers and the per-survey fetch pipeline
//! - [`survey`]: survey metadata, texture resolution and traversal
//! - [`traverse`]: generic depth-first tile traversal
//! - [`modules`]: renderable sky layers built on surveys
//! - [`config`], [`logging`]: ambient configuration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use skyhips::{config::EngineConfig, fetch::FileFetcher, survey::SurveyOptions, Engine};
//!
//! let engine = Engine::new(EngineConfig::default(), Arc::new(FileFetcher::new()))?;
//! let survey = engine.create_survey(SurveyOptions::new("/data/hips/DSS"));
//! while !survey.is_ready() {}
//! println!("{} up to order {}", survey.label(), survey.max_order());
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod index;
pub mod logging;
pub mod modules;
pub mod survey;
pub mod tile;
pub mod traverse;

pub use engine::Engine;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
