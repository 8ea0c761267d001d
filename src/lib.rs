//! dualsub - bilingual subtitle pipeline
//!
//! Speech-to-text word streams are grouped into subtitle cues, translated
//! through a local LLM and burned into videos as two stacked language tracks.

pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod lookup;
pub mod media;
pub mod progress;
pub mod queue;
pub mod segment;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod workflow;
