//! Core domain model types for cardflow.
//!
//! This module contains the stage outcome types shared by the pipeline
//! engine and the media orchestrator.

mod result;
mod status;

pub use result::{StageResult, UnitCounts};
pub use status::StageStatus;
