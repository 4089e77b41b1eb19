//! Pipeline module for orchestrating a module run.
//!
//! Provides a trait-based architecture for the fit, project and postprocess
//! stages of one ice-source module.

mod stage;

pub use stage::{
    FitStage, ModuleRun, ModuleStage, Pipeline, PipelineError, PostprocessStage, ProjectStage, StageId,
};
