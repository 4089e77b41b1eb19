//! Module stage trait and pipeline orchestration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::bundle::{BundleError, ProjectionBundle};
use crate::config::{ConfigError, ModuleConfig};
use crate::emulator::{EmulatorError, EmulatorRequest, EmulatorRunner};
use crate::postprocess::{postprocess, PostprocessError};
use crate::project::{project, ProjectError};
use crate::trend::{FitParameters, TrendError};

/// Unique identifier for module stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Trend-parameter selection.
    Fit,
    /// Emulator run, extraction, trend correction and global output.
    Project,
    /// Localization to point sites.
    Postprocess,
}

impl StageId {
    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Fit => "fit",
            StageId::Project => "project",
            StageId::Postprocess => "postprocess",
        }
    }
}

/// Errors that can occur during pipeline execution.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{0}' failed: {1}")]
    StageFailed(String, String),
    #[error("Missing dependency: stage '{0}' requires '{1}'")]
    MissingDependency(String, String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trend(#[from] TrendError),
    #[error(transparent)]
    Emulator(#[from] EmulatorError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Postprocess(#[from] PostprocessError),
}

/// State threaded through the stages of one module run.
#[derive(Debug, Clone)]
pub struct ModuleRun {
    pub config: ModuleConfig,
    /// Set by the fit stage.
    pub fit: Option<FitParameters>,
    /// Set by the project stage, or loaded from disk.
    pub bundle: Option<ProjectionBundle>,
    /// Every file written so far, in order.
    pub written: Vec<PathBuf>,
}

impl ModuleRun {
    pub fn new(config: ModuleConfig) -> Self {
        Self {
            config,
            fit: None,
            bundle: None,
            written: Vec::new(),
        }
    }

    /// Resumes a run from a saved bundle, ready for postprocessing.
    pub fn from_bundle(config: ModuleConfig, bundle: ProjectionBundle) -> Self {
        Self {
            bundle: Some(bundle),
            ..Self::new(config)
        }
    }

    /// True if the output of `stage` is already available.
    pub fn provides(&self, stage: StageId) -> bool {
        match stage {
            StageId::Fit => self.fit.is_some(),
            StageId::Project => self.bundle.is_some(),
            StageId::Postprocess => false,
        }
    }
}

/// Trait for implementing module stages.
///
/// Each stage reads what earlier stages left in the [`ModuleRun`] and adds
/// its own output.
pub trait ModuleStage: Send + Sync {
    /// Returns the unique identifier for this stage.
    fn id(&self) -> StageId;

    /// Returns a human-readable name for the stage.
    fn name(&self) -> &str;

    /// Returns the stage IDs that must be executed before this stage.
    fn dependencies(&self) -> &[StageId] {
        &[]
    }

    /// Executes the stage, updating the run in place.
    fn execute(&self, run: &mut ModuleRun) -> Result<(), PipelineError>;
}

/// Orchestrates module stages into a complete run.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn ModuleStage>>,
}

impl Pipeline {
    /// Creates a new empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage to the pipeline.
    pub fn add_stage<S: ModuleStage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Executes all stages in order.
    pub fn run(&self, run: &mut ModuleRun) -> Result<(), PipelineError> {
        self.run_with_callbacks(run, |_, _, _| {}, |_, _, _| {})
    }

    /// Executes all stages with progress callbacks.
    ///
    /// A dependency is satisfied by an earlier stage of this pipeline or by
    /// state already present in `run`.
    ///
    /// # Arguments
    /// * `run` - The module run to advance
    /// * `on_stage_start` - Called when each stage begins
    /// * `on_stage_complete` - Called when each stage finishes
    pub fn run_with_callbacks<F1, F2>(
        &self,
        run: &mut ModuleRun,
        mut on_stage_start: F1,
        mut on_stage_complete: F2,
    ) -> Result<(), PipelineError>
    where
        F1: FnMut(&str, usize, usize),
        F2: FnMut(&str, usize, usize),
    {
        let total = self.stages.len();
        let mut completed: Vec<StageId> = Vec::new();

        for (i, stage) in self.stages.iter().enumerate() {
            on_stage_start(stage.name(), i, total);

            // Check dependencies
            for dep in stage.dependencies() {
                if !completed.contains(dep) && !run.provides(*dep) {
                    return Err(PipelineError::MissingDependency(
                        stage.name().to_string(),
                        dep.name().to_string(),
                    ));
                }
            }

            info!(stage = stage.id().name(), "starting stage");
            stage.execute(run)?;
            completed.push(stage.id());

            on_stage_complete(stage.name(), i, total);
        }

        Ok(())
    }
}

/// Selects and validates trend parameters.
pub struct FitStage;

impl ModuleStage for FitStage {
    fn id(&self) -> StageId {
        StageId::Fit
    }

    fn name(&self) -> &str {
        "Trend Fit"
    }

    fn execute(&self, run: &mut ModuleRun) -> Result<(), PipelineError> {
        run.config.validate()?;
        let fit = run.config.fit_parameters();
        fit.validate()?;
        run.fit = Some(fit);
        Ok(())
    }
}

/// Runs the emulator and projects global contributions.
pub struct ProjectStage {
    runner: Box<dyn EmulatorRunner>,
    save_bundle: bool,
}

impl ProjectStage {
    pub fn new<R: EmulatorRunner + 'static>(runner: R) -> Self {
        Self::from_boxed(Box::new(runner))
    }

    pub fn from_boxed(runner: Box<dyn EmulatorRunner>) -> Self {
        Self {
            runner,
            save_bundle: false,
        }
    }

    /// Also writes the bundle as JSON for a later postprocess run.
    pub fn with_saved_bundle(mut self, save: bool) -> Self {
        self.save_bundle = save;
        self
    }
}

impl ModuleStage for ProjectStage {
    fn id(&self) -> StageId {
        StageId::Project
    }

    fn name(&self) -> &str {
        "Projection"
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Fit]
    }

    fn execute(&self, run: &mut ModuleRun) -> Result<(), PipelineError> {
        let fit = run.fit.as_ref().ok_or_else(|| {
            PipelineError::StageFailed(self.name().to_string(), "no fit parameters".to_string())
        })?;

        let request = EmulatorRequest {
            dataset: run.config.emulator_dataset.clone(),
            nsamps: run.config.nsamps,
            source: run.config.source,
            output_dir: run.config.output_dir.clone(),
        };
        let csv = self.runner.run(&request)?;
        let output = project(&run.config, fit, &csv)?;

        run.written.extend(output.written);
        if self.save_bundle {
            let path = run.config.bundle_file();
            output.bundle.save(&path)?;
            run.written.push(path);
        }
        run.bundle = Some(output.bundle);
        Ok(())
    }
}

/// Localizes every bundle component and writes local files.
pub struct PostprocessStage {
    location_file: PathBuf,
    fingerprint_files: BTreeMap<String, PathBuf>,
}

impl PostprocessStage {
    /// `fingerprint_files` maps each bundle component to its fingerprint dataset.
    pub fn new(location_file: PathBuf, fingerprint_files: BTreeMap<String, PathBuf>) -> Self {
        Self {
            location_file,
            fingerprint_files,
        }
    }
}

impl ModuleStage for PostprocessStage {
    fn id(&self) -> StageId {
        StageId::Postprocess
    }

    fn name(&self) -> &str {
        "Localization"
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Project]
    }

    fn execute(&self, run: &mut ModuleRun) -> Result<(), PipelineError> {
        let bundle = run.bundle.as_ref().ok_or_else(|| {
            PipelineError::StageFailed(self.name().to_string(), "no projection bundle".to_string())
        })?;
        run.config.validate()?;

        let config = &run.config;
        let written = postprocess(
            bundle,
            &self.location_file,
            &self.fingerprint_files,
            config.chunk_size,
            |component| config.local_file(component),
        )?;
        run.written.extend(written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::ExistingOutput;
    use crate::export::ProjectionMetadata;
    use crate::extract::IceSource;
    use crate::project::test_support::write_emulator_csv;
    use crate::series::SampleSeries;
    use tempfile::tempdir;

    fn gris_config(dir: &std::path::Path) -> ModuleConfig {
        let mut config = ModuleConfig::greenland("emu.gris");
        config.nsamps = 2;
        config.output_dir = dir.to_path_buf();
        config
    }

    fn write_gris_csv(path: &std::path::Path) {
        write_emulator_csv(
            path,
            &[
                ("GrIS", "ALL", 2020, 1, 1.0),
                ("GrIS", "ALL", 2030, 1, 2.0),
                ("GrIS", "ALL", 2020, 2, 1.5),
                ("GrIS", "ALL", 2030, 2, 2.5),
            ],
        );
    }

    #[test]
    fn test_stage_id_name() {
        assert_eq!(StageId::Fit.name(), "fit");
        assert_eq!(StageId::Postprocess.name(), "postprocess");
    }

    #[test]
    fn test_fit_stage_uses_presets() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.add_stage(FitStage);

        let mut run = ModuleRun::new(gris_config(dir.path()));
        pipeline.run(&mut run).unwrap();
        assert_eq!(run.fit, Some(FitParameters::greenland()));
    }

    #[test]
    fn test_pipeline_execution() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("projections.csv");
        write_gris_csv(&csv);

        let mut pipeline = Pipeline::new();
        pipeline.add_stage(FitStage);
        pipeline.add_stage(ProjectStage::new(ExistingOutput::new(&csv)).with_saved_bundle(true));
        assert_eq!(pipeline.stage_count(), 2);

        let config = gris_config(dir.path());
        let mut run = ModuleRun::new(config.clone());
        pipeline.run(&mut run).unwrap();

        let bundle = run.bundle.as_ref().unwrap();
        assert_eq!(bundle.component_names(), vec!["GIS"]);
        assert_eq!(run.written, vec![config.global_file(), config.bundle_file()]);
        assert_eq!(&ProjectionBundle::load(&config.bundle_file()).unwrap(), bundle);
    }

    #[test]
    fn test_missing_dependency() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.add_stage(ProjectStage::new(ExistingOutput::new(dir.path().join("x.csv"))));

        let mut run = ModuleRun::new(gris_config(dir.path()));
        let err = pipeline.run(&mut run).unwrap_err();
        assert!(matches!(err, PipelineError::MissingDependency(stage, dep) if stage == "Projection" && dep == "fit"));
    }

    #[test]
    fn test_loaded_bundle_satisfies_project_dependency() {
        let dir = tempdir().unwrap();
        let config = gris_config(dir.path());
        let metadata = ProjectionMetadata {
            pipeline_id: config.pipeline_id.clone(),
            baseyear: 2005,
            scenario: "ssp585".into(),
            preprocess_infile: None,
        };
        let mut bundle = ProjectionBundle::new(IceSource::Gris, vec![2020], metadata);
        bundle.push("GIS", SampleSeries::missing(2, 1)).unwrap();

        let mut pipeline = Pipeline::new();
        pipeline.add_stage(PostprocessStage::new(dir.path().join("missing.lst"), BTreeMap::new()));

        // Dependency check passes; the stage then fails reading the location file.
        let mut run = ModuleRun::from_bundle(config, bundle);
        let err = pipeline.run(&mut run).unwrap_err();
        assert!(matches!(err, PipelineError::Postprocess(_)));
    }

    #[test]
    fn test_pipeline_with_callbacks() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new();
        pipeline.add_stage(FitStage);

        let mut run = ModuleRun::new(gris_config(dir.path()));
        let mut started = false;
        let mut completed = false;

        pipeline
            .run_with_callbacks(
                &mut run,
                |name, _, _| {
                    assert_eq!(name, "Trend Fit");
                    started = true;
                },
                |name, i, total| {
                    assert_eq!(name, "Trend Fit");
                    assert_eq!((i, total), (0, 1));
                    completed = true;
                },
            )
            .unwrap();

        assert!(started);
        assert!(completed);
    }

    #[test]
    fn test_invalid_config_fails_fit() {
        let dir = tempdir().unwrap();
        let mut config = gris_config(dir.path());
        config.chunk_size = 0;

        let mut pipeline = Pipeline::new();
        pipeline.add_stage(FitStage);
        let mut run = ModuleRun::new(config);
        assert!(matches!(pipeline.run(&mut run), Err(PipelineError::Config(_))));
    }
}
