//! Emulandice CLI - sea-level projections from emulator output.
//!
//! Runs the fit, project and (optionally) postprocess stages of one ice
//! source module, or localizes a previously saved projection bundle.

use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use emulandice::bundle::ProjectionBundle;
use emulandice::config::ModuleConfig;
use emulandice::emulator::{EmulatorRunner, ExistingOutput, RscriptEmulator};
use emulandice::extract::{extract_glaciers, extract_ice_sheet, extract_single, IceSource};
use emulandice::pipeline::{FitStage, ModuleRun, Pipeline, PostprocessStage, ProjectStage};

/// Sea-level projections from the emulandice ice-sheet and glacier emulators.
#[derive(Parser)]
#[command(name = "emulandice")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project sea-level rise from the Antarctic ice sheet (AIS).
    Ais(ModuleArgs),
    /// Project sea-level rise from the Greenland ice sheet (GrIS).
    Gris(ModuleArgs),
    /// Project sea-level rise from glaciers.
    Glaciers(ModuleArgs),
    /// Localize a saved projection bundle.
    Postprocess {
        /// Bundle JSON written by a module run with --save-bundle.
        #[arg(short, long)]
        bundle: PathBuf,

        /// Output directory for local projection files.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Sites processed per parallel chunk.
        #[arg(long, default_value = "50")]
        chunk_size: usize,

        #[command(flatten)]
        localize: LocalizeArgs,
    },
    /// Display the extents of an emulator output file.
    Info {
        /// Emulator CSV.
        input: PathBuf,

        /// Ice source to read (AIS, GrIS or Glaciers).
        #[arg(short, long, default_value = "AIS")]
        source: IceSource,
    },
}

#[derive(Args)]
struct ModuleArgs {
    /// TOML configuration file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unique identifier for this instance of the module.
    #[arg(long)]
    pipeline_id: Option<String>,

    /// Number of temperature trajectories.
    #[arg(short, long)]
    nsamps: Option<usize>,

    /// Year at which trend corrections are zero.
    #[arg(long)]
    baseyear: Option<i32>,

    /// Scenario label written to output files.
    #[arg(long)]
    scenario: Option<String>,

    /// Input file the run was prepared from (provenance only).
    #[arg(long)]
    preprocess_infile: Option<String>,

    /// Forcing dataset passed to the emulator.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Use an existing emulator CSV instead of running R.
    #[arg(long)]
    emulator_output: Option<PathBuf>,

    /// R executable used to run the emulator.
    #[arg(long, default_value = "R")]
    r_program: String,

    /// Output directory for emulator and projection files.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seed of the shared trend quantile draw.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write per-component (AIS) or per-region (glaciers) global files.
    #[arg(long)]
    write_components: bool,

    /// Save the projection bundle as JSON for a later postprocess run.
    #[arg(long)]
    save_bundle: bool,

    /// Sites processed per parallel chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    #[command(flatten)]
    localize: LocalizeArgs,
}

#[derive(Args)]
struct LocalizeArgs {
    /// Tab-separated location file (name, id, lat, lon). Enables localization.
    #[arg(short, long)]
    locations: Option<PathBuf>,

    /// Fingerprint dataset for a component, as COMPONENT=PATH. Repeatable.
    #[arg(short, long = "fingerprint", value_parser = parse_fingerprint)]
    fingerprints: Vec<(String, PathBuf)>,
}

fn parse_fingerprint(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((component, path)) if !component.is_empty() && !path.is_empty() => {
            Ok((component.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected COMPONENT=PATH, got '{value}'")),
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ais(args) => run_module(IceSource::Ais, args),
        Commands::Gris(args) => run_module(IceSource::Gris, args),
        Commands::Glaciers(args) => run_module(IceSource::Glaciers, args),
        Commands::Postprocess {
            bundle,
            output,
            chunk_size,
            localize,
        } => run_postprocess(bundle, output, chunk_size, localize),
        Commands::Info { input, source } => run_info(&input, source),
    }
}

fn build_config(source: IceSource, args: &ModuleArgs) -> ModuleConfig {
    let mut config = match &args.config {
        Some(path) => ModuleConfig::from_toml_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => ModuleConfig::for_source(source, &format!("emulandice.{}", source.label().to_lowercase())),
    };
    config.source = source;

    if let Some(id) = &args.pipeline_id {
        config.pipeline_id = id.clone();
    }
    if let Some(nsamps) = args.nsamps {
        config.nsamps = nsamps;
    }
    if let Some(baseyear) = args.baseyear {
        config.baseyear = baseyear;
    }
    if let Some(scenario) = &args.scenario {
        config.scenario = scenario.clone();
    }
    if let Some(infile) = &args.preprocess_infile {
        config.preprocess_infile = Some(infile.clone());
    }
    if let Some(dataset) = &args.dataset {
        config.emulator_dataset = Some(dataset.clone());
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    config.write_components |= args.write_components;
    config
}

fn fingerprint_map(localize: &LocalizeArgs) -> BTreeMap<String, PathBuf> {
    localize.fingerprints.iter().cloned().collect()
}

fn run_module(source: IceSource, args: ModuleArgs) {
    let config = build_config(source, &args);
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    println!("Emulandice - {} Sea-Level Projection", source);
    println!("=======================================");
    println!("Pipeline ID: {}", config.pipeline_id);
    println!("Samples: {}", config.nsamps);
    println!("Baseyear: {}", config.baseyear);
    println!("Scenario: {}", config.scenario);
    println!("Seed: {}", config.seed);
    println!("Output: {}", config.output_dir.display());

    let start = Instant::now();

    let runner: Box<dyn EmulatorRunner> = match &args.emulator_output {
        Some(path) => {
            println!("Emulator: using existing output {}", path.display());
            Box::new(ExistingOutput::new(path))
        }
        None => {
            println!("Emulator: {} (dataset {})", args.r_program, config
                .emulator_dataset
                .as_deref()
                .map_or_else(|| "<none>".to_string(), |p| p.display().to_string()));
            Box::new(RscriptEmulator {
                program: args.r_program.clone(),
            })
        }
    };

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(FitStage);
    pipeline.add_stage(ProjectStage::from_boxed(runner).with_saved_bundle(args.save_bundle));

    if let Some(locations) = &args.localize.locations {
        pipeline.add_stage(PostprocessStage::new(locations.clone(), fingerprint_map(&args.localize)));
        println!("Localization enabled: {}", locations.display());
    } else {
        println!("Localization: SKIPPED");
    }

    println!("\nRunning module pipeline...");
    let mut run = ModuleRun::new(config);
    execute(&pipeline, &mut run);

    println!("Module completed in {:.2?}", start.elapsed());
    report_written(&run);
}

fn run_postprocess(bundle_path: PathBuf, output: PathBuf, chunk_size: usize, localize: LocalizeArgs) {
    let Some(locations) = localize.locations.clone() else {
        eprintln!("Error: --locations is required for postprocess");
        std::process::exit(1);
    };

    let bundle = ProjectionBundle::load(&bundle_path).unwrap_or_else(|e| {
        eprintln!("Error loading bundle: {}", e);
        std::process::exit(1);
    });

    let mut config = ModuleConfig::for_source(bundle.source, &bundle.metadata.pipeline_id);
    config.nsamps = bundle.nsamps().max(1);
    config.baseyear = bundle.metadata.baseyear;
    config.scenario = bundle.metadata.scenario.clone();
    config.preprocess_infile = bundle.metadata.preprocess_infile.clone();
    config.output_dir = output;
    config.chunk_size = chunk_size;

    println!("Emulandice - Localization");
    println!("=========================");
    println!("Bundle: {}", bundle_path.display());
    println!("Source: {}", bundle.source);
    println!("Components: {}", bundle.component_names().join(", "));
    println!("Locations: {}", locations.display());

    let start = Instant::now();

    let mut pipeline = Pipeline::new();
    pipeline.add_stage(PostprocessStage::new(locations, fingerprint_map(&localize)));

    let mut run = ModuleRun::from_bundle(config, bundle);
    execute(&pipeline, &mut run);

    println!("Localization completed in {:.2?}", start.elapsed());
    report_written(&run);
}

fn execute(pipeline: &Pipeline, run: &mut ModuleRun) {
    pipeline
        .run_with_callbacks(
            run,
            |name, i, total| {
                println!("  [{}/{}] Starting: {}", i + 1, total, name);
            },
            |name, i, total| {
                println!("  [{}/{}] Completed: {}", i + 1, total, name);
            },
        )
        .unwrap_or_else(|e| {
            eprintln!("Error during module run: {}", e);
            std::process::exit(1);
        });
}

fn report_written(run: &ModuleRun) {
    println!("\nWrote {} files:", run.written.len());
    for path in &run.written {
        println!("  {}", path.display());
    }
    println!("Done!");
}

fn run_info(input: &Path, source: IceSource) {
    let (nregions, nsamps, years, missing) = match source {
        IceSource::Gris => extract_single(input, source).map(|e| {
            (1, e.data.nsamps(), e.years, e.data.missing_count())
        }),
        IceSource::Ais => extract_ice_sheet(input).map(|e| {
            let (r, s, _) = e.data.shape();
            (r, s, e.years, e.data.iter().map(|x| x.missing_count()).sum::<usize>())
        }),
        IceSource::Glaciers => extract_glaciers(input).map(|e| {
            let (r, s, _) = e.data.shape();
            (r, s, e.years, e.data.iter().map(|x| x.missing_count()).sum::<usize>())
        }),
    }
    .unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let cells = nregions * nsamps * years.len();

    println!("Emulandice - Emulator Output Info");
    println!("=================================");
    println!();
    println!("File: {}", input.display());
    println!("Source: {}", source);
    println!();
    println!("Extents:");
    println!("  Regions:   {:>8}", nregions);
    println!("  Samples:   {:>8}", nsamps);
    println!("  Years:     {:>8}", years.len());
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        println!("  Range:     {:>8} - {}", first, last);
    }
    println!();
    println!("Cells:");
    println!("  Total:     {:>8}", cells);
    println!("  Missing:   {:>8}", missing);

    let bytes_f32 = nsamps * years.len() * 4;
    println!();
    println!("Global file payload (f32): {} bytes ({:.2} MB)", bytes_f32, bytes_f32 as f64 / 1024.0 / 1024.0);
}
