use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mover_mlp::config::{FileConfig, HarnessConfig, Verbosity};
use mover_mlp::devices::{self, DeviceKind};
use mover_mlp::harness;
use mover_mlp::history::write_history;
use mover_mlp::parsing::{self, synthetic, DataSplit, MoverSplit};
use rand::{rngs::StdRng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML file with harness settings. Command-line flags take precedence
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on a split's train set and evaluate on its test set
    Run(RunArgs),
    /// Train on the static split, continue on the mover split, evaluate after each stage
    TwoStage(RunArgs),
    /// Print the adapted shapes of a split's training set
    Shape {
        /// JSON file holding a train/test split
        #[arg(short, long, value_name = "PATH")]
        data: PathBuf,
    },
    /// List the GPU devices visible to this process
    Devices,
    /// Generate Gaussian clusters in the upstream layout
    Synth(SynthArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON file holding the split
    #[arg(short, long, value_name = "PATH")]
    data: PathBuf,

    /// Number of passes over the training data
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Samples per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// 0 = silent, 1 = every batch, 2 = one line per epoch
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    verbose: Option<u8>,

    /// Seed for weight initialization
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the per-epoch training loss and accuracy as CSV
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> Result<FileConfig> {
        Ok(FileConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            verbose: self.verbose.map(Verbosity::try_from).transpose()?,
            seed: self.seed,
            ..FileConfig::default()
        })
    }
}

#[derive(Args, Debug)]
struct SynthArgs {
    /// Where to write the JSON split
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    #[arg(short = 'k', long, default_value_t = 2)]
    classes: usize,

    /// Training samples per class
    #[arg(short = 'n', long, default_value_t = 100)]
    train_per_class: usize,

    /// Test samples per class
    #[arg(short, long, default_value_t = 50)]
    test_per_class: usize,

    /// Distance of the cluster centres from the origin
    #[arg(short, long, default_value_t = 3.0)]
    radius: f64,

    /// Standard deviation of every cluster
    #[arg(long, default_value_t = 0.5)]
    std_dev: f64,

    /// Also write a mover split whose centres are moved by this much along each axis
    #[arg(short, long)]
    mover_shift: Option<f64>,

    #[arg(short, long)]
    seed: Option<u64>,
}

/// Defaults, then the config file, then the command line
fn load_config(path: Option<&Path>, overrides: FileConfig) -> Result<HarnessConfig> {
    let file = match path {
        Some(path) => FileConfig::load(path)
            .with_context(|| format!("reading config file {}", path.display()))?,
        None => FileConfig::default(),
    };
    let config = file.merge(overrides).apply(HarnessConfig::default());
    config.validate()?;

    Ok(config)
}

fn run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = load_config(config_path, args.overrides()?)?;
    let split: DataSplit = parsing::read_json(&args.data)
        .with_context(|| format!("reading split {}", args.data.display()))?;

    let report = harness::run(&split, &config)?;
    info!(loss = report.metrics.loss, accuracy = report.metrics.accuracy, "run done");

    if let Some(path) = &args.history {
        write_history(path, &report.history)
            .with_context(|| format!("writing history {}", path.display()))?;
    }

    Ok(())
}

fn run_two_stage(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let config = load_config(config_path, args.overrides()?)?;
    let split: MoverSplit = parsing::read_json(&args.data)
        .with_context(|| format!("reading mover split {}", args.data.display()))?;

    let report = harness::run_two_stage(&split, &config)?;
    println!("Pre-shift:  {}", report.pre_shift);
    println!("Post-shift: {}", report.post_shift);
    println!("Combined:   {}", report.combined);

    if let Some(path) = &args.history {
        write_history(path, &report.history)
            .with_context(|| format!("writing history {}", path.display()))?;
    }

    Ok(())
}

fn synth(args: &SynthArgs) -> Result<()> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let centers = synthetic::circle_centers(args.classes, args.radius);

    match args.mover_shift {
        Some(shift) => {
            let split = synthetic::mover_split(
                centers.view(),
                shift,
                args.std_dev,
                args.train_per_class,
                args.test_per_class,
                &mut rng,
            )?;
            parsing::write_json(&args.output, &split)?;
        }
        None => {
            let split = synthetic::data_split(
                centers.view(),
                args.std_dev,
                args.train_per_class,
                args.test_per_class,
                &mut rng,
            )?;
            parsing::write_json(&args.output, &split)?;
        }
    }
    info!(output = %args.output.display(), classes = args.classes, "wrote synthetic split");

    Ok(())
}

fn list_devices() {
    let host = devices::list_physical_devices(DeviceKind::Cpu);
    info!(host = %devices::format_devices(&host), model = ?host.first().and_then(|cpu| cpu.model.as_deref()), "host devices");

    let gpus = devices::list_physical_devices(DeviceKind::Gpu);
    println!("{}", devices::format_devices(&gpus));
}

fn main() -> Result<()> {
    mover_mlp::logging::init_logging()?;
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match &cli.command {
        Command::Run(args) => {
            harness::print_loaded();
            run(config_path, args)
        }
        Command::TwoStage(args) => {
            harness::print_loaded();
            run_two_stage(config_path, args)
        }
        Command::Shape { data } => {
            let split: DataSplit = parsing::read_json(data)
                .with_context(|| format!("reading split {}", data.display()))?;
            harness::show_data_shape(&split);
            Ok(())
        }
        Command::Devices => {
            list_devices();
            Ok(())
        }
        Command::Synth(args) => synth(args),
    }
}
