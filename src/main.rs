//! Jester NCF CLI
//!
//! Trains the collaborative-filtering network over every pair of a
//! proportion, then builds comparison reports from the saved artifacts.

use clap::{Parser, Subcommand};
use jester::{Config, Proportion, Result};

#[derive(Parser)]
#[command(name = "jester")]
#[command(about = "Neural collaborative filtering on Jester joke ratings", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Train every pair of a proportion and save per-epoch estimates
    Train {
        /// Training proportion: 30, 60 or 90
        #[arg(short, long)]
        proportion: Proportion,
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
        /// Override random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Select the optimal epoch of a run and write comparison tables
    Report {
        #[arg(short, long)]
        proportion: Proportion,
        /// Epoch count the run was trained with
        #[arg(long)]
        epochs: usize,
        /// Run id printed by `train`
        #[arg(long)]
        run: String,
    },
    /// Summarise a run's training and validation error per epoch
    Curves {
        #[arg(short, long)]
        proportion: Proportion,
        #[arg(long)]
        epochs: usize,
        #[arg(long)]
        run: String,
        /// Also write the summary as CSV
        #[arg(long)]
        output: Option<String>,
    },
    /// Evaluate a saved pair model on its validation split
    Score {
        #[arg(short, long)]
        proportion: Proportion,
        /// Pair number, starting at 1
        #[arg(long)]
        pair: usize,
        /// Model path without extension
        #[arg(long)]
        model: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Train {
            proportion,
            epochs,
            seed,
        } => commands::train(&config, proportion, epochs, seed),
        Commands::Report {
            proportion,
            epochs,
            run,
        } => commands::report(&config, proportion, epochs, &run),
        Commands::Curves {
            proportion,
            epochs,
            run,
            output,
        } => commands::curves(&config, proportion, epochs, &run, output),
        Commands::Score {
            proportion,
            pair,
            model,
        } => commands::score(&config, proportion, pair, &model),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::path::Path;

    use burn::backend::{Autodiff, NdArray};
    use jester::data::artifacts::{ArtifactKey, ExperimentArtifacts};
    use jester::data::pairs::{load_pair, load_pairs};
    use jester::data::{Baselines, RatingShift, UserMatrix};
    use jester::evaluation::curves::{summarize, write_csv};
    use jester::evaluation::selector::{count_weights, select_epoch};
    use jester::model::{NcfConfig, NcfModel, NcfPredictor, Predictor};
    use jester::report::{report_dir, ComparisonReport};
    use jester::training::{ExperimentRunner, ExperimentSpec, Metrics};
    use jester::JesterError;

    type MyBackend = NdArray<f32>;
    type MyAutodiffBackend = Autodiff<MyBackend>;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        for dir in [
            &config.data.pairs_dir,
            &config.data.artifact_dir,
            &config.data.model_dir,
            &config.report.output_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        println!(
            "Created {}/, {}/, {}/ and {}/ directories",
            config.data.pairs_dir,
            config.data.artifact_dir,
            config.data.model_dir,
            config.report.output_dir
        );

        println!("\nNext steps:");
        println!(
            "  1. Place pair files in {}/ (e.g. 60_1_train.csv, 60_1_test.csv)",
            config.data.pairs_dir
        );
        println!("  2. Run 'jester train --proportion 60' to train all pairs");
        println!("  3. Run 'jester report --proportion 60 --epochs N --run RUN' to write tables");

        Ok(())
    }

    pub fn train(
        config: &Config,
        proportion: Proportion,
        epochs: Option<usize>,
        seed: Option<u64>,
    ) -> Result<()> {
        let spec = ExperimentSpec {
            proportion,
            epochs: epochs.unwrap_or(config.training.epochs),
            seed: seed.unwrap_or(config.training.seed),
        };

        let shift = RatingShift::new(config.data.rating_offset);
        let pairs = load_pairs(Path::new(&config.data.pairs_dir), proportion, shift)?;

        println!(
            "Training {} pairs for proportion {}% ({} epochs, seed {})",
            pairs.len(),
            proportion,
            spec.epochs,
            spec.seed
        );

        let device = Default::default();
        let runner = ExperimentRunner::<MyAutodiffBackend>::new(config.clone(), device);
        let outcome = runner.run(&spec, &pairs)?;

        let artifact_dir = Path::new(&config.data.artifact_dir);
        outcome.artifacts.save(artifact_dir, &outcome.key)?;

        println!("\nTraining complete!");
        for (index, history) in outcome.histories.iter().enumerate() {
            println!(
                "  Pair {:>2}: best validation MAE {:.4} at epoch {}",
                index + 1,
                history.best_val_mae,
                history.best_epoch + 1
            );
        }
        println!("\nRun id: {}", outcome.key.run_id);
        println!(
            "Estimates: {}",
            outcome.key.estimates_path(artifact_dir).display()
        );
        println!(
            "Report with: jester report --proportion {} --epochs {} --run {}",
            proportion, spec.epochs, outcome.key.run_id
        );

        Ok(())
    }

    pub fn report(config: &Config, proportion: Proportion, epochs: usize, run: &str) -> Result<()> {
        let key = ArtifactKey::new(proportion, epochs, run);
        let artifacts = ExperimentArtifacts::load(Path::new(&config.data.artifact_dir), &key)?;

        let weights = count_weights(proportion.rating_counts());
        let selection = select_epoch(&artifacts.val_curve, &weights)?;
        println!("Optimal epoch: {}", selection.epoch);

        let estimates = &artifacts.estimates;
        let predictions = estimates.epoch(selection.epoch)?;
        let n_items = config.data.n_items;
        let truth = UserMatrix::from_csv(&config.data.testing_path, n_items)?
            .aligned_to(&estimates.user_ids)?;
        let baselines = Baselines::load(
            Path::new(&config.data.uniform_path),
            Path::new(&config.data.user_avg_path),
            Path::new(&config.data.total_avg_path),
            n_items,
            &estimates.user_ids,
        )?;

        let report = ComparisonReport::build(&estimates.user_ids, predictions, &truth, &baselines)?;
        let dir = report_dir(&config.report.output_dir, proportion, selection.epoch);
        report.write(&dir)?;

        println!("\nTernary counts ({} users x {} jokes):", estimates.user_ids.len(), n_items);
        for (name, table) in report.tables() {
            println!("  {:<5} {}", name, table.counts);
        }
        println!("\nReport written to {}", dir.display());

        Ok(())
    }

    pub fn curves(
        config: &Config,
        proportion: Proportion,
        epochs: usize,
        run: &str,
        output: Option<String>,
    ) -> Result<()> {
        let key = ArtifactKey::new(proportion, epochs, run);
        let artifacts = ExperimentArtifacts::load(Path::new(&config.data.artifact_dir), &key)?;
        let points = summarize(
            &artifacts.train_curve,
            &artifacts.val_curve,
            proportion.rating_counts(),
        )?;

        println!("{:>6} {:>10} {:>10}", "Epoch", "Train MAE", "Val MAE");
        for point in &points {
            println!(
                "{:>6} {:>10.4} {:>10.4}",
                point.epoch, point.train_mae, point.val_mae
            );
        }

        if let Some(path) = output {
            write_csv(&points, Path::new(&path))?;
            println!("\nWrote {}", path);
        }

        Ok(())
    }

    pub fn score(config: &Config, proportion: Proportion, pair: usize, model: &str) -> Result<()> {
        let index = pair.checked_sub(1).ok_or_else(|| {
            JesterError::Config("Pair numbers start at 1".to_string())
        })?;
        let shift = RatingShift::new(config.data.rating_offset);
        let split = load_pair(Path::new(&config.data.pairs_dir), proportion, index, shift)?;

        let (n_users, n_items) = split.id_bounds();
        let ncf_config = NcfConfig::new(&config.model, n_users, n_items);
        let device = Default::default();
        let network = NcfModel::<MyBackend>::load(&device, model, &ncf_config)?;

        let predictor =
            NcfPredictor::new(&network, &ncf_config, device, config.training.eval_batch_size);
        let validation = &split.validation;
        let predictions = predictor.predict(&validation.user_ids(), &validation.item_ids())?;
        let metrics = Metrics::from_predictions(&predictions, &validation.ratings());

        println!(
            "Pair {} ({}%): {} validation ratings | {}",
            pair,
            proportion,
            validation.len(),
            metrics
        );

        Ok(())
    }
}
