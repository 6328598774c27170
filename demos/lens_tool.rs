//! Lens Distortion Round-Trip Example
//!
//! Loads a lens configuration, samples a grid of normalized points, runs the
//! forward and inverse mapping of the configured model and reports the
//! round-trip error.
//!
//! Usage:
//! ```bash
//! cargo run --example lens_tool -- \
//!   --config samples/brown_conrady.yaml \
//!   --num-points 200 \
//!   --extent 0.8
//! ```

use clap::Parser;
use flexi_logger::{colored_detailed_format, Logger};
use lens_distortion::distortion::{BrownConradyTransform, DistortionModel, ModelKind, Operation};
use lens_distortion::geometry::{sample_points, Points2D};
use lens_distortion::{LensConfig, SolveStatus};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Lens distortion round-trip tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the lens configuration file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Approximate number of grid points
    #[arg(short = 'n', long, default_value_t = 100)]
    num_points: usize,

    /// Half extent of the sampled grid in normalized coordinates
    #[arg(short = 'e', long, default_value_t = 0.5)]
    extent: f64,
}

fn report_errors(
    original: &Points2D,
    recovered: &Points2D,
) -> Result<(), Box<dyn std::error::Error>> {
    let errors = recovered.difference(original)?.norms();
    let finite: Vec<f64> = errors.iter().copied().filter(|e| e.is_finite()).collect();
    if finite.is_empty() {
        warn!("No finite round-trip errors");
        return Ok(());
    }
    let max = finite.iter().copied().fold(0.0, f64::max);
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    info!(
        "Round-trip error over {} points: mean {:.3e}, max {:.3e}",
        finite.len(),
        mean,
        max
    );
    if finite.len() < errors.len() {
        warn!("{} points produced non-finite values", errors.len() - finite.len());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _logger = Logger::try_with_env_or_str("info")?
        .log_to_stdout()
        .format(colored_detailed_format)
        // Format: "error;warn;info;debug;trace"
        .set_palette("196;208;76;39;178".to_string())
        .start()?;

    let cli = Cli::parse();

    let path = cli.config.to_str().ok_or("Invalid config path string")?;
    let config = LensConfig::load_from_yaml(path)?;
    info!("Loaded {} model with parameters {:?}", config.model, config.params);

    let params = config.params();
    let points = sample_points(cli.extent, cli.extent, cli.num_points);
    info!("Sampled {} points in [-{e}, {e}]²", points.len(), e = cli.extent);

    match config.model {
        ModelKind::BrownConrady => {
            let model = BrownConradyTransform::with_solver(config.solver);
            let projected = model.project(&params, &points)?;
            let (recovered, reports) = model.unproject_with_report(&params, &projected)?;

            let mut statuses: BTreeMap<String, usize> = BTreeMap::new();
            for report in &reports {
                *statuses.entry(format!("{:?}", report.status)).or_default() += 1;
            }
            info!("Solver outcomes: {:?}", statuses);

            let worst = reports
                .iter()
                .filter(|r| r.status == SolveStatus::Converged)
                .map(|r| r.iterations)
                .max()
                .unwrap_or(0);
            info!("Converged points needed at most {} iterations", worst);

            report_errors(&points, &recovered)?;
        }
        _ => {
            let model = config.model();
            if model.supports(Operation::Distort) {
                let distorted = model.distort(&params, &points)?;
                let recovered = model.undistort(&params, &distorted)?;
                report_errors(&points, &recovered)?;
            } else {
                warn!("The {} model supports no operation yet", model.name());
            }
        }
    }

    Ok(())
}
