use argh::FromArgs;
use std::path::PathBuf;

use disparo::imgproc::{
    filter::{DisparityFilter, DisparityFilterParams, ReferenceView},
    parallel::ExecutionStrategy,
};

#[derive(FromArgs)]
/// Smooth the left view of a stereo pair guided by a disparity map
struct Args {
    /// path to the left view
    #[argh(option, short = 'l')]
    left: PathBuf,

    /// path to the right view
    #[argh(option, short = 'r')]
    right: PathBuf,

    /// path to the disparity map
    #[argh(option, short = 'd')]
    disparity: PathBuf,

    /// path to the output image
    #[argh(option, short = 'o')]
    output: PathBuf,

    /// optional JSON file with the filter parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// color-similarity bandwidth
    #[argh(option)]
    sigma: Option<f32>,

    /// spatial bandwidth in pixels
    #[argh(option)]
    sigma_s: Option<f32>,

    /// disparity-similarity bandwidth
    #[argh(option)]
    sigma_r: Option<f32>,

    /// disable the color-similarity term
    #[argh(switch)]
    no_color_weight: bool,

    /// view the disparity map is indexed in: left or right
    #[argh(option)]
    reference_view: Option<ReferenceView>,

    /// number of worker threads (default: rayon global pool)
    #[argh(option)]
    num_threads: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut params = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => DisparityFilterParams::default(),
    };

    // command line flags override the config file
    if let Some(sigma) = args.sigma {
        params.sigma = sigma;
    }
    if let Some(sigma_s) = args.sigma_s {
        params.sigma_s = sigma_s;
    }
    if let Some(sigma_r) = args.sigma_r {
        params.sigma_r = sigma_r;
    }
    if args.no_color_weight {
        params.use_color_weight = false;
    }
    if let Some(reference_view) = args.reference_view {
        params.reference_view = reference_view;
    }

    let strategy = match args.num_threads {
        Some(n) => ExecutionStrategy::Fixed(n),
        None => ExecutionStrategy::ParallelRows,
    };

    let filter = DisparityFilter::new(params)?.with_execution_strategy(strategy);
    log::info!(
        "filtering with {:?} (window {}x{})",
        params,
        2 * filter.half_kernel_size() + 1,
        2 * filter.half_kernel_size() + 1
    );

    let start = std::time::Instant::now();
    let output = disparo::execute(
        &args.left,
        &args.right,
        &args.disparity,
        &args.output,
        &filter,
    )?;

    println!(
        "Filtered {} in {:.2?}, written to {}",
        output.size(),
        start.elapsed(),
        args.output.display()
    );

    Ok(())
}
