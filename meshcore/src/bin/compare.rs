use meshcore::*;
use meshcore::algo::{AllocatorArgs, build_allocator};
use tracing_subscriber::EnvFilter;

/// Replays one job stream through every allocator and compares
/// how compact the resulting placements are
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Mesh dimensions, as X, XxY or XxYxZ
    #[arg(short, long)]
    dims:       Dims,

    /// Path to a CSV of jobs (`id,procs[,name]`, with a header line)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    jobs:       PathBuf,

    /// Group identifiers of the nodes (`index name` per line)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    node_ids:   Option<PathBuf>,

    #[command(flatten)]
    knobs:      AllocatorArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Args::parse();
    let jobs = read_from_path::<JobCSVParser, _>(cli.jobs.clone())
        .map_err(|e| anyhow::anyhow!("{}: {e}", cli.jobs.display()))?;
    let mut mesh = Mesh::new(cli.dims);
    if let Some(path) = &cli.node_ids {
        mesh.apply_node_ids(read_node_ids(path)?)?;
    }
    let cfg = cli.knobs.config();

    println!("{:<14} {:>8} {:>8} {:>10} {:>12} {:>10}", "allocator", "placed", "unplaced", "evictions", "dispersion", "time");
    for kind in AllocatorKind::all() {
        let mut allocator = build_allocator(kind, &cfg);
        let start = Instant::now();
        let report = replay(&jobs, mesh.clone(), allocator.as_mut())?;
        let elapsed = start.elapsed();
        let name = kind.to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_else(|| format!("{kind:?}"));
        println!(
            "{:<14} {:>8} {:>8} {:>10} {:>12.2} {:>10.2?}",
            name,
            report.placements.len(),
            report.unplaced.len(),
            report.evictions,
            report.mean_dispersion,
            elapsed,
        );
        info!(allocator = %allocator.setup_info(false), "compared");
    }

    Ok(())
}
