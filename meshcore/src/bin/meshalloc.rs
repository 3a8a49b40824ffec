use meshcore::*;
use meshcore::algo::{AllocatorArgs, build_allocator};
use tracing_subscriber::EnvFilter;

/// Places a stream of parallel jobs on a mesh of compute nodes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Mesh dimensions, as X, XxY or XxYxZ
    #[arg(short, long)]
    dims:       Dims,

    /// Path to a CSV of jobs (`id,procs[,name]`, with a header line)
    #[arg(short, long, value_parser = clap::value_parser!(PathBuf))]
    jobs:       PathBuf,

    /// Placement strategy
    #[arg(short, long, value_enum, default_value_t = AllocatorKind::GenAlg)]
    allocator:  AllocatorKind,

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

    let mut allocator = build_allocator(cli.allocator, &cli.knobs.config());
    println!("{}", allocator.setup_info(true));
    info!(jobs = jobs.len(), max_procs = get_max_procs(&jobs), mesh = mesh.num_procs(), "starting");

    let report = replay(&jobs, mesh, allocator.as_mut())?;
    for alloc in &report.placements {
        println!("{}: {}", alloc.job.id, alloc.proc_list());
    }
    for id in &report.unplaced {
        println!("{id}: -");
    }
    info!(
        placed = report.placements.len(),
        unplaced = report.unplaced.len(),
        evictions = report.evictions,
        mean_dispersion = report.mean_dispersion,
        "done"
    );

    Ok(())
}
