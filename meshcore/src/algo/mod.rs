pub mod centers;
pub mod collect;
pub mod score;
pub mod nearest;
pub mod constraint;
pub mod sorted;

use crate::helpe::*;

pub use self::{
    centers::CenterGenerator,
    collect::PointCollector,
    score::{Score, Scorer, Tiebreaker},
    nearest::NearestAllocator,
    constraint::{ConstraintAllocator, ConstraintSnapshot, DependencyGraph, read_constraint_clusters},
    sorted::{MeshOrdering, SortedFreeListAllocator},
};

/// What every placement strategy offers to the scheduling loop.
///
/// `allocate` only *proposes* a set of nodes. It is the caller who
/// commits it to the [Mesh] (and later releases it). `None` means
/// "cannot place this job right now", which is no error: the caller
/// requeues and tries again later.
pub trait Allocator {
    fn allocate(&mut self, job: &Arc<Job>, machine: &dyn Machine) -> Option<AllocInfo>;

    /// A human-readable description of the strategy and its knobs.
    /// With `comment` set, every line is prefixed by `"# "`.
    fn setup_info(&self, comment: bool) -> String;

    /// Cheap feasibility check shared by all strategies: a job that
    /// asks for nothing, or for more than what is free, never fits.
    #[inline(always)]
    fn can_allocate(&self, job: &Job, machine: &dyn Machine) -> bool {
        job.procs_needed >= 1 && job.procs_needed <= machine.num_free()
    }
}

#[inline(always)]
pub fn comment_prefix(comment: bool) -> &'static str {
    if comment { "# " } else { "" }
}

/// Everything needed to build any of the [AllocatorKind]s.
/// Strategies simply ignore the knobs they have no use for.
#[derive(Clone, Debug)]
pub struct AllocatorConfig {
    pub tiebreaker:     Tiebreaker,
    pub ordering:       MeshOrdering,
    pub deps:           Option<PathBuf>,
    pub constraints:    Option<PathBuf>,
    pub seed:           u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            tiebreaker:     Tiebreaker::new(1, 1, 0, 0),
            ordering:       MeshOrdering::Xyz,
            deps:           None,
            constraints:    None,
            seed:           DEFAULT_SEED,
        }
    }
}

/// Allocator knobs, as given on the command line.
#[derive(clap::Args, Debug, Clone)]
pub struct AllocatorArgs {
    /// Walk followed by the sorted free list
    #[arg(long, value_enum, default_value_t = MeshOrdering::Xyz)]
    pub ordering:       MeshOrdering,

    /// How many shells beyond the allocation the tiebreaker looks at
    #[arg(long, default_value_t = 1)]
    pub max_shells:     Coord,

    /// Tiebreak cost of each free node around the allocation
    #[arg(long, default_value_t = 1)]
    pub avail_factor:   i64,

    /// Tiebreak bonus of each point off the mesh around the allocation
    #[arg(long, default_value_t = 0)]
    pub wall_factor:    i64,

    /// Tiebreak bonus of each allocated node on the mesh border
    #[arg(long, default_value_t = 0)]
    pub border_factor:  i64,

    /// Peak tiebreak cost of the positional curve
    #[arg(long, default_value_t = 0)]
    pub curve_factor:   i64,

    /// Period of the positional curve along x (0 disables it)
    #[arg(long, default_value_t = 0)]
    pub curve_width:    i64,

    /// Dependency graph of the constraint allocator
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    pub deps:           Option<PathBuf>,

    /// Constraint clusters of the constraint allocator
    #[arg(long, value_parser = clap::value_parser!(PathBuf))]
    pub constraints:    Option<PathBuf>,

    /// Seed of the random stream
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed:           u32,
}

impl AllocatorArgs {
    pub fn config(&self) -> AllocatorConfig {
        AllocatorConfig {
            tiebreaker:     Tiebreaker::new(
                                self.max_shells,
                                self.avail_factor,
                                self.wall_factor,
                                self.border_factor,
                            ).with_curve(self.curve_factor, self.curve_width),
            ordering:       self.ordering,
            deps:           self.deps.clone(),
            constraints:    self.constraints.clone(),
            seed:           self.seed,
        }
    }
}

/// Spawns a fresh allocator of the requested kind.
pub fn build_allocator(kind: AllocatorKind, cfg: &AllocatorConfig) -> Box<dyn Allocator> {
    match kind {
        AllocatorKind::Sorted       => Box::new(SortedFreeListAllocator::new(cfg.ordering)),
        AllocatorKind::GenAlg       => Box::new(NearestAllocator::gen_alg()),
        AllocatorKind::Mm           => Box::new(NearestAllocator::mm()),
        AllocatorKind::Mc1x1        => Box::new(NearestAllocator::mc1x1(cfg.tiebreaker)),
        AllocatorKind::GreedyMc1x1  => Box::new(NearestAllocator::greedy_mc1x1(cfg.tiebreaker)),
        AllocatorKind::Constraint   => {
            let deps = match &cfg.deps {
                Some(p) => DependencyGraph::from_path(p).unwrap_or_else(|e| {
                    warn!(path = %p.display(), error = %e, "dependency graph unreadable, using an empty one");
                    DependencyGraph::default()
                }),
                None    => DependencyGraph::default(),
            };
            let rng = Lcg48::new(cfg.seed);
            let alloc = match &cfg.constraints {
                Some(p) => ConstraintAllocator::with_constraint_file(deps, p.clone(), rng),
                None    => ConstraintAllocator::new(deps, rng),
            };

            Box::new(alloc)
        },
    }
}
