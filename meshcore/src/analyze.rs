use std::collections::VecDeque;

use crate::helpe::*;

/// Returns `true` iff `alloc` holds exactly as many nodes as its job
/// asked for, all distinct, all drawn from `free`.
pub fn placement_is_valid(alloc: &AllocInfo, free: &[NodeIdx]) -> bool {
    let free: HashSet<&NodeIdx> = free.iter().collect();
    alloc.len() == alloc.job.procs_needed
        && alloc.node_indices.iter().all_unique()
        && alloc.node_indices.iter().all(|n| free.contains(n))
}

/// Returns `true` iff no node appears in more than one of `allocs`.
pub fn allocations_are_disjoint(allocs: &[AllocInfo]) -> bool {
    allocs.iter()
        .flat_map(|a| a.node_indices.iter())
        .all_unique()
}

/// Sum of pairwise L1 distances among the nodes of `alloc`. The lower,
/// the more compact the placement.
pub fn dispersion(alloc: &AllocInfo, dims: Dims) -> Coord {
    let locs: Vec<MeshLocation> = alloc.node_indices
        .iter()
        .map(|&n| dims.location_of(n))
        .collect();

    pairwise_l1_distance(&locs)
}

/// What came out of [replay].
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Every successful placement, in the order it was made.
    pub placements:         Vec<AllocInfo>,
    /// IDs of jobs that could never be placed: they ask for more
    /// nodes than the mesh has.
    pub unplaced:           Vec<u32>,
    /// How many times the oldest live job had to finish early to
    /// make room.
    pub evictions:          usize,
    pub mean_dispersion:    f64,
}

/// Feeds `jobs` to `allocator` one at a time, committing each placement
/// to `mesh`. Job runtimes are not modeled: whenever a job does not fit,
/// the oldest live job completes and gives its nodes back, until the
/// newcomer fits.
///
/// A [MeshError] here means the allocator proposed an invalid placement.
pub fn replay(
    jobs:       &JobStream,
    mut mesh:   Mesh,
    allocator:  &mut dyn Allocator,
) -> Result<ReplayReport, MeshError> {
    let start = Instant::now();
    let dims = mesh.dims();
    let mut live: VecDeque<AllocInfo> = VecDeque::new();
    let mut res = ReplayReport::default();
    let mut total_dispersion = 0;

    for job in jobs {
        if job.procs_needed > mesh.num_procs() {
            warn!(job = job.id, needed = job.procs_needed, "job larger than the mesh");
            res.unplaced.push(job.id);
            continue;
        }
        loop {
            if let Some(alloc) = allocator.allocate(job, &mesh) {
                mesh.commit(&alloc)?;
                total_dispersion += dispersion(&alloc, dims);
                res.placements.push(alloc.clone());
                live.push_back(alloc);
                break;
            } else if let Some(done) = live.pop_front() {
                mesh.release(&done)?;
                res.evictions += 1;
            } else {
                res.unplaced.push(job.id);
                break;
            }
        }
    }

    if !res.placements.is_empty() {
        res.mean_dispersion = total_dispersion as f64 / res.placements.len() as f64;
    }
    debug!(
        placed = res.placements.len(),
        unplaced = res.unplaced.len(),
        evictions = res.evictions,
        elapsed = ?start.elapsed(),
        "replay done"
    );

    Ok(res)
}
