//! Welcome to `meshcore`!
//!
//! A topology-aware placement engine: given a mesh of compute nodes,
//! some free and some busy, and a parallel [`Job`] asking for a fixed
//! number of processors, pick *which* free nodes it gets.

mod job;
mod mesh;
mod analyze;

pub mod algo;
pub mod geometry;
pub mod jobset;
pub mod helpe;

pub use crate::helpe::*;
pub use crate::analyze::{
    placement_is_valid,
    allocations_are_disjoint,
    dispersion,
    replay,
    ReplayReport,
};

/// Our fundamental unit of interest. A [`Job`] asks for
/// [`procs_needed`](Job::procs_needed) processors, all at once, and
/// keeps them until it completes.
///
/// The [`name`](Job::name) is optional. When present it is the key
/// under which the job's group appears in a dependency graph (see
/// [`algo::constraint::DependencyGraph`]).
///
/// > ***ATTENTION:*** a job asking for zero processors is not a job.
/// > [`jobset::init`] rejects it, and every allocator refuses to place it.
#[derive(Debug, Clone)]
pub struct Job {
    pub id:             u32,
    pub procs_needed:   usize,
    pub name:           Option<String>,
}

/// The outcome of a successful allocation: the [`Job`] that asked,
/// plus exactly [`procs_needed`](Job::procs_needed) distinct node
/// indices, all of which were free when the allocator looked.
///
/// An [`AllocInfo`] does not mark anything busy by itself. Its owner
/// hands it to [`Mesh::commit`] and, once the job is done, to
/// [`Mesh::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocInfo {
    pub job:            Arc<Job>,
    pub node_indices:   Vec<NodeIdx>,
}

/// Intermediate result of the constraint allocator. Free nodes are
/// split into two pools:
///
/// 1. *constrained* nodes, tagged by a leaf of some constraint cluster,
/// 2. *unconstrained* filler, i.e., everything else.
///
/// Whenever allocation succeeds, the two sets together hold exactly
/// [`procs_needed`](Job::procs_needed) nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstrainedAllocation {
    pub job:                    Arc<Job>,
    pub constrained_nodes:      BTreeSet<NodeIdx>,
    pub unconstrained_nodes:    BTreeSet<NodeIdx>,
}

/// A regular grid of 1 to 3 dimensions. Owns the free/busy status of
/// every node, plus the group identifier each node is tagged with.
///
/// Allocators only ever read a [`Mesh`] (through [`Machine`]); the
/// caller is the one who commits and releases placements.
#[derive(Debug, Clone)]
pub struct Mesh {
    dims:       Dims,
    free:       Vec<bool>,
    num_free:   usize,
    node_ids:   Vec<String>,
}
