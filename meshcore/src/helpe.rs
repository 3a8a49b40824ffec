pub use std::{
    sync::Arc,
    io::{BufRead, BufReader},
    collections::{HashMap, HashSet, BTreeSet},
    path::{Path, PathBuf},
    cmp::Ordering,
    hash::Hash,
    time::Instant,
};
pub use thiserror::Error;
pub use itertools::{Itertools, iproduct};
pub use rayon::prelude::*;
pub use indexmap::{IndexMap, IndexSet};
pub use clap::{Parser, ValueEnum};
pub use rand::{RngCore, SeedableRng};
pub use tracing::{debug, info, trace, warn};

pub use crate::{Job, AllocInfo, ConstrainedAllocation, Mesh,
    geometry::*,
    jobset::*,
    mesh::Machine,
    algo::Allocator,
};

/// Index of a node in the mesh. Row-major: `x` varies fastest,
/// then `y`, then `z`.
pub type NodeIdx = usize;

/// A single mesh coordinate. Signed, because shells around a center
/// may poke outside the mesh and we still need to talk about them.
pub type Coord = i64;

//---START ERRORS
#[derive(Error, Debug)]
#[error("{message}\n{:?}", culprit)]
/// Appears while constructing the [JobStream] to be fed
/// to an allocator.
pub struct JobError {
    pub message: String,
    pub culprit: Job,
}

/// Anything that can go wrong while reading one of the plain-text
/// inputs: job lists, dependency graphs, constraint clusters, node ids.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Parse {
        line:   usize,
        reason: String,
    },
}

/// Raised by the [Mesh] collaborator. Allocators never see these:
/// they only come up when a placement is committed or released.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    #[error("mesh dimensions must be positive, got {0}x{1}x{2}")]
    BadDimensions(Coord, Coord, Coord),
    #[error("malformed mesh dimensions '{0}' (expected X, XxY or XxYxZ)")]
    BadDimsSpec(String),
    #[error("node {0} lies outside the mesh")]
    OutOfBounds(NodeIdx),
    #[error("node {0} is already busy")]
    NodeBusy(NodeIdx),
    #[error("node {0} is already free")]
    NodeAlreadyFree(NodeIdx),
    #[error("node {0} appears twice in the same allocation")]
    Duplicate(NodeIdx),
    #[error("expected {expected} node ids, got {got}")]
    SizeMismatch {
        expected:   usize,
        got:        usize,
    },
}
//---END ERRORS

//---START EXTERNAL INTERFACES
// The types listed below read the plain-text inputs of `meshcore`.
//
// To read jobs from some other source, simply make sure that it
// satisfies the `JobGen` trait.

/// Defines the interface for reading jobs.
pub trait JobGen<T> {
    fn new(path: PathBuf) -> Self;
    /// Either a set of jobs is successfully returned, or a
    /// [LoadError] pointing at the offending line.
    fn read_jobs(&self) -> Result<Vec<Job>, LoadError>;
    /// Uses some available data to spawn one [Job].
    fn gen_single(&self, d: T, id: u32) -> Job;
}

/// Reads a CSV of jobs. The first line is a header; every other
/// line is `id,procs[,name]`.
pub struct JobCSVParser {
    pub path: PathBuf,
}

impl JobGen<(usize, Option<String>)> for JobCSVParser {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
        }
    }

    fn read_jobs(&self) -> Result<Vec<Job>, LoadError> {
        let fd = std::fs::File::open(self.path.as_path())?;
        let reader = BufReader::new(fd);
        let mut res = vec![];
        for (idx, line) in reader.lines()
            .enumerate()
            // First line is the header!
            .skip(1) {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let fields: Vec<&str> = line.split(',')
                .map(|f| f.trim())
                .collect();
            let bad = |reason: &str| LoadError::Parse {
                line:   idx + 1,
                reason: reason.to_string(),
            };
            if fields.len() < 2 {
                return Err(bad("expected at least `id,procs`"));
            }
            let id = fields[0].parse::<u32>()
                .map_err(|_| bad("job id is not a non-negative integer"))?;
            let procs = fields[1].parse::<usize>()
                .map_err(|_| bad("processor count is not a non-negative integer"))?;
            let name = fields.get(2)
                .filter(|n| !n.is_empty())
                .map(|n| n.to_string());
            res.push(self.gen_single((procs, name), id));
        }

        Ok(res)
    }

    fn gen_single(&self, d: (usize, Option<String>), id: u32) -> Job {
        Job {
            id,
            procs_needed:   d.0,
            name:           d.1,
        }
    }
}

/// Reads the group identifiers of a mesh's nodes: one
/// `index name` pair per line. Indices not mentioned keep
/// whatever id they already had.
pub fn read_node_ids(path: &Path) -> Result<Vec<(NodeIdx, String)>, LoadError> {
    let fd = std::fs::File::open(path)?;
    let mut res = vec![];
    for (idx, line) in BufReader::new(fd).lines().enumerate() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let (Some(node), Some(name)) = (tokens.next(), tokens.next()) else {
            if line.trim().is_empty() { continue; }
            return Err(LoadError::Parse {
                line:   idx + 1,
                reason: String::from("expected `index name`"),
            });
        };
        let node = node.parse::<NodeIdx>()
            .map_err(|_| LoadError::Parse {
                line:   idx + 1,
                reason: format!("'{node}' is not a node index"),
            })?;
        res.push((node, name.to_string()));
    }

    Ok(res)
}
//---END EXTERNAL INTERFACES

//---START RANDOMNESS
pub const LCG48_MULTIPLIER: u64 = 0x5_DEEC_E66D;
pub const LCG48_INCREMENT:  u64 = 0xB;
const LCG48_MASK:           u64 = (1 << 48) - 1;
// Low 16 bits of a freshly seeded state.
const LCG48_SEED_LOW:       u64 = 0x330E;
pub const DEFAULT_SEED:     u32 = 42;

/// The classic 48-bit linear congruential stream:
/// `X(n+1) = (a * X(n) + c) mod 2^48`.
///
/// It is the *only* source of randomness in `meshcore`. Allocators
/// that need one get it injected at construction and advance it call
/// by call, so replaying the same calls against the same seed replays
/// the same placements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lcg48 {
    state: u64,
}

impl Lcg48 {
    pub fn new(seed: u32) -> Self {
        Self {
            state: ((seed as u64) << 16) | LCG48_SEED_LOW,
        }
    }

    /// Rebuilds a stream from a previously observed [`Lcg48::state`].
    pub fn from_state(state: u64) -> Self {
        Self {
            state: state & LCG48_MASK,
        }
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    #[inline(always)]
    fn step(&mut self) -> u64 {
        self.state = self.state
            .wrapping_mul(LCG48_MULTIPLIER)
            .wrapping_add(LCG48_INCREMENT)
            & LCG48_MASK;

        self.state
    }
}

impl Default for Lcg48 {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl RngCore for Lcg48 {
    // The top 31 of the 48 state bits, exactly what nrand48 yields.
    // The low bits of an LCG are weak, and bit 31 is always clear.
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 17) as u32
    }

    // Two draws side by side; bits 63 and 31 are always clear.
    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;

        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);

        Ok(())
    }
}

impl SeedableRng for Lcg48 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

/// Draws an index in `0..len` from `rng`. `len` must be positive.
#[inline(always)]
pub fn pick_index<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> usize {
    debug_assert!(len > 0, "Picking from an empty pool");
    rng.next_u32() as usize % len
}
//---END RANDOMNESS

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum AllocatorKind {
    /// First free nodes by some fixed mesh ordering
    Sorted,
    /// Free centers, L1-nearest points, pairwise L1 score
    GenAlg,
    /// Intersection centers, L1-nearest points, pairwise L1 score
    Mm,
    /// Free centers, LInf-nearest points, LInf-from-center score
    Mc1x1,
    /// Like MC1x1, but grows the outermost shell greedily
    GreedyMc1x1,
    /// Constraint-cluster aware, falls back to random
    Constraint,
}

impl AllocatorKind {
    pub fn all() -> [AllocatorKind; 6] {
        [
            AllocatorKind::Sorted,
            AllocatorKind::GenAlg,
            AllocatorKind::Mm,
            AllocatorKind::Mc1x1,
            AllocatorKind::GreedyMc1x1,
            AllocatorKind::Constraint,
        ]
    }
}
