//! Allocation that keeps jobs away from organizationally linked nodes.
//!
//! Nodes are tagged with group identifiers (see [`Machine::node_id`]).
//! A [DependencyGraph] relates groups to one another, and a list of
//! *constraint clusters* (typically produced by an external analysis)
//! names groups that should not be leaned on. For each cluster, the
//! free nodes whose tag is a *leaf* under it are "constrained"; the
//! rest are filler. The allocator takes as much filler as it can and
//! tops up from the constrained pool only when it must.
//!
//! Every input here may be missing or malformed. That is never fatal:
//! the affected piece is treated as empty, and with nothing to go on
//! the allocator simply picks free nodes at random.
use crate::helpe::*;
use super::comment_prefix;

/// Maps a key (a job group or a node group) to its children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Parses `key child child ...` records, one per line. Blank lines
    /// are skipped; a key seen twice gets the union of its children.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, LoadError> {
        let mut res = Self::default();
        for line in reader.lines() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else { continue; };
            for child in tokens {
                res.insert(key, child);
            }
        }

        Ok(res)
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let fd = std::fs::File::open(path)?;

        Self::from_reader(BufReader::new(fd))
    }

    pub fn insert(&mut self, key: impl Into<String>, child: impl Into<String>) {
        self.edges
            .entry(key.into())
            .or_default()
            .insert(child.into());
    }

    /// The children of `key`. Unknown keys have none.
    pub fn children(&self, key: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(key)
            .into_iter()
            .flatten()
            .map(|c| c.as_str())
    }

    #[inline(always)]
    pub fn is_leaf(&self, key: &str) -> bool {
        self.edges.get(key).is_some_and(|c| c.len() == 1)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Collects, for every key of `cluster`, those of its children
    /// that are leaves.
    pub fn constrained_leaves<S: AsRef<str>>(&self, cluster: &[S]) -> BTreeSet<String> {
        cluster.iter()
            .flat_map(|key| self.children(key.as_ref()))
            .filter(|child| self.is_leaf(child))
            .map(String::from)
            .collect()
    }
}

/// Reads constraint clusters: one per non-blank line, made of
/// whitespace-separated keys of the dependency graph.
pub fn read_constraint_clusters(path: &Path) -> Result<Vec<Vec<String>>, LoadError> {
    let fd = std::fs::File::open(path)?;
    let mut res = vec![];
    for line in BufReader::new(fd).lines() {
        let cluster: Vec<String> = line?
            .split_whitespace()
            .map(String::from)
            .collect();
        if !cluster.is_empty() {
            res.push(cluster);
        }
    }

    Ok(res)
}

/// Where constraint clusters come from.
#[derive(Clone, Debug)]
enum ConstraintSource {
    Nothing,
    File(PathBuf),
    Fixed(Vec<Vec<String>>),
}

/// Everything needed to resume a [ConstraintAllocator] exactly where
/// it stood: the graph it consults and the state of its random stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstraintSnapshot<R> {
    pub deps:   DependencyGraph,
    pub rng:    R,
}

pub struct ConstraintAllocator<R: RngCore = Lcg48> {
    deps:       DependencyGraph,
    source:     ConstraintSource,
    // One leaf set per cluster, refreshed before every allocation.
    leaves:     Vec<BTreeSet<String>>,
    rng:        R,
}

impl<R: RngCore> ConstraintAllocator<R> {
    /// An allocator with no constraint clusters at all.
    pub fn new(deps: DependencyGraph, rng: R) -> Self {
        Self {
            deps,
            source: ConstraintSource::Nothing,
            leaves: vec![],
            rng,
        }
    }

    /// Clusters get re-read from `path` whenever they may have changed.
    pub fn with_constraint_file(deps: DependencyGraph, path: PathBuf, rng: R) -> Self {
        Self {
            source: ConstraintSource::File(path),
            ..Self::new(deps, rng)
        }
    }

    pub fn with_clusters(deps: DependencyGraph, clusters: Vec<Vec<String>>, rng: R) -> Self {
        Self {
            source: ConstraintSource::Fixed(clusters),
            ..Self::new(deps, rng)
        }
    }

    /// Whether clusters must be re-read. There is no change detection,
    /// so the answer is always yes.
    pub fn constraints_changed(&self) -> bool {
        true
    }

    /// Rebuilds the leaf sets from scratch. An unreadable file counts
    /// as an empty one.
    pub fn read_constraints(&mut self) {
        let clusters = match &self.source {
            ConstraintSource::Nothing       => vec![],
            ConstraintSource::Fixed(c)      => c.clone(),
            ConstraintSource::File(path)    => {
                read_constraint_clusters(path).unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %e, "constraint clusters unreadable, ignoring them");
                    vec![]
                })
            },
        };
        self.leaves = clusters.iter()
            .map(|c| self.deps.constrained_leaves(c))
            .collect();
        trace!(clusters = self.leaves.len(), "constraints reloaded");
    }

    /// The leaf sets currently in effect.
    pub fn leaves(&self) -> &[BTreeSet<String>] {
        &self.leaves
    }

    /// Picks `job.procs_needed` free nodes uniformly at random,
    /// ignoring every constraint. Assumes enough of them are free.
    fn random_allocation(&mut self, job: &Arc<Job>, machine: &dyn Machine) -> AllocInfo {
        let mut pool = machine.free_processors();
        let nodes = (0..job.procs_needed)
            .map(|_| {
                let idx = pick_index(&mut self.rng, pool.len());
                pool.remove(idx)
            })
            .collect();

        AllocInfo::new(job.clone(), nodes)
    }
}

impl<R: RngCore + Clone> ConstraintAllocator<R> {
    pub fn snapshot(&self) -> ConstraintSnapshot<R> {
        ConstraintSnapshot {
            deps:   self.deps.clone(),
            rng:    self.rng.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: ConstraintSnapshot<R>) {
        self.deps = snapshot.deps;
        self.rng = snapshot.rng;
    }
}

/// Splits `free` into constrained (tagged by one of `leaves`) and
/// unconstrained nodes, then draws at random: as much filler as
/// possible while leaving room for one constrained node, the rest from
/// the constrained pool, and filler again if that pool runs dry.
///
/// Returns `None` if both pools together cannot cover the job.
pub fn allocate_constrained<R: RngCore + ?Sized>(
    job:        &Arc<Job>,
    leaves:     &BTreeSet<String>,
    free:       &[NodeIdx],
    machine:    &dyn Machine,
    rng:        &mut R,
) -> Option<ConstrainedAllocation> {
    let (mut constrained, mut unconstrained): (Vec<NodeIdx>, Vec<NodeIdx>) = free.iter()
        .copied()
        .sorted_unstable()
        .dedup()
        .partition(|&n| leaves.contains(machine.node_id(n)));
    let needed = job.procs_needed;
    let un = needed.saturating_sub(1).min(unconstrained.len());
    let con = (needed - un).min(constrained.len());
    let un = needed - con;
    if un > unconstrained.len() {
        return None;
    }

    let mut res = ConstrainedAllocation::new(job.clone());
    for _ in 0..un {
        let idx = pick_index(rng, unconstrained.len());
        res.unconstrained_nodes.insert(unconstrained.remove(idx));
    }
    for _ in 0..con {
        let idx = pick_index(rng, constrained.len());
        res.constrained_nodes.insert(constrained.remove(idx));
    }

    Some(res)
}

impl<R: RngCore> Allocator for ConstraintAllocator<R> {
    fn allocate(&mut self, job: &Arc<Job>, machine: &dyn Machine) -> Option<AllocInfo> {
        if !self.can_allocate(job, machine) {
            return None;
        }
        if self.constraints_changed() {
            self.read_constraints();
        }

        let free = machine.free_processors();
        let mut candidates = Vec::with_capacity(self.leaves.len());
        for leaves in &self.leaves {
            if let Some(ca) = allocate_constrained(job, leaves, &free, machine, &mut self.rng) {
                candidates.push(ca);
            }
        }

        // Fewest constrained nodes wins; the earliest cluster on ties.
        let top = candidates.into_iter()
            .min_by_key(|ca| ca.constrained_nodes.len());
        let res = match top {
            Some(ca) => {
                debug!(
                    job = job.id,
                    group = job.name.as_deref().unwrap_or("-"),
                    constrained = ca.constrained_nodes.len(),
                    unconstrained = ca.unconstrained_nodes.len(),
                    "constrained allocation"
                );
                ca.into_alloc_info()
            },
            None => {
                debug!(job = job.id, "no usable constraints, allocating at random");
                self.random_allocation(job, machine)
            },
        };

        Some(res)
    }

    fn setup_info(&self, comment: bool) -> String {
        format!("{}Constraint Allocator", comment_prefix(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // Groups `b` and `c` are leaves under `rack`; `d` is not a leaf.
    const DEPS: &str = "rack b c d\nb x\nc y\n\nd y\nd z\n";

    fn deps() -> DependencyGraph {
        DependencyGraph::from_reader(DEPS.as_bytes()).unwrap()
    }

    // Nodes 0 and 1 belong to `b`, node 2 to `c`, the rest are untagged.
    fn mesh() -> Mesh {
        let mut m = Mesh::new(Dims::new(6, 1, 1).unwrap());
        m.set_node_id(0, "b").unwrap();
        m.set_node_id(1, "b").unwrap();
        m.set_node_id(2, "c").unwrap();
        m
    }

    fn job(id: u32, procs: usize) -> Arc<Job> {
        Arc::new(Job::new(id, procs))
    }

    fn cluster(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_graph_parsing() {
        let g = deps();
        assert_eq!(g.children("rack").collect::<Vec<_>>(), vec!["b", "c", "d"]);
        assert!(g.is_leaf("b"));
        assert!(!g.is_leaf("d"));
        assert!(!g.is_leaf("nowhere"));
        assert_eq!(g.children("nowhere").count(), 0);
        let leaves = g.constrained_leaves(&["rack", "nowhere"]);
        assert_eq!(leaves, BTreeSet::from([String::from("b"), String::from("c")]));
    }

    #[test]
    fn test_missing_graph_file() {
        let err = DependencyGraph::from_path(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_prefers_filler_over_constrained() {
        let mut a = ConstraintAllocator::with_clusters(deps(), vec![cluster(&["rack"])], Lcg48::default());
        let alloc = a.allocate(&job(0, 3), &mesh()).unwrap();
        // Two of the three untagged nodes, then one constrained node.
        assert_eq!(alloc.len(), 3);
        assert!(alloc.node_indices[..2].iter().all(|n| (3..6).contains(n)));
        assert!((0..3).contains(&alloc.node_indices[2]));
    }

    #[test]
    fn test_tops_up_from_constrained_pool() {
        let mut a = ConstraintAllocator::with_clusters(deps(), vec![cluster(&["rack"])], Lcg48::default());
        let alloc = a.allocate(&job(0, 5), &mesh()).unwrap();
        let mut nodes = alloc.node_indices.clone();
        nodes.sort();
        assert_eq!(nodes.iter().filter(|n| **n >= 3).count(), 3);
        assert_eq!(nodes.iter().unique().count(), 5);
    }

    #[test]
    fn test_fewest_constrained_cluster_wins() {
        // Under `wide` every node is constrained; under `rack` only three are.
        let mut g = deps();
        g.insert("wide", "b");
        g.insert("wide", "c");
        g.insert("wide", "e");
        g.insert("e", "w");
        let mut m = mesh();
        for n in 3..6 {
            m.set_node_id(n, "e").unwrap();
        }
        let clusters = vec![cluster(&["wide"]), cluster(&["rack"])];
        let mut a = ConstraintAllocator::with_clusters(g, clusters, Lcg48::default());
        let alloc = a.allocate(&job(0, 3), &m).unwrap();
        assert_eq!(a.leaves().len(), 2);
        assert!(alloc.node_indices[..2].iter().all(|n| (3..6).contains(n)));
        assert!((0..3).contains(&alloc.node_indices[2]));
    }

    #[test]
    fn test_missing_constraint_file_falls_back_to_random() {
        let path = PathBuf::from("/definitely/not/here");
        let mut with_file = ConstraintAllocator::with_constraint_file(deps(), path, Lcg48::new(7));
        let mut plain = ConstraintAllocator::new(deps(), Lcg48::new(7));
        let m = mesh();
        for id in 0..5 {
            assert_eq!(with_file.allocate(&job(id, 4), &m), plain.allocate(&job(id, 4), &m));
        }
        assert!(with_file.leaves().is_empty());
    }

    #[test]
    fn test_constraint_file_is_reread() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f).unwrap();
        writeln!(f, "rack").unwrap();
        let mut a = ConstraintAllocator::with_constraint_file(deps(), f.path().to_path_buf(), Lcg48::default());
        a.allocate(&job(0, 2), &mesh()).unwrap();
        assert_eq!(a.leaves().len(), 1);
        writeln!(f, "nowhere").unwrap();
        a.allocate(&job(1, 2), &mesh()).unwrap();
        assert_eq!(a.leaves().len(), 2);
    }

    #[test]
    fn test_random_fallback_is_seeded() {
        let m = mesh();
        let mut a = ConstraintAllocator::new(DependencyGraph::default(), Lcg48::new(42));
        let mut b = ConstraintAllocator::new(DependencyGraph::default(), Lcg48::new(42));
        let first = a.allocate(&job(0, 4), &m).unwrap();
        assert_eq!(first, b.allocate(&job(0, 4), &m).unwrap());
        assert_eq!(first.node_indices.iter().unique().count(), 4);
        assert!(first.node_indices.iter().all(|n| m.is_free(*n)));
    }

    #[test]
    fn test_fails_only_when_short() {
        let mut m = mesh();
        m.occupy(4).unwrap();
        let mut a = ConstraintAllocator::with_clusters(deps(), vec![cluster(&["rack"])], Lcg48::default());
        assert!(a.allocate(&job(0, 6), &m).is_none());
        assert!(a.allocate(&job(0, 5), &m).is_some());
    }

    #[test]
    fn test_snapshot_restore_replays() {
        let m = mesh();
        let mut a = ConstraintAllocator::with_clusters(deps(), vec![cluster(&["rack"])], Lcg48::new(3));
        a.allocate(&job(0, 2), &m);
        let snap = a.snapshot();
        let first = a.allocate(&job(1, 4), &m);
        a.restore(snap);
        assert_eq!(a.allocate(&job(1, 4), &m), first);
    }
}
