use crate::helpe::*;

impl Job {
    pub fn new(id: u32, procs_needed: usize) -> Self {
        Self {
            id,
            procs_needed,
            name: None,
        }
    }

    /// Tags the job with the key its group has in the dependency graph.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

// Jobs are identified by ID, nothing else.
impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl AllocInfo {
    pub fn new(job: Arc<Job>, node_indices: Vec<NodeIdx>) -> Self {
        debug_assert!(node_indices.len() == job.procs_needed, "Badly sized allocation");
        Self {
            job,
            node_indices,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.node_indices.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.node_indices.is_empty()
    }

    /// Space-separated node indices, in allocation order.
    pub fn proc_list(&self) -> String {
        self.node_indices.iter().join(" ")
    }
}

impl ConstrainedAllocation {
    pub fn new(job: Arc<Job>) -> Self {
        Self {
            job,
            constrained_nodes:      BTreeSet::new(),
            unconstrained_nodes:    BTreeSet::new(),
        }
    }

    #[inline(always)]
    pub fn total(&self) -> usize {
        self.constrained_nodes.len() + self.unconstrained_nodes.len()
    }

    /// Flattens into an [AllocInfo]: unconstrained filler first, then
    /// constrained nodes, each group in ascending index order.
    pub fn into_alloc_info(self) -> AllocInfo {
        debug_assert!(self.total() == self.job.procs_needed, "Incomplete constrained allocation");
        let nodes = self.unconstrained_nodes
            .into_iter()
            .chain(self.constrained_nodes)
            .collect();

        AllocInfo::new(self.job, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_compare_by_id() {
        let a = Job::new(3, 4).with_name("alpha");
        let b = Job::new(3, 8);
        assert_eq!(a, b);
        assert!(Job::new(1, 8) < b);
    }

    #[test]
    fn test_proc_list() {
        let alloc = AllocInfo::new(Arc::new(Job::new(0, 3)), vec![4, 0, 9]);
        assert_eq!(alloc.proc_list(), "4 0 9");
        assert_eq!(alloc.len(), 3);
    }

    #[test]
    fn test_constrained_flattening_order() {
        let mut ca = ConstrainedAllocation::new(Arc::new(Job::new(0, 4)));
        ca.constrained_nodes.extend([7, 2]);
        ca.unconstrained_nodes.extend([9, 1]);
        assert_eq!(ca.total(), 4);
        assert_eq!(ca.into_alloc_info().node_indices, vec![1, 9, 2, 7]);
    }
}
