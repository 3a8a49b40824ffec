use crate::helpe::*;

/// What an allocator is allowed to know about the machine it places
/// jobs on. Everything here is a read: allocators never flip a node's
/// status themselves.
///
/// `Sync` because the nearest allocator scores centers in parallel.
pub trait Machine: Sync {
    fn dims(&self) -> Dims;

    fn is_free(&self, node: NodeIdx) -> bool;

    /// A snapshot of the free nodes, in ascending index order. The
    /// caller owns it and may reorder it at will.
    fn free_processors(&self) -> Vec<NodeIdx>;

    /// The group identifier a node is tagged with.
    fn node_id(&self, node: NodeIdx) -> &str;

    fn num_procs(&self) -> usize {
        self.dims().num_procs()
    }

    fn num_free(&self) -> usize {
        self.free_processors().len()
    }

    /// Same as [`Machine::free_processors`], as coordinates.
    fn free_locations(&self) -> Vec<MeshLocation> {
        let dims = self.dims();
        self.free_processors()
            .into_iter()
            .map(|n| dims.location_of(n))
            .collect()
    }

    /// Returns `true` iff `loc` is on the mesh and free.
    fn is_free_at(&self, loc: &MeshLocation) -> bool {
        self.dims()
            .index_of(loc)
            .is_some_and(|n| self.is_free(n))
    }
}

impl Mesh {
    /// A fully free mesh. Each node's id defaults to its index.
    pub fn new(dims: Dims) -> Self {
        let n = dims.num_procs();
        Self {
            dims,
            free:       vec![true; n],
            num_free:   n,
            node_ids:   (0..n).map(|i| i.to_string()).collect(),
        }
    }

    /// Replaces every node id at once.
    pub fn with_node_ids(mut self, ids: Vec<String>) -> Result<Self, MeshError> {
        if ids.len() != self.free.len() {
            return Err(MeshError::SizeMismatch {
                expected:   self.free.len(),
                got:        ids.len(),
            });
        }
        self.node_ids = ids;

        Ok(self)
    }

    pub fn set_node_id(&mut self, node: NodeIdx, id: impl Into<String>) -> Result<(), MeshError> {
        let slot = self.node_ids
            .get_mut(node)
            .ok_or(MeshError::OutOfBounds(node))?;
        *slot = id.into();

        Ok(())
    }

    /// Retags the listed nodes, e.g. from [read_node_ids].
    pub fn apply_node_ids(&mut self, ids: Vec<(NodeIdx, String)>) -> Result<(), MeshError> {
        for (node, id) in ids {
            self.set_node_id(node, id)?;
        }

        Ok(())
    }

    /// Marks a single node busy, e.g. to set up a fragmented mesh.
    pub fn occupy(&mut self, node: NodeIdx) -> Result<(), MeshError> {
        let Some(slot) = self.free.get_mut(node) else {
            return Err(MeshError::OutOfBounds(node));
        };
        if !*slot {
            return Err(MeshError::NodeBusy(node));
        }
        *slot = false;
        self.num_free -= 1;

        Ok(())
    }

    /// Applies a placement: every node it names becomes busy.
    ///
    /// Nothing changes unless *all* nodes are on the mesh, distinct and
    /// free. This is what keeps two live allocations from ever sharing
    /// a node.
    pub fn commit(&mut self, alloc: &AllocInfo) -> Result<(), MeshError> {
        let mut seen = HashSet::with_capacity(alloc.len());
        for &n in &alloc.node_indices {
            match self.free.get(n).copied() {
                None        => { return Err(MeshError::OutOfBounds(n)); },
                Some(false) => { return Err(MeshError::NodeBusy(n)); },
                Some(true)  => {},
            }
            if !seen.insert(n) {
                return Err(MeshError::Duplicate(n));
            }
        }
        for &n in &alloc.node_indices {
            self.free[n] = false;
        }
        self.num_free -= alloc.len();

        Ok(())
    }

    /// Gives a finished job's nodes back.
    pub fn release(&mut self, alloc: &AllocInfo) -> Result<(), MeshError> {
        let mut seen = HashSet::with_capacity(alloc.len());
        for &n in &alloc.node_indices {
            match self.free.get(n).copied() {
                None        => { return Err(MeshError::OutOfBounds(n)); },
                Some(true)  => { return Err(MeshError::NodeAlreadyFree(n)); },
                Some(false) => {},
            }
            if !seen.insert(n) {
                return Err(MeshError::Duplicate(n));
            }
        }
        for &n in &alloc.node_indices {
            self.free[n] = true;
        }
        self.num_free += alloc.len();

        Ok(())
    }
}

impl Machine for Mesh {
    fn dims(&self) -> Dims {
        self.dims
    }

    #[inline(always)]
    fn is_free(&self, node: NodeIdx) -> bool {
        self.free.get(node).copied().unwrap_or(false)
    }

    fn free_processors(&self) -> Vec<NodeIdx> {
        self.free.iter()
            .enumerate()
            .filter_map(|(n, &f)| f.then_some(n))
            .collect()
    }

    fn node_id(&self, node: NodeIdx) -> &str {
        self.node_ids
            .get(node)
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    fn num_free(&self) -> usize {
        self.num_free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(x: Coord, y: Coord) -> Mesh {
        Mesh::new(Dims::new(x, y, 1).unwrap())
    }

    fn alloc(id: u32, nodes: Vec<NodeIdx>) -> AllocInfo {
        AllocInfo::new(Arc::new(Job::new(id, nodes.len())), nodes)
    }

    #[test]
    fn test_fresh_mesh_is_free() {
        let m = mesh(4, 4);
        assert_eq!(m.num_free(), 16);
        assert_eq!(m.free_processors(), (0..16).collect::<Vec<_>>());
        assert_eq!(m.node_id(5), "5");
    }

    #[test]
    fn test_commit_and_release() {
        let mut m = mesh(4, 4);
        let a = alloc(0, vec![0, 1, 4, 5]);
        m.commit(&a).unwrap();
        assert_eq!(m.num_free(), 12);
        assert!(!m.is_free(5));
        assert!(!m.is_free_at(&MeshLocation::new(1, 1, 0)));
        assert_eq!(m.free_processors().len(), 12);
        m.release(&a).unwrap();
        assert_eq!(m.num_free(), 16);
        assert_eq!(m.release(&a), Err(MeshError::NodeAlreadyFree(0)));
    }

    #[test]
    fn test_double_allocation_is_refused_atomically() {
        let mut m = mesh(4, 4);
        m.commit(&alloc(0, vec![2, 3])).unwrap();
        assert_eq!(m.commit(&alloc(1, vec![0, 1, 3])), Err(MeshError::NodeBusy(3)));
        // Nothing of the failed commit stuck.
        assert!(m.is_free(0) && m.is_free(1));
        assert_eq!(m.num_free(), 14);
        assert_eq!(m.commit(&alloc(2, vec![7, 7])), Err(MeshError::Duplicate(7)));
        assert_eq!(m.commit(&alloc(3, vec![16])), Err(MeshError::OutOfBounds(16)));
    }

    #[test]
    fn test_node_ids() {
        let m = mesh(2, 1)
            .with_node_ids(vec![String::from("a"), String::from("b")])
            .unwrap();
        assert_eq!(m.node_id(1), "b");
        assert!(mesh(2, 2).with_node_ids(vec![]).is_err());
        let mut m = mesh(2, 2);
        m.set_node_id(3, "rack").unwrap();
        assert_eq!(m.node_id(3), "rack");
        assert_eq!(m.set_node_id(4, "x"), Err(MeshError::OutOfBounds(4)));
    }

    #[test]
    fn test_occupy() {
        let mut m = mesh(3, 1);
        m.occupy(1).unwrap();
        assert_eq!(m.occupy(1), Err(MeshError::NodeBusy(1)));
        assert_eq!(m.free_locations(), vec![MeshLocation::new(0, 0, 0), MeshLocation::new(2, 0, 0)]);
    }
}
