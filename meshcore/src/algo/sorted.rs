use crate::helpe::*;
use super::comment_prefix;

/// Fixed walks over the mesh that the sorted free list can follow.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum MeshOrdering {
    /// Lexicographic by coordinate: `x`, then `y`, then `z`
    #[default]
    Xyz,
    /// Plain node index order (`x` varies fastest)
    Index,
    /// Boustrophedon: like `index`, but every other row runs backwards
    Snake,
}

impl MeshOrdering {
    #[inline(always)]
    pub fn compare(&self, a: &MeshLocation, b: &MeshLocation) -> Ordering {
        match self {
            MeshOrdering::Xyz   => a.cmp(b),
            MeshOrdering::Index => (a.z, a.y, a.x).cmp(&(b.z, b.y, b.x)),
            MeshOrdering::Snake => snake_key(a).cmp(&snake_key(b)),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            MeshOrdering::Xyz   => "xyz",
            MeshOrdering::Index => "index",
            MeshOrdering::Snake => "snake",
        }
    }
}

#[inline(always)]
fn snake_key(p: &MeshLocation) -> (Coord, Coord, Coord) {
    let x = if (p.y + p.z) % 2 == 1 { -p.x } else { p.x };

    (p.z, p.y, x)
}

type Comparator = Box<dyn Fn(&MeshLocation, &MeshLocation) -> Ordering + Send + Sync>;

/// The baseline: sort the free nodes along some fixed walk and take
/// the first ones. Every smarter allocator had better beat this.
pub struct SortedFreeListAllocator {
    name:       String,
    comparator: Comparator,
}

impl SortedFreeListAllocator {
    pub fn new(ordering: MeshOrdering) -> Self {
        Self {
            name:       ordering.name().to_string(),
            comparator: Box::new(move |a, b| ordering.compare(a, b)),
        }
    }

    /// Sorts by an arbitrary caller-supplied comparator instead.
    pub fn with_comparator<F>(name: impl Into<String>, comparator: F) -> Self
    where F: Fn(&MeshLocation, &MeshLocation) -> Ordering + Send + Sync + 'static {
        Self {
            name:       name.into(),
            comparator: Box::new(comparator),
        }
    }
}

impl std::fmt::Debug for SortedFreeListAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedFreeListAllocator")
            .field("ordering", &self.name)
            .finish()
    }
}

impl Allocator for SortedFreeListAllocator {
    fn allocate(&mut self, job: &Arc<Job>, machine: &dyn Machine) -> Option<AllocInfo> {
        if !self.can_allocate(job, machine) {
            return None;
        }
        let dims = machine.dims();
        let mut free = machine.free_locations();
        // Stable, so nodes the comparator cannot tell apart stay in index order.
        free.sort_by(|a, b| (self.comparator)(a, b));
        let nodes = free.iter()
            .take(job.procs_needed)
            .map(|p| dims.index_of(p))
            .collect::<Option<Vec<NodeIdx>>>()?;
        debug!(job = job.id, ordering = %self.name, first = ?nodes.first(), "sorted allocation");

        Some(AllocInfo::new(job.clone(), nodes))
    }

    fn setup_info(&self, comment: bool) -> String {
        format!("{}Linear Allocator (Sorted Free List, {})", comment_prefix(comment), self.name)
    }
}
