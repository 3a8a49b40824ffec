use crate::helpe::*;
use super::comment_prefix;

/// Ways to come up with candidate centers for nearest-neighbor search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CenterGenerator {
    /// Every free location.
    Free,
    /// Every free location, plus every point where axis-aligned lines
    /// through free locations cross. A superset of [`CenterGenerator::Free`].
    Intersection,
    /// Every location of the mesh, free or not.
    All,
}

impl CenterGenerator {
    /// Returns the centers to try, given the currently free locations.
    ///
    /// No coordinate appears twice. The order is a pure function of
    /// the input order: free locations keep theirs and come first.
    pub fn get_centers(&self, available: &[MeshLocation], dims: Dims) -> Vec<MeshLocation> {
        match self {
            CenterGenerator::Free           => {
                available.iter()
                    .copied()
                    .unique()
                    .collect()
            },
            CenterGenerator::Intersection   => {
                let mut res: IndexSet<MeshLocation> = available.iter()
                    .copied()
                    .collect();
                // A point sits on a line through some free location along
                // each axis iff each of its coordinates is used by one.
                let xs: BTreeSet<Coord> = available.iter().map(|p| p.x).collect();
                let ys: BTreeSet<Coord> = available.iter().map(|p| p.y).collect();
                let zs: BTreeSet<Coord> = available.iter().map(|p| p.z).collect();
                for (&x, &y, &z) in iproduct!(&xs, &ys, &zs) {
                    res.insert(MeshLocation::new(x, y, z));
                }

                res.into_iter().collect()
            },
            CenterGenerator::All            => dims.all_locations().collect(),
        }
    }

    pub fn setup_info(&self, comment: bool) -> String {
        let name = match self {
            CenterGenerator::Free           => "FreeCenterGenerator",
            CenterGenerator::Intersection   => "IntersectionCenterGen",
            CenterGenerator::All            => "AllCenterGenerator",
        };

        format!("{}{name}", comment_prefix(comment))
    }
}
