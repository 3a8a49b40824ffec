use crate::helpe::*;

/// An immutable point on the mesh. Unused dimensions sit at 0.
///
/// Two locations are equal iff their coordinates are. The derived
/// ordering (`x`, then `y`, then `z`) is what every distance-based
/// comparison falls back to when distances tie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshLocation {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
}

impl MeshLocation {
    pub fn new(x: Coord, y: Coord, z: Coord) -> Self {
        Self { x, y, z }
    }

    #[inline(always)]
    pub fn l1_distance_to(&self, other: &Self) -> Coord {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }

    #[inline(always)]
    pub fn linf_distance_to(&self, other: &Self) -> Coord {
        (self.x - other.x).abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The two metrics nearest-neighbor search knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    L1,
    LInf,
}

impl Metric {
    #[inline(always)]
    pub fn distance(&self, a: &MeshLocation, b: &MeshLocation) -> Coord {
        match self {
            Metric::L1      => a.l1_distance_to(b),
            Metric::LInf    => a.linf_distance_to(b),
        }
    }

    /// Sorts `points` by increasing distance to `center`. The sort is
    /// stable: points the metric cannot tell apart keep their relative
    /// order. Under L1 the L∞ distance is consulted first, so that
    /// among L1 ties the rounder point goes first.
    pub fn sort_from(&self, center: &MeshLocation, points: &mut [MeshLocation]) {
        match self {
            Metric::L1      => points.sort_by_key(|p| (p.l1_distance_to(center), p.linf_distance_to(center))),
            Metric::LInf    => points.sort_by_key(|p| p.linf_distance_to(center)),
        }
    }
}

/// Extent of the mesh along each axis. A 2D mesh has `z == 1`,
/// a 1D one also has `y == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dims {
    pub x: Coord,
    pub y: Coord,
    pub z: Coord,
}

impl Dims {
    /// Fails unless every extent is positive and the node count fits
    /// in a [NodeIdx].
    pub fn new(x: Coord, y: Coord, z: Coord) -> Result<Self, MeshError> {
        let total = x.checked_mul(y)
            .and_then(|xy| xy.checked_mul(z))
            .and_then(|n| NodeIdx::try_from(n).ok());
        if x < 1 || y < 1 || z < 1 || total.is_none() {
            return Err(MeshError::BadDimensions(x, y, z));
        }

        Ok(Self { x, y, z })
    }

    #[inline(always)]
    pub fn num_procs(&self) -> usize {
        (self.x * self.y * self.z) as usize
    }

    #[inline(always)]
    pub fn contains(&self, loc: &MeshLocation) -> bool {
        (0..self.x).contains(&loc.x)
            && (0..self.y).contains(&loc.y)
            && (0..self.z).contains(&loc.z)
    }

    /// Flat node index of `loc`, or `None` if it lies off the mesh.
    #[inline(always)]
    pub fn index_of(&self, loc: &MeshLocation) -> Option<NodeIdx> {
        if self.contains(loc) {
            Some((loc.x + self.x * (loc.y + self.y * loc.z)) as NodeIdx)
        } else { None }
    }

    /// Inverse of [`Dims::index_of`]. Assumes `node < num_procs()`.
    #[inline(always)]
    pub fn location_of(&self, node: NodeIdx) -> MeshLocation {
        debug_assert!(node < self.num_procs(), "Node {node} off the mesh");
        let n = node as Coord;
        MeshLocation::new(
            n % self.x,
            (n / self.x) % self.y,
            n / (self.x * self.y),
        )
    }

    /// Returns `true` if `loc` touches the outer boundary of the mesh
    /// along some axis that actually has an extent.
    pub fn on_border(&self, loc: &MeshLocation) -> bool {
        let touches = |c: Coord, extent: Coord| extent > 1 && (c == 0 || c == extent - 1);
        touches(loc.x, self.x) || touches(loc.y, self.y) || touches(loc.z, self.z)
    }

    /// Every location of the mesh, in node index order.
    pub fn all_locations(&self) -> impl Iterator<Item = MeshLocation> + '_ {
        (0..self.num_procs()).map(move |n| self.location_of(n))
    }

    /// The points at L∞ distance exactly `radius` from `center`.
    ///
    /// Only axes with an extent vary, so a shell on a 2D mesh is a
    /// square ring, not a cube. Points off the mesh are included:
    /// the caller decides what a wall means.
    pub fn shell(&self, center: &MeshLocation, radius: Coord) -> Vec<MeshLocation> {
        let span = |extent: Coord| if extent > 1 { radius } else { 0 };
        let (rx, ry, rz) = (span(self.x), span(self.y), span(self.z));
        iproduct!(-rz..=rz, -ry..=ry, -rx..=rx)
            .filter(|(dz, dy, dx)| dx.abs().max(dy.abs()).max(dz.abs()) == radius)
            .map(|(dz, dy, dx)| MeshLocation::new(center.x + dx, center.y + dy, center.z + dz))
            .collect()
    }
}

impl std::str::FromStr for Dims {
    type Err = MeshError;

    /// Parses `X`, `XxY` or `XxYxZ`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MeshError::BadDimsSpec(s.to_string());
        let parts: Vec<Coord> = s.split(['x', 'X'])
            .map(|p| p.trim().parse::<Coord>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad())?;
        match parts[..] {
            [x]         => Dims::new(x, 1, 1),
            [x, y]      => Dims::new(x, y, 1),
            [x, y, z]   => Dims::new(x, y, z),
            _           => Err(bad()),
        }
    }
}

/// Sum of L1 distances over every unordered pair in `procs`.
pub fn pairwise_l1_distance(procs: &[MeshLocation]) -> Coord {
    procs.iter()
        .tuple_combinations()
        .map(|(a, b)| a.l1_distance_to(b))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: Coord, y: Coord) -> MeshLocation {
        MeshLocation::new(x, y, 0)
    }

    #[test]
    fn test_distances() {
        let a = MeshLocation::new(0, 0, 0);
        let b = MeshLocation::new(3, -1, 2);
        assert_eq!(a.l1_distance_to(&b), 6);
        assert_eq!(a.linf_distance_to(&b), 3);
        assert_eq!(b.l1_distance_to(&a), 6);
        assert_eq!(a.l1_distance_to(&a), 0);
        assert_eq!(b.linf_distance_to(&b), 0);
    }

    #[test]
    fn test_index_roundtrip() {
        let dims = Dims::new(4, 3, 2).unwrap();
        for n in 0..dims.num_procs() {
            let l = dims.location_of(n);
            assert!(dims.contains(&l));
            assert_eq!(dims.index_of(&l), Some(n));
        }
        assert_eq!(dims.index_of(&MeshLocation::new(4, 0, 0)), None);
        assert_eq!(dims.index_of(&MeshLocation::new(-1, 0, 0)), None);
        assert_eq!(dims.location_of(5), MeshLocation::new(1, 1, 0));
    }

    #[test]
    fn test_dims_parsing() {
        assert_eq!("4x4".parse::<Dims>().unwrap(), Dims::new(4, 4, 1).unwrap());
        assert_eq!("8".parse::<Dims>().unwrap(), Dims::new(8, 1, 1).unwrap());
        assert_eq!("2x3x4".parse::<Dims>().unwrap(), Dims::new(2, 3, 4).unwrap());
        assert!("2x".parse::<Dims>().is_err());
        assert!("1x2x3x4".parse::<Dims>().is_err());
        assert_eq!("0x4".parse::<Dims>(), Err(MeshError::BadDimensions(0, 4, 1)));
    }

    #[test]
    fn test_oversized_dims_are_rejected() {
        assert_eq!(Dims::new(Coord::MAX, 2, 1), Err(MeshError::BadDimensions(Coord::MAX, 2, 1)));
        assert!(Dims::new(1 << 31, 1 << 31, 1 << 31).is_err());
        assert!(format!("{}x3", Coord::MAX / 2).parse::<Dims>().is_err());
        assert_eq!(Dims::new(1 << 20, 1 << 20, 1).unwrap().num_procs(), 1 << 40);
    }

    #[test]
    fn test_shell_sizes() {
        let flat = Dims::new(10, 10, 1).unwrap();
        let c = loc(5, 5);
        assert_eq!(flat.shell(&c, 0), vec![c]);
        assert_eq!(flat.shell(&c, 1).len(), 8);
        assert_eq!(flat.shell(&c, 2).len(), 16);
        let cube = Dims::new(10, 10, 10).unwrap();
        assert_eq!(cube.shell(&MeshLocation::new(5, 5, 5), 1).len(), 26);
        let line = Dims::new(10, 1, 1).unwrap();
        assert_eq!(line.shell(&loc(5, 0), 3), vec![loc(2, 0), loc(8, 0)]);
    }

    #[test]
    fn test_shell_keeps_walls() {
        let dims = Dims::new(4, 4, 1).unwrap();
        let ring = dims.shell(&loc(0, 0), 1);
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.iter().filter(|p| dims.contains(p)).count(), 3);
    }

    #[test]
    fn test_border() {
        let dims = Dims::new(4, 4, 1).unwrap();
        assert!(dims.on_border(&loc(0, 2)));
        assert!(dims.on_border(&loc(2, 3)));
        assert!(!dims.on_border(&loc(1, 2)));
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let center = loc(1, 1);
        let mut pts = vec![loc(2, 1), loc(0, 1), loc(1, 1), loc(1, 0)];
        Metric::L1.sort_from(&center, &mut pts);
        assert_eq!(pts, vec![loc(1, 1), loc(2, 1), loc(0, 1), loc(1, 0)]);
    }

    #[test]
    fn test_l1_ties_prefer_rounder_points() {
        let center = loc(0, 0);
        let mut pts = vec![loc(2, 0), loc(1, 1), loc(0, 2)];
        Metric::L1.sort_from(&center, &mut pts);
        assert_eq!(pts, vec![loc(1, 1), loc(2, 0), loc(0, 2)]);
    }

    #[test]
    fn test_linf_ties_keep_input_order() {
        let center = loc(0, 0);
        let mut pts = vec![loc(2, 0), loc(1, 1), loc(0, 1), loc(1, 0)];
        Metric::LInf.sort_from(&center, &mut pts);
        assert_eq!(pts, vec![loc(1, 1), loc(0, 1), loc(1, 0), loc(2, 0)]);
    }

    #[test]
    fn test_pairwise_square_vs_line() {
        let square = [loc(0, 0), loc(1, 0), loc(0, 1), loc(1, 1)];
        let line = [loc(0, 0), loc(1, 0), loc(2, 0), loc(3, 0)];
        assert_eq!(pairwise_l1_distance(&square), 8);
        assert_eq!(pairwise_l1_distance(&line), 10);
    }
}
