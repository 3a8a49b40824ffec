use crate::helpe::*;
use super::comment_prefix;

/// Ways to gather the free locations nearest to a center.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointCollector {
    /// The `num` nearest by L1 distance (L∞ on ties).
    L1,
    /// The `num` nearest by L∞ distance.
    LInf,
    /// Like [`PointCollector::LInf`] for every shell but the outermost
    /// one it needs; that shell is filled greedily so that the picked
    /// points hug the rest of the group.
    GreedyLInf,
}

impl PointCollector {
    /// Returns the `num` locations of `available` nearest to `center`.
    ///
    /// `available` gets sorted by distance along the way. If it holds
    /// fewer than `num` locations, all of them are returned and it is up
    /// to the caller to notice the shortfall.
    pub fn get_nearest(
        &self,
        center:     &MeshLocation,
        num:        usize,
        available:  &mut [MeshLocation],
    ) -> Vec<MeshLocation> {
        match self {
            PointCollector::L1          => nearest_by(Metric::L1, center, num, available),
            PointCollector::LInf        => nearest_by(Metric::LInf, center, num, available),
            PointCollector::GreedyLInf  => greedy_linf(center, num, available),
        }
    }

    pub fn setup_info(&self, comment: bool) -> String {
        let name = match self {
            PointCollector::L1          => "L1PointCollector",
            PointCollector::LInf        => "LInfPointCollector",
            PointCollector::GreedyLInf  => "GreedyLInfPointCollector",
        };

        format!("{}{name}", comment_prefix(comment))
    }
}

#[inline(always)]
fn nearest_by(
    metric:     Metric,
    center:     &MeshLocation,
    num:        usize,
    available:  &mut [MeshLocation],
) -> Vec<MeshLocation> {
    metric.sort_from(center, available);
    available.iter()
        .take(num)
        .copied()
        .collect()
}

/// A candidate of the outermost shell, along with what we need
/// to rank it.
struct PointInfo {
    point:          MeshLocation,
    // Sum of L1 distances to everything picked so far.
    l1_to_group:    Coord,
    l1_to_center:   Coord,
}

impl PointInfo {
    // Closest to the group wins, then closest to the center, then
    // plain coordinate order. Total, so no two candidates ever tie.
    #[inline(always)]
    fn rank(&self) -> (Coord, Coord, MeshLocation) {
        (self.l1_to_group, self.l1_to_center, self.point)
    }
}

fn greedy_linf(
    center:     &MeshLocation,
    num:        usize,
    available:  &mut [MeshLocation],
) -> Vec<MeshLocation> {
    Metric::LInf.sort_from(center, available);
    if num == 0 {
        return vec![];
    } else if available.len() <= num {
        // Either everything is needed, or we're short anyway.
        return available.to_vec();
    }

    // Points strictly inside the last shell are taken no matter what.
    let last_shell = center.linf_distance_to(&available[num - 1]);
    let inner_end = available.partition_point(|p| center.linf_distance_to(p) < last_shell);
    let outer_end = available.partition_point(|p| center.linf_distance_to(p) <= last_shell);
    let mut group: Vec<MeshLocation> = available[..inner_end].to_vec();

    let mut outer: Vec<PointInfo> = available[inner_end..outer_end]
        .iter()
        .map(|p| PointInfo {
            point:          *p,
            l1_to_group:    l1_to_group(p, &group),
            l1_to_center:   p.l1_distance_to(center),
        })
        .collect();

    while group.len() < num {
        let Some((best, _)) = outer.iter()
            .enumerate()
            .min_by_key(|(_, pi)| pi.rank()) else { break; };
        let picked = outer.swap_remove(best).point;
        for pi in outer.iter_mut() {
            pi.l1_to_group += pi.point.l1_distance_to(&picked);
        }
        trace!(%picked, remaining = outer.len(), "greedy shell pick");
        group.push(picked);
    }

    group
}

/// Sum of L1 distances from `outer` to every point of `group`.
/// `outer` itself must not be part of `group`.
#[inline(always)]
fn l1_to_group(outer: &MeshLocation, group: &[MeshLocation]) -> Coord {
    group.iter()
        .map(|g| outer.l1_distance_to(g))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(x: Coord, y: Coord) -> MeshLocation {
        MeshLocation::new(x, y, 0)
    }

    fn grid(w: Coord, h: Coord) -> Vec<MeshLocation> {
        iproduct!(0..h, 0..w).map(|(y, x)| loc(x, y)).collect()
    }

    #[test]
    fn test_l1_collector_takes_nearest() {
        let mut avail = grid(5, 5);
        let got = PointCollector::L1.get_nearest(&loc(2, 2), 5, &mut avail);
        assert_eq!(got.len(), 5);
        assert!(got.iter().all(|p| p.l1_distance_to(&loc(2, 2)) <= 1));
        // Sorted in place.
        assert_eq!(avail[0], loc(2, 2));
    }

    #[test]
    fn test_l1_ties_keep_input_order() {
        let mut avail = vec![loc(1, 0), loc(0, 1), loc(2, 1), loc(1, 2)];
        let got = PointCollector::L1.get_nearest(&loc(1, 1), 2, &mut avail);
        assert_eq!(got, vec![loc(1, 0), loc(0, 1)]);
    }

    #[test]
    fn test_linf_collector_counts_diagonals_as_near() {
        let mut avail = vec![loc(0, 3), loc(3, 3), loc(2, 1)];
        let got = PointCollector::LInf.get_nearest(&loc(1, 0), 2, &mut avail);
        assert_eq!(got, vec![loc(2, 1), loc(0, 3)]);
    }

    #[test]
    fn test_linf_ties_keep_input_order() {
        let mut avail = vec![loc(0, 0), loc(1, 0)];
        let got = PointCollector::LInf.get_nearest(&loc(1, 1), 1, &mut avail);
        assert_eq!(got, vec![loc(0, 0)]);
    }

    #[test]
    fn test_shortfall_returns_what_exists() {
        let mut avail = vec![loc(0, 0), loc(1, 0)];
        for c in [PointCollector::L1, PointCollector::LInf, PointCollector::GreedyLInf] {
            assert_eq!(c.get_nearest(&loc(0, 0), 3, &mut avail.clone()).len(), 2);
        }
        assert!(PointCollector::GreedyLInf.get_nearest(&loc(0, 0), 0, &mut avail).is_empty());
    }

    #[test]
    fn test_greedy_prefers_a_compact_shell() {
        // Center (1,1) is free; the whole first shell is free too.
        // Plain LInf takes shell points in input order, scattering them.
        let mut avail = vec![
            loc(1, 1),
            loc(0, 2), loc(2, 0), loc(2, 2), loc(0, 0),
            loc(1, 0), loc(0, 1), loc(2, 1), loc(1, 2),
        ];
        let plain = PointCollector::LInf.get_nearest(&loc(1, 1), 4, &mut avail.clone());
        let greedy = PointCollector::GreedyLInf.get_nearest(&loc(1, 1), 4, &mut avail);
        assert_eq!(plain, vec![loc(1, 1), loc(0, 2), loc(2, 0), loc(2, 2)]);
        assert_eq!(greedy.len(), 4);
        assert_eq!(greedy[0], loc(1, 1));
        assert!(pairwise_l1_distance(&greedy) < pairwise_l1_distance(&plain));
        // Two side neighbors and the corner between them.
        assert_eq!(pairwise_l1_distance(&greedy), 8);
    }

    #[test]
    fn test_greedy_breaks_group_ties_by_center_distance() {
        // Both shell-2 candidates sit 5 away from the group; (2,4) is
        // nearer the center, although (0,1) comes first in every other order.
        let mut avail = vec![loc(2, 2), loc(2, 1), loc(0, 1), loc(2, 4)];
        let got = PointCollector::GreedyLInf.get_nearest(&loc(2, 2), 3, &mut avail);
        assert_eq!(got, vec![loc(2, 2), loc(2, 1), loc(2, 4)]);
    }

    #[test]
    fn test_greedy_keeps_the_inner_shells() {
        let mut avail = grid(5, 5);
        let got = PointCollector::GreedyLInf.get_nearest(&loc(2, 2), 12, &mut avail);
        assert_eq!(got.len(), 12);
        // The full 3x3 block around the center is inside the last shell.
        for p in grid(3, 3) {
            assert!(got.contains(&loc(p.x + 1, p.y + 1)));
        }
        assert_eq!(got.iter().unique().count(), 12);
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let avail = grid(6, 4);
        let a = PointCollector::GreedyLInf.get_nearest(&loc(3, 2), 7, &mut avail.clone());
        let b = PointCollector::GreedyLInf.get_nearest(&loc(3, 2), 7, &mut avail.clone());
        assert_eq!(a, b);
    }
}
