use crate::helpe::*;
use super::comment_prefix;

/// How good a candidate set is. Both halves are minimized, and
/// [`tiebreak`](Score::tiebreak) only matters when
/// [`primary`](Score::primary) ties: the derived ordering is
/// lexicographic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub primary:    i64,
    pub tiebreak:   i64,
}

/// Ways to evaluate a candidate allocation. Lower is better.
#[derive(Clone, Debug, PartialEq)]
pub enum Scorer {
    /// Sum of pairwise L1 distances.
    PairwiseL1,
    /// Sum of L1 distances from the center.
    L1FromCenter,
    /// Sum of L∞ distances from the center, ties broken by a [Tiebreaker].
    LInfFromCenter(Tiebreaker),
}

impl Scorer {
    /// Scores the first `num` members of `procs`, which were gathered
    /// around `center`.
    ///
    /// Returns `None` when `procs` holds fewer than `num` points: such
    /// a candidate is not scoreable, and loses against everything.
    pub fn value_of(
        &self,
        center:     &MeshLocation,
        procs:      &[MeshLocation],
        num:        usize,
        machine:    &dyn Machine,
    ) -> Option<Score> {
        let chosen = procs.get(..num)?;
        let score = match self {
            Scorer::PairwiseL1          => Score {
                primary:    pairwise_l1_distance(chosen),
                tiebreak:   0,
            },
            Scorer::L1FromCenter        => Score {
                primary:    chosen.iter().map(|p| center.l1_distance_to(p)).sum(),
                tiebreak:   0,
            },
            Scorer::LInfFromCenter(tb)  => Score {
                primary:    chosen.iter().map(|p| center.linf_distance_to(p)).sum(),
                tiebreak:   tb.get_tiebreak(center, chosen, machine),
            },
        };

        Some(score)
    }

    pub fn setup_info(&self, comment: bool) -> String {
        let com = comment_prefix(comment);
        match self {
            Scorer::PairwiseL1          => format!("{com}PairwiseL1DistScorer"),
            Scorer::L1FromCenter        => format!("{com}L1DistFromCenterScorer"),
            Scorer::LInfFromCenter(tb)  => format!("{com}LInfDistFromCenterScorer ({})", tb.info()),
        }
    }
}

/// Tells apart candidates of equal L∞ score by looking at the shells
/// just outside the allocation.
///
/// L∞ alone cannot distinguish a clustered allocation from a scattered
/// one. The tiebreaker scans the shells from the outermost one the
/// allocation reaches (`last_shell`) up to `last_shell + max_shells`;
/// nearer shells weigh more. Within them:
///
/// - every free node *not* taken costs `avail_factor`: an allocation
///   wedged between busy nodes leaves the free area less fragmented,
/// - every point off the mesh earns `wall_factor`: walls are as good
///   as busy neighbors.
///
/// Besides, every taken node on the mesh border earns `border_factor`,
/// and an optional cosine curve of period `curve_width` along `x`
/// charges up to `curve_factor` per node, favoring placements that
/// start on multiples of the width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tiebreaker {
    max_shells:     Coord,
    avail_factor:   i64,
    wall_factor:    i64,
    border_factor:  i64,
    curve_factor:   i64,
    curve_width:    i64,
}

impl Tiebreaker {
    pub fn new(
        max_shells:     Coord,
        avail_factor:   i64,
        wall_factor:    i64,
        border_factor:  i64,
    ) -> Self {
        Self {
            max_shells:     max_shells.max(0),
            avail_factor,
            wall_factor,
            border_factor,
            curve_factor:   0,
            curve_width:    0,
        }
    }

    pub fn with_curve(mut self, factor: i64, width: i64) -> Self {
        self.curve_factor = factor;
        self.curve_width = width;
        self
    }

    pub fn max_shells(&self) -> Coord {
        self.max_shells
    }

    pub fn info(&self) -> String {
        format!(
            "Tiebreaker: max shells {}, avail {}, wall {}, border {}, curve {}/{}",
            self.max_shells,
            self.avail_factor,
            self.wall_factor,
            self.border_factor,
            self.curve_factor,
            self.curve_width,
        )
    }

    /// Returns the tiebreak value of allocating `chosen` around
    /// `center`. Lower is better.
    pub fn get_tiebreak(
        &self,
        center:     &MeshLocation,
        chosen:     &[MeshLocation],
        machine:    &dyn Machine,
    ) -> i64 {
        let Some(last_shell) = chosen.iter()
            .map(|p| center.linf_distance_to(p))
            .max() else { return 0; };
        let dims = machine.dims();
        let taken: HashSet<&MeshLocation> = chosen.iter().collect();

        let (mut avail, mut walls) = (0, 0);
        if self.avail_factor != 0 || self.wall_factor != 0 {
            for radius in last_shell..=last_shell + self.max_shells {
                let weight = self.max_shells - (radius - last_shell) + 1;
                for p in dims.shell(center, radius) {
                    if !dims.contains(&p) {
                        walls += weight;
                    } else if !taken.contains(&p) && machine.is_free_at(&p) {
                        avail += weight;
                    }
                }
            }
        }

        let border = chosen.iter()
            .filter(|p| dims.on_border(p))
            .count() as i64;

        let curve = if self.curve_factor != 0 && self.curve_width > 0 {
            let period = self.curve_width as f64;
            chosen.iter()
                .map(|p| {
                    let phase = 2.0 * std::f64::consts::PI * (p.x as f64) / period;
                    self.curve_factor as f64 * (1.0 - phase.cos()) / 2.0
                })
                .sum::<f64>()
                .round() as i64
        } else { 0 };

        let res = self.avail_factor * avail
            - self.wall_factor * walls
            - self.border_factor * border
            + curve;
        trace!(%center, avail, walls, border, curve, res, "tiebreak");

        res
    }
}
