//! The family of allocators that includes Gen-Alg, MM and MC1x1:
//! from each candidate center, gather the closest free points, and
//! keep the best-scoring set.
//!
//! | preset  | centers      | collector | scorer                 |
//! |---------|--------------|-----------|------------------------|
//! | Gen-Alg | free         | L1        | pairwise L1            |
//! | MM      | intersection | L1        | pairwise L1            |
//! | MC1x1   | free         | L∞        | L∞ from center + ties  |
use crate::helpe::*;
use super::{
    centers::CenterGenerator,
    collect::PointCollector,
    score::{Score, Scorer, Tiebreaker},
};

/// A fully scored candidate. `order` is the position of its center in
/// the generated sequence, the last word in every tie.
struct Candidate {
    order:  usize,
    center: MeshLocation,
    score:  Score,
    points: Vec<MeshLocation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NearestAllocator {
    centers:    CenterGenerator,
    collector:  PointCollector,
    scorer:     Scorer,
}

impl NearestAllocator {
    pub fn new(centers: CenterGenerator, collector: PointCollector, scorer: Scorer) -> Self {
        Self {
            centers,
            collector,
            scorer,
        }
    }

    pub fn gen_alg() -> Self {
        Self::new(CenterGenerator::Free, PointCollector::L1, Scorer::PairwiseL1)
    }

    pub fn mm() -> Self {
        Self::new(CenterGenerator::Intersection, PointCollector::L1, Scorer::PairwiseL1)
    }

    pub fn mc1x1(tb: Tiebreaker) -> Self {
        Self::new(CenterGenerator::Free, PointCollector::LInf, Scorer::LInfFromCenter(tb))
    }

    pub fn greedy_mc1x1(tb: Tiebreaker) -> Self {
        Self::new(CenterGenerator::Free, PointCollector::GreedyLInf, Scorer::LInfFromCenter(tb))
    }

    /// Runs collector and scorer around every center and returns the
    /// winner, if any center yields a full-size candidate.
    ///
    /// Centers are evaluated in parallel; the reduction is on
    /// `(score, order)`, which never ties, so the outcome is the same
    /// as that of a left-to-right scan keeping the first best.
    fn best_candidate(&self, num: usize, machine: &dyn Machine) -> Option<Candidate> {
        let free = machine.free_locations();
        let centers = self.centers.get_centers(&free, machine.dims());
        trace!(centers = centers.len(), free = free.len(), "nearest search");

        centers.par_iter()
            .enumerate()
            .filter_map(|(order, center)| {
                let mut avail = free.clone();
                let points = self.collector.get_nearest(center, num, &mut avail);
                if points.len() < num {
                    // Not viable, not an error.
                    return None;
                }
                let score = self.scorer.value_of(center, &points, num, machine)?;

                Some(Candidate {
                    order,
                    center: *center,
                    score,
                    points,
                })
            })
            .min_by_key(|c| (c.score, c.order))
    }
}

impl Allocator for NearestAllocator {
    fn allocate(&mut self, job: &Arc<Job>, machine: &dyn Machine) -> Option<AllocInfo> {
        if !self.can_allocate(job, machine) {
            debug!(job = job.id, needed = job.procs_needed, free = machine.num_free(), "not enough free nodes");
            return None;
        }
        let num = job.procs_needed;
        let best = self.best_candidate(num, machine)?;
        let dims = machine.dims();
        let nodes = best.points
            .iter()
            .take(num)
            .map(|p| dims.index_of(p))
            .collect::<Option<Vec<NodeIdx>>>()?;
        debug!(
            job = job.id,
            center = %best.center,
            primary = best.score.primary,
            tiebreak = best.score.tiebreak,
            "nearest allocation"
        );

        Some(AllocInfo::new(job.clone(), nodes))
    }

    fn setup_info(&self, comment: bool) -> String {
        format!(
            "{}Nearest Allocator ({}, {}, {})",
            super::comment_prefix(comment),
            self.centers.setup_info(false),
            self.collector.setup_info(false),
            self.scorer.setup_info(false),
        )
    }
}
