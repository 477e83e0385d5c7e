//! Collective operations across worker ranks.

/// Collective communication between the ranks of a run.
///
/// Every method is collective: all ranks must call it in the same order.
pub trait Communicator: Send + Sync {
    /// Index of this rank.
    fn rank(&self) -> usize;

    /// Number of ranks in the run.
    fn num_ranks(&self) -> usize;

    /// Global minimum of `value`.
    fn all_reduce_min(&self, value: f64) -> f64;

    /// Global sum of `value`.
    fn all_reduce_sum(&self, value: f64) -> f64;

    /// Block until every rank has arrived.
    fn barrier(&self);

    /// Whether this rank reports run-wide diagnostics.
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Communicator of a run with exactly one rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SingleRank;

impl Communicator for SingleRank {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn all_reduce_min(&self, value: f64) -> f64 {
        value
    }

    fn all_reduce_sum(&self, value: f64) -> f64 {
        value
    }

    fn barrier(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank_reductions_are_identity() {
        let c = SingleRank;
        assert!(c.is_root());
        assert_eq!(c.num_ranks(), 1);
        assert_eq!(c.all_reduce_min(3.5), 3.5);
        assert_eq!(c.all_reduce_sum(-1.0), -1.0);
        c.barrier();
    }
}
