use crate::model::{Assignment, PatternModel};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// How often (in search nodes) the deadline is polled.
const DEADLINE_POLL_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStatus {
    /// Search finished; no plan with fewer tubes exists.
    Optimal,
    /// A valid plan was found but the deadline hit before it was proven optimal.
    Feasible,
    /// The constraints admit no solution.
    Infeasible,
    /// The deadline hit before any valid plan was found.
    NoResult,
}

impl SearchStatus {
    pub fn has_solution(&self) -> bool {
        matches!(self, Self::Optimal | Self::Feasible)
    }
}

impl std::fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimal => write!(f, "OPTIMAL"),
            Self::Feasible => write!(f, "FEASIBLE"),
            Self::Infeasible => write!(f, "INFEASIBLE"),
            Self::NoResult => write!(f, "NO_RESULT"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Present for `Optimal` and `Feasible`.
    pub assignment: Option<Assignment>,
    pub nodes: u64,
    pub elapsed: Duration,
}

impl SearchOutcome {
    fn without_solution(status: SearchStatus, nodes: u64, started: Instant) -> Self {
        Self {
            status,
            assignment: None,
            nodes,
            elapsed: started.elapsed(),
        }
    }

    /// Number of active units in the assignment.
    pub fn objective(&self) -> Option<usize> {
        self.assignment.as_ref().map(Assignment::active_units)
    }
}

/// Something that can search a [`PatternModel`] under a time limit.
///
/// `None` means no limit. Implementations must return the same objective
/// value for the same model whenever they run to completion.
pub trait SearchEngine {
    fn solve(&self, model: &PatternModel, time_limit: Option<Duration>) -> SearchOutcome;
}

/// Exact depth-first branch and bound over cutting patterns.
///
/// Tubes are filled one at a time. Each new tube must contain the longest
/// piece still unplaced and only maximal patterns (no remaining piece
/// fits in the leftover) are tried, which removes tube-order symmetry
/// without losing optimal plans. A first-fit-decreasing plan seeds the
/// incumbent unless `warm_start` is off.
#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    pub warm_start: bool,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self { warm_start: true }
    }
}

impl SearchEngine for BranchAndBound {
    fn solve(&self, model: &PatternModel, time_limit: Option<Duration>) -> SearchOutcome {
        let started = Instant::now();
        // a limit too large to represent is no limit
        let deadline = time_limit.and_then(|limit| started.checked_add(limit));
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);

        if expired() {
            return SearchOutcome::without_solution(SearchStatus::NoResult, 0, started);
        }

        let stock = model.stock_length();
        let pieces = model.pieces();
        // zero lengths only get here when normalization was bypassed
        if stock == 0
            || pieces
                .iter()
                .any(|p| p.demand > 0 && (p.length == 0 || p.length > stock))
        {
            return SearchOutcome::without_solution(SearchStatus::Infeasible, 0, started);
        }

        // Work longest first regardless of how the model orders its pieces.
        let mut order: Vec<usize> = (0..pieces.len()).filter(|&j| pieces[j].demand > 0).collect();
        order.sort_by(|&a, &b| pieces[b].length.cmp(&pieces[a].length));
        let lengths: Vec<u64> = order.iter().map(|&j| pieces[j].length).collect();
        let demand: Vec<u32> = order.iter().map(|&j| pieces[j].demand).collect();

        let lower_bound = model.lower_bound();
        let mut search = Search {
            lengths: &lengths,
            stock,
            best: None,
            best_count: model.candidate_units() + 1,
            nodes: 0,
        };

        if self.warm_start {
            let patterns = first_fit_decreasing(&lengths, &demand, stock);
            search.best_count = patterns.len();
            search.best = Some(patterns);
        }

        let finished = if search.best_count <= lower_bound {
            true
        } else if expired() {
            false
        } else {
            search.run(&demand, lower_bound, &expired)
        };

        let status = match (finished, search.best.is_some()) {
            (true, true) => SearchStatus::Optimal,
            (true, false) => SearchStatus::Infeasible,
            (false, true) => SearchStatus::Feasible,
            (false, false) => SearchStatus::NoResult,
        };

        let assignment = search.best.map(|patterns| {
            let mut assignment = Assignment::empty(model.candidate_units(), pieces.len());
            for (unit, pattern) in patterns.iter().enumerate() {
                assignment.active[unit] = true;
                for (k, &j) in order.iter().enumerate() {
                    assignment.counts[unit][j] = pattern[k];
                }
            }
            assignment
        });

        let outcome = SearchOutcome {
            status,
            assignment,
            nodes: search.nodes,
            elapsed: started.elapsed(),
        };

        tracing::debug!(
            group = %model.key(),
            status = %outcome.status,
            units = outcome.objective(),
            lower_bound,
            nodes = outcome.nodes,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "search finished"
        );

        outcome
    }
}

/// Packs identical pieces in bulk: each piece type fills earlier tubes first.
fn first_fit_decreasing(lengths: &[u64], demand: &[u32], stock: u64) -> Vec<Vec<u32>> {
    let mut units: Vec<(Vec<u32>, u64)> = Vec::new();

    for (j, (&length, &qty)) in lengths.iter().zip(demand).enumerate() {
        let mut left = qty as u64;
        for (pattern, space) in units.iter_mut() {
            if left == 0 {
                break;
            }
            let take = left.min(*space / length);
            pattern[j] += take as u32;
            *space -= take * length;
            left -= take;
        }
        while left > 0 {
            let take = left.min(stock / length);
            let mut pattern = vec![0; lengths.len()];
            pattern[j] = take as u32;
            units.push((pattern, stock - take * length));
            left -= take;
        }
    }

    units.into_iter().map(|(pattern, _)| pattern).collect()
}

struct Search<'a> {
    lengths: &'a [u64],
    stock: u64,
    best: Option<Vec<Vec<u32>>>,
    best_count: usize,
    nodes: u64,
}

struct Frame {
    patterns: PatternIter,
    applied: bool,
}

impl Search<'_> {
    /// Explores the tree. Returns `false` if the deadline cut it short.
    fn run(&mut self, demand: &[u32], lower_bound: usize, expired: &dyn Fn() -> bool) -> bool {
        let mut remaining = demand.to_vec();
        let mut remaining_len: u64 = remaining
            .iter()
            .zip(self.lengths)
            .map(|(&q, &l)| q as u64 * l)
            .sum();

        if remaining_len == 0 {
            self.best = Some(Vec::new());
            self.best_count = 0;
            return true;
        }

        let mut stack = vec![Frame {
            patterns: PatternIter::new(&remaining, self.lengths, self.stock),
            applied: false,
        }];

        while let Some(frame) = stack.last_mut() {
            self.nodes += 1;
            if self.nodes % DEADLINE_POLL_INTERVAL == 0 && expired() {
                return false;
            }

            if frame.applied {
                frame.applied = false;
                for (j, &c) in frame.patterns.counts.iter().enumerate() {
                    remaining[j] += c;
                    remaining_len += c as u64 * self.lengths[j];
                }
            }

            let Some(maximal) = frame.patterns.advance(self.lengths) else {
                stack.pop();
                continue;
            };
            if !maximal {
                continue;
            }

            frame.applied = true;
            for (j, &c) in frame.patterns.counts.iter().enumerate() {
                remaining[j] -= c;
                remaining_len -= c as u64 * self.lengths[j];
            }

            let depth = stack.len();
            if remaining_len == 0 {
                if depth < self.best_count {
                    self.best_count = depth;
                    self.best = Some(stack.iter().map(|f| f.patterns.counts.clone()).collect());
                    if self.best_count <= lower_bound {
                        return true;
                    }
                }
                continue;
            }

            if depth + remaining_len.div_ceil(self.stock) as usize >= self.best_count {
                continue;
            }

            stack.push(Frame {
                patterns: PatternIter::new(&remaining, self.lengths, self.stock),
                applied: false,
            });
        }

        true
    }
}

/// Enumerates every pattern that fits one tube and contains at least one
/// of the longest available piece, in decreasing lexicographic order.
struct PatternIter {
    avail: Vec<u32>,
    counts: Vec<u32>,
    first: usize,
    space: u64,
    started: bool,
}

impl PatternIter {
    fn new(avail: &[u32], lengths: &[u64], stock: u64) -> Self {
        let first = avail.iter().position(|&q| q > 0).unwrap_or(avail.len());
        let mut iter = Self {
            avail: avail.to_vec(),
            counts: vec![0; avail.len()],
            first,
            space: stock,
            started: false,
        };
        // nothing to place, or the longest piece cannot fit at all
        if first == avail.len() || lengths[first] > stock {
            iter.started = true;
        }
        iter
    }

    fn min_count(&self, j: usize) -> u32 {
        if j == self.first { 1 } else { 0 }
    }

    fn fill_from(&mut self, start: usize, lengths: &[u64]) {
        for j in start..self.counts.len() {
            let fit = (self.space / lengths[j]).min(self.avail[j] as u64) as u32;
            self.counts[j] = fit;
            self.space -= fit as u64 * lengths[j];
        }
    }

    fn is_maximal(&self, lengths: &[u64]) -> bool {
        (self.first..self.counts.len())
            .all(|j| self.avail[j] == self.counts[j] || lengths[j] > self.space)
    }

    /// Moves to the next pattern. Returns whether it is maximal, or `None`
    /// once exhausted.
    fn advance(&mut self, lengths: &[u64]) -> Option<bool> {
        if !self.started {
            self.started = true;
            self.fill_from(self.first, lengths);
            return Some(self.is_maximal(lengths));
        }
        if self.first >= self.counts.len() {
            return None;
        }

        let k = (self.first..self.counts.len())
            .rev()
            .find(|&j| self.counts[j] > self.min_count(j))?;
        self.counts[k] -= 1;
        self.space += lengths[k];
        self.fill_from(k + 1, lengths);
        Some(self.is_maximal(lengths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaterialGroup, MaterialKey, Measure, PieceType};

    fn model(stock: u64, pieces: &[(u64, u32)]) -> PatternModel {
        PatternModel::build(MaterialGroup {
            key: MaterialKey::new(Measure::new(2.0).unwrap(), Measure::new(40.0).unwrap()),
            stock_length: stock,
            pieces: pieces
                .iter()
                .map(|&(length, demand)| PieceType { length, demand })
                .collect(),
        })
    }

    fn assert_solved(model: &PatternModel, outcome: &SearchOutcome, expected_units: usize) {
        assert_eq!(outcome.status, SearchStatus::Optimal);
        let assignment = outcome.assignment.as_ref().expect("optimal outcome carries a plan");
        assert_eq!(model.check(assignment), Ok(()));
        assert_eq!(outcome.objective(), Some(expected_units));
    }

    #[test]
    fn test_two_units_for_small_mixed_demand() {
        let m = model(6000, &[(2000, 3), (1500, 2)]);
        let outcome = BranchAndBound::default().solve(&m, None);
        assert_solved(&m, &outcome, 2);
    }

    #[test]
    fn test_beats_first_fit_decreasing() {
        // FFD needs 3 tubes; {500, 300, 200} + {400, 300, 300} needs 2
        let m = model(1000, &[(500, 1), (400, 1), (300, 3), (200, 1)]);
        let ffd = first_fit_decreasing(&[500, 400, 300, 200], &[1, 1, 3, 1], 1000);
        assert_eq!(ffd.len(), 3);

        let outcome = BranchAndBound::default().solve(&m, None);
        assert_solved(&m, &outcome, 2);
    }

    #[test]
    fn test_without_warm_start() {
        let m = model(1000, &[(500, 1), (400, 1), (300, 3), (200, 1)]);
        let outcome = BranchAndBound { warm_start: false }.solve(&m, None);
        assert_solved(&m, &outcome, 2);
    }

    #[test]
    fn test_long_pieces_need_own_tubes() {
        let m = model(6000, &[(3500, 3), (2400, 3)]);
        let outcome = BranchAndBound::default().solve(&m, None);
        assert_solved(&m, &outcome, 3);
    }

    #[test]
    fn test_exact_fit() {
        let m = model(6000, &[(3000, 4), (2000, 3)]);
        let outcome = BranchAndBound::default().solve(&m, None);
        assert_solved(&m, &outcome, 3);
    }

    #[test]
    fn test_unsorted_pieces() {
        let m = model(1000, &[(200, 1), (300, 3), (400, 1), (500, 1)]);
        let outcome = BranchAndBound { warm_start: false }.solve(&m, None);
        assert_solved(&m, &outcome, 2);
    }

    #[test]
    fn test_piece_longer_than_stock_is_infeasible() {
        let m = model(6000, &[(7000, 1), (1000, 2)]);
        let outcome = BranchAndBound::default().solve(&m, None);
        assert_eq!(outcome.status, SearchStatus::Infeasible);
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn test_zero_time_limit_yields_no_result() {
        let m = model(6000, &[(2000, 3), (1500, 2)]);
        let outcome = BranchAndBound::default().solve(&m, Some(Duration::ZERO));
        assert_eq!(outcome.status, SearchStatus::NoResult);
        assert!(outcome.assignment.is_none());
    }

    #[test]
    fn test_empty_model_uses_no_units() {
        let m = model(6000, &[]);
        let outcome = BranchAndBound::default().solve(&m, None);
        assert_eq!(outcome.status, SearchStatus::Optimal);
        assert_eq!(outcome.objective(), Some(0));
    }

    #[test]
    fn test_repeat_runs_agree_on_objective() {
        let m = model(6000, &[(2350, 2), (1720, 3), (1130, 3), (860, 2), (410, 4)]);
        let engine = BranchAndBound::default();
        let first = engine.solve(&m, None);
        let second = engine.solve(&m, None);
        assert_eq!(first.status, SearchStatus::Optimal);
        assert_eq!(first.objective(), second.objective());
        assert_eq!(m.check(first.assignment.as_ref().unwrap()), Ok(()));
        assert!(first.objective().unwrap() >= m.lower_bound());
    }

    #[test]
    fn test_bounded_search_returns_valid_plan() {
        let m = model(
            6000,
            &[(2950, 7), (2100, 9), (1640, 11), (1230, 8), (770, 13), (380, 17)],
        );
        let outcome = BranchAndBound::default().solve(&m, Some(Duration::from_secs(2)));
        assert!(outcome.status.has_solution());
        let assignment = outcome.assignment.as_ref().unwrap();
        assert_eq!(m.check(assignment), Ok(()));
        assert!(assignment.active_units() <= m.candidate_units());
        assert!(assignment.active_units() >= m.lower_bound());
    }

    #[test]
    fn test_timeout_keeps_warm_start_plan() {
        // No tube holds more than two pieces, so 60 is optimal, but the
        // length bound only proves 50 and the tree is far too large to close.
        let m = model(6000, &[(2999, 60), (2001, 60)]);
        assert_eq!(m.lower_bound(), 50);

        let outcome = BranchAndBound::default().solve(&m, Some(Duration::from_millis(200)));
        assert_eq!(outcome.status, SearchStatus::Feasible);
        assert_eq!(outcome.objective(), Some(60));
        assert_eq!(m.check(outcome.assignment.as_ref().unwrap()), Ok(()));
        assert!(outcome.nodes > 0);
    }

    #[test]
    fn test_pattern_iter_lists_maximal_patterns() {
        let lengths = [500, 300, 200];
        let mut iter = PatternIter::new(&[1, 2, 2], &lengths, 1000);
        let mut maximal = Vec::new();
        while let Some(is_max) = iter.advance(&lengths) {
            if is_max {
                maximal.push(iter.counts.clone());
            }
        }
        assert_eq!(maximal, vec![vec![1, 1, 1], vec![1, 0, 2]]);
    }
}
