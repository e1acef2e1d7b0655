//! Assignment formulation of one material group.
//!
//! Candidate unit `i` stands for a possible stock tube. For each unit and
//! piece type `j` there is an integer `count[i][j]` in `[0, demand[j]]`,
//! and each unit has a boolean `active[i]`. Constraints:
//!
//! - demand satisfaction: `sum_i count[i][j] == demand[j]`
//! - capacity when active: `sum_j count[i][j] * length[j] <= stock` if
//!   `active[i]`, and `== 0` otherwise
//!
//! The objective minimizes `sum_i active[i]`.

use crate::types::{MaterialGroup, MaterialKey, PieceType};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    DemandSatisfaction { piece: usize },
    CapacityWhenActive { unit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    MinimizeActiveUnits,
}

/// A value for every variable of a [`PatternModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// `counts[unit][piece]`
    pub counts: Vec<Vec<u32>>,
    pub active: Vec<bool>,
}

impl Assignment {
    /// Every unit inactive, every count zero.
    pub fn empty(units: usize, piece_types: usize) -> Self {
        Self {
            counts: vec![vec![0; piece_types]; units],
            active: vec![false; units],
        }
    }

    pub fn active_units(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("assignment shape does not match the model ({units} units x {pieces} piece types)")]
    Shape { units: usize, pieces: usize },

    #[error("unit {unit}: count {value} for piece {piece} outside [0, {max}]")]
    Domain {
        unit: usize,
        piece: usize,
        value: u32,
        max: u32,
    },

    #[error("piece {piece}: placed {placed}, demanded {demanded}")]
    Demand {
        piece: usize,
        placed: u64,
        demanded: u64,
    },

    #[error("unit {unit}: {used} mm cut from a {capacity} mm tube")]
    Capacity { unit: usize, used: u64, capacity: u64 },

    #[error("unit {unit}: inactive but carries {used} mm of cuts")]
    InactiveUsed { unit: usize, used: u64 },
}

#[derive(Debug, Clone)]
pub struct PatternModel {
    key: MaterialKey,
    stock_length: u64,
    pieces: Vec<PieceType>,
    candidate_units: usize,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl PatternModel {
    /// Formulates one group. The candidate unit bound is the total number
    /// of demanded pieces: one piece per tube always fits.
    pub fn build(group: MaterialGroup) -> Self {
        let candidate_units = group.total_pieces() as usize;
        let constraints = (0..group.pieces.len())
            .map(|piece| Constraint::DemandSatisfaction { piece })
            .chain((0..candidate_units).map(|unit| Constraint::CapacityWhenActive { unit }))
            .collect();

        tracing::debug!(
            group = %group.key,
            piece_types = group.pieces.len(),
            candidate_units,
            "built pattern model"
        );

        Self {
            key: group.key,
            stock_length: group.stock_length,
            pieces: group.pieces,
            candidate_units,
            constraints,
            objective: Objective::MinimizeActiveUnits,
        }
    }

    pub fn key(&self) -> MaterialKey {
        self.key
    }

    pub fn stock_length(&self) -> u64 {
        self.stock_length
    }

    pub fn pieces(&self) -> &[PieceType] {
        &self.pieces
    }

    pub fn candidate_units(&self) -> usize {
        self.candidate_units
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Domain of `count[_][piece]`.
    pub fn count_domain(&self, piece: usize) -> (u32, u32) {
        (0, self.pieces[piece].demand)
    }

    pub fn total_length(&self) -> u64 {
        self.pieces.iter().map(|p| p.length * p.demand as u64).sum()
    }

    /// No plan can use fewer tubes than this.
    pub fn lower_bound(&self) -> usize {
        if self.stock_length == 0 {
            return 0;
        }
        let by_length = self.total_length().div_ceil(self.stock_length) as usize;
        // two pieces longer than half a tube never share one
        let long_pieces: u64 = self
            .pieces
            .iter()
            .filter(|p| p.length * 2 > self.stock_length)
            .map(|p| p.demand as u64)
            .sum();
        by_length.max(long_pieces as usize)
    }

    pub fn objective_value(&self, assignment: &Assignment) -> usize {
        match self.objective {
            Objective::MinimizeActiveUnits => assignment.active_units(),
        }
    }

    fn unit_length(&self, counts: &[u32]) -> u64 {
        counts
            .iter()
            .zip(&self.pieces)
            .map(|(&c, p)| c as u64 * p.length)
            .sum()
    }

    /// Checks domains and every constraint, reporting the first violation.
    pub fn check(&self, assignment: &Assignment) -> Result<(), Violation> {
        let shape_ok = assignment.active.len() == self.candidate_units
            && assignment.counts.len() == self.candidate_units
            && assignment
                .counts
                .iter()
                .all(|row| row.len() == self.pieces.len());
        if !shape_ok {
            return Err(Violation::Shape {
                units: self.candidate_units,
                pieces: self.pieces.len(),
            });
        }

        for (unit, row) in assignment.counts.iter().enumerate() {
            for (piece, &value) in row.iter().enumerate() {
                let (_, hi) = self.count_domain(piece);
                if value > hi {
                    return Err(Violation::Domain {
                        unit,
                        piece,
                        value,
                        max: hi,
                    });
                }
            }
        }

        for constraint in &self.constraints {
            match *constraint {
                Constraint::DemandSatisfaction { piece } => {
                    let placed: u64 = assignment
                        .counts
                        .iter()
                        .map(|row| row[piece] as u64)
                        .sum();
                    let demanded = self.pieces[piece].demand as u64;
                    if placed != demanded {
                        return Err(Violation::Demand {
                            piece,
                            placed,
                            demanded,
                        });
                    }
                }
                Constraint::CapacityWhenActive { unit } => {
                    let used = self.unit_length(&assignment.counts[unit]);
                    if assignment.active[unit] {
                        if used > self.stock_length {
                            return Err(Violation::Capacity {
                                unit,
                                used,
                                capacity: self.stock_length,
                            });
                        }
                    } else if used != 0 {
                        return Err(Violation::InactiveUsed { unit, used });
                    }
                }
            }
        }

        Ok(())
    }
}
