use crate::error::FailureReason;
use crate::model::{Assignment, PatternModel};
use crate::types::{CuttingPlanLine, PatternEntry};

/// Turns a solved assignment into one plan line per active unit.
///
/// Lines follow candidate-unit order and patterns follow the model's piece
/// order. Inactive units are dropped. Scrap is the stock length minus what
/// was cut, computed here rather than taken from the search.
pub fn extract(
    model: &PatternModel,
    assignment: &Assignment,
) -> Result<Vec<CuttingPlanLine>, FailureReason> {
    model
        .check(assignment)
        .map_err(|v| FailureReason::InvalidAssignment(v.to_string()))?;

    let stock_length = model.stock_length();
    let lines = assignment
        .active
        .iter()
        .zip(&assignment.counts)
        .filter(|(active, _)| **active)
        .map(|(_, counts)| {
            let pattern: Vec<PatternEntry> = counts
                .iter()
                .zip(model.pieces())
                .filter(|(count, _)| **count > 0)
                .map(|(&count, piece)| PatternEntry {
                    count,
                    length: piece.length,
                })
                .collect();
            let used: u64 = pattern.iter().map(|e| e.count as u64 * e.length).sum();
            CuttingPlanLine {
                key: model.key(),
                stock_length,
                pattern,
                // check() already bounded used by stock_length
                scrap: stock_length - used,
            }
        })
        .collect();

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MaterialGroup, MaterialKey, Measure, PieceType};

    fn model() -> PatternModel {
        PatternModel::build(MaterialGroup {
            key: MaterialKey::new(Measure::new(2.0).unwrap(), Measure::new(40.0).unwrap()),
            stock_length: 6000,
            pieces: vec![
                PieceType {
                    length: 2000,
                    demand: 3,
                },
                PieceType {
                    length: 1500,
                    demand: 2,
                },
            ],
        })
    }

    #[test]
    fn test_lines_follow_unit_order_and_skip_inactive() {
        let m = model();
        let mut a = Assignment::empty(5, 2);
        a.active[1] = true;
        a.counts[1] = vec![1, 2];
        a.active[4] = true;
        a.counts[4] = vec![2, 0];

        let lines = extract(&m, &a).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].cut_plan(), "1 x 2000mm + 2 x 1500mm");
        assert_eq!(lines[0].scrap, 1000);
        assert_eq!(lines[1].cut_plan(), "2 x 2000mm");
        assert_eq!(lines[1].scrap, 2000);
        assert!(lines.iter().all(|l| l.stock_length == 6000));
    }

    #[test]
    fn test_active_unit_without_cuts_is_all_scrap() {
        let m = model();
        let mut a = Assignment::empty(5, 2);
        a.active[0] = true;
        a.counts[0] = vec![3, 0];
        a.active[1] = true;
        a.counts[1] = vec![0, 2];
        a.active[2] = true;

        let lines = extract(&m, &a).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].pattern.is_empty());
        assert_eq!(lines[2].scrap, 6000);
    }

    #[test]
    fn test_invalid_assignment_rejected() {
        let m = model();
        let mut a = Assignment::empty(5, 2);
        a.active[0] = true;
        a.counts[0] = vec![3, 2];

        let err = extract(&m, &a).unwrap_err();
        assert!(matches!(err, FailureReason::InvalidAssignment(_)));
    }
}
