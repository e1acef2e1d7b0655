use crate::error::ValidationError;
use crate::types::{DemandRecord, MaterialGroup, MaterialKey, PieceType};
use std::collections::BTreeMap;

/// Most pieces one material group may demand. Every piece is a candidate
/// tube in the model, so this bounds model size and memory.
pub const MAX_GROUP_PIECES: u64 = 100_000;

#[derive(Default)]
struct GroupTotals {
    pieces: u64,
    length: u64,
}

/// Validates demand rows and groups them by material key.
///
/// Groups come back ordered by thickness, then diameter. Inside a group,
/// rows with the same length are merged and pieces are sorted longest
/// first, ties keeping input order. The first invalid row fails the whole
/// batch.
pub fn normalize(
    records: &[DemandRecord],
) -> Result<BTreeMap<MaterialKey, MaterialGroup>, ValidationError> {
    let mut groups: BTreeMap<MaterialKey, MaterialGroup> = BTreeMap::new();
    let mut totals: BTreeMap<MaterialKey, GroupTotals> = BTreeMap::new();

    for (idx, record) in records.iter().enumerate() {
        let row = idx + 1;
        validate(row, record)?;

        let key = record.key();
        let stock_length = record.standard_length as u64;
        let length = record.required_length as u64;
        let demand = record.demand as u32;

        let group = groups.entry(key).or_insert_with(|| MaterialGroup {
            key,
            stock_length,
            pieces: Vec::new(),
        });

        if group.stock_length != stock_length {
            return Err(ValidationError::InconsistentStockLength {
                row,
                key,
                expected: group.stock_length as i64,
                found: record.standard_length,
            });
        }

        let total = totals.entry(key).or_default();
        total.pieces += demand as u64;
        if total.pieces > MAX_GROUP_PIECES {
            return Err(ValidationError::TooManyPieces {
                row,
                key,
                limit: MAX_GROUP_PIECES,
            });
        }
        total.length = length
            .checked_mul(demand as u64)
            .and_then(|l| total.length.checked_add(l))
            .ok_or(ValidationError::GroupLengthOverflow { row, key })?;

        match group.pieces.iter_mut().find(|p| p.length == length) {
            Some(piece) => {
                piece.demand = piece.demand.checked_add(demand).ok_or(
                    ValidationError::DemandTooLarge {
                        row,
                        demand: record.demand,
                    },
                )?;
            }
            None => group.pieces.push(PieceType { length, demand }),
        }
    }

    for group in groups.values_mut() {
        // sort_by is stable, so equal lengths keep first-seen order
        group.pieces.sort_by(|a, b| b.length.cmp(&a.length));
    }

    tracing::debug!(
        rows = records.len(),
        groups = groups.len(),
        "normalized demand"
    );

    Ok(groups)
}

fn validate(row: usize, record: &DemandRecord) -> Result<(), ValidationError> {
    if record.required_length <= 0 {
        return Err(ValidationError::NonPositiveLength {
            row,
            length: record.required_length,
        });
    }
    if record.standard_length <= 0 {
        return Err(ValidationError::NonPositiveStockLength {
            row,
            length: record.standard_length,
        });
    }
    if record.demand <= 0 {
        return Err(ValidationError::NonPositiveDemand {
            row,
            demand: record.demand,
        });
    }
    if record.demand > u32::MAX as i64 {
        return Err(ValidationError::DemandTooLarge {
            row,
            demand: record.demand,
        });
    }
    if record.required_length > record.standard_length {
        return Err(ValidationError::LengthExceedsStock {
            row,
            required: record.required_length,
            stock: record.standard_length,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Measure;

    fn record(length: i64, thickness: f64, diameter: f64, demand: i64, stock: i64) -> DemandRecord {
        DemandRecord {
            required_length: length,
            thickness: Measure::new(thickness).unwrap(),
            diameter: Measure::new(diameter).unwrap(),
            demand,
            standard_length: stock,
        }
    }

    #[test]
    fn test_groups_sorted_by_thickness_then_diameter() {
        let records = vec![
            record(1000, 3.0, 20.0, 1, 6000),
            record(1000, 2.0, 50.0, 1, 6000),
            record(1000, 2.0, 40.0, 1, 6000),
        ];
        let groups = normalize(&records).unwrap();
        let keys: Vec<String> = groups.keys().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "thickness 2 mm, diameter 40 mm",
                "thickness 2 mm, diameter 50 mm",
                "thickness 3 mm, diameter 20 mm",
            ]
        );
    }

    #[test]
    fn test_pieces_sorted_longest_first() {
        let records = vec![
            record(1500, 2.0, 40.0, 2, 6000),
            record(2000, 2.0, 40.0, 3, 6000),
            record(500, 2.0, 40.0, 4, 6000),
        ];
        let groups = normalize(&records).unwrap();
        let group = groups.values().next().unwrap();
        let lengths: Vec<u64> = group.pieces.iter().map(|p| p.length).collect();
        assert_eq!(lengths, vec![2000, 1500, 500]);
        assert_eq!(group.stock_length, 6000);
        assert_eq!(group.total_pieces(), 9);
    }

    #[test]
    fn test_duplicate_lengths_merged() {
        let records = vec![
            record(1500, 2.0, 40.0, 2, 6000),
            record(1500, 2.0, 40.0, 5, 6000),
        ];
        let groups = normalize(&records).unwrap();
        let group = groups.values().next().unwrap();
        assert_eq!(
            group.pieces,
            vec![PieceType {
                length: 1500,
                demand: 7
            }]
        );
    }

    #[test]
    fn test_deterministic_grouping() {
        let records = vec![
            record(1200, 1.5, 30.0, 2, 5800),
            record(800, 2.0, 40.0, 1, 6000),
            record(1200, 2.0, 40.0, 3, 6000),
            record(300, 1.5, 30.0, 6, 5800),
        ];
        let a = normalize(&records).unwrap();
        let b = normalize(&records).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_length_exceeds_stock_rejected() {
        let records = vec![record(7000, 2.0, 40.0, 1, 6000)];
        let err = normalize(&records).unwrap_err();
        assert_eq!(
            err,
            ValidationError::LengthExceedsStock {
                row: 1,
                required: 7000,
                stock: 6000
            }
        );
    }

    #[test]
    fn test_non_positive_demand_rejected() {
        let records = vec![
            record(1000, 2.0, 40.0, 1, 6000),
            record(1000, 2.0, 40.0, 0, 6000),
        ];
        let err = normalize(&records).unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveDemand { row: 2, demand: 0 });
    }

    #[test]
    fn test_non_positive_lengths_rejected() {
        assert!(matches!(
            normalize(&[record(0, 2.0, 40.0, 1, 6000)]),
            Err(ValidationError::NonPositiveLength { row: 1, .. })
        ));
        assert!(matches!(
            normalize(&[record(100, 2.0, 40.0, 1, -6000)]),
            Err(ValidationError::NonPositiveStockLength { row: 1, .. })
        ));
    }

    #[test]
    fn test_inconsistent_stock_length_rejected() {
        let records = vec![
            record(1000, 1.0, 20.0, 2, 6000),
            record(1000, 2.0, 40.0, 1, 6000),
            record(900, 2.0, 40.0, 1, 5000),
        ];
        let err = normalize(&records).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InconsistentStockLength {
                row: 3,
                expected: 6000,
                found: 5000,
                ..
            }
        ));
    }

    #[test]
    fn test_group_length_overflow_rejected() {
        let huge = 4_000_000_000_000_000_000;
        let records = vec![record(huge, 2.0, 40.0, 5, huge)];
        let err = normalize(&records).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::GroupLengthOverflow { row: 1, .. }
        ));
    }

    #[test]
    fn test_group_length_overflow_across_rows() {
        let big = 2_000_000_000_000_000_000;
        let records = vec![
            record(big, 2.0, 40.0, 5, big),
            record(big - 1, 2.0, 40.0, 5, big),
            record(1000, 3.0, 40.0, 4, big),
        ];
        assert!(matches!(
            normalize(&records),
            Err(ValidationError::GroupLengthOverflow { row: 2, .. })
        ));
    }

    #[test]
    fn test_too_many_pieces_rejected() {
        let records = vec![
            record(7, 2.0, 40.0, MAX_GROUP_PIECES as i64 - 10, 6000),
            record(9, 2.0, 40.0, 11, 6000),
        ];
        let err = normalize(&records).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooManyPieces {
                row: 2,
                limit: MAX_GROUP_PIECES,
                ..
            }
        ));

        let at_limit = vec![
            record(7, 2.0, 40.0, MAX_GROUP_PIECES as i64 - 10, 6000),
            record(9, 2.0, 40.0, 10, 6000),
        ];
        assert!(normalize(&at_limit).is_ok());
    }

    #[test]
    fn test_piece_limit_is_per_group() {
        let records = vec![
            record(7, 2.0, 40.0, MAX_GROUP_PIECES as i64, 6000),
            record(7, 3.0, 40.0, MAX_GROUP_PIECES as i64, 6000),
        ];
        assert_eq!(normalize(&records).unwrap().len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize(&[]).unwrap().is_empty());
    }
}
