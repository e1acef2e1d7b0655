use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A material attribute (thickness or diameter) in millimetres.
///
/// Wraps a finite `f64` with a total order so it can key sorted maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Measure(f64);

impl Measure {
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // -0.0 and 0.0 must land in the same group
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Measure {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Measure {}

impl PartialOrd for Measure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Measure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Measure {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.fract() == 0.0 && self.0.abs() < 1e15 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Groups demand that shares one stock length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialKey {
    pub thickness: Measure,
    pub diameter: Measure,
}

impl MaterialKey {
    pub fn new(thickness: Measure, diameter: Measure) -> Self {
        Self {
            thickness,
            diameter,
        }
    }
}

impl std::fmt::Display for MaterialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "thickness {} mm, diameter {} mm",
            self.thickness, self.diameter
        )
    }
}

/// One row of demand as it arrives from the outside world.
///
/// Values are kept signed so that the normalizer, not the parser, decides
/// what counts as a usable length or quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    #[serde(alias = "Required Length (mm)")]
    pub required_length: i64,
    #[serde(alias = "Thickness (mm)")]
    pub thickness: Measure,
    #[serde(alias = "Diameter (mm)")]
    pub diameter: Measure,
    #[serde(alias = "Demand")]
    pub demand: i64,
    #[serde(alias = "Standard Tube Length (mm)")]
    pub standard_length: i64,
}

impl DemandRecord {
    pub fn key(&self) -> MaterialKey {
        MaterialKey::new(self.thickness, self.diameter)
    }
}

/// A distinct piece length within a material group and how many are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceType {
    pub length: u64,
    pub demand: u32,
}

/// Validated demand for one material, pieces ordered longest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialGroup {
    pub key: MaterialKey,
    pub stock_length: u64,
    pub pieces: Vec<PieceType>,
}

impl MaterialGroup {
    pub fn total_pieces(&self) -> u64 {
        self.pieces.iter().map(|p| p.demand as u64).sum()
    }

    pub fn total_length(&self) -> u64 {
        self.pieces.iter().map(|p| p.length * p.demand as u64).sum()
    }
}

/// `count` pieces of `length` cut from one tube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternEntry {
    pub count: u32,
    pub length: u64,
}

impl std::fmt::Display for PatternEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x {}mm", self.count, self.length)
    }
}

/// The cuts made on a single stock tube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuttingPlanLine {
    pub key: MaterialKey,
    pub stock_length: u64,
    pub pattern: Vec<PatternEntry>,
    pub scrap: u64,
}

impl CuttingPlanLine {
    pub fn used_length(&self) -> u64 {
        self.pattern.iter().map(|e| e.count as u64 * e.length).sum()
    }

    pub fn piece_count(&self) -> u64 {
        self.pattern.iter().map(|e| e.count as u64).sum()
    }

    /// `"3 x 2000mm + 1 x 1500mm"`
    pub fn cut_plan(&self) -> String {
        self.pattern
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Identical tubes of one group collapsed into a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub key: MaterialKey,
    pub stock_length: u64,
    pub pattern: Vec<PatternEntry>,
    pub scrap: u64,
    pub quantity: usize,
}
