//! Scan data model: data points, ranges and scan handles

use crate::core::store::StorageId;
use serde::{Deserialize, Serialize};

/// Logical scan number, unique within a session
pub type ScanNumber = u32;

/// Opaque resolution level; `0` is reserved as the "all levels" wildcard
pub type Level = u32;

/// Query level meaning "every scan regardless of level"
pub const ALL_LEVELS: Level = 0;

/// One (coordinate, intensity) pair
///
/// Stored with single precision; values read back from a store are the
/// `f32` rounding of what was written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Coordinate (m/z)
    pub mz: f64,
    /// Intensity
    pub intensity: f64,
}

impl DataPoint {
    pub fn new(mz: f64, intensity: f64) -> Self {
        DataPoint { mz, intensity }
    }
}

/// Closed interval `[min, max]`
///
/// `Range` is `Copy`, so every value handed out is an independent copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Create a range; the bounds are reordered if given backwards
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Range { min: a, max: b }
        } else {
            Range { min: b, max: a }
        }
    }

    /// Zero-width range at `value`
    pub fn point(value: f64) -> Self {
        Range {
            min: value,
            max: value,
        }
    }

    /// Range covering every finite and infinite value
    pub fn unbounded() -> Self {
        Range {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    /// Inclusive containment
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Grow to cover `other`
    pub fn extend(&mut self, other: &Range) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Grow to cover `value`
    pub fn extend_value(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Per-scan figures computed once from the data points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Number of data points stored for the scan
    pub point_count: usize,

    /// Point with the highest intensity (the base peak)
    pub highest: Option<DataPoint>,

    /// Sum of all intensities
    pub total_signal: f64,

    /// Coordinate range spanned by the points
    pub mz_range: Option<Range>,
}

impl ScanSummary {
    /// Compute the summary from a scan's data points
    pub fn from_points(points: &[DataPoint]) -> Self {
        let mut summary = ScanSummary {
            point_count: points.len(),
            ..ScanSummary::default()
        };

        for point in points {
            summary.total_signal += point.intensity;

            match summary.highest {
                Some(best) if best.intensity >= point.intensity => {}
                _ => summary.highest = Some(*point),
            }

            match summary.mz_range.as_mut() {
                Some(range) => range.extend_value(point.mz),
                None => summary.mz_range = Some(Range::point(point.mz)),
            }
        }

        summary
    }
}

/// In-memory handle for a registered scan
///
/// Holds the scan's metadata and the storage ID of its data points, but
/// never the points themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHandle {
    pub scan_number: ScanNumber,
    pub level: Level,
    /// Time coordinate (retention time)
    pub time: f64,
    pub storage_id: StorageId,
    pub summary: ScanSummary,
}

impl ScanHandle {
    /// Create a handle with an empty summary
    pub fn new(scan_number: ScanNumber, level: Level, time: f64, storage_id: StorageId) -> Self {
        ScanHandle {
            scan_number,
            level,
            time,
            storage_id,
            summary: ScanSummary::default(),
        }
    }

    /// Attach precomputed per-scan figures
    pub fn with_summary(mut self, summary: ScanSummary) -> Self {
        self.summary = summary;
        self
    }

    /// Highest intensity in the scan, if it has any points
    pub fn highest_intensity(&self) -> Option<f64> {
        self.summary.highest.map(|p| p.intensity)
    }

    pub fn total_signal(&self) -> f64 {
        self.summary.total_signal
    }

    pub fn mz_range(&self) -> Option<Range> {
        self.summary.mz_range
    }

    /// Whether this scan belongs to `level` (`ALL_LEVELS` matches everything)
    pub fn matches_level(&self, level: Level) -> bool {
        level == ALL_LEVELS || self.level == level
    }
}

/// A scan as handed over by a producer, data points included
#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub scan_number: ScanNumber,
    pub level: Level,
    pub time: f64,
    pub points: Vec<DataPoint>,
}

impl ScanRecord {
    pub fn new(scan_number: ScanNumber, level: Level, time: f64, points: Vec<DataPoint>) -> Self {
        ScanRecord {
            scan_number,
            level,
            time,
            points,
        }
    }
}
