//! Fixed-width binary encoding of data points
//!
//! Each point occupies 8 bytes: the coordinate followed by the intensity,
//! both as big-endian IEEE-754 single-precision floats. Records carry no
//! header, so a record is only meaningful together with its point count.

use crate::core::error::{Result, ScanStoreError};
use crate::core::scan::DataPoint;

/// Encoded size of one data point in bytes
pub const POINT_SIZE: usize = 8;

/// Encoded size of `count` data points
///
/// Only for counts backed by an in-memory slice or an already validated
/// index entry; untrusted counts go through [`checked_encoded_len`].
pub fn encoded_len(count: usize) -> usize {
    count * POINT_SIZE
}

/// Encoded size of `count` data points, `None` on overflow
pub fn checked_encoded_len(count: usize) -> Option<usize> {
    count.checked_mul(POINT_SIZE)
}

/// Encode `points` into `out`, which must be exactly `encoded_len(points.len())` bytes
pub fn encode_into(points: &[DataPoint], out: &mut [u8]) {
    debug_assert_eq!(out.len(), encoded_len(points.len()));

    for (point, chunk) in points.iter().zip(out.chunks_exact_mut(POINT_SIZE)) {
        chunk[0..4].copy_from_slice(&(point.mz as f32).to_be_bytes());
        chunk[4..8].copy_from_slice(&(point.intensity as f32).to_be_bytes());
    }
}

/// Decode a record back into data points, preserving order
pub fn decode(bytes: &[u8]) -> Result<Vec<DataPoint>> {
    if bytes.len() % POINT_SIZE != 0 {
        return Err(ScanStoreError::MalformedRecord(bytes.len()));
    }

    Ok(bytes
        .chunks_exact(POINT_SIZE)
        .map(|chunk| {
            let mz = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let intensity = f32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            DataPoint::new(mz as f64, intensity as f64)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_coordinate_then_intensity() {
        let points = [DataPoint::new(1.0, 2.0)];
        let mut out = [0u8; POINT_SIZE];
        encode_into(&points, &mut out);

        assert_eq!(&out[0..4], &1.0f32.to_be_bytes());
        assert_eq!(&out[4..8], &2.0f32.to_be_bytes());
    }

    #[test]
    fn test_precision_narrowed_to_f32() {
        let points = [DataPoint::new(100.123456789, 0.1)];
        let mut out = vec![0u8; encoded_len(1)];
        encode_into(&points, &mut out);

        let decoded = decode(&out).unwrap();
        assert_eq!(decoded[0].mz, 100.123456789f64 as f32 as f64);
        assert_eq!(decoded[0].intensity, 0.1f64 as f32 as f64);
    }

    #[test]
    fn test_empty_record() {
        let mut out = [];
        encode_into(&[], &mut out);
        assert!(decode(&out).unwrap().is_empty());
    }

    #[test]
    fn test_checked_len_overflow() {
        assert_eq!(checked_encoded_len(3), Some(24));
        assert_eq!(checked_encoded_len(usize::MAX / POINT_SIZE + 1), None);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let result = decode(&[0u8; 12]);
        assert!(matches!(result, Err(ScanStoreError::MalformedRecord(12))));
    }
}
