use std::fmt;

use half::f16;
use num_complex::Complex64;

// Precision — Numeric storage formats for transform data
//
// Every transform runs in one precision. The precision fixes the byte size of
// each scalar in device memory and therefore the upload capacity of a
// workgroup (shared-memory bytes / complex element size):
//
//   Half   — 16-bit IEEE half float, stored through the `half` crate
//   Single — 32-bit float, the default
//   Double — 64-bit float, only when the device class reports support
//
// Scalars are always little-endian in device buffers. Host-side arithmetic is
// done in f64 and narrowed on store.

/// Numeric precision of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    Half,
    #[default]
    Single,
    Double,
}

impl Precision {
    /// Size of one real scalar in bytes.
    pub fn scalar_bytes(&self) -> usize {
        match self {
            Precision::Half => 2,
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }

    /// Size of one interleaved complex element in bytes.
    pub fn complex_bytes(&self) -> usize {
        2 * self.scalar_bytes()
    }

    /// Precision used to store precomputed tables (twiddle LUTs, chirps,
    /// Bluestein spectra). Half transforms keep their tables in single.
    pub fn table_precision(&self) -> Precision {
        match self {
            Precision::Half => Precision::Single,
            other => *other,
        }
    }

    /// Absolute round-trip tolerance for unit-magnitude data.
    pub fn tolerance(&self) -> f64 {
        match self {
            Precision::Half => 5e-2,
            Precision::Single => 1e-5,
            Precision::Double => 1e-9,
        }
    }

    /// Bound on `|x - y| / |x|` (L2 norms) after a forward + inverse round trip.
    pub fn relative_tolerance(&self) -> f64 {
        match self {
            Precision::Half => 1e-2,
            Precision::Single => 1e-5,
            Precision::Double => 1e-12,
        }
    }

    /// Load the scalar at `index` (in scalars, not bytes).
    pub fn read_scalar(&self, bytes: &[u8], index: usize) -> f64 {
        let size = self.scalar_bytes();
        let at = index * size;
        let raw = &bytes[at..at + size];
        match self {
            Precision::Half => f16::from_le_bytes([raw[0], raw[1]]).to_f64(),
            Precision::Single => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            Precision::Double => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                f64::from_le_bytes(b)
            }
        }
    }

    /// Store `value` at scalar `index`, rounding to this precision.
    pub fn write_scalar(&self, bytes: &mut [u8], index: usize, value: f64) {
        let size = self.scalar_bytes();
        let at = index * size;
        let dst = &mut bytes[at..at + size];
        match self {
            Precision::Half => dst.copy_from_slice(&f16::from_f64(value).to_le_bytes()),
            Precision::Single => dst.copy_from_slice(&(value as f32).to_le_bytes()),
            Precision::Double => dst.copy_from_slice(&value.to_le_bytes()),
        }
    }

    /// Encode real scalars into a little-endian byte vector.
    pub fn encode_real(&self, values: &[f64]) -> Vec<u8> {
        let mut out = vec![0u8; values.len() * self.scalar_bytes()];
        for (i, v) in values.iter().enumerate() {
            self.write_scalar(&mut out, i, *v);
        }
        out
    }

    /// Decode every scalar in `bytes`.
    pub fn decode_real(&self, bytes: &[u8]) -> Vec<f64> {
        (0..bytes.len() / self.scalar_bytes())
            .map(|i| self.read_scalar(bytes, i))
            .collect()
    }

    /// Encode complex values as interleaved (re, im) pairs.
    pub fn encode_complex(&self, values: &[Complex64]) -> Vec<u8> {
        let mut out = vec![0u8; values.len() * self.complex_bytes()];
        for (i, v) in values.iter().enumerate() {
            self.write_scalar(&mut out, 2 * i, v.re);
            self.write_scalar(&mut out, 2 * i + 1, v.im);
        }
        out
    }

    /// Decode interleaved (re, im) pairs.
    pub fn decode_complex(&self, bytes: &[u8]) -> Vec<Complex64> {
        (0..bytes.len() / self.complex_bytes())
            .map(|i| {
                Complex64::new(
                    self.read_scalar(bytes, 2 * i),
                    self.read_scalar(bytes, 2 * i + 1),
                )
            })
            .collect()
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Precision::Half => "f16",
            Precision::Single => "f32",
            Precision::Double => "f64",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(Precision::Half.scalar_bytes(), 2);
        assert_eq!(Precision::Single.complex_bytes(), 8);
        assert_eq!(Precision::Double.complex_bytes(), 16);
    }

    #[test]
    fn test_table_precision() {
        assert_eq!(Precision::Half.table_precision(), Precision::Single);
        assert_eq!(Precision::Double.table_precision(), Precision::Double);
    }

    #[test]
    fn test_half_rounding() {
        let bytes = Precision::Half.encode_real(&[0.1, -2.5]);
        assert_eq!(bytes.len(), 4);
        let back = Precision::Half.decode_real(&bytes);
        assert!((back[0] - 0.1).abs() < 1e-3);
        assert_eq!(back[1], -2.5);
    }

    #[test]
    fn test_complex_interleaving() {
        let bytes = Precision::Double.encode_complex(&[Complex64::new(1.0, -3.0)]);
        assert_eq!(Precision::Double.read_scalar(&bytes, 0), 1.0);
        assert_eq!(Precision::Double.read_scalar(&bytes, 1), -3.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Precision::Single.to_string(), "f32");
    }
}
