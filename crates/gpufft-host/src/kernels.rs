use std::collections::HashMap;
use std::f64::consts::PI;

use gpufft_core::{
    BufferBinding, BufferHandle, DeviceError, DeviceResult, Dispatch, ElementLayout,
    KernelVariant, PassKind, PassParams, Precision,
};
use num_complex::Complex64;
use rayon::prelude::*;

// Pass interpreter — What a compiled kernel does, evaluated on host memory
//
// A dispatch transforms every line of its destination along one axis. Lines
// are independent and are evaluated in parallel; results are gathered before
// anything is written so a pass may read and write the same buffer.
//
// Reading a half-spectrum binding past its stored extent on axis 0 returns
// the conjugate of the mirrored element; writing past the stored extent is
// dropped. Arithmetic is f64 and results are narrowed to the kernel's
// precision on store.

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Execute one dispatch against the device's buffer table.
pub(crate) fn run_dispatch(
    variant: &KernelVariant,
    dispatch: &Dispatch,
    buffers: &mut HashMap<u64, Vec<u8>>,
) -> DeviceResult<()> {
    let precision = variant.precision;
    let axis = dispatch.params.axis;
    let src = &dispatch.src;
    let dst = &dispatch.dst;

    check_binding(buffers, src, precision, "source")?;
    check_binding(buffers, dst, precision, "destination")?;
    if axis >= dst.shape.dims.len() || axis >= src.shape.dims.len() {
        return Err(DeviceError::Backend(format!(
            "axis {axis} out of range for {}",
            dst.shape
        )));
    }
    let lines = dst.shape.lines(axis);
    if src.shape.lines(axis) != lines {
        return Err(DeviceError::Backend(format!(
            "source {} and destination {} disagree off axis {axis}",
            src.shape, dst.shape
        )));
    }

    let table = match dispatch.aux {
        Some(aux) => Some(decode_table(buffers, aux, precision.table_precision())?),
        None => None,
    };
    let out_len = dst.shape.logical_len(axis);

    let src_bytes = buffer(buffers, src.buffer)?;
    let outputs = (0..lines)
        .into_par_iter()
        .map(|line| {
            let input = read_line(src_bytes, src, precision, axis, line);
            transform_line(variant, &dispatch.params, &input, out_len, table.as_deref())
        })
        .collect::<DeviceResult<Vec<Vec<Complex64>>>>()?;

    let dst_bytes = buffers
        .get_mut(&dst.buffer.0)
        .ok_or(DeviceError::InvalidBuffer(dst.buffer.0))?;
    for (line, values) in outputs.iter().enumerate() {
        write_line(dst_bytes, dst, precision, axis, line, values);
    }
    Ok(())
}

/// Byte copy between two buffers.
pub(crate) fn run_copy(
    buffers: &mut HashMap<u64, Vec<u8>>,
    src: BufferHandle,
    dst: BufferHandle,
    bytes: usize,
) -> DeviceResult<()> {
    if src == dst {
        return Ok(());
    }
    let data = {
        let from = buffer(buffers, src)?;
        if bytes > from.len() {
            return Err(DeviceError::Backend(format!(
                "copy of {bytes} bytes exceeds {src}"
            )));
        }
        from[..bytes].to_vec()
    };
    let to = buffers
        .get_mut(&dst.0)
        .ok_or(DeviceError::InvalidBuffer(dst.0))?;
    if bytes > to.len() {
        return Err(DeviceError::Backend(format!(
            "copy of {bytes} bytes exceeds {dst}"
        )));
    }
    to[..bytes].copy_from_slice(&data);
    Ok(())
}

fn buffer(buffers: &HashMap<u64, Vec<u8>>, handle: BufferHandle) -> DeviceResult<&Vec<u8>> {
    buffers
        .get(&handle.0)
        .ok_or(DeviceError::InvalidBuffer(handle.0))
}

fn check_binding(
    buffers: &HashMap<u64, Vec<u8>>,
    binding: &BufferBinding,
    precision: Precision,
    role: &str,
) -> DeviceResult<()> {
    let len = buffer(buffers, binding.buffer)?.len();
    let needed = binding.offset + binding.shape.bytes(precision, binding.layout);
    if needed > len {
        return Err(DeviceError::Backend(format!(
            "{role} binding needs {needed} bytes of {} but it holds {len}",
            binding.buffer
        )));
    }
    Ok(())
}

fn decode_table(
    buffers: &HashMap<u64, Vec<u8>>,
    handle: BufferHandle,
    precision: Precision,
) -> DeviceResult<Vec<Complex64>> {
    Ok(precision.decode_complex(buffer(buffers, handle)?))
}

fn element_index(binding: &BufferBinding, axis: usize, line: usize, j: usize) -> usize {
    let inner = binding.shape.stride(axis);
    let outer = line / inner;
    (outer * binding.shape.dims[axis] + j) * inner + line % inner
}

fn load(bytes: &[u8], binding: &BufferBinding, precision: Precision, e: usize) -> Complex64 {
    let bytes = &bytes[binding.offset..];
    match binding.layout {
        ElementLayout::Interleaved => Complex64::new(
            precision.read_scalar(bytes, 2 * e),
            precision.read_scalar(bytes, 2 * e + 1),
        ),
        ElementLayout::Planar => {
            let plane = binding.shape.elements();
            Complex64::new(
                precision.read_scalar(bytes, e),
                precision.read_scalar(bytes, plane + e),
            )
        }
        ElementLayout::Real => Complex64::new(precision.read_scalar(bytes, e), 0.0),
    }
}

fn store(bytes: &mut [u8], binding: &BufferBinding, precision: Precision, e: usize, v: Complex64) {
    let bytes = &mut bytes[binding.offset..];
    match binding.layout {
        ElementLayout::Interleaved => {
            precision.write_scalar(bytes, 2 * e, v.re);
            precision.write_scalar(bytes, 2 * e + 1, v.im);
        }
        ElementLayout::Planar => {
            let plane = binding.shape.elements();
            precision.write_scalar(bytes, e, v.re);
            precision.write_scalar(bytes, plane + e, v.im);
        }
        ElementLayout::Real => precision.write_scalar(bytes, e, v.re),
    }
}

fn read_line(
    bytes: &[u8],
    binding: &BufferBinding,
    precision: Precision,
    axis: usize,
    line: usize,
) -> Vec<Complex64> {
    let len = binding.shape.logical_len(axis);
    let extent = binding.shape.extent(axis);
    let half = axis == 0 && binding.shape.half_spectrum.is_some();
    (0..len)
        .map(|j| {
            if j < extent {
                load(bytes, binding, precision, element_index(binding, axis, line, j))
            } else if half {
                load(bytes, binding, precision, element_index(binding, axis, line, len - j)).conj()
            } else {
                ZERO
            }
        })
        .collect()
}

fn write_line(
    bytes: &mut [u8],
    binding: &BufferBinding,
    precision: Precision,
    axis: usize,
    line: usize,
    values: &[Complex64],
) {
    let extent = binding.shape.extent(axis).min(values.len());
    for (j, v) in values.iter().take(extent).enumerate() {
        store(bytes, binding, precision, element_index(binding, axis, line, j), *v);
    }
}

fn transform_line(
    variant: &KernelVariant,
    params: &PassParams,
    input: &[Complex64],
    out_len: usize,
    table: Option<&[Complex64]>,
) -> DeviceResult<Vec<Complex64>> {
    let sign = if variant.inverse { 1.0 } else { -1.0 };
    let mut out = match variant.kind {
        PassKind::Butterfly { radix } => {
            let lut = if variant.lut { table } else { None };
            stockham(input, radix, params.span, sign, lut)?
        }
        PassKind::BluesteinChirpIn => {
            let chirp = require_table(table, input.len(), variant)?;
            let mut out = vec![ZERO; out_len];
            for (k, x) in input.iter().enumerate() {
                out[k] = x * chirp[k];
            }
            out
        }
        PassKind::BluesteinConvolve => {
            let spectrum = require_table(table, input.len(), variant)?;
            input.iter().zip(spectrum).map(|(x, s)| x * s).collect()
        }
        PassKind::BluesteinChirpOut => {
            let chirp = require_table(table, out_len, variant)?;
            let m = input.len() as f64;
            (0..out_len).map(|k| input[k] * chirp[k] / m).collect()
        }
    };
    if params.scale != 1.0 {
        for v in out.iter_mut() {
            *v *= params.scale;
        }
    }
    Ok(out)
}

fn require_table<'a>(
    table: Option<&'a [Complex64]>,
    len: usize,
    variant: &KernelVariant,
) -> DeviceResult<&'a [Complex64]> {
    match table {
        Some(t) if t.len() >= len => Ok(t),
        _ => Err(DeviceError::Backend(format!(
            "{variant} needs a table of {len} entries"
        ))),
    }
}

/// One Stockham radix stage of span `span`: natural-order input, and after
/// the last stage of a run, natural-order output.
fn stockham(
    input: &[Complex64],
    radix: usize,
    span: usize,
    sign: f64,
    lut: Option<&[Complex64]>,
) -> DeviceResult<Vec<Complex64>> {
    let n = input.len();
    if radix == 1 {
        return Ok(input.to_vec());
    }
    if n % radix != 0 || (n / radix) % span != 0 {
        return Err(DeviceError::Backend(format!(
            "radix {radix} span {span} does not divide line length {n}"
        )));
    }
    if let Some(t) = lut {
        if t.len() < span * radix {
            return Err(DeviceError::Backend(format!(
                "twiddle table too short for radix {radix} span {span}"
            )));
        }
    }

    let stride = n / radix;
    let theta = sign * 2.0 * PI / (span * radix) as f64;
    let roots: Vec<Complex64> = (0..radix)
        .map(|t| Complex64::from_polar(1.0, sign * 2.0 * PI * t as f64 / radix as f64))
        .collect();

    let mut out = vec![ZERO; n];
    let mut v = vec![ZERO; radix];
    for j in 0..stride {
        let k = j % span;
        for (r, slot) in v.iter_mut().enumerate() {
            let twiddle = match lut {
                Some(t) => t[k * radix + r],
                None => Complex64::from_polar(1.0, theta * (k * r) as f64),
            };
            *slot = input[j + r * stride] * twiddle;
        }
        let base = (j / span) * span * radix + k;
        for q in 0..radix {
            let mut acc = ZERO;
            for (r, x) in v.iter().enumerate() {
                acc += x * roots[(r * q) % radix];
            }
            out[base + q * span] = acc;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dft(x: &[Complex64], sign: f64) -> Vec<Complex64> {
        let n = x.len();
        (0..n)
            .map(|k| {
                x.iter()
                    .enumerate()
                    .map(|(j, v)| {
                        v * Complex64::from_polar(1.0, sign * 2.0 * PI * (j * k) as f64 / n as f64)
                    })
                    .sum()
            })
            .collect()
    }

    fn run_stages(x: &[Complex64], radices: &[usize], sign: f64) -> Vec<Complex64> {
        let mut data = x.to_vec();
        let mut span = 1;
        for &r in radices {
            data = stockham(&data, r, span, sign, None).unwrap();
            span *= r;
        }
        data
    }

    fn signal(n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect()
    }

    #[test]
    fn test_mixed_radix_matches_dft() {
        let x = signal(60);
        let expected = dft(&x, -1.0);
        for radices in [vec![15, 4], vec![4, 15], vec![3, 5, 2, 2]] {
            let got = run_stages(&x, &radices, -1.0);
            for (a, b) in got.iter().zip(&expected) {
                assert!((a - b).norm() < 1e-9, "{radices:?}");
            }
        }
    }

    #[test]
    fn test_inverse_sign() {
        let x = signal(16);
        let got = run_stages(&x, &[4, 4], 1.0);
        let expected = dft(&x, 1.0);
        for (a, b) in got.iter().zip(&expected) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_lut_matches_computed() {
        let x = signal(32);
        let lut: Vec<Complex64> = (0..8)
            .flat_map(|k| {
                (0..4).map(move |r| {
                    Complex64::from_polar(1.0, -2.0 * PI * (k * r) as f64 / 32.0)
                })
            })
            .collect();
        let computed = stockham(&x, 4, 8, -1.0, None).unwrap();
        let tabled = stockham(&x, 4, 8, -1.0, Some(&lut)).unwrap();
        for (a, b) in computed.iter().zip(&tabled) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_bad_geometry() {
        assert!(stockham(&signal(10), 4, 1, -1.0, None).is_err());
    }
}
