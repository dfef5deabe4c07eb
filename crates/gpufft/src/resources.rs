// Resources — Device tables owned by an Application
//
// Some passes read a table from device memory:
//
//   Butterfly (LUT on)   — twiddles exp(±2πi·k·r/(span·R)), k < span, r < R
//   Bluestein chirp      — w_k = exp(±πi·(k² mod 2N)/N), k < N
//   Bluestein convolve   — forward FFT of the length-M chirp kernel conj(w)
//
// Tables are computed on the host, uploaded once at initialize and shared
// between passes with the same key. Allocation is all-or-nothing: if any
// upload fails every table allocated so far is freed before the error is
// returned.

use std::collections::HashMap;
use std::f64::consts::PI;

use gpufft_core::{
    BoundPass, BufferHandle, BuildError, DeviceBackend, DeviceResult, Direction, PassKind, Plan,
};
use num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TableKey {
    Twiddle {
        radix: usize,
        span: usize,
        inverse: bool,
    },
    Chirp {
        n: usize,
        inverse: bool,
    },
    Spectrum {
        n: usize,
        m: usize,
        inverse: bool,
    },
}

impl TableKey {
    fn for_pass(pass: &BoundPass) -> Option<Self> {
        let inverse = pass.variant.inverse;
        match pass.variant.kind {
            PassKind::Butterfly { radix } if pass.variant.lut => Some(TableKey::Twiddle {
                radix,
                span: pass.params.span,
                inverse,
            }),
            PassKind::Butterfly { .. } => None,
            PassKind::BluesteinChirpIn | PassKind::BluesteinChirpOut => {
                pass.bluestein.map(|(n, _)| TableKey::Chirp { n, inverse })
            }
            PassKind::BluesteinConvolve => {
                pass.bluestein.map(|(n, m)| TableKey::Spectrum { n, m, inverse })
            }
        }
    }

    fn values(&self) -> Vec<Complex64> {
        match *self {
            TableKey::Twiddle {
                radix,
                span,
                inverse,
            } => twiddles(radix, span, inverse),
            TableKey::Chirp { n, inverse } => chirp(n, inverse),
            TableKey::Spectrum { n, m, inverse } => bluestein_spectrum(n, m, inverse),
        }
    }
}

/// Table buffers of one Application plus the per-pass bindings into them.
#[derive(Debug, Default)]
pub(crate) struct Resources {
    buffers: Vec<BufferHandle>,
    forward_aux: Vec<Option<BufferHandle>>,
    inverse_aux: Vec<Option<BufferHandle>>,
}

impl Resources {
    pub(crate) fn allocate(device: &dyn DeviceBackend, plan: &Plan) -> Result<Self, BuildError> {
        let mut resources = Resources::default();
        let mut tables: HashMap<TableKey, BufferHandle> = HashMap::new();
        let precision = plan.config().precision().table_precision();

        for direction in [Direction::Forward, Direction::Inverse] {
            let Some(passes) = plan.passes(direction) else {
                continue;
            };
            let mut aux = Vec::with_capacity(passes.len());
            for pass in passes {
                let Some(key) = TableKey::for_pass(pass) else {
                    aux.push(None);
                    continue;
                };
                if let Some(handle) = tables.get(&key) {
                    aux.push(Some(*handle));
                    continue;
                }
                let bytes = precision.encode_complex(&key.values());
                match upload(device, &bytes) {
                    Ok(handle) => {
                        resources.buffers.push(handle);
                        tables.insert(key, handle);
                        aux.push(Some(handle));
                    }
                    Err(err) => {
                        log::warn!(
                            "table upload of {} bytes failed ({err}); releasing {} tables",
                            bytes.len(),
                            resources.buffers.len()
                        );
                        resources.release(device);
                        return Err(err.into());
                    }
                }
            }
            match direction {
                Direction::Forward => resources.forward_aux = aux,
                Direction::Inverse => resources.inverse_aux = aux,
            }
        }
        log::debug!("uploaded {} table buffers", resources.buffers.len());
        Ok(resources)
    }

    /// Table bound to pass `index` of `direction`.
    pub(crate) fn aux(&self, direction: Direction, index: usize) -> Option<BufferHandle> {
        let aux = match direction {
            Direction::Forward => &self.forward_aux,
            Direction::Inverse => &self.inverse_aux,
        };
        aux.get(index).copied().flatten()
    }

    pub(crate) fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub(crate) fn release(&mut self, device: &dyn DeviceBackend) {
        for buffer in self.buffers.drain(..) {
            device.free_buffer(buffer);
        }
        self.forward_aux.clear();
        self.inverse_aux.clear();
    }
}

fn upload(device: &dyn DeviceBackend, bytes: &[u8]) -> DeviceResult<BufferHandle> {
    let buffer = device.allocate(bytes.len())?;
    if let Err(err) = device.write_buffer(buffer, 0, bytes) {
        device.free_buffer(buffer);
        return Err(err);
    }
    Ok(buffer)
}

fn sign(inverse: bool) -> f64 {
    if inverse {
        1.0
    } else {
        -1.0
    }
}

/// Twiddle table of one Stockham stage; entry `k * radix + r`.
pub(crate) fn twiddles(radix: usize, span: usize, inverse: bool) -> Vec<Complex64> {
    let theta = sign(inverse) * 2.0 * PI / (span * radix) as f64;
    (0..span)
        .flat_map(|k| (0..radix).map(move |r| Complex64::from_polar(1.0, theta * (k * r) as f64)))
        .collect()
}

/// Bluestein chirp of length `n`.
pub(crate) fn chirp(n: usize, inverse: bool) -> Vec<Complex64> {
    let period = 2 * n as u128;
    (0..n)
        .map(|k| {
            let phase = ((k as u128 * k as u128) % period) as f64;
            Complex64::from_polar(1.0, sign(inverse) * PI * phase / n as f64)
        })
        .collect()
}

/// Forward FFT of the conjugate chirp wrapped into length `m`.
pub(crate) fn bluestein_spectrum(n: usize, m: usize, inverse: bool) -> Vec<Complex64> {
    let w = chirp(n, inverse);
    let mut kernel = vec![Complex64::new(0.0, 0.0); m];
    kernel[0] = w[0].conj();
    for j in 1..n {
        kernel[j] = w[j].conj();
        kernel[m - j] = w[j].conj();
    }
    fft_pow2(&mut kernel, -1.0);
    kernel
}

/// In-place iterative radix-2 FFT; `data.len()` must be a power of two.
fn fft_pow2(data: &mut [Complex64], sign: f64) {
    let n = data.len();
    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let w = Complex64::from_polar(1.0, sign * 2.0 * PI * k as f64 / len as f64);
                let u = data[start + k];
                let v = data[start + k + half] * w;
                data[start + k] = u + v;
                data[start + k + half] = u - v;
            }
        }
        len <<= 1;
    }
}
