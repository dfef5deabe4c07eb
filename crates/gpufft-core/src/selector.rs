use std::collections::HashMap;
use std::fmt;

use crate::config::{DeviceLimits, Direction, TransformConfig};
use crate::error::ConfigError;
use crate::precision::Precision;

// Kernel Selector — Decompose a transform into axis passes
//
// Every axis is transformed independently. An axis of length N is either:
//
//   Identity  — N == 1, nothing to do
//   Radix     — N factors into supported radices; one Stockham pass per radix
//   Bluestein — N has a prime factor we have no butterfly for; the axis is
//               padded to M = next_pow2(2N - 1) and evaluated as a chirp
//               convolution of length M
//
// Radices are built from the primes 2, 3, 5, 7, 11 and 13 and may be
// composite up to the device's maximum radix. Among all factorizations we
// prefer (in order) fewer passes, fewer non-power-of-two radices and a lower
// butterfly overhead (sum of radices, which favours balanced splits).
//
// Consecutive passes of one axis are grouped into uploads: a group whose
// radix product fits in the workgroup's shared memory. `plan_axis` hands out
// one upload at a time.

const SUPPORTED_PRIMES: [usize; 6] = [2, 3, 5, 7, 11, 13];

/// Algorithm of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// One Stockham radix stage.
    Butterfly { radix: usize },
    /// Multiply by the chirp and zero-pad to the convolution length.
    BluesteinChirpIn,
    /// Pointwise product with the precomputed kernel spectrum.
    BluesteinConvolve,
    /// Multiply by the chirp, scale by 1/M and truncate to the axis length.
    BluesteinChirpOut,
}

impl PassKind {
    pub fn radix(&self) -> Option<usize> {
        match self {
            PassKind::Butterfly { radix } => Some(*radix),
            _ => None,
        }
    }

    pub fn is_butterfly(&self) -> bool {
        matches!(self, PassKind::Butterfly { .. })
    }

    /// The kind that takes this pass's place in the opposite direction.
    pub fn inverted(&self) -> Self {
        match self {
            PassKind::BluesteinChirpIn => PassKind::BluesteinChirpOut,
            PassKind::BluesteinChirpOut => PassKind::BluesteinChirpIn,
            other => *other,
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Butterfly { radix } => write!(f, "radix{radix}"),
            PassKind::BluesteinChirpIn => write!(f, "chirp_in"),
            PassKind::BluesteinConvolve => write!(f, "convolve"),
            PassKind::BluesteinChirpOut => write!(f, "chirp_out"),
        }
    }
}

/// One stage of a multi-pass transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisPass {
    pub axis: usize,
    pub upload: usize,
    pub kind: PassKind,
    pub inverse: bool,
    /// Butterfly of the sign-`+` length-M FFT that follows the convolve on a
    /// Bluestein axis. Set on the same half in both directions.
    pub reverse_bluestein: bool,
}

impl AxisPass {
    /// Same stage run in the opposite direction.
    pub fn inverted(&self) -> Self {
        Self {
            kind: self.kind.inverted(),
            inverse: !self.inverse,
            ..*self
        }
    }
}

/// How one axis is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisStrategy {
    Identity,
    Radix { radices: Vec<usize> },
    Bluestein { padded: usize, radices: Vec<usize> },
}

/// Passes of one axis, in forward order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisDecomposition {
    pub axis: usize,
    pub len: usize,
    pub strategy: AxisStrategy,
    pub passes: Vec<AxisPass>,
    pub uploads: usize,
}

impl AxisDecomposition {
    /// Passes in execution order for `direction`. The inverse order is the
    /// forward order reversed with every pass inverted; uploads are renumbered
    /// so they still count up in execution order.
    ///
    /// Inverting swaps the two butterfly halves of a Bluestein axis, so
    /// `reverse_bluestein` moves with them and stays on the half after the
    /// convolve.
    pub fn passes_for(&self, direction: Direction) -> Vec<AxisPass> {
        let bluestein = self.bluestein_padded().is_some();
        match direction {
            Direction::Forward => self.passes.clone(),
            Direction::Inverse => self
                .passes
                .iter()
                .rev()
                .map(|p| AxisPass {
                    upload: self.uploads - 1 - p.upload,
                    reverse_bluestein: bluestein
                        && p.kind.is_butterfly()
                        && !p.reverse_bluestein,
                    ..p.inverted()
                })
                .collect(),
        }
    }

    /// Padded convolution length when the axis uses Bluestein.
    pub fn bluestein_padded(&self) -> Option<usize> {
        match self.strategy {
            AxisStrategy::Bluestein { padded, .. } => Some(padded),
            _ => None,
        }
    }
}

/// Decomposition of a whole transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decomposition {
    pub axes: Vec<AxisDecomposition>,
    pub precision: Precision,
}

impl Decomposition {
    pub fn pass_count(&self) -> usize {
        self.axes.iter().map(|a| a.passes.len()).sum()
    }

    pub fn upload_count(&self) -> usize {
        self.axes.iter().map(|a| a.uploads).sum()
    }

    pub fn axis(&self, axis: usize) -> Option<&AxisDecomposition> {
        self.axes.get(axis)
    }

    /// All passes in execution order: axes ascending forward, descending inverse.
    pub fn passes_for(&self, direction: Direction) -> Vec<AxisPass> {
        match direction {
            Direction::Forward => self
                .axes
                .iter()
                .flat_map(|a| a.passes_for(direction))
                .collect(),
            Direction::Inverse => self
                .axes
                .iter()
                .rev()
                .flat_map(|a| a.passes_for(direction))
                .collect(),
        }
    }
}

/// Convolution length used by the Bluestein fallback for an axis of length
/// `n`, or `None` when it does not fit in `usize`.
pub fn bluestein_length(n: usize) -> Option<usize> {
    n.checked_mul(2)?.checked_sub(1)?.checked_next_power_of_two()
}

fn is_smooth(mut n: usize) -> bool {
    for p in SUPPORTED_PRIMES {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

type SplitCost = (usize, usize, usize, Vec<usize>);

fn split_cost(radices: &[usize]) -> SplitCost {
    let non_pow2 = radices.iter().filter(|r| !r.is_power_of_two()).count();
    let overhead = radices.iter().sum();
    (radices.len(), non_pow2, overhead, radices.to_vec())
}

/// Best non-increasing radix sequence for `len` with every radix `<= cap`.
fn best_split(
    len: usize,
    cap: usize,
    allowed: &[usize],
    memo: &mut HashMap<(usize, usize), Option<Vec<usize>>>,
) -> Option<Vec<usize>> {
    if len == 1 {
        return Some(Vec::new());
    }
    if let Some(hit) = memo.get(&(len, cap)) {
        return hit.clone();
    }
    let mut best: Option<(SplitCost, Vec<usize>)> = None;
    for &r in allowed.iter().filter(|&&r| r <= cap && len % r == 0) {
        if let Some(rest) = best_split(len / r, r, allowed, memo) {
            let mut candidate = Vec::with_capacity(rest.len() + 1);
            candidate.push(r);
            candidate.extend(rest);
            let cost = split_cost(&candidate);
            if best.as_ref().map_or(true, |(c, _)| cost < *c) {
                best = Some((cost, candidate));
            }
        }
    }
    let result = best.map(|(_, radices)| radices);
    memo.insert((len, cap), result.clone());
    result
}

/// Chooses decompositions for a device class.
#[derive(Debug, Clone)]
pub struct KernelSelector {
    limits: DeviceLimits,
}

impl KernelSelector {
    pub fn new(limits: DeviceLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Radices a single kernel may implement, largest first.
    pub fn allowed_radices(&self, precision: Precision) -> Vec<usize> {
        let top = self
            .limits
            .max_radix
            .min(self.limits.upload_capacity(precision));
        (2..=top).rev().filter(|&r| is_smooth(r)).collect()
    }

    /// Best radix sequence for `len`, largest radix first. `None` if `len`
    /// has no decomposition into allowed radices.
    pub fn radix_split(&self, len: usize, precision: Precision) -> Option<Vec<usize>> {
        let allowed = self.allowed_radices(precision);
        let mut memo = HashMap::new();
        best_split(len, usize::MAX, &allowed, &mut memo)
    }

    /// Decompose every axis of `config`.
    pub fn select(&self, config: &TransformConfig) -> Result<Decomposition, ConfigError> {
        config.validate()?;
        if !self.limits.supports(config.precision()) {
            return Err(ConfigError::PrecisionUnsupported(config.precision()));
        }
        let axes = (0..config.rank())
            .map(|axis| self.decompose_axis(config, axis))
            .collect::<Result<Vec<_>, _>>()?;
        let decomposition = Decomposition {
            axes,
            precision: config.precision(),
        };
        log::debug!(
            "selected {} passes in {} uploads for {:?} {}",
            decomposition.pass_count(),
            decomposition.upload_count(),
            config.dims(),
            config.precision()
        );
        Ok(decomposition)
    }

    /// Passes of one upload of one axis, for manual per-axis planning.
    pub fn plan_axis(
        &self,
        config: &TransformConfig,
        axis: usize,
        upload: usize,
        inverse: bool,
        reverse_bluestein: bool,
    ) -> Result<Vec<AxisPass>, ConfigError> {
        config.validate()?;
        if !self.limits.supports(config.precision()) {
            return Err(ConfigError::PrecisionUnsupported(config.precision()));
        }
        if axis >= config.rank() {
            return Err(ConfigError::InvalidConfig(format!(
                "axis {axis} out of range for a {}-dimensional transform",
                config.rank()
            )));
        }
        let decomposed = self.decompose_axis(config, axis)?;
        let passes: Vec<AxisPass> = decomposed
            .passes_for(Direction::from_inverse(inverse))
            .into_iter()
            .filter(|p| p.upload == upload && p.reverse_bluestein == reverse_bluestein)
            .collect();
        if passes.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "axis {axis} has no upload {upload} (reverse bluestein: {reverse_bluestein})"
            )));
        }
        Ok(passes)
    }

    fn decompose_axis(
        &self,
        config: &TransformConfig,
        axis: usize,
    ) -> Result<AxisDecomposition, ConfigError> {
        let len = config.dims()[axis];
        let precision = config.precision();
        let capacity = self.limits.upload_capacity(precision);
        let unsupported = ConfigError::UnsupportedLength { axis, len };

        let mut passes = Vec::new();
        let mut next_upload = 0;

        let strategy = if len == 1 {
            // A real transform still needs one pass to change element layout.
            if axis == 0 && config.is_real() {
                push_butterflies(&mut passes, &mut next_upload, axis, &[1], capacity, false, false);
                AxisStrategy::Radix { radices: vec![1] }
            } else {
                AxisStrategy::Identity
            }
        } else if let Some(radices) = self.radix_split(len, precision) {
            push_butterflies(&mut passes, &mut next_upload, axis, &radices, capacity, false, false);
            AxisStrategy::Radix { radices }
        } else {
            if !config.bluestein() {
                return Err(unsupported);
            }
            let padded = bluestein_length(len).ok_or_else(|| unsupported.clone())?;
            let radices = self.radix_split(padded, precision).ok_or(unsupported)?;
            let reversed: Vec<usize> = radices.iter().rev().copied().collect();

            push_single(&mut passes, &mut next_upload, axis, PassKind::BluesteinChirpIn);
            push_butterflies(&mut passes, &mut next_upload, axis, &radices, capacity, false, false);
            push_single(&mut passes, &mut next_upload, axis, PassKind::BluesteinConvolve);
            push_butterflies(&mut passes, &mut next_upload, axis, &reversed, capacity, true, true);
            push_single(&mut passes, &mut next_upload, axis, PassKind::BluesteinChirpOut);
            AxisStrategy::Bluestein { padded, radices }
        };

        Ok(AxisDecomposition {
            axis,
            len,
            strategy,
            passes,
            uploads: next_upload,
        })
    }
}

fn push_single(passes: &mut Vec<AxisPass>, next_upload: &mut usize, axis: usize, kind: PassKind) {
    passes.push(AxisPass {
        axis,
        upload: *next_upload,
        kind,
        inverse: false,
        reverse_bluestein: false,
    });
    *next_upload += 1;
}

/// Append one butterfly per radix, opening a new upload whenever the running
/// span would exceed `capacity`.
fn push_butterflies(
    passes: &mut Vec<AxisPass>,
    next_upload: &mut usize,
    axis: usize,
    radices: &[usize],
    capacity: usize,
    inverse: bool,
    reverse_bluestein: bool,
) {
    if radices.is_empty() {
        return;
    }
    let mut span = 1;
    for (i, &radix) in radices.iter().enumerate() {
        if i > 0 && span * radix > capacity {
            *next_upload += 1;
            span = 1;
        }
        span *= radix;
        passes.push(AxisPass {
            axis,
            upload: *next_upload,
            kind: PassKind::Butterfly { radix },
            inverse,
            reverse_bluestein,
        });
    }
    *next_upload += 1;
}
