use std::sync::Arc;

use crate::backend::KernelVariant;
use crate::cache::{CompiledKernel, KernelCache};
use crate::config::{BufferShape, Direction, ElementLayout, TransformConfig};
use crate::error::BuildError;
use crate::selector::{AxisDecomposition, AxisPass, Decomposition, PassKind};
use crate::stream::PassParams;

// Plan Builder — Bind a decomposition to kernels and buffers
//
// For each supported direction the builder walks the decomposition in
// execution order and produces one BoundPass per AxisPass:
//
//   - the kernel variant (operation, direction, precision, element layouts)
//     and the compiled kernel from the shared cache
//   - the shapes the pass reads and writes; Bluestein passes pad an axis to
//     its convolution length, real transforms shrink axis 0 to the half
//     spectrum after its last forward pass
//   - launch constants: Stockham span and output scale
//
// The first pass reads the caller's input and the last writes the caller's
// output. Every pass in between writes one of two scratch regions, alternating,
// so scratch needs at most two regions of the largest intermediate size.

/// One AxisPass ready to record.
#[derive(Debug, Clone)]
pub struct BoundPass {
    pub pass: AxisPass,
    pub variant: KernelVariant,
    pub kernel: Arc<CompiledKernel>,
    pub params: PassParams,
    pub src_shape: BufferShape,
    pub dst_shape: BufferShape,
    /// `(n, m)` of the Bluestein axis this pass belongs to.
    pub bluestein: Option<(usize, usize)>,
}

/// Executable plan owned by one Application.
#[derive(Debug)]
pub struct Plan {
    config: TransformConfig,
    decomposition: Decomposition,
    forward: Option<Vec<BoundPass>>,
    inverse: Option<Vec<BoundPass>>,
    region_bytes: usize,
    scratch_regions: usize,
    fresh: Vec<KernelVariant>,
}

impl Plan {
    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    /// Bound passes in execution order, or `None` if the plan was not built
    /// for `direction`.
    pub fn passes(&self, direction: Direction) -> Option<&[BoundPass]> {
        match direction {
            Direction::Forward => self.forward.as_deref(),
            Direction::Inverse => self.inverse.as_deref(),
        }
    }

    /// Bound passes of both directions.
    pub fn all_passes(&self) -> impl Iterator<Item = &BoundPass> {
        self.forward.iter().chain(self.inverse.iter()).flatten()
    }

    /// Bytes of one scratch region.
    pub fn region_bytes(&self) -> usize {
        self.region_bytes
    }

    /// Byte offset of scratch region `index % 2`.
    pub fn region_offset(&self, index: usize) -> usize {
        (index % 2) * self.region_bytes
    }

    /// Total scratch requirement in bytes.
    pub fn scratch_bytes(&self) -> usize {
        self.region_bytes * self.scratch_regions
    }

    /// Variants this plan compiled itself (cache misses during build).
    pub fn fresh_variants(&self) -> &[KernelVariant] {
        &self.fresh
    }

    /// Distinct kernels referenced by the plan.
    pub fn kernel_count(&self) -> usize {
        let mut handles: Vec<_> = self.all_passes().map(|p| p.kernel.handle()).collect();
        handles.sort();
        handles.dedup();
        handles.len()
    }
}

/// Builds plans against a shared kernel cache.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    cache: Arc<KernelCache>,
}

impl PlanBuilder {
    pub fn new(cache: Arc<KernelCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<KernelCache> {
        &self.cache
    }

    /// Bind `decomposition` for every direction `config` supports. On failure,
    /// kernels compiled by this call are evicted before returning.
    pub fn build(
        &self,
        decomposition: &Decomposition,
        config: &TransformConfig,
    ) -> Result<Plan, BuildError> {
        let mut fresh = Vec::new();
        match self.bind(decomposition, config, &mut fresh) {
            Ok((forward, inverse)) => {
                let (region_bytes, scratch_regions) = scratch_layout(
                    config,
                    forward.as_deref().unwrap_or_default(),
                    inverse.as_deref().unwrap_or_default(),
                );
                let plan = Plan {
                    config: config.clone(),
                    decomposition: decomposition.clone(),
                    forward,
                    inverse,
                    region_bytes,
                    scratch_regions,
                    fresh,
                };
                log::debug!(
                    "built plan for {:?}: {} kernels, {} scratch bytes",
                    config.dims(),
                    plan.kernel_count(),
                    plan.scratch_bytes()
                );
                Ok(plan)
            }
            Err(err) => {
                let evicted = self.cache.evict_unused(&fresh);
                log::warn!("plan build failed ({err}); evicted {evicted} kernels");
                Err(err)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn bind(
        &self,
        decomposition: &Decomposition,
        config: &TransformConfig,
        fresh: &mut Vec<KernelVariant>,
    ) -> Result<(Option<Vec<BoundPass>>, Option<Vec<BoundPass>>), BuildError> {
        let directions = config.directions();
        let forward = if directions.forward {
            Some(self.bind_direction(decomposition, config, Direction::Forward, fresh)?)
        } else {
            None
        };
        let inverse = if directions.inverse {
            Some(self.bind_direction(decomposition, config, Direction::Inverse, fresh)?)
        } else {
            None
        };
        Ok((forward, inverse))
    }

    fn bind_direction(
        &self,
        decomposition: &Decomposition,
        config: &TransformConfig,
        direction: Direction,
        fresh: &mut Vec<KernelVariant>,
    ) -> Result<Vec<BoundPass>, BuildError> {
        let axes: Vec<&AxisDecomposition> = match direction {
            Direction::Forward => decomposition.axes.iter().collect(),
            Direction::Inverse => decomposition.axes.iter().rev().collect(),
        };
        let total = decomposition.pass_count();
        let mut shape = config.input_shape(direction);
        let mut bound = Vec::with_capacity(total);

        for axis_dec in axes {
            let axis = axis_dec.axis;
            let logical = axis_dec.len;
            let bluestein = axis_dec.bluestein_padded().map(|m| (logical, m));
            let passes = axis_dec.passes_for(direction);
            let mut span = 1;
            let mut in_butterfly_run = false;

            for (k, pass) in passes.iter().enumerate() {
                let index = bound.len();
                let first = index == 0;
                let last = index + 1 == total;
                let last_in_axis = k + 1 == passes.len();

                let src_shape = shape.clone();
                let mut dst_shape = match pass.kind {
                    PassKind::BluesteinChirpIn => {
                        src_shape.with_extent(axis, bluestein.map_or(logical, |(_, m)| m))
                    }
                    PassKind::BluesteinChirpOut => src_shape.with_extent(axis, logical),
                    PassKind::BluesteinConvolve | PassKind::Butterfly { .. } => {
                        src_shape.with_extent(axis, src_shape.logical_len(axis))
                    }
                };
                if last_in_axis && axis == 0 && config.is_real() {
                    dst_shape = match direction {
                        Direction::Forward => config.spectrum_shape(),
                        Direction::Inverse => config.signal_shape(),
                    };
                }
                if last {
                    dst_shape = config.output_shape(direction);
                }

                let pass_span = match pass.kind.radix() {
                    Some(radix) => {
                        if !in_butterfly_run {
                            span = 1;
                        }
                        let current = span;
                        span *= radix;
                        current
                    }
                    None => 1,
                };
                in_butterfly_run = pass.kind.is_butterfly();

                let scale = if direction.is_inverse() && config.normalize() && last_in_axis {
                    1.0 / logical as f64
                } else {
                    1.0
                };

                let variant = KernelVariant {
                    kind: pass.kind,
                    inverse: pass.inverse,
                    precision: config.precision(),
                    src_layout: if first {
                        config.input_layout(direction)
                    } else {
                        ElementLayout::Interleaved
                    },
                    dst_layout: if last {
                        config.output_layout(direction)
                    } else {
                        ElementLayout::Interleaved
                    },
                    half_spectrum: axis == 0
                        && (src_shape.half_spectrum.is_some() || dst_shape.half_spectrum.is_some()),
                    lut: config.use_lut() && pass.kind.is_butterfly(),
                };
                let (kernel, compiled) =
                    self.cache
                        .acquire(&variant)
                        .map_err(|diagnostic| BuildError::KernelCompileError {
                            variant: variant.to_string(),
                            diagnostic,
                        })?;
                if compiled {
                    fresh.push(variant);
                }

                bound.push(BoundPass {
                    pass: *pass,
                    variant,
                    kernel,
                    params: PassParams {
                        axis,
                        span: pass_span,
                        scale,
                    },
                    src_shape,
                    dst_shape: dst_shape.clone(),
                    bluestein,
                });
                shape = dst_shape;
            }
        }
        Ok(bound)
    }
}

/// Region size and region count for the intermediates of both directions.
fn scratch_layout(
    config: &TransformConfig,
    forward: &[BoundPass],
    inverse: &[BoundPass],
) -> (usize, usize) {
    let mut region_bytes = 0;
    let mut regions = 0;
    for passes in [forward, inverse] {
        if passes.len() < 2 {
            continue;
        }
        let intermediates = &passes[..passes.len() - 1];
        for pass in intermediates {
            region_bytes = region_bytes.max(
                pass.dst_shape
                    .bytes(config.precision(), ElementLayout::Interleaved),
            );
        }
        regions = regions.max(intermediates.len().min(2));
    }
    (region_bytes, regions)
}
