use std::fmt;

use crate::error::ConfigError;
use crate::precision::Precision;

// Config — Transform description and device class
//
// A TransformConfig is an immutable value built once with `with_*` methods and
// handed to the Kernel Selector. Nothing here talks to a device.
//
// Axis 0 is the innermost (contiguous) axis. Buffers are laid out as
//
//   index = ((b * n2 + i2) * n1 + i1) * n0 + i0
//
// with `b` the batch index. Real-to-complex transforms store the N0/2+1
// non-redundant outputs along axis 0 on the spectrum side.

/// Maximum number of transform dimensions.
pub const MAX_DIMS: usize = 3;

// Direction

/// Direction of a single transform invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    /// Exponent sign of the transform kernel: -1 forward, +1 inverse.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Forward => -1.0,
            Direction::Inverse => 1.0,
        }
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, Direction::Inverse)
    }

    pub fn from_inverse(inverse: bool) -> Self {
        if inverse {
            Direction::Inverse
        } else {
            Direction::Forward
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Inverse => write!(f, "inverse"),
        }
    }
}

/// Set of directions an application is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectionSupport {
    pub forward: bool,
    pub inverse: bool,
}

impl DirectionSupport {
    pub const FORWARD: Self = Self {
        forward: true,
        inverse: false,
    };
    pub const INVERSE: Self = Self {
        forward: false,
        inverse: true,
    };
    pub const BOTH: Self = Self {
        forward: true,
        inverse: true,
    };
    pub const NONE: Self = Self {
        forward: false,
        inverse: false,
    };

    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.forward,
            Direction::Inverse => self.inverse,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.forward && !self.inverse
    }
}

impl Default for DirectionSupport {
    fn default() -> Self {
        Self::BOTH
    }
}

// Layouts

/// Layout of the user-facing buffers of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferLayout {
    /// Complex data with real and imaginary parts interleaved.
    #[default]
    Interleaved,
    /// Complex data as a plane of real parts followed by a plane of imaginary parts.
    Planar,
    /// Real input, half-spectrum interleaved output (and the reverse for inverse).
    RealToComplex,
}

/// Element layout of one buffer binding as seen by a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementLayout {
    Interleaved,
    Planar,
    Real,
}

impl ElementLayout {
    /// Bytes needed for `elements` values of this layout.
    pub fn bytes(&self, elements: usize, precision: Precision) -> usize {
        match self {
            ElementLayout::Interleaved | ElementLayout::Planar => {
                elements * precision.complex_bytes()
            }
            ElementLayout::Real => elements * precision.scalar_bytes(),
        }
    }
}

impl fmt::Display for ElementLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementLayout::Interleaved => "interleaved",
            ElementLayout::Planar => "planar",
            ElementLayout::Real => "real",
        };
        write!(f, "{}", s)
    }
}

// BufferShape

/// Extents of a buffer as addressed by a kernel.
///
/// `half_spectrum` is set when axis 0 stores only the non-redundant outputs of
/// a real transform: `dims[0] == n / 2 + 1` where `n` is the logical length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub dims: Vec<usize>,
    pub batch: usize,
    pub half_spectrum: Option<usize>,
}

impl BufferShape {
    pub fn new(dims: &[usize], batch: usize) -> Self {
        Self {
            dims: dims.to_vec(),
            batch,
            half_spectrum: None,
        }
    }

    /// Shape holding the half spectrum of a real transform over `dims`.
    pub fn half_spectrum(dims: &[usize], batch: usize) -> Self {
        let mut stored = dims.to_vec();
        stored[0] = dims[0] / 2 + 1;
        Self {
            dims: stored,
            batch,
            half_spectrum: Some(dims[0]),
        }
    }

    /// Number of stored elements, batch included.
    pub fn elements(&self) -> usize {
        self.dims.iter().product::<usize>() * self.batch
    }

    /// Stored extent along `axis`.
    pub fn extent(&self, axis: usize) -> usize {
        self.dims[axis]
    }

    /// Logical transform length along `axis`.
    pub fn logical_len(&self, axis: usize) -> usize {
        match (axis, self.half_spectrum) {
            (0, Some(n)) => n,
            _ => self.dims[axis],
        }
    }

    /// Elements between consecutive samples along `axis`.
    pub fn stride(&self, axis: usize) -> usize {
        self.dims[..axis].iter().product()
    }

    /// Number of independent lines along `axis`, batch included.
    pub fn lines(&self, axis: usize) -> usize {
        self.elements() / self.dims[axis]
    }

    pub fn bytes(&self, precision: Precision, layout: ElementLayout) -> usize {
        layout.bytes(self.elements(), precision)
    }

    /// Copy of this shape with a new stored extent along `axis`.
    pub fn with_extent(&self, axis: usize, extent: usize) -> Self {
        let mut out = self.clone();
        out.dims[axis] = extent;
        if axis == 0 {
            out.half_spectrum = None;
        }
        out
    }
}

impl fmt::Display for BufferShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}x{}", self.dims, self.batch)?;
        if let Some(n) = self.half_spectrum {
            write!(f, " (half of {n})")?;
        }
        Ok(())
    }
}

// TransformConfig

/// Immutable description of a transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    dims: Vec<usize>,
    precision: Precision,
    batch: usize,
    directions: DirectionSupport,
    layout: BufferLayout,
    normalize: bool,
    bluestein: bool,
    use_lut: bool,
}

impl TransformConfig {
    /// A single-precision, batch-1, interleaved transform over `dims`
    /// supporting both directions.
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: dims.to_vec(),
            precision: Precision::Single,
            batch: 1,
            directions: DirectionSupport::BOTH,
            layout: BufferLayout::Interleaved,
            normalize: true,
            bluestein: true,
            use_lut: false,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_directions(mut self, directions: DirectionSupport) -> Self {
        self.directions = directions;
        self
    }

    pub fn with_layout(mut self, layout: BufferLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Scale inverse output by 1/N (default on).
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Allow the Bluestein fallback for lengths with large prime factors (default on).
    pub fn with_bluestein(mut self, bluestein: bool) -> Self {
        self.bluestein = bluestein;
        self
    }

    /// Precompute twiddle factors into device lookup tables (default off).
    pub fn with_lut(mut self, use_lut: bool) -> Self {
        self.use_lut = use_lut;
        self
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn directions(&self) -> DirectionSupport {
        self.directions
    }

    pub fn layout(&self) -> BufferLayout {
        self.layout
    }

    pub fn normalize(&self) -> bool {
        self.normalize
    }

    pub fn bluestein(&self) -> bool {
        self.bluestein
    }

    pub fn use_lut(&self) -> bool {
        self.use_lut
    }

    pub fn is_real(&self) -> bool {
        self.layout == BufferLayout::RealToComplex
    }

    /// Check structural validity. Device-dependent checks live in the selector.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dims.is_empty() || self.dims.len() > MAX_DIMS {
            return Err(ConfigError::InvalidConfig(format!(
                "dimensionality must be 1..={MAX_DIMS}, got {}",
                self.dims.len()
            )));
        }
        if let Some(axis) = self.dims.iter().position(|&n| n == 0) {
            return Err(ConfigError::InvalidConfig(format!(
                "axis {axis} has zero length"
            )));
        }
        if self.batch == 0 {
            return Err(ConfigError::InvalidConfig("batch count is zero".into()));
        }
        if self.directions.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "no transform direction is enabled".into(),
            ));
        }
        // A Bluestein axis pads to less than four times its length.
        let bytes = self
            .dims
            .iter()
            .try_fold(self.batch, |acc, &n| acc.checked_mul(n))
            .and_then(|elements| elements.checked_mul(4))
            .and_then(|elements| elements.checked_mul(self.precision.complex_bytes()))
            .filter(|&bytes| bytes <= isize::MAX as usize);
        if bytes.is_none() {
            return Err(ConfigError::InvalidConfig(format!(
                "{:?} x {} elements exceed the addressable size",
                self.dims, self.batch
            )));
        }
        Ok(())
    }

    /// Shape of the full complex (or real) signal.
    pub fn signal_shape(&self) -> BufferShape {
        BufferShape::new(&self.dims, self.batch)
    }

    /// Shape of the spectrum: the half spectrum for real transforms.
    pub fn spectrum_shape(&self) -> BufferShape {
        if self.is_real() {
            BufferShape::half_spectrum(&self.dims, self.batch)
        } else {
            self.signal_shape()
        }
    }

    pub fn input_shape(&self, direction: Direction) -> BufferShape {
        match direction {
            Direction::Forward => self.signal_shape(),
            Direction::Inverse => self.spectrum_shape(),
        }
    }

    pub fn output_shape(&self, direction: Direction) -> BufferShape {
        self.input_shape(opposite(direction))
    }

    pub fn input_layout(&self, direction: Direction) -> ElementLayout {
        match (self.layout, direction) {
            (BufferLayout::Interleaved, _) => ElementLayout::Interleaved,
            (BufferLayout::Planar, _) => ElementLayout::Planar,
            (BufferLayout::RealToComplex, Direction::Forward) => ElementLayout::Real,
            (BufferLayout::RealToComplex, Direction::Inverse) => ElementLayout::Interleaved,
        }
    }

    pub fn output_layout(&self, direction: Direction) -> ElementLayout {
        self.input_layout(opposite(direction))
    }

    /// Bytes the input buffer must hold for `direction`.
    pub fn input_bytes(&self, direction: Direction) -> usize {
        self.input_shape(direction)
            .bytes(self.precision, self.input_layout(direction))
    }

    /// Bytes the output buffer must hold for `direction`.
    pub fn output_bytes(&self, direction: Direction) -> usize {
        self.output_shape(direction)
            .bytes(self.precision, self.output_layout(direction))
    }
}

fn opposite(direction: Direction) -> Direction {
    match direction {
        Direction::Forward => Direction::Inverse,
        Direction::Inverse => Direction::Forward,
    }
}

// DeviceLimits

/// Capabilities of the target device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Shared memory available to one workgroup, in bytes.
    pub shared_memory_bytes: usize,
    /// Largest butterfly radix a single kernel may implement.
    pub max_radix: usize,
    pub supports_half: bool,
    pub supports_double: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            shared_memory_bytes: 32 * 1024,
            max_radix: 32,
            supports_half: true,
            supports_double: true,
        }
    }
}

impl DeviceLimits {
    pub fn with_shared_memory(mut self, bytes: usize) -> Self {
        self.shared_memory_bytes = bytes;
        self
    }

    pub fn with_max_radix(mut self, radix: usize) -> Self {
        self.max_radix = radix;
        self
    }

    pub fn with_half(mut self, supported: bool) -> Self {
        self.supports_half = supported;
        self
    }

    pub fn with_double(mut self, supported: bool) -> Self {
        self.supports_double = supported;
        self
    }

    pub fn supports(&self, precision: Precision) -> bool {
        match precision {
            Precision::Half => self.supports_half,
            Precision::Single => true,
            Precision::Double => self.supports_double,
        }
    }

    /// Complex elements that fit in one workgroup's shared memory.
    pub fn upload_capacity(&self, precision: Precision) -> usize {
        self.shared_memory_bytes / precision.complex_bytes()
    }
}
