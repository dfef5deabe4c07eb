use std::fmt;

use crate::config::{DeviceLimits, ElementLayout};
use crate::error::DeviceResult;
use crate::precision::Precision;
use crate::selector::PassKind;
use crate::stream::CommandStream;

// Backend — The two collaborators the engine drives
//
// DeviceBackend is a single command-queue device: it owns memory, accepts
// recorded command streams and can be waited on. KernelCompiler turns a
// KernelVariant (the identity of one specialized kernel) into a handle the
// device can dispatch. Queue creation and shader generation happen behind
// these traits.
//
// Both traits take `&self`: one device is shared by every Application built
// on it, so implementations use interior mutability.

/// Opaque device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Opaque compiled kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelHandle(pub u64);

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

impl fmt::Display for KernelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kernel#{}", self.0)
    }
}

/// A command-queue device.
pub trait DeviceBackend: Send + Sync {
    /// Capabilities used by the Kernel Selector.
    fn limits(&self) -> DeviceLimits;

    /// Allocate `bytes` of zeroed device memory.
    fn allocate(&self, bytes: usize) -> DeviceResult<BufferHandle>;

    /// Release a buffer. Unknown handles are ignored.
    fn free_buffer(&self, buffer: BufferHandle);

    /// Size of a live buffer in bytes.
    fn buffer_len(&self, buffer: BufferHandle) -> DeviceResult<usize>;

    /// Copy host bytes into a buffer at `offset`.
    fn write_buffer(&self, buffer: BufferHandle, offset: usize, data: &[u8]) -> DeviceResult<()>;

    /// Copy buffer bytes at `offset` into `out`.
    fn read_buffer(&self, buffer: BufferHandle, offset: usize, out: &mut [u8])
        -> DeviceResult<()>;

    /// Enqueue a recorded stream. Does not block.
    fn submit(&self, stream: CommandStream) -> DeviceResult<()>;

    /// Block until every submitted stream has finished.
    fn wait_idle(&self) -> DeviceResult<()>;
}

/// Produces device kernels for kernel variants.
pub trait KernelCompiler: Send + Sync {
    /// Compile one variant. The error string is the compiler diagnostic.
    fn compile(&self, variant: &KernelVariant) -> std::result::Result<KernelHandle, String>;

    /// Release a kernel previously returned by `compile`.
    fn release(&self, kernel: KernelHandle);
}

/// Identity of one specialized kernel. Two passes with equal variants share
/// a compiled kernel; span and scale are launch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelVariant {
    pub kind: PassKind,
    pub inverse: bool,
    pub precision: Precision,
    pub src_layout: ElementLayout,
    pub dst_layout: ElementLayout,
    /// Axis-0 pass reading or writing a real-transform half spectrum.
    pub half_spectrum: bool,
    /// Twiddles come from a lookup table instead of being computed.
    pub lut: bool,
}

impl fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.inverse { "inv" } else { "fwd" };
        write!(
            f,
            "{}_{}_{}_{}_to_{}",
            self.kind, dir, self.precision, self.src_layout, self.dst_layout
        )?;
        if self.half_spectrum {
            write!(f, "_hs")?;
        }
        if self.lut {
            write!(f, "_lut")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_name() {
        let v = KernelVariant {
            kind: PassKind::Butterfly { radix: 32 },
            inverse: false,
            precision: Precision::Single,
            src_layout: ElementLayout::Real,
            dst_layout: ElementLayout::Interleaved,
            half_spectrum: true,
            lut: true,
        };
        assert_eq!(v.to_string(), "radix32_fwd_f32_real_to_interleaved_hs_lut");
    }
}
