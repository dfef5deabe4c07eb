//! # gpufft
//!
//! A GPU FFT execution engine.
//!
//! This is the top-level facade crate: it owns the Application lifecycle and
//! the Execution Engine, and re-exports the device-independent planning types.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gpufft::prelude::*;
//!
//! let cache = Arc::new(KernelCache::new(compiler));
//! let mut app = Application::initialize(device.clone(), cache, TransformConfig::new(&[1024]))?;
//! let mut stream = CommandStream::new();
//! app.append(Direction::Forward, &LaunchParams::in_place(buffer), &mut stream)?;
//! device.submit(stream)?;
//! app.sync()?;
//! app.destroy();
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `gpufft-core` | Config, Kernel Selector, Kernel Cache, Plan Builder, device traits, command streams |
//! | `gpufft` | Application lifecycle, Execution Engine, sync, device tables |
//! | `gpufft-host` | Reference device interpreting command streams on host memory |
//! | `gpufft-capi` | C ABI with integer result codes |
//!
//! ## Modules
//!
//! - [`app`] — initialize / destroy / sync / plan_axis
//! - [`exec`] — append: recording passes into a command stream

/// Re-export core types.
pub use gpufft_core::{
    bluestein_length, AxisDecomposition, AxisPass, AxisStrategy, BoundPass, BufferBinding,
    BufferHandle, BufferLayout, BufferShape, BuildError, CacheStats, Command, CommandStream,
    CompiledKernel, ConfigError, Decomposition, DeviceBackend, DeviceError, DeviceLimits,
    DeviceResult, Direction, DirectionSupport, Dispatch, ElementLayout, Error, KernelCache,
    KernelCompiler, KernelHandle, KernelSelector, KernelVariant, PassKind, PassParams, Plan,
    PlanBuilder, Precision, Result, RuntimeError, TransformConfig, MAX_DIMS,
};

/// Application — one compiled transform and its device resources.
pub mod app;

/// Execution Engine — records passes into command streams.
pub mod exec;

mod lifecycle;
mod resources;

pub use app::Application;
pub use exec::LaunchParams;

pub const VERSION_MAJOR: u32 = 1;
pub const VERSION_MINOR: u32 = 3;
pub const VERSION_PATCH: u32 = 4;

/// Library version as `major * 10000 + minor * 100 + patch`.
pub fn get_version() -> u32 {
    VERSION_MAJOR * 10000 + VERSION_MINOR * 100 + VERSION_PATCH
}

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::{Application, LaunchParams};
    pub use crate::{
        BufferHandle, BufferLayout, CommandStream, DeviceBackend, DeviceLimits, Direction,
        DirectionSupport, KernelCache, KernelCompiler, Precision, TransformConfig,
    };
    pub use crate::{BuildError, ConfigError, Error, Result, RuntimeError};
    pub use std::sync::Arc;
}
