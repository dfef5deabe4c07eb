//! # gpufft-core
//!
//! Device-independent half of the gpufft engine.
//!
//! This crate provides:
//! - [`TransformConfig`] / [`DeviceLimits`] — what to transform and on which device class
//! - [`KernelSelector`] — radix / Bluestein decomposition into axis passes
//! - [`KernelCache`] — compile-once cache of kernel variants
//! - [`PlanBuilder`] / [`Plan`] — passes bound to kernels, shapes and scratch
//! - [`DeviceBackend`] / [`KernelCompiler`] — the collaborators a device implements
//! - [`CommandStream`] — recorded dispatches, barriers and copies
// - Precision: f16 / f32 / f64 storage helpers
// - Error: one error enum per stage plus the umbrella Error / Result

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod plan;
pub mod precision;
pub mod selector;
pub mod stream;

pub use backend::{BufferHandle, DeviceBackend, KernelCompiler, KernelHandle, KernelVariant};
pub use cache::{CacheStats, CompiledKernel, KernelCache};
pub use config::{
    BufferLayout, BufferShape, DeviceLimits, Direction, DirectionSupport, ElementLayout,
    TransformConfig, MAX_DIMS,
};
pub use error::{
    BuildError, ConfigError, DeviceError, DeviceResult, Error, Result, RuntimeError,
};
pub use plan::{BoundPass, Plan, PlanBuilder};
pub use precision::Precision;
pub use selector::{
    bluestein_length, AxisDecomposition, AxisPass, AxisStrategy, Decomposition, KernelSelector,
    PassKind,
};
pub use stream::{BufferBinding, Command, CommandStream, Dispatch, PassParams};
