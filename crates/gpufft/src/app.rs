// Application — One compiled transform and the device resources it owns
//
// initialize: select → build plan → upload tables. Any failure leaves the
//             device exactly as it was: tables are freed and kernels compiled
//             for this application are evicted from the shared cache.
// append:     see exec::engine
// sync:       wait for everything appended so far
// destroy:    free tables and scratch (consumes the Application)
//
// Scratch memory is not allocated here. The first append that needs it
// allocates it, unless the caller passes a temp buffer.

use std::fmt;
use std::sync::Arc;

use gpufft_core::{
    BoundPass, BufferHandle, BuildError, ConfigError, DeviceBackend, Direction, Error,
    KernelCache, KernelSelector, Plan, PlanBuilder, RuntimeError, TransformConfig,
};

use crate::lifecycle::Lifecycle;
use crate::resources::Resources;

/// A device-side FFT plan with its resources.
pub struct Application {
    pub(crate) device: Arc<dyn DeviceBackend>,
    pub(crate) cache: Arc<KernelCache>,
    pub(crate) plan: Plan,
    pub(crate) resources: Resources,
    pub(crate) scratch: Option<BufferHandle>,
    pub(crate) lifecycle: Lifecycle,
}

impl Application {
    /// Select, build and upload everything `config` needs on `device`.
    pub fn initialize(
        device: Arc<dyn DeviceBackend>,
        cache: Arc<KernelCache>,
        config: TransformConfig,
    ) -> Result<Self, BuildError> {
        let selector = KernelSelector::new(device.limits());
        let decomposition = selector.select(&config)?;
        let plan = PlanBuilder::new(cache.clone()).build(&decomposition, &config)?;

        let resources = match Resources::allocate(device.as_ref(), &plan) {
            Ok(resources) => resources,
            Err(err) => {
                let fresh = plan.fresh_variants().to_vec();
                drop(plan);
                let evicted = cache.evict_unused(&fresh);
                log::warn!("initialize failed ({err}); evicted {evicted} kernels");
                return Err(err);
            }
        };

        log::info!(
            "initialized {:?} {} transform: {} passes, {} tables, {} scratch bytes",
            config.dims(),
            config.precision(),
            decomposition.pass_count(),
            resources.buffer_count(),
            plan.scratch_bytes()
        );
        Ok(Self {
            device,
            cache,
            plan,
            resources,
            scratch: None,
            lifecycle: Lifecycle::default(),
        })
    }

    /// Release every device resource of this application.
    pub fn destroy(self) {
        drop(self);
    }

    /// Block until all work recorded by `append` and submitted has completed.
    pub fn sync(&mut self) -> Result<(), RuntimeError> {
        self.lifecycle.sync(self.device.as_ref())
    }

    /// Bound passes of one upload of one axis, in execution order.
    pub fn plan_axis(
        &self,
        axis: usize,
        upload: usize,
        inverse: bool,
        reverse_bluestein: bool,
    ) -> gpufft_core::Result<Vec<&BoundPass>> {
        let direction = Direction::from_inverse(inverse);
        let passes = self
            .plan
            .passes(direction)
            .ok_or(Error::Runtime(RuntimeError::UnsupportedDirection(direction)))?;
        if axis >= self.config().rank() {
            return Err(ConfigError::InvalidConfig(format!(
                "axis {axis} out of range for a {}-dimensional transform",
                self.config().rank()
            ))
            .into());
        }
        let selected: Vec<&BoundPass> = passes
            .iter()
            .filter(|p| {
                p.pass.axis == axis
                    && p.pass.upload == upload
                    && p.pass.reverse_bluestein == reverse_bluestein
            })
            .collect();
        if selected.is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "axis {axis} has no upload {upload} (reverse bluestein: {reverse_bluestein})"
            ))
            .into());
        }
        Ok(selected)
    }

    pub fn config(&self) -> &TransformConfig {
        self.plan.config()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn cache(&self) -> &Arc<KernelCache> {
        &self.cache
    }

    pub fn device(&self) -> &Arc<dyn DeviceBackend> {
        &self.device
    }

    pub fn supports(&self, direction: Direction) -> bool {
        self.plan.passes(direction).is_some()
    }

    /// Scratch bytes required when no temp buffer is supplied.
    pub fn scratch_bytes(&self) -> usize {
        self.plan.scratch_bytes()
    }

    /// Whether internal scratch has been allocated yet.
    pub fn has_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Device buffers holding precomputed tables.
    pub fn table_buffers(&self) -> usize {
        self.resources.buffer_count()
    }

    pub fn input_bytes(&self, direction: Direction) -> usize {
        self.config().input_bytes(direction)
    }

    pub fn output_bytes(&self, direction: Direction) -> usize {
        self.config().output_bytes(direction)
    }

    /// Whether appended work may still be running.
    pub fn is_pending(&self) -> bool {
        self.lifecycle.is_pending()
    }

    /// Whether the device was lost under this application.
    pub fn is_poisoned(&self) -> bool {
        self.lifecycle.is_poisoned()
    }

    pub(crate) fn ensure_scratch(&mut self) -> Result<BufferHandle, RuntimeError> {
        if let Some(scratch) = self.scratch {
            return Ok(scratch);
        }
        let bytes = self.plan.scratch_bytes();
        let scratch = self
            .device
            .allocate(bytes)
            .map_err(|err| self.lifecycle.device_error(err))?;
        log::debug!("allocated {bytes} scratch bytes");
        self.scratch = Some(scratch);
        Ok(scratch)
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.lifecycle.drain(self.device.as_ref());
        self.resources.release(self.device.as_ref());
        if let Some(scratch) = self.scratch.take() {
            self.device.free_buffer(scratch);
        }
        log::info!("destroyed {:?} transform", self.plan.config().dims());
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("dims", &self.config().dims())
            .field("precision", &self.config().precision())
            .field("scratch_bytes", &self.scratch_bytes())
            .field("pending", &self.is_pending())
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}
