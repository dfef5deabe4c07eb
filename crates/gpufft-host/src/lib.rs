//! # gpufft-host
//!
//! Reference software device for gpufft.
//!
//! [`HostDevice`] implements both collaborator traits of the engine:
//! [`DeviceBackend`] (memory, command queue, wait) and [`KernelCompiler`]
//! (kernel registry). Submitted command streams are queued and interpreted on
//! host memory when the device is waited on, so the engine observes the same
//! asynchronous submit / wait contract a GPU queue gives it.
//!
//! The device can simulate memory exhaustion, missing butterfly kernels and
//! device loss, and counts every buffer, kernel, submit and wait so tests can
//! assert on resource usage.

mod kernels;
pub mod pool;

use std::collections::HashMap;
use std::sync::Mutex;

use gpufft_core::{
    BufferHandle, Command, CommandStream, DeviceBackend, DeviceError, DeviceLimits,
    DeviceResult, KernelCompiler, KernelHandle, KernelVariant,
};

pub use pool::{BufferPool, PoolStats};

// Configuration

/// Knobs of the reference device.
#[derive(Debug, Clone, Default)]
pub struct HostDeviceConfig {
    /// Device class reported to the Kernel Selector.
    pub limits: DeviceLimits,
    /// Total bytes that may be live at once.
    pub memory_limit: Option<usize>,
    /// Number of successful allocations after which every allocation fails.
    pub allocation_limit: Option<usize>,
    /// Butterfly radices the compiler refuses to build.
    pub unsupported_radices: Vec<usize>,
}

impl HostDeviceConfig {
    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_allocation_limit(mut self, count: usize) -> Self {
        self.allocation_limit = Some(count);
        self
    }

    pub fn with_unsupported_radix(mut self, radix: usize) -> Self {
        self.unsupported_radices.push(radix);
        self
    }
}

// Statistics

/// Snapshot of device counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub live_buffers: usize,
    pub allocated_bytes: usize,
    pub live_kernels: usize,
    /// Kernels compiled over the device's lifetime.
    pub compiles: u64,
    pub submits: u64,
    /// `wait_idle` calls that reached the queue.
    pub waits: u64,
    pub dispatches: u64,
    pub barriers: u64,
    pub copies: u64,
    pub pool: PoolStats,
}

#[derive(Default)]
struct HostState {
    buffers: HashMap<u64, Vec<u8>>,
    kernels: HashMap<u64, KernelVariant>,
    queue: Vec<CommandStream>,
    next_id: u64,
    allocated_bytes: usize,
    allocations: usize,
    lost: bool,
    compiles: u64,
    submits: u64,
    waits: u64,
    dispatches: u64,
    barriers: u64,
    copies: u64,
}

impl HostState {
    fn next_handle(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn execute(&mut self, stream: CommandStream) -> DeviceResult<()> {
        for command in stream.into_commands() {
            match command {
                Command::Dispatch(dispatch) => {
                    let variant = *self
                        .kernels
                        .get(&dispatch.kernel.0)
                        .ok_or(DeviceError::InvalidKernel(dispatch.kernel.0))?;
                    kernels::run_dispatch(&variant, &dispatch, &mut self.buffers)?;
                    self.dispatches += 1;
                }
                // Commands already run in submission order.
                Command::Barrier => self.barriers += 1,
                Command::Copy { src, dst, bytes } => {
                    kernels::run_copy(&mut self.buffers, src, dst, bytes)?;
                    self.copies += 1;
                }
            }
        }
        Ok(())
    }
}

// HostDevice

/// Software device interpreting command streams on host memory.
pub struct HostDevice {
    config: HostDeviceConfig,
    state: Mutex<HostState>,
    pool: BufferPool,
}

impl HostDevice {
    pub fn new(config: HostDeviceConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HostState::default()),
            pool: BufferPool::new(),
        }
    }

    pub fn config(&self) -> &HostDeviceConfig {
        &self.config
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate an unrecoverable device fault: queued work is discarded and
    /// every later submit or wait fails with `DeviceError::Lost`.
    pub fn lose_device(&self) {
        let mut state = self.state();
        state.lost = true;
        state.queue.clear();
        log::warn!("host device marked lost");
    }

    pub fn is_lost(&self) -> bool {
        self.state().lost
    }

    /// Streams submitted but not yet executed.
    pub fn pending_streams(&self) -> usize {
        self.state().queue.len()
    }

    /// Allocate a buffer holding exactly `data`.
    pub fn upload(&self, data: &[u8]) -> DeviceResult<BufferHandle> {
        let buffer = self.allocate(data.len())?;
        self.write_buffer(buffer, 0, data)?;
        Ok(buffer)
    }

    /// Whole contents of a buffer.
    pub fn download(&self, buffer: BufferHandle) -> DeviceResult<Vec<u8>> {
        let mut out = vec![0u8; self.buffer_len(buffer)?];
        self.read_buffer(buffer, 0, &mut out)?;
        Ok(out)
    }

    pub fn stats(&self) -> HostStats {
        let state = self.state();
        HostStats {
            live_buffers: state.buffers.len(),
            allocated_bytes: state.allocated_bytes,
            live_kernels: state.kernels.len(),
            compiles: state.compiles,
            submits: state.submits,
            waits: state.waits,
            dispatches: state.dispatches,
            barriers: state.barriers,
            copies: state.copies,
            pool: self.pool.stats(),
        }
    }

    /// Release every freed buffer cached by the pool.
    pub fn empty_cache(&self) -> usize {
        self.pool.empty_cache()
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new(HostDeviceConfig::default())
    }
}

impl DeviceBackend for HostDevice {
    fn limits(&self) -> DeviceLimits {
        self.config.limits
    }

    fn allocate(&self, bytes: usize) -> DeviceResult<BufferHandle> {
        let mut state = self.state();
        if state.lost {
            return Err(DeviceError::Lost);
        }
        let over_memory = self
            .config
            .memory_limit
            .is_some_and(|limit| state.allocated_bytes + bytes > limit);
        let over_count = self
            .config
            .allocation_limit
            .is_some_and(|limit| state.allocations >= limit);
        if over_memory || over_count {
            log::debug!("host allocation of {bytes} bytes refused");
            return Err(DeviceError::OutOfMemory { requested: bytes });
        }
        let id = state.next_handle();
        state.buffers.insert(id, self.pool.alloc_zeroed(bytes));
        state.allocated_bytes += bytes;
        state.allocations += 1;
        Ok(BufferHandle(id))
    }

    fn free_buffer(&self, buffer: BufferHandle) {
        let removed = {
            let mut state = self.state();
            let removed = state.buffers.remove(&buffer.0);
            if let Some(buf) = &removed {
                state.allocated_bytes -= buf.len();
            }
            removed
        };
        if let Some(buf) = removed {
            self.pool.reclaim(buf);
        }
    }

    fn buffer_len(&self, buffer: BufferHandle) -> DeviceResult<usize> {
        self.state()
            .buffers
            .get(&buffer.0)
            .map(|b| b.len())
            .ok_or(DeviceError::InvalidBuffer(buffer.0))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: usize, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state();
        if state.lost {
            return Err(DeviceError::Lost);
        }
        let buf = state
            .buffers
            .get_mut(&buffer.0)
            .ok_or(DeviceError::InvalidBuffer(buffer.0))?;
        let end = offset + data.len();
        if end > buf.len() {
            return Err(DeviceError::Backend(format!(
                "write of {} bytes at {offset} exceeds {buffer} ({} bytes)",
                data.len(),
                buf.len()
            )));
        }
        buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: BufferHandle, offset: usize, out: &mut [u8]) -> DeviceResult<()> {
        let state = self.state();
        if state.lost {
            return Err(DeviceError::Lost);
        }
        let buf = state
            .buffers
            .get(&buffer.0)
            .ok_or(DeviceError::InvalidBuffer(buffer.0))?;
        let end = offset + out.len();
        if end > buf.len() {
            return Err(DeviceError::Backend(format!(
                "read of {} bytes at {offset} exceeds {buffer} ({} bytes)",
                out.len(),
                buf.len()
            )));
        }
        out.copy_from_slice(&buf[offset..end]);
        Ok(())
    }

    fn submit(&self, stream: CommandStream) -> DeviceResult<()> {
        let mut state = self.state();
        if state.lost {
            return Err(DeviceError::Lost);
        }
        state.submits += 1;
        if !stream.is_empty() {
            state.queue.push(stream);
        }
        Ok(())
    }

    fn wait_idle(&self) -> DeviceResult<()> {
        let mut state = self.state();
        if state.lost {
            return Err(DeviceError::Lost);
        }
        state.waits += 1;
        let queue = std::mem::take(&mut state.queue);
        for stream in queue {
            state.execute(stream)?;
        }
        Ok(())
    }
}

impl KernelCompiler for HostDevice {
    fn compile(&self, variant: &KernelVariant) -> Result<KernelHandle, String> {
        if let Some(radix) = variant.kind.radix() {
            if self.config.unsupported_radices.contains(&radix) {
                return Err(format!("radix-{radix} butterfly is not available on this device"));
            }
        }
        let mut state = self.state();
        if state.lost {
            return Err("device lost".to_string());
        }
        let id = state.next_handle();
        state.kernels.insert(id, *variant);
        state.compiles += 1;
        log::debug!("compiled {variant} as kernel#{id}");
        Ok(KernelHandle(id))
    }

    fn release(&self, kernel: KernelHandle) {
        self.state().kernels.remove(&kernel.0);
    }
}
