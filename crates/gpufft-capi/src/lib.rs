//! C ABI for gpufft.
//!
//! Every fallible entry point returns an integer result code (`GPUFFT_SUCCESS`
//! is 0) and writes its result through an out-pointer. The message of the
//! last failure on the calling thread is available through
//! [`gpufft_last_error_length`] / [`gpufft_last_error_message`].
//!
//! Buffers are plain `u64` handles; `0` never names a buffer and means "none"
//! in [`GpufftLaunchParams`]. Passing a handle to `gpufft_delete` twice is
//! undefined behaviour and is not detected.

use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::slice;
use std::sync::Arc;

use gpufft::{Application, LaunchParams};
use gpufft_core::{
    BufferHandle, BufferLayout, BuildError, CommandStream, ConfigError, DeviceBackend,
    DeviceError, DeviceLimits, Direction, DirectionSupport, Error, KernelCache, PassKind,
    Precision, RuntimeError, TransformConfig, MAX_DIMS,
};
use gpufft_host::{HostDevice, HostDeviceConfig};

// Result codes

pub const GPUFFT_SUCCESS: i32 = 0;
pub const GPUFFT_ERROR_NULL_POINTER: i32 = 1;
pub const GPUFFT_ERROR_INVALID_ARGUMENT: i32 = 2;
pub const GPUFFT_ERROR_UNSUPPORTED_LENGTH: i32 = 3;
pub const GPUFFT_ERROR_PRECISION_UNSUPPORTED: i32 = 4;
pub const GPUFFT_ERROR_INVALID_CONFIG: i32 = 5;
pub const GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY: i32 = 6;
pub const GPUFFT_ERROR_KERNEL_COMPILE: i32 = 7;
pub const GPUFFT_ERROR_DEVICE_LOST: i32 = 8;
pub const GPUFFT_ERROR_UNSUPPORTED_DIRECTION: i32 = 9;
pub const GPUFFT_ERROR_BUFFER_TOO_SMALL: i32 = 10;
pub const GPUFFT_ERROR_INVALID_LAUNCH: i32 = 11;
pub const GPUFFT_ERROR_DEVICE: i32 = 12;
pub const GPUFFT_ERROR_PANIC: i32 = 13;

pub const GPUFFT_PRECISION_HALF: u32 = 0;
pub const GPUFFT_PRECISION_SINGLE: u32 = 1;
pub const GPUFFT_PRECISION_DOUBLE: u32 = 2;

pub const GPUFFT_LAYOUT_INTERLEAVED: u32 = 0;
pub const GPUFFT_LAYOUT_PLANAR: u32 = 1;
pub const GPUFFT_LAYOUT_REAL_TO_COMPLEX: u32 = 2;

pub const GPUFFT_DIRECTION_FORWARD: u32 = 1;
pub const GPUFFT_DIRECTION_INVERSE: u32 = 2;

pub const GPUFFT_PASS_BUTTERFLY: u32 = 0;
pub const GPUFFT_PASS_CHIRP_IN: u32 = 1;
pub const GPUFFT_PASS_CONVOLVE: u32 = 2;
pub const GPUFFT_PASS_CHIRP_OUT: u32 = 3;

/// Capacity of the per-pass arrays of [`GpufftAxisPlan`].
pub const GPUFFT_MAX_PASSES: usize = 32;

// Last error

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(message: impl Into<String>) {
    let message = message.into().replace('\0', " ");
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = CString::new(message).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

fn fail(code: i32, message: impl Into<String>) -> i32 {
    let message = message.into();
    log::debug!("gpufft call failed ({code}): {message}");
    set_last_error(message);
    code
}

fn fail_with(err: impl Into<Error>) -> i32 {
    let err = err.into();
    fail(error_code(&err), err.to_string())
}

fn config_code(err: &ConfigError) -> i32 {
    match err {
        ConfigError::UnsupportedLength { .. } => GPUFFT_ERROR_UNSUPPORTED_LENGTH,
        ConfigError::PrecisionUnsupported(_) => GPUFFT_ERROR_PRECISION_UNSUPPORTED,
        ConfigError::InvalidConfig(_) => GPUFFT_ERROR_INVALID_CONFIG,
    }
}

fn device_code(err: &DeviceError) -> i32 {
    match err {
        DeviceError::OutOfMemory { .. } => GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY,
        DeviceError::Lost => GPUFFT_ERROR_DEVICE_LOST,
        DeviceError::InvalidBuffer(_) | DeviceError::InvalidKernel(_) => {
            GPUFFT_ERROR_INVALID_ARGUMENT
        }
        DeviceError::Backend(_) => GPUFFT_ERROR_DEVICE,
    }
}

/// Result code for an error.
pub fn error_code(err: &Error) -> i32 {
    match err {
        Error::Config(e) => config_code(e),
        Error::Build(e) => match e {
            BuildError::Config(c) => config_code(c),
            BuildError::OutOfDeviceMemory { .. } => GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY,
            BuildError::KernelCompileError { .. } => GPUFFT_ERROR_KERNEL_COMPILE,
            BuildError::Device(d) => device_code(d),
        },
        Error::Runtime(e) => match e {
            RuntimeError::UnsupportedDirection(_) => GPUFFT_ERROR_UNSUPPORTED_DIRECTION,
            RuntimeError::DeviceLost => GPUFFT_ERROR_DEVICE_LOST,
            RuntimeError::BufferTooSmall { .. } => GPUFFT_ERROR_BUFFER_TOO_SMALL,
            RuntimeError::InvalidLaunch(_) => GPUFFT_ERROR_INVALID_LAUNCH,
            RuntimeError::OutOfDeviceMemory { .. } => GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY,
            RuntimeError::Device(d) => device_code(d),
        },
        Error::Device(e) => device_code(e),
    }
}

/// Run `body`, turning a panic into `GPUFFT_ERROR_PANIC`.
fn guard(label: &str, body: impl FnOnce() -> i32) -> i32 {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(code) => {
            if code == GPUFFT_SUCCESS {
                clear_last_error();
            }
            code
        }
        Err(_) => fail(GPUFFT_ERROR_PANIC, format!("{label} panicked")),
    }
}

fn require_non_null<T>(ptr: *const T, label: &str) -> Result<(), i32> {
    if ptr.is_null() {
        return Err(fail(GPUFFT_ERROR_NULL_POINTER, format!("{label} pointer was null")));
    }
    Ok(())
}

/// Returns the length of the last error message in bytes, excluding the
/// trailing null terminator.
#[no_mangle]
pub extern "C" fn gpufft_last_error_length() -> usize {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(0, |msg| msg.as_bytes().len()))
}

/// Copies the last error message into `buffer` and returns the number of bytes
/// copied, excluding the null terminator. Returns 0 when there is no error.
///
/// # Safety
/// `buffer` must be valid for `capacity` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn gpufft_last_error_message(buffer: *mut c_char, capacity: usize) -> usize {
    if buffer.is_null() || capacity == 0 {
        return 0;
    }
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(message) => {
            let bytes = message.as_bytes();
            let to_copy = bytes.len().min(capacity - 1);
            ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, to_copy);
            *buffer.add(to_copy) = 0;
            to_copy
        }
        None => 0,
    })
}

#[no_mangle]
pub extern "C" fn gpufft_clear_last_error() {
    clear_last_error();
}

/// Library version as `major * 10000 + minor * 100 + patch`.
#[no_mangle]
pub extern "C" fn gpufft_get_version() -> i32 {
    i32::try_from(gpufft::get_version()).unwrap_or(i32::MAX)
}

// Configuration

/// Plain-data transform description.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpufftConfiguration {
    /// Number of used entries of `size` (1..=3).
    pub dimensions: u32,
    pub size: [u64; MAX_DIMS],
    pub batch: u64,
    /// One of `GPUFFT_PRECISION_*`.
    pub precision: u32,
    /// Bitwise or of `GPUFFT_DIRECTION_*`.
    pub directions: u32,
    /// One of `GPUFFT_LAYOUT_*`.
    pub layout: u32,
    pub normalize: u32,
    pub bluestein: u32,
    pub use_lut: u32,
}

impl Default for GpufftConfiguration {
    fn default() -> Self {
        Self {
            dimensions: 1,
            size: [1; MAX_DIMS],
            batch: 1,
            precision: GPUFFT_PRECISION_SINGLE,
            directions: GPUFFT_DIRECTION_FORWARD | GPUFFT_DIRECTION_INVERSE,
            layout: GPUFFT_LAYOUT_INTERLEAVED,
            normalize: 1,
            bluestein: 1,
            use_lut: 0,
        }
    }
}

impl GpufftConfiguration {
    fn to_config(&self) -> Result<TransformConfig, i32> {
        let dimensions = self.dimensions as usize;
        if dimensions == 0 || dimensions > MAX_DIMS {
            return Err(fail(
                GPUFFT_ERROR_INVALID_CONFIG,
                format!("dimensions must be 1..={MAX_DIMS}, got {dimensions}"),
            ));
        }
        let dims = self.size[..dimensions]
            .iter()
            .map(|&n| to_usize(n, "size"))
            .collect::<Result<Vec<_>, _>>()?;
        let precision = match self.precision {
            GPUFFT_PRECISION_HALF => Precision::Half,
            GPUFFT_PRECISION_SINGLE => Precision::Single,
            GPUFFT_PRECISION_DOUBLE => Precision::Double,
            other => {
                return Err(fail(
                    GPUFFT_ERROR_INVALID_ARGUMENT,
                    format!("unknown precision {other}"),
                ))
            }
        };
        let layout = match self.layout {
            GPUFFT_LAYOUT_INTERLEAVED => BufferLayout::Interleaved,
            GPUFFT_LAYOUT_PLANAR => BufferLayout::Planar,
            GPUFFT_LAYOUT_REAL_TO_COMPLEX => BufferLayout::RealToComplex,
            other => {
                return Err(fail(
                    GPUFFT_ERROR_INVALID_ARGUMENT,
                    format!("unknown layout {other}"),
                ))
            }
        };
        let directions = DirectionSupport {
            forward: self.directions & GPUFFT_DIRECTION_FORWARD != 0,
            inverse: self.directions & GPUFFT_DIRECTION_INVERSE != 0,
        };
        Ok(TransformConfig::new(&dims)
            .with_batch(to_usize(self.batch, "batch")?)
            .with_precision(precision)
            .with_directions(directions)
            .with_layout(layout)
            .with_normalize(self.normalize != 0)
            .with_bluestein(self.bluestein != 0)
            .with_lut(self.use_lut != 0))
    }
}

fn to_usize(value: u64, label: &str) -> Result<usize, i32> {
    usize::try_from(value)
        .map_err(|_| fail(GPUFFT_ERROR_INVALID_ARGUMENT, format!("{label} {value} overflows")))
}

/// Fill `out` with the default configuration: a single-precision, normalized,
/// interleaved 1D transform of length 1 in both directions.
///
/// # Safety
/// `out` must point to writable memory for one `GpufftConfiguration`.
#[no_mangle]
pub unsafe extern "C" fn gpufft_default_configuration(out: *mut GpufftConfiguration) -> i32 {
    guard("gpufft_default_configuration", || {
        if let Err(code) = require_non_null(out, "configuration") {
            return code;
        }
        *out = GpufftConfiguration::default();
        GPUFFT_SUCCESS
    })
}

// Device

/// A device plus the kernel cache shared by its applications.
pub struct GpufftDevice {
    device: Arc<HostDevice>,
    cache: Arc<KernelCache>,
}

/// Create the reference host device. `shared_memory_bytes == 0` keeps the
/// default limit; `memory_limit == 0` means unlimited.
///
/// # Safety
/// `out` must point to writable memory for one pointer.
#[no_mangle]
pub unsafe extern "C" fn gpufft_device_create_host(
    shared_memory_bytes: usize,
    memory_limit: usize,
    out: *mut *mut GpufftDevice,
) -> i32 {
    guard("gpufft_device_create_host", || {
        if let Err(code) = require_non_null(out, "device") {
            return code;
        }
        let mut limits = DeviceLimits::default();
        if shared_memory_bytes > 0 {
            limits = limits.with_shared_memory(shared_memory_bytes);
        }
        let mut config = HostDeviceConfig::default().with_limits(limits);
        if memory_limit > 0 {
            config = config.with_memory_limit(memory_limit);
        }
        let device = Arc::new(HostDevice::new(config));
        let cache = Arc::new(KernelCache::new(device.clone()));
        log::debug!("created host device");
        *out = Box::into_raw(Box::new(GpufftDevice { device, cache }));
        GPUFFT_SUCCESS
    })
}

/// Release a device. Applications created on it stay valid until deleted.
///
/// # Safety
/// `device` must come from `gpufft_device_create_host` and not be used again.
#[no_mangle]
pub unsafe extern "C" fn gpufft_device_destroy(device: *mut GpufftDevice) {
    if device.is_null() {
        return;
    }
    drop(Box::from_raw(device));
}

unsafe fn device_ref<'a>(device: *const GpufftDevice) -> Result<&'a GpufftDevice, i32> {
    require_non_null(device, "device")?;
    Ok(&*device)
}

/// # Safety
/// `device` must be a live device and `out` writable.
#[no_mangle]
pub unsafe extern "C" fn gpufft_buffer_allocate(
    device: *const GpufftDevice,
    bytes: usize,
    out: *mut u64,
) -> i32 {
    guard("gpufft_buffer_allocate", || {
        let device = match device_ref(device) {
            Ok(device) => device,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(out, "buffer") {
            return code;
        }
        match device.device.allocate(bytes) {
            Ok(buffer) => {
                *out = buffer.0;
                GPUFFT_SUCCESS
            }
            Err(err) => fail_with(err),
        }
    })
}

/// # Safety
/// `device` must be a live device.
#[no_mangle]
pub unsafe extern "C" fn gpufft_buffer_free(device: *const GpufftDevice, buffer: u64) -> i32 {
    guard("gpufft_buffer_free", || match device_ref(device) {
        Ok(device) => {
            device.device.free_buffer(BufferHandle(buffer));
            GPUFFT_SUCCESS
        }
        Err(code) => code,
    })
}

/// Copy `len` bytes from `data` into `buffer` at `offset`.
///
/// # Safety
/// `device` must be a live device and `data` valid for `len` bytes of reads.
#[no_mangle]
pub unsafe extern "C" fn gpufft_buffer_write(
    device: *const GpufftDevice,
    buffer: u64,
    offset: usize,
    data: *const u8,
    len: usize,
) -> i32 {
    guard("gpufft_buffer_write", || {
        let device = match device_ref(device) {
            Ok(device) => device,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(data, "data") {
            return code;
        }
        let bytes = slice::from_raw_parts(data, len);
        match device.device.write_buffer(BufferHandle(buffer), offset, bytes) {
            Ok(()) => GPUFFT_SUCCESS,
            Err(err) => fail_with(err),
        }
    })
}

/// Copy `len` bytes of `buffer` starting at `offset` into `data`.
///
/// # Safety
/// `device` must be a live device and `data` valid for `len` bytes of writes.
#[no_mangle]
pub unsafe extern "C" fn gpufft_buffer_read(
    device: *const GpufftDevice,
    buffer: u64,
    offset: usize,
    data: *mut u8,
    len: usize,
) -> i32 {
    guard("gpufft_buffer_read", || {
        let device = match device_ref(device) {
            Ok(device) => device,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(data, "data") {
            return code;
        }
        let bytes = slice::from_raw_parts_mut(data, len);
        match device.device.read_buffer(BufferHandle(buffer), offset, bytes) {
            Ok(()) => GPUFFT_SUCCESS,
            Err(err) => fail_with(err),
        }
    })
}

// Streams

/// Commands recorded by `gpufft_append`, waiting to be submitted.
pub struct GpufftStream(CommandStream);

#[no_mangle]
pub extern "C" fn gpufft_stream_create() -> *mut GpufftStream {
    Box::into_raw(Box::new(GpufftStream(CommandStream::new())))
}

/// Number of commands currently recorded.
///
/// # Safety
/// `stream` must be a live stream or null.
#[no_mangle]
pub unsafe extern "C" fn gpufft_stream_len(stream: *const GpufftStream) -> usize {
    if stream.is_null() {
        return 0;
    }
    (*stream).0.len()
}

/// Submit everything recorded so far; the stream is left empty.
///
/// # Safety
/// `device` and `stream` must be live.
#[no_mangle]
pub unsafe extern "C" fn gpufft_stream_submit(
    device: *const GpufftDevice,
    stream: *mut GpufftStream,
) -> i32 {
    guard("gpufft_stream_submit", || {
        let device = match device_ref(device) {
            Ok(device) => device,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(stream, "stream") {
            return code;
        }
        let commands = std::mem::take(&mut (*stream).0);
        match device.device.submit(commands) {
            Ok(()) => GPUFFT_SUCCESS,
            Err(err) => fail_with(err),
        }
    })
}

/// # Safety
/// `stream` must come from `gpufft_stream_create` and not be used again.
#[no_mangle]
pub unsafe extern "C" fn gpufft_stream_destroy(stream: *mut GpufftStream) {
    if stream.is_null() {
        return;
    }
    drop(Box::from_raw(stream));
}

// Application

pub struct GpufftApplication(Application);

/// Buffers of one `gpufft_append` call. `input == 0` runs in place on
/// `output`; `temp == 0` uses internal scratch.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpufftLaunchParams {
    pub input: u64,
    pub output: u64,
    pub temp: u64,
}

impl GpufftLaunchParams {
    fn to_launch(self) -> LaunchParams {
        let handle = |id: u64| (id != 0).then_some(BufferHandle(id));
        LaunchParams {
            input: handle(self.input),
            output: BufferHandle(self.output),
            temp: handle(self.temp),
        }
    }
}

/// Passes of one upload of one axis, as returned by `gpufft_plan_axis`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpufftAxisPlan {
    pub passes: u32,
    /// Uploads of the axis in the queried direction.
    pub uploads: u32,
    /// Butterfly radix per pass; 0 for Bluestein chirp and convolve passes.
    pub radices: [u32; GPUFFT_MAX_PASSES],
    /// One of `GPUFFT_PASS_*` per pass.
    pub kinds: [u32; GPUFFT_MAX_PASSES],
    pub spans: [u64; GPUFFT_MAX_PASSES],
    pub scratch_bytes: u64,
}

impl Default for GpufftAxisPlan {
    fn default() -> Self {
        Self {
            passes: 0,
            uploads: 0,
            radices: [0; GPUFFT_MAX_PASSES],
            kinds: [0; GPUFFT_MAX_PASSES],
            spans: [0; GPUFFT_MAX_PASSES],
            scratch_bytes: 0,
        }
    }
}

fn pass_kind_code(kind: PassKind) -> u32 {
    match kind {
        PassKind::Butterfly { .. } => GPUFFT_PASS_BUTTERFLY,
        PassKind::BluesteinChirpIn => GPUFFT_PASS_CHIRP_IN,
        PassKind::BluesteinConvolve => GPUFFT_PASS_CONVOLVE,
        PassKind::BluesteinChirpOut => GPUFFT_PASS_CHIRP_OUT,
    }
}

unsafe fn app_mut<'a>(app: *mut GpufftApplication) -> Result<&'a mut Application, i32> {
    require_non_null(app, "application")?;
    Ok(&mut (*app).0)
}

/// Build an application for `config` on `device`. On failure `*out` is
/// left null and nothing stays allocated.
///
/// # Safety
/// `device` must be live, `config` readable and `out` writable.
#[no_mangle]
pub unsafe extern "C" fn gpufft_initialize(
    device: *const GpufftDevice,
    config: *const GpufftConfiguration,
    out: *mut *mut GpufftApplication,
) -> i32 {
    guard("gpufft_initialize", || {
        let device = match device_ref(device) {
            Ok(device) => device,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(config, "configuration") {
            return code;
        }
        if let Err(code) = require_non_null(out, "application") {
            return code;
        }
        *out = ptr::null_mut();
        let config = match (*config).to_config() {
            Ok(config) => config,
            Err(code) => return code,
        };
        let backend: Arc<dyn DeviceBackend> = device.device.clone();
        match Application::initialize(backend, device.cache.clone(), config) {
            Ok(app) => {
                *out = Box::into_raw(Box::new(GpufftApplication(app)));
                GPUFFT_SUCCESS
            }
            Err(err) => fail_with(err),
        }
    })
}

/// Release every resource of `app`, waiting for its pending work first.
///
/// # Safety
/// `app` must come from `gpufft_initialize` and not be used again.
#[no_mangle]
pub unsafe extern "C" fn gpufft_delete(app: *mut GpufftApplication) {
    if app.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| Box::from_raw(app).0.destroy()));
}

/// Block until every submitted transform of `app` has completed.
///
/// # Safety
/// `app` must be live.
#[no_mangle]
pub unsafe extern "C" fn gpufft_sync(app: *mut GpufftApplication) -> i32 {
    guard("gpufft_sync", || match app_mut(app) {
        Ok(app) => match app.sync() {
            Ok(()) => GPUFFT_SUCCESS,
            Err(err) => fail_with(err),
        },
        Err(code) => code,
    })
}

/// Record one transform into `stream`. `inverse != 0` selects the inverse.
///
/// # Safety
/// `app`, `launch` and `stream` must be live.
#[no_mangle]
pub unsafe extern "C" fn gpufft_append(
    app: *mut GpufftApplication,
    inverse: i32,
    launch: *const GpufftLaunchParams,
    stream: *mut GpufftStream,
) -> i32 {
    guard("gpufft_append", || {
        let app = match app_mut(app) {
            Ok(app) => app,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(launch, "launch parameters") {
            return code;
        }
        if let Err(code) = require_non_null(stream, "stream") {
            return code;
        }
        let direction = Direction::from_inverse(inverse != 0);
        match app.append(direction, &(*launch).to_launch(), &mut (*stream).0) {
            Ok(()) => GPUFFT_SUCCESS,
            Err(err) => fail_with(err),
        }
    })
}

/// Describe the passes of upload `upload` of axis `axis`.
///
/// # Safety
/// `app` must be live and `out` writable.
#[no_mangle]
pub unsafe extern "C" fn gpufft_plan_axis(
    app: *mut GpufftApplication,
    axis: u32,
    upload: u32,
    inverse: i32,
    reverse_bluestein: i32,
    out: *mut GpufftAxisPlan,
) -> i32 {
    guard("gpufft_plan_axis", || {
        let app = match app_mut(app) {
            Ok(app) => app,
            Err(code) => return code,
        };
        if let Err(code) = require_non_null(out, "axis plan") {
            return code;
        }
        let passes = match app.plan_axis(
            axis as usize,
            upload as usize,
            inverse != 0,
            reverse_bluestein != 0,
        ) {
            Ok(passes) => passes,
            Err(err) => return fail_with(err),
        };
        if passes.len() > GPUFFT_MAX_PASSES {
            return fail(
                GPUFFT_ERROR_INVALID_CONFIG,
                format!("{} passes exceed {GPUFFT_MAX_PASSES}", passes.len()),
            );
        }
        let uploads = app
            .plan()
            .decomposition()
            .axis(axis as usize)
            .map_or(0, |a| a.uploads);
        let mut plan = GpufftAxisPlan {
            passes: passes.len() as u32,
            uploads: uploads as u32,
            scratch_bytes: app.scratch_bytes() as u64,
            ..GpufftAxisPlan::default()
        };
        for (i, pass) in passes.iter().enumerate() {
            plan.radices[i] = pass.pass.kind.radix().unwrap_or(0) as u32;
            plan.kinds[i] = pass_kind_code(pass.pass.kind);
            plan.spans[i] = pass.params.span as u64;
        }
        *out = plan;
        GPUFFT_SUCCESS
    })
}

/// Bytes of internal scratch the application needs, or 0 for a null handle.
///
/// # Safety
/// `app` must be live or null.
#[no_mangle]
pub unsafe extern "C" fn gpufft_scratch_bytes(app: *const GpufftApplication) -> usize {
    if app.is_null() {
        return 0;
    }
    (*app).0.scratch_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: Error = ConfigError::UnsupportedLength { axis: 0, len: 97 }.into();
        assert_eq!(error_code(&err), GPUFFT_ERROR_UNSUPPORTED_LENGTH);
        let err: Error = RuntimeError::from(DeviceError::Lost).into();
        assert_eq!(error_code(&err), GPUFFT_ERROR_DEVICE_LOST);
        let err: Error = BuildError::from(DeviceError::OutOfMemory { requested: 8 }).into();
        assert_eq!(error_code(&err), GPUFFT_ERROR_OUT_OF_DEVICE_MEMORY);
        let err: Error = DeviceError::InvalidBuffer(3).into();
        assert_eq!(error_code(&err), GPUFFT_ERROR_INVALID_ARGUMENT);
    }

    #[test]
    fn test_guard_catches_panics() {
        let code = guard("test", || panic!("boom"));
        assert_eq!(code, GPUFFT_ERROR_PANIC);
        assert!(gpufft_last_error_length() > 0);
        assert_eq!(guard("test", || GPUFFT_SUCCESS), GPUFFT_SUCCESS);
        assert_eq!(gpufft_last_error_length(), 0);
    }

    #[test]
    fn test_configuration_conversion() {
        let mut raw = GpufftConfiguration {
            dimensions: 2,
            size: [8, 6, 99],
            batch: 3,
            precision: GPUFFT_PRECISION_DOUBLE,
            directions: GPUFFT_DIRECTION_INVERSE,
            layout: GPUFFT_LAYOUT_PLANAR,
            normalize: 0,
            ..GpufftConfiguration::default()
        };
        let config = raw.to_config().unwrap();
        assert_eq!(config.dims(), &[8, 6]);
        assert_eq!(config.batch(), 3);
        assert_eq!(config.precision(), Precision::Double);
        assert_eq!(config.directions(), DirectionSupport::INVERSE);
        assert_eq!(config.layout(), BufferLayout::Planar);
        assert!(!config.normalize());

        raw.precision = 7;
        assert_eq!(raw.to_config().unwrap_err(), GPUFFT_ERROR_INVALID_ARGUMENT);
        raw.precision = GPUFFT_PRECISION_SINGLE;
        raw.dimensions = 4;
        assert_eq!(raw.to_config().unwrap_err(), GPUFFT_ERROR_INVALID_CONFIG);
    }
}
