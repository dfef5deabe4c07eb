use crate::config::Direction;
use crate::precision::Precision;

// Errors — one enum per stage of an application's life
//
//   ConfigError  — kernel selection; nothing has touched the device yet
//   BuildError   — initialize; partial resources are released before returning
//   RuntimeError — append / sync; DeviceLost poisons the application
//   DeviceError  — what the device backend itself reports
//
// `Error` wraps all of them so callers that do not care about the stage can
// use a single `Result<T>`.

/// Failure while selecting a decomposition for a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No radix or Bluestein decomposition exists for this axis length.
    #[error("unsupported length {len} on axis {axis}")]
    UnsupportedLength { axis: usize, len: usize },

    /// The device class cannot run transforms in this precision.
    #[error("precision {0} is not supported by the device")]
    PrecisionUnsupported(Precision),

    /// Structurally invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a device backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("device out of memory: requested {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("device lost")]
    Lost,

    #[error("unknown buffer handle {0}")]
    InvalidBuffer(u64),

    #[error("unknown kernel handle {0}")]
    InvalidKernel(u64),

    #[error("device error: {0}")]
    Backend(String),
}

/// Failure while initializing an application.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("out of device memory: requested {requested} bytes")]
    OutOfDeviceMemory { requested: usize },

    #[error("failed to compile kernel {variant}: {diagnostic}")]
    KernelCompileError { variant: String, diagnostic: String },

    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for BuildError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::OutOfMemory { requested } => BuildError::OutOfDeviceMemory { requested },
            other => BuildError::Device(other),
        }
    }
}

/// Failure while recording or waiting on a transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("application was not built for the {0} direction")]
    UnsupportedDirection(Direction),

    #[error("device lost")]
    DeviceLost,

    #[error("{role} buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall {
        role: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("invalid launch: {0}")]
    InvalidLaunch(String),

    #[error("out of device memory: requested {requested} bytes")]
    OutOfDeviceMemory { requested: usize },

    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for RuntimeError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Lost => RuntimeError::DeviceLost,
            DeviceError::OutOfMemory { requested } => {
                RuntimeError::OutOfDeviceMemory { requested }
            }
            DeviceError::InvalidBuffer(handle) => {
                RuntimeError::InvalidLaunch(format!("unknown buffer handle {handle}"))
            }
            other => RuntimeError::Device(other),
        }
    }
}

/// Any gpufft error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Convenience Result type used throughout gpufft.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by device backends.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_error_mapping() {
        let oom = DeviceError::OutOfMemory { requested: 64 };
        assert_eq!(
            BuildError::from(oom.clone()),
            BuildError::OutOfDeviceMemory { requested: 64 }
        );
        assert_eq!(
            RuntimeError::from(oom),
            RuntimeError::OutOfDeviceMemory { requested: 64 }
        );
        assert_eq!(RuntimeError::from(DeviceError::Lost), RuntimeError::DeviceLost);
        assert!(matches!(
            RuntimeError::from(DeviceError::InvalidBuffer(9)),
            RuntimeError::InvalidLaunch(_)
        ));
    }

    #[test]
    fn test_messages() {
        let err = ConfigError::UnsupportedLength { axis: 1, len: 97 };
        assert_eq!(err.to_string(), "unsupported length 97 on axis 1");
        let wrapped: Error = BuildError::from(err).into();
        assert_eq!(wrapped.to_string(), "unsupported length 97 on axis 1");
    }
}
