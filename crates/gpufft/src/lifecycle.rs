// Lifecycle — Host/device synchronization state of one Application
//
// `append` only records work, so an Application tracks whether anything it
// recorded may still be in flight. `sync` waits on the device only in that
// case, which makes repeated syncs free.
//
// A lost device poisons the Application: every later append or sync reports
// DeviceLost without touching the device again.

use gpufft_core::{DeviceBackend, DeviceError, RuntimeError};

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    pending: bool,
    poisoned: bool,
}

impl Lifecycle {
    pub(crate) fn check_usable(&self) -> Result<(), RuntimeError> {
        if self.poisoned {
            Err(RuntimeError::DeviceLost)
        } else {
            Ok(())
        }
    }

    pub(crate) fn mark_pending(&mut self) {
        self.pending = true;
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) fn poison(&mut self) {
        if !self.poisoned {
            log::warn!("device lost; application poisoned");
        }
        self.poisoned = true;
        self.pending = false;
    }

    /// Map a device failure, poisoning on loss.
    pub(crate) fn device_error(&mut self, err: DeviceError) -> RuntimeError {
        if err == DeviceError::Lost {
            self.poison();
        }
        err.into()
    }

    /// Block until recorded work has completed.
    pub(crate) fn sync(&mut self, device: &dyn DeviceBackend) -> Result<(), RuntimeError> {
        self.check_usable()?;
        if !self.pending {
            return Ok(());
        }
        let waited = device.wait_idle();
        self.pending = false;
        waited.map_err(|err| self.device_error(err))
    }

    /// Wait for in-flight work before resources are freed.
    pub(crate) fn drain(&mut self, device: &dyn DeviceBackend) {
        if self.pending && !self.poisoned {
            if let Err(err) = device.wait_idle() {
                log::warn!("wait before teardown failed: {err}");
            }
            self.pending = false;
        }
    }
}
