use std::io::Write;
use std::thread;

use tracing::warn;

use crate::bus::ServoBus;
use crate::error::Result;

/// Scoped EPROM unlock.
///
/// Created by unlocking a device's EPROM. The lock is restored by
/// [`EpromUnlock::release`] or, if the guard is dropped without it (early
/// return, panic), by `Drop`. Either way protection is never left disabled.
pub(crate) struct EpromUnlock<'a, W: Write + Send + 'static> {
    bus: &'a ServoBus<W>,
    id: u8,
    armed: bool,
}

impl<'a, W: Write + Send + 'static> EpromUnlock<'a, W> {
    /// Unlock `id` and wait for the device to settle.
    pub(crate) fn acquire(bus: &'a ServoBus<W>, id: u8) -> Result<Self> {
        bus.lock_eprom(id, false)?;
        thread::sleep(bus.config().settle_delay);
        Ok(Self {
            bus,
            id,
            armed: true,
        })
    }

    /// Re-lock under a different id, for writes that renumber the device.
    pub(crate) fn retarget(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Wait for the device to settle, then lock.
    pub(crate) fn release(mut self) -> Result<()> {
        self.armed = false;
        self.relock()
    }

    fn relock(&self) -> Result<()> {
        thread::sleep(self.bus.config().settle_delay);
        let result = self.bus.lock_eprom(self.id, true);
        if let Err(err) = &result {
            warn!(id = self.id, error = %err, "failed to re-lock eprom");
        }
        result
    }
}

impl<W: Write + Send + 'static> Drop for EpromUnlock<'_, W> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.relock();
        }
    }
}
