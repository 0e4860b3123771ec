use crate::Desktop;
use tracing::{info, warn};

/// Holds the global keyboard and mouse lock while alive.
///
/// Locking needs elevation on Windows; when the OS refuses, a warning is
/// logged and the automation runs unlocked.
pub struct InputLock {
    desktop: Desktop,
    locked: bool,
}

impl InputLock {
    pub fn acquire(desktop: &Desktop) -> Self {
        let locked = match desktop.block_input(true) {
            Ok(true) => {
                info!("Input locked");
                true
            }
            Ok(false) => {
                warn!("Could not block input. Run as Administrator for full protection.");
                false
            }
            Err(e) => {
                warn!("BlockInput error: {}", e);
                false
            }
        };
        Self {
            desktop: desktop.clone(),
            locked,
        }
    }

    /// A guard that never touches the OS lock.
    pub fn disabled(desktop: &Desktop) -> Self {
        Self {
            desktop: desktop.clone(),
            locked: false,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for InputLock {
    fn drop(&mut self) {
        if !self.locked {
            return;
        }
        match self.desktop.block_input(false) {
            Ok(_) => info!("Input unlocked"),
            Err(e) => warn!("failed to release input lock: {}", e),
        }
    }
}
