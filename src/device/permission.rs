//! Restore read access to the touch device node through `su`.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Something that can try to make the device node readable.
pub trait PermissionRepair: Send + Sync {
    fn repair(&self, path: &Path) -> Result<()>;
}

/// Relaxes SELinux and opens up the node's mode via `su -c`.
#[derive(Debug, Clone)]
pub struct SuChmod {
    su: String,
}

impl Default for SuChmod {
    fn default() -> Self {
        Self { su: "su".into() }
    }
}

impl SuChmod {
    /// Use a different privilege helper binary in place of `su`.
    pub fn with_helper(helper: impl Into<String>) -> Self {
        Self { su: helper.into() }
    }

    fn run_command(&self, command: &str) -> std::result::Result<(), String> {
        log::debug!("[device] executing: {} -c {}", self.su, command);
        let status = Command::new(&self.su)
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|e| format!("cannot run {}: {}", self.su, e))?;

        if !status.success() {
            return Err(match status.code() {
                Some(code) => format!("'{}' exited with status {}", command, code),
                None => format!("'{}' terminated by signal", command),
            });
        }
        Ok(())
    }
}

impl PermissionRepair for SuChmod {
    fn repair(&self, path: &Path) -> Result<()> {
        log::info!("[device] repairing SELinux mode and permissions of {}", path.display());

        // Not every device enforces SELinux; keep going if this fails.
        if let Err(reason) = self.run_command("setenforce 0") {
            log::warn!("[device] {}; continuing with chmod", reason);
        }

        self.run_command(&format!("chmod 666 {}", path.display()))
            .map_err(|reason| Error::PermissionRepairFailed {
                path: path.to_path_buf(),
                reason,
            })?;

        log::info!("[device] permission repair done for {}", path.display());
        Ok(())
    }
}
