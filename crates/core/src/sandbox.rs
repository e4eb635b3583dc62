//! User/mount namespace sandbox ("hinder").
//!
//! Entering the namespace is one-way. [`Credentials::hinder`] consumes its
//! handle, and a process-wide flag rejects a second entry even through a new
//! handle, since the kernel itself would happily nest user namespaces.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SandboxError;

static HINDERED: AtomicBool = AtomicBool::new(false);

/// Requested identity inside the new namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

/// Proof that the current process entered its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hindered {
    /// Identity mapped inside the namespace.
    pub mapped: Credentials,
    /// Identity the process had before entering it.
    pub original: Credentials,
}

impl Credentials {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Move the calling process into a fresh user+mount namespace, mapping its
    /// current uid/gid onto `self`.
    ///
    /// Steps already applied cannot be undone; a failure past namespace entry
    /// leaves the process half-configured and should be treated as fatal.
    #[cfg(target_os = "linux")]
    pub fn hinder(self) -> Result<Hindered, SandboxError> {
        use nix::sched::{unshare, CloneFlags};
        use nix::unistd::{getgid, getuid};

        if HINDERED.swap(true, Ordering::SeqCst) {
            return Err(SandboxError::AlreadyHindered);
        }

        // Unmapped ids resolve to the overflow id once unshare succeeds.
        let original = Credentials::new(getuid().as_raw(), getgid().as_raw());

        if let Err(errno) = unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNS) {
            HINDERED.store(false, Ordering::SeqCst);
            return Err(SandboxError::Step { step: "unshare", source: errno.into() });
        }

        write_proc("uid_map", &id_map(self.uid, original.uid))?;
        // The kernel refuses an unprivileged gid_map until setgroups is denied.
        write_proc("setgroups", "deny")?;
        write_proc("gid_map", &id_map(self.gid, original.gid))?;

        tracing::debug!(
            uid = self.uid,
            gid = self.gid,
            original_uid = original.uid,
            original_gid = original.gid,
            "entered user and mount namespace"
        );

        Ok(Hindered { mapped: self, original })
    }

    /// Namespaces are unavailable here: warn and carry on unisolated.
    #[cfg(not(target_os = "linux"))]
    pub fn hinder(self) -> Result<Hindered, SandboxError> {
        if HINDERED.swap(true, Ordering::SeqCst) {
            return Err(SandboxError::AlreadyHindered);
        }
        crate::logging::emit(
            crate::logging::LogLevel::Warning,
            "User isolation is not supported on this platform!",
        );
        Ok(Hindered { mapped: self, original: self })
    }
}

/// Whether this process already went through [`Credentials::hinder`].
pub fn is_hindered() -> bool {
    HINDERED.load(Ordering::SeqCst)
}

fn id_map(inside: u32, outside: u32) -> String {
    format!("{inside} {outside} 1")
}

#[cfg(target_os = "linux")]
fn write_proc(file: &'static str, content: &str) -> Result<(), SandboxError> {
    use std::io::Write;

    let path = format!("/proc/self/{file}");
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .and_then(|mut f| f.write_all(content.as_bytes()))
        .map_err(|source| SandboxError::Step { step: file, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_map_has_single_entry() {
        assert_eq!(id_map(0, 1000), "0 1000 1");
    }
}
