//! Filesystem operations available to rituals.
//!
//! `copy`/`remove` live in [`tree`]; the rest are thin wrappers that attach
//! the operation name and path to OS errors.

pub mod tree;

pub use tree::{copy, remove};

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::{RitualError, RitualResult};

/// Create `path` and every missing parent.
///
/// An existing directory is fine; an existing non-directory is a fault.
pub fn mkdirs(path: &Path) -> RitualResult<()> {
    fs::create_dir_all(path).map_err(|e| RitualError::io("mkdirs", "mkdir", path, e))?;
    if !path.is_dir() {
        return Err(RitualError::io(
            "mkdirs",
            "mkdir",
            path,
            io::Error::new(ErrorKind::AlreadyExists, "exists and is not a directory"),
        ));
    }
    Ok(())
}

pub fn chdir(path: &Path) -> RitualResult<()> {
    std::env::set_current_dir(path).map_err(|e| RitualError::io("chdir", "chdir", path, e))
}

pub fn chroot(path: &Path) -> RitualResult<()> {
    std::os::unix::fs::chroot(path).map_err(|e| RitualError::io("chroot", "chroot", path, e))
}

/// Current working directory.
pub fn pwd() -> RitualResult<PathBuf> {
    std::env::current_dir().map_err(|e| RitualError::io("pwd", "getcwd", ".", e))
}

/// Join path components with single slashes.
///
/// Trailing slashes are dropped from every component and leading ones from
/// all but the first, so `["/srv/", "/www"]` gives `/srv/www`.
pub fn join_path<S: AsRef<str>>(parts: &[S]) -> String {
    let mut joined = String::new();
    for (i, part) in parts.iter().enumerate() {
        let part = part.as_ref().trim_end_matches('/');
        if i > 0 {
            joined.push('/');
            joined.push_str(part.trim_start_matches('/'));
        } else {
            joined.push_str(part);
        }
    }
    joined
}

/// POSIX `dirname(3)`.
pub fn dirname(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        None => ".".into(),
        Some(i) => {
            let parent = trimmed[..i].trim_end_matches('/');
            if parent.is_empty() {
                "/".into()
            } else {
                parent.into()
            }
        }
    }
}

/// POSIX `basename(3)`.
pub fn basename(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { ".".into() } else { "/".into() };
    }
    match trimmed.rfind('/') {
        None => trimmed.into(),
        Some(i) => trimmed[i + 1..].into(),
    }
}

/// Mount `source` on `target`. Flags are given by name (`bind`, `rdonly`, ...).
#[cfg(target_os = "linux")]
pub fn mount(
    source: &str,
    target: &Path,
    fstype: &str,
    flags: &[String],
    data: Option<&str>,
) -> RitualResult<()> {
    let flags = mount_flags(flags)?;
    nix::mount::mount(Some(source), target, Some(fstype), flags, data)
        .map_err(|errno| RitualError::io("mount", "mount", target, errno.into()))
}

#[cfg(target_os = "linux")]
pub fn umount(target: &Path) -> RitualResult<()> {
    nix::mount::umount(target).map_err(|errno| RitualError::io("umount", "umount", target, errno.into()))
}

#[cfg(not(target_os = "linux"))]
pub fn mount(
    _source: &str,
    target: &Path,
    _fstype: &str,
    _flags: &[String],
    _data: Option<&str>,
) -> RitualResult<()> {
    Err(RitualError::io("mount", "mount", target, io::Error::from(ErrorKind::Unsupported)))
}

#[cfg(not(target_os = "linux"))]
pub fn umount(target: &Path) -> RitualResult<()> {
    Err(RitualError::io("umount", "umount", target, io::Error::from(ErrorKind::Unsupported)))
}

#[cfg(target_os = "linux")]
fn mount_flags(names: &[String]) -> RitualResult<nix::mount::MsFlags> {
    use nix::mount::MsFlags;

    names.iter().try_fold(MsFlags::empty(), |acc, name| {
        let flag = match name.as_str() {
            "rdonly" => MsFlags::MS_RDONLY,
            "nosuid" => MsFlags::MS_NOSUID,
            "nodev" => MsFlags::MS_NODEV,
            "noexec" => MsFlags::MS_NOEXEC,
            "synchronous" => MsFlags::MS_SYNCHRONOUS,
            "remount" => MsFlags::MS_REMOUNT,
            "mandlock" => MsFlags::MS_MANDLOCK,
            "dirsync" => MsFlags::MS_DIRSYNC,
            "noatime" => MsFlags::MS_NOATIME,
            "nodiratime" => MsFlags::MS_NODIRATIME,
            "bind" => MsFlags::MS_BIND,
            "move" => MsFlags::MS_MOVE,
            "rec" => MsFlags::MS_REC,
            "silent" => MsFlags::MS_SILENT,
            "unbindable" => MsFlags::MS_UNBINDABLE,
            "private" => MsFlags::MS_PRIVATE,
            "slave" => MsFlags::MS_SLAVE,
            "shared" => MsFlags::MS_SHARED,
            "relatime" => MsFlags::MS_RELATIME,
            "strictatime" => MsFlags::MS_STRICTATIME,
            "lazytime" => MsFlags::MS_LAZYTIME,
            other => return Err(RitualError::usage("mount", format!("unknown mount flag '{other}'"))),
        };
        Ok(acc | flag)
    })
}
