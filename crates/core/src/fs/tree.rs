//! Recursive copy and removal of files, symlinks and directory trees.

use std::fs::{self, DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;

use crate::error::{RitualError, RitualResult};

const COPY: &str = "copy";
const REMOVE: &str = "remove";

/// The three file kinds the replicator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Symlink,
    Directory,
}

impl Kind {
    fn of(meta: &Metadata) -> Option<Self> {
        let ft = meta.file_type();
        if ft.is_file() {
            Some(Kind::File)
        } else if ft.is_symlink() {
            Some(Kind::Symlink)
        } else if ft.is_dir() {
            Some(Kind::Directory)
        } else {
            None
        }
    }
}

/// One copy step: source, destination and the source's metadata captured
/// once by the caller.
struct CopySpec<'a> {
    src: &'a Path,
    dst: &'a Path,
    meta: &'a Metadata,
}

/// Copy `src` onto `dst`.
///
/// Files and symlinks are duplicated directly; a directory is replicated in
/// pre-order. A pre-existing destination must be of the same kind.
pub fn copy(src: &Path, dst: &Path) -> RitualResult<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| RitualError::io(COPY, "stat", src, e))?;
    let kind = Kind::of(&meta).ok_or_else(|| unsupported(COPY, src))?;

    match fs::symlink_metadata(dst) {
        Ok(dst_meta) => {
            if Kind::of(&dst_meta) != Some(kind) {
                return Err(RitualError::io(
                    COPY,
                    "compare",
                    dst,
                    io::Error::new(
                        ErrorKind::InvalidInput,
                        format!("file type for {} and {} differ", src.display(), dst.display()),
                    ),
                ));
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(RitualError::io(COPY, "stat", dst, e)),
    }

    let spec = CopySpec { src, dst, meta: &meta };
    match kind {
        Kind::File => copy_file(&spec),
        Kind::Symlink => copy_symlink(&spec),
        Kind::Directory => {
            create_dir(&spec)?;
            copy_tree(src, dst, src)
        }
    }
}

/// Remove `path` and, for directories, everything below it (children first).
///
/// Entries vanishing underneath us are not an error.
pub fn remove(path: &Path) -> RitualResult<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(RitualError::io(REMOVE, "stat", path, e)),
    };

    match Kind::of(&meta) {
        Some(Kind::Directory) => {
            let entries = match fs::read_dir(path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(RitualError::io(REMOVE, "read_dir", path, e)),
            };
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(RitualError::io(REMOVE, "read_dir", path, e)),
                };
                remove(&entry.path())?;
            }
            tolerate_missing(fs::remove_dir(path)).map_err(|e| RitualError::io(REMOVE, "rmdir", path, e))
        }
        Some(Kind::File | Kind::Symlink) => tolerate_missing(fs::remove_file(path))
            .map_err(|e| RitualError::io(REMOVE, "unlink", path, e)),
        None => Err(unsupported(REMOVE, path)),
    }
}

fn tolerate_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn unsupported(op: &'static str, path: &Path) -> RitualError {
    RitualError::io(op, "inspect", path, io::Error::new(ErrorKind::Unsupported, "unsupported file type"))
}

/// Pre-order walk of `dir`, replicating every entry below `src_root` at the
/// same relative position below `dst_root`.
fn copy_tree(src_root: &Path, dst_root: &Path, dir: &Path) -> RitualResult<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| RitualError::io(COPY, "read_dir", dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RitualError::io(COPY, "read_dir", dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let src = entry.path();
        // DirEntry::metadata does not follow symlinks.
        let meta = entry.metadata().map_err(|e| RitualError::io(COPY, "stat", &src, e))?;
        let relative = src.strip_prefix(src_root).unwrap_or(&src);
        let dst = dst_root.join(relative);
        let spec = CopySpec { src: &src, dst: &dst, meta: &meta };

        match Kind::of(&meta) {
            Some(Kind::Directory) => {
                create_dir(&spec)?;
                copy_tree(src_root, dst_root, &src)?;
            }
            Some(Kind::File) => copy_file(&spec)?,
            Some(Kind::Symlink) => copy_symlink(&spec)?,
            None => return Err(unsupported(COPY, &src)),
        }
    }
    Ok(())
}

fn create_dir(spec: &CopySpec<'_>) -> RitualResult<()> {
    match DirBuilder::new().mode(spec.meta.mode() & 0o777).create(spec.dst) {
        Err(e) if e.kind() != ErrorKind::AlreadyExists => {
            Err(RitualError::io(COPY, "mkdir", spec.dst, e))
        }
        _ => Ok(()),
    }
}

fn copy_file(spec: &CopySpec<'_>) -> RitualResult<()> {
    // Permission bits only; setuid, setgid and sticky are not carried over.
    let mode = spec.meta.mode() & 0o777;
    let mut src = File::open(spec.src).map_err(|e| RitualError::io(COPY, "open", spec.src, e))?;
    let mut dst = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(spec.dst)
        .map_err(|e| RitualError::io(COPY, "open", spec.dst, e))?;

    if !clone_file(&src, &dst) {
        block_copy(spec, &mut src, &mut dst)?;
    }

    // An existing destination keeps its old mode through open(2).
    fs::set_permissions(spec.dst, Permissions::from_mode(mode))
        .map_err(|e| RitualError::io(COPY, "chmod", spec.dst, e))
}

/// Copy-on-write clone; `false` means the filesystem cannot do it.
#[cfg(target_os = "linux")]
fn clone_file(src: &File, dst: &File) -> bool {
    use std::os::unix::io::AsRawFd;

    // _IOW(0x94, 9, int)
    const FICLONE: libc::c_ulong = 0x4004_9409;
    // SAFETY: both descriptors are open for the duration of the call.
    unsafe { libc::ioctl(dst.as_raw_fd(), FICLONE as _, src.as_raw_fd()) == 0 }
}

#[cfg(not(target_os = "linux"))]
fn clone_file(_src: &File, _dst: &File) -> bool {
    false
}

fn block_copy(spec: &CopySpec<'_>, src: &mut File, dst: &mut File) -> RitualResult<()> {
    let block_size = usize::try_from(spec.meta.blksize()).unwrap_or(0).max(512);
    let mut block = vec![0u8; block_size];

    loop {
        let n = match src.read(&mut block) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(RitualError::io(COPY, "read", spec.src, e)),
        };
        dst.write_all(&block[..n]).map_err(|e| RitualError::io(COPY, "write", spec.dst, e))?;
    }
}

fn copy_symlink(spec: &CopySpec<'_>) -> RitualResult<()> {
    let target =
        fs::read_link(spec.src).map_err(|e| RitualError::io(COPY, "readlink", spec.src, e))?;

    if target.as_os_str().len() as u64 != spec.meta.len() {
        return Err(RitualError::io(
            COPY,
            "readlink",
            spec.src,
            io::Error::new(ErrorKind::InvalidData, "link target changed size while copying"),
        ));
    }

    tolerate_missing(fs::remove_file(spec.dst))
        .map_err(|e| RitualError::io(COPY, "unlink", spec.dst, e))?;
    std::os::unix::fs::symlink(&target, spec.dst)
        .map_err(|e| RitualError::io(COPY, "symlink", spec.dst, e))
}
