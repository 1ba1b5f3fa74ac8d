//! POSIX shared segment backend.
//!
//! Wraps `shm_open` and `mmap` behind the provider contract: create/open,
//! map, release on drop, and an explicit idempotent destroy. The backing
//! object lives under `/dev/shm/<name>` until destroyed, independently of
//! any process exit - releasing a mapping never removes the name.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::SegmentError;
use crate::types::SegmentName;

/// A mapped named shared memory segment.
///
/// The mapping is owned by the process that created this handle and is
/// released exactly once, on drop. The segment data itself is shared:
/// two processes that map the same name see the same physical memory.
pub struct Segment {
    /// Name of the shared memory object, without the leading slash.
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    size: usize,
    /// File descriptor for the shared memory object.
    fd: i32,
}

// SAFETY: Segment can be sent between threads; the mapping stays valid
// until drop and all shared access goes through atomics in the ring.
unsafe impl Send for Segment {}

// SAFETY: Segment can be shared between threads; the ring engine
// mediates all concurrent access through atomic fields.
unsafe impl Sync for Segment {}

fn shm_name(name: &SegmentName) -> Result<CString, SegmentError> {
    CString::new(format!("/{}", name.as_str())).map_err(|e| SegmentError::CreateFailed {
        name: name.as_str().to_string(),
        reason: format!("Invalid name: {}", e),
    })
}

impl Segment {
    /// Create a new segment of exactly `size` bytes, zero-initialized.
    ///
    /// Fails with [`SegmentError::AlreadyExists`] if the name is taken;
    /// the caller decides whether to fall back to [`Segment::open`].
    pub fn create(name: &SegmentName, size: usize) -> Result<Self, SegmentError> {
        let c_name = shm_name(name)?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };

        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EEXIST) {
                return Err(SegmentError::AlreadyExists {
                    name: name.as_str().to_string(),
                });
            }
            return Err(SegmentError::CreateFailed {
                name: name.as_str().to_string(),
                reason: format!("shm_open failed: {}", errno),
            });
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, size as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
            return Err(SegmentError::CreateFailed {
                name: name.as_str().to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = map_fd(fd, size).inspect_err(|_| {
            // Creation failed mid-way: leave no artifact behind.
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        })?;

        // Fresh shm objects are zero-filled after ftruncate; make it
        // explicit so the layout init never sees stale page contents.
        // SAFETY: ptr is valid, size is the mapped length
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared segment");

        Ok(Self {
            name: name.as_str().to_string(),
            ptr,
            size,
            fd,
        })
    }

    /// Open an existing segment and map exactly `size` bytes.
    ///
    /// The backing object must be at least `size` bytes; a smaller one
    /// means the two sides were built with different layouts.
    pub fn open(name: &SegmentName, size: usize) -> Result<Self, SegmentError> {
        let c_name = shm_name(name)?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };

        if fd < 0 {
            return Err(SegmentError::OpenFailed {
                name: name.as_str().to_string(),
                reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
            });
        }

        // SAFETY: fd is a valid file descriptor
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::fstat(fd, &mut stat) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(SegmentError::OpenFailed {
                name: name.as_str().to_string(),
                reason: format!("fstat failed: {}", errno),
            });
        }
        let actual = stat.st_size as usize;
        if actual < size {
            unsafe { libc::close(fd) };
            return Err(SegmentError::SizeMismatch {
                expected: size,
                actual,
            });
        }

        let ptr = map_fd(fd, size).inspect_err(|_| {
            unsafe { libc::close(fd) };
        })?;

        tracing::debug!(name = %name, size = size, "Opened shared segment");

        Ok(Self {
            name: name.as_str().to_string(),
            ptr,
            size,
            fd,
        })
    }

    /// Remove the durable backing artifact for `name`.
    ///
    /// Idempotent: destroying a name that does not exist is not an
    /// error. Existing mappings stay valid until their handles drop.
    pub fn destroy(name: &SegmentName) -> Result<(), SegmentError> {
        let c_name = shm_name(name).map_err(|_| SegmentError::DestroyFailed {
            name: name.as_str().to_string(),
            reason: "Invalid name".to_string(),
        })?;

        // SAFETY: c_name is a valid CString
        let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ENOENT) {
                return Ok(());
            }
            return Err(SegmentError::DestroyFailed {
                name: name.as_str().to_string(),
                reason: format!("shm_unlink failed: {}", errno),
            });
        }

        tracing::debug!(name = %name, "Destroyed shared segment");
        Ok(())
    }

    /// Get the name of this segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the mapped size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get a raw pointer to the mapped region.
    ///
    /// The mapping is page-aligned, so 8-byte aligned fields within it
    /// are safe for cross-process atomic loads and stores.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

fn map_fd(fd: i32, size: usize) -> Result<NonNull<u8>, SegmentError> {
    // SAFETY: fd is valid, size is nonzero, offset 0 is valid
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(SegmentError::MapFailed {
            reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
        });
    }

    Ok(NonNull::new(ptr as *mut u8).expect("mmap returned null but not MAP_FAILED"))
}

impl Drop for Segment {
    fn drop(&mut self) {
        // SAFETY: ptr and size were set during creation
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size) };
        if result < 0 {
            tracing::error!(
                name = %self.name,
                error = %std::io::Error::last_os_error(),
                "Failed to unmap shared segment"
            );
        }

        // SAFETY: fd was opened during creation
        unsafe { libc::close(self.fd) };
    }
}
