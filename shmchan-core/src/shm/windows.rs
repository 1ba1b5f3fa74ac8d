// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Windows shared segment backend.
//!
//! Backed by a named paging-file mapping (`CreateFileMappingW` with
//! `INVALID_HANDLE_VALUE`), which has no durable artifact: the segment
//! vanishes when the last handle closes. [`Segment::destroy`] is
//! therefore a no-op here, and losing every handle before the peer
//! attaches loses the segment silently - the attach-time layout check
//! will report the resulting fresh, uninitialized mapping.

use std::ptr::NonNull;

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use crate::error::SegmentError;
use crate::types::SegmentName;

/// A mapped named shared memory segment (paging-file backed).
///
/// Same contract as the POSIX type: the view is owned by this handle
/// and released exactly once, on drop; the segment contents are shared
/// with every other process that maps the same name.
pub struct Segment {
    name: String,
    ptr: NonNull<u8>,
    size: usize,
    mapping: HANDLE,
}

// SAFETY: Segment can be sent between threads; the view stays valid
// until drop and all shared access goes through atomics in the ring.
unsafe impl Send for Segment {}

// SAFETY: Segment can be shared between threads; the ring engine
// mediates all concurrent access through atomic fields.
unsafe impl Sync for Segment {}

/// Session-local object namespace, mirroring the POSIX `/` prefix.
fn wide_name(name: &SegmentName) -> Vec<u16> {
    format!("Local\\{}", name.as_str())
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect()
}

impl Segment {
    /// Create a new segment of exactly `size` bytes, zero-initialized.
    ///
    /// Fails with [`SegmentError::AlreadyExists`] if another process
    /// already owns a mapping under this name.
    pub fn create(name: &SegmentName, size: usize) -> Result<Self, SegmentError> {
        let wide = wide_name(name);

        // SAFETY: wide is NUL-terminated; INVALID_HANDLE_VALUE selects
        // the paging file as backing store
        let mapping = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                std::ptr::null(),
                PAGE_READWRITE,
                (size as u64 >> 32) as u32,
                size as u32,
                wide.as_ptr(),
            )
        };

        if mapping == 0 {
            return Err(SegmentError::CreateFailed {
                name: name.as_str().to_string(),
                reason: format!(
                    "CreateFileMappingW failed: {}",
                    std::io::Error::last_os_error()
                ),
            });
        }

        // CreateFileMappingW hands back the existing object on a name
        // collision instead of failing; surface that as AlreadyExists
        // so the caller can fall back to open().
        // SAFETY: mapping is a valid handle at this point
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(mapping) };
            return Err(SegmentError::AlreadyExists {
                name: name.as_str().to_string(),
            });
        }

        let ptr = map_view(mapping, size).inspect_err(|_| {
            unsafe { CloseHandle(mapping) };
        })?;

        // Fresh paging-file mappings are zero pages; make it explicit so
        // the layout init never sees stale contents.
        // SAFETY: ptr is valid, size is the mapped length
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, size);
        }

        tracing::debug!(name = %name, size = size, "Created shared segment");

        Ok(Self {
            name: name.as_str().to_string(),
            ptr,
            size,
            mapping,
        })
    }

    /// Open an existing segment and map exactly `size` bytes.
    pub fn open(name: &SegmentName, size: usize) -> Result<Self, SegmentError> {
        let wide = wide_name(name);

        // SAFETY: wide is NUL-terminated
        let mapping = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wide.as_ptr()) };

        if mapping == 0 {
            return Err(SegmentError::OpenFailed {
                name: name.as_str().to_string(),
                reason: format!(
                    "OpenFileMappingW failed: {}",
                    std::io::Error::last_os_error()
                ),
            });
        }

        // A view larger than the underlying section fails to map, which
        // covers the size-mismatch check the POSIX backend does via fstat.
        let ptr = map_view(mapping, size).inspect_err(|_| {
            unsafe { CloseHandle(mapping) };
        })?;

        tracing::debug!(name = %name, size = size, "Opened shared segment");

        Ok(Self {
            name: name.as_str().to_string(),
            ptr,
            size,
            mapping,
        })
    }

    /// Remove the durable backing artifact for `name`.
    ///
    /// Paging-file mappings have none, so this is a documented no-op;
    /// the segment disappears when the last handle closes. Idempotent.
    pub fn destroy(name: &SegmentName) -> Result<(), SegmentError> {
        tracing::debug!(name = %name, "Destroy is a no-op for paging-file segments");
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
    /// Views are allocation-granularity aligned, so 8-byte aligned
    /// fields within them are safe for cross-process atomics.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

fn map_view(mapping: HANDLE, size: usize) -> Result<NonNull<u8>, SegmentError> {
    // SAFETY: mapping is a valid file-mapping handle
    let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, size) };

    NonNull::new(view.Value as *mut u8).ok_or_else(|| SegmentError::MapFailed {
        reason: format!(
            "MapViewOfFile failed: {}",
            std::io::Error::last_os_error()
        ),
    })
}

impl Drop for Segment {
    fn drop(&mut self) {
        // SAFETY: ptr and mapping were set during creation
        unsafe {
            let view = MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.ptr.as_ptr() as *mut _,
            };
            if UnmapViewOfFile(view) == 0 {
                tracing::error!(
                    name = %self.name,
                    error = %std::io::Error::last_os_error(),
                    "Failed to unmap shared segment"
                );
            }
            CloseHandle(self.mapping);
        }
    }
}
