//! Host memory backing for heap regions
//!
//! CPU-side heap regions are memory mappings: anonymous by default, or backed
//! by a Linux memfd when the region should be shareable by descriptor.

use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::heap::{HeapOps, HeapRegion};

/// Backing flavor for host heap regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HostBacking {
    /// Anonymous private mapping
    #[default]
    Anonymous,
    /// Anonymous memory file descriptor (Linux-specific)
    #[cfg(target_os = "linux")]
    MemFd,
}

impl HostBacking {
    /// Check if this backing type is supported on the current platform
    pub fn is_supported(&self) -> bool {
        match self {
            HostBacking::Anonymous => true,
            #[cfg(target_os = "linux")]
            HostBacking::MemFd => true,
        }
    }
}

/// One mapped host region
#[derive(Debug)]
pub struct HostRegion {
    mmap: MmapMut,
    /// Keeps the memfd file alive for the mapping's lifetime
    _file: Option<std::fs::File>,
}

impl HostRegion {
    /// Mutable pointer to the start of the mapping
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }
}

impl HeapRegion for HostRegion {
    fn addr(&self) -> usize {
        self.mmap.as_ptr() as usize
    }

    fn size(&self) -> usize {
        self.mmap.len()
    }
}

/// Heap-region provider over host memory mappings
#[derive(Debug)]
pub struct HostHeapOps {
    backing: HostBacking,
    region_seq: AtomicU64,
}

impl Default for HostHeapOps {
    fn default() -> Self {
        Self::new(HostBacking::default())
    }
}

impl HostHeapOps {
    /// Create a provider with the given backing flavor
    pub fn new(backing: HostBacking) -> Self {
        Self {
            backing,
            region_seq: AtomicU64::new(0),
        }
    }

    /// The configured backing flavor
    pub fn backing(&self) -> HostBacking {
        self.backing
    }

    fn map_anonymous(size: usize) -> Result<HostRegion> {
        let mmap = MmapOptions::new()
            .len(size)
            .map_anon()
            .map_err(|e| TesseraError::backend_failure(format!("anonymous mmap failed: {}", e)))?;
        Ok(HostRegion { mmap, _file: None })
    }

    #[cfg(target_os = "linux")]
    fn map_memfd(&self, size: usize) -> Result<HostRegion> {
        use std::ffi::CString;

        use nix::sys::memfd::{memfd_create, MemFdCreateFlag};
        use nix::unistd::ftruncate;

        let seq = self.region_seq.fetch_add(1, Ordering::Relaxed);
        let name = CString::new(format!("tessera_heap_{}", seq))
            .map_err(|_| TesseraError::invalid_argument("name", "name contains null bytes"))?;
        let owned_fd = memfd_create(&name, MemFdCreateFlag::MFD_CLOEXEC)
            .map_err(|e| TesseraError::backend_failure(format!("memfd_create failed: {}", e)))?;
        ftruncate(&owned_fd, size as i64)
            .map_err(|e| TesseraError::backend_failure(format!("ftruncate failed: {}", e)))?;

        let file = std::fs::File::from(owned_fd);
        let mmap = unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(&file)
                .map_err(|e| TesseraError::backend_failure(format!("memfd mmap failed: {}", e)))?
        };
        Ok(HostRegion {
            mmap,
            _file: Some(file),
        })
    }
}

impl HeapOps for HostHeapOps {
    type Region = HostRegion;

    fn allocate_region(&self, size: usize) -> Result<HostRegion> {
        if size == 0 {
            return Err(TesseraError::invalid_argument(
                "size",
                "region size must be non-zero",
            ));
        }
        match self.backing {
            HostBacking::Anonymous => {
                let _ = self.region_seq.fetch_add(1, Ordering::Relaxed);
                Self::map_anonymous(size)
            }
            #[cfg(target_os = "linux")]
            HostBacking::MemFd => self.map_memfd(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_region() {
        let ops = HostHeapOps::default();
        let region = ops.allocate_region(4096).unwrap();
        assert_eq!(region.size(), 4096);
        assert_ne!(region.addr(), 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        let ops = HostHeapOps::default();
        assert!(ops.allocate_region(0).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_memfd_region() {
        let ops = HostHeapOps::new(HostBacking::MemFd);
        let region = ops.allocate_region(8192).unwrap();
        assert_eq!(region.size(), 8192);
        assert_ne!(region.addr(), 0);
    }

    #[test]
    fn test_regions_are_writable() {
        let ops = HostHeapOps::default();
        let mut region = ops.allocate_region(4096).unwrap();
        unsafe {
            region.as_mut_ptr().write(0xA5);
            assert_eq!(*region.as_mut_ptr(), 0xA5);
        }
    }
}
