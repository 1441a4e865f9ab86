//! Physical memory mapping for MMIO access
//!
//! This module maps a window of physical memory through `/dev/mem` so the
//! GPIO registers can be driven directly.
//!
//! # Safety
//!
//! Accessing physical memory is inherently unsafe and requires root privileges.
//! The mapping functions ensure proper alignment and size constraints.

use rdyspi_core::RegisterBlock;

use crate::error::{LinuxError, Result};

/// A mapped region of physical memory
#[cfg(target_os = "linux")]
pub struct PhysMap {
    /// Pointer to the mapped memory
    ptr: *mut u8,
    /// Size of the mapping
    size: usize,
    /// Physical address (for error reporting)
    phys_addr: u64,
}

#[cfg(target_os = "linux")]
impl PhysMap {
    /// Map a region of physical memory for MMIO access
    ///
    /// The caller must ensure that the range is a register block, not RAM,
    /// and that nothing else in the process maps it concurrently.
    pub fn new(phys_addr: u64, size: usize) -> Result<Self> {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;
        use std::os::unix::io::AsRawFd;

        let map_err = |source| LinuxError::MemoryMap {
            address: phys_addr,
            size,
            source,
        };

        // Open /dev/mem with O_SYNC for uncached access (required for MMIO)
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(map_err)?;

        let page_mask = page_size() - 1;
        let offset = (phys_addr as usize) & page_mask;
        let aligned_addr = phys_addr & !(page_mask as u64);
        let map_size = (size + offset + page_mask) & !page_mask;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                aligned_addr as libc::off_t,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(map_err(std::io::Error::last_os_error()));
        }

        // The descriptor is not needed once the mapping exists
        drop(file);

        log::debug!(
            "physmap: Mapped {:#x}+{:#x} ({} bytes)",
            aligned_addr,
            offset,
            map_size
        );

        Ok(Self {
            ptr: unsafe { (ptr as *mut u8).add(offset) },
            size: map_size - offset,
            phys_addr,
        })
    }

    /// Read a 32-bit value at byte `offset`
    #[inline]
    pub fn read32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.size, "read past end of mapping");
        debug_assert!(offset & 3 == 0, "unaligned 32-bit read");
        unsafe { core::ptr::read_volatile(self.ptr.add(offset) as *const u32) }
    }

    /// Write a 32-bit value at byte `offset`
    #[inline]
    pub fn write32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.size, "write past end of mapping");
        debug_assert!(offset & 3 == 0, "unaligned 32-bit write");
        unsafe { core::ptr::write_volatile(self.ptr.add(offset) as *mut u32, value) }
    }

    /// Get the physical address of this mapping
    pub fn phys_addr(&self) -> u64 {
        self.phys_addr
    }

    /// Get the usable size of this mapping
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(target_os = "linux")]
fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

#[cfg(target_os = "linux")]
impl Drop for PhysMap {
    fn drop(&mut self) {
        let page_mask = page_size() - 1;
        let offset = (self.phys_addr as usize) & page_mask;
        unsafe {
            let original_ptr = self.ptr.sub(offset);
            libc::munmap(original_ptr as *mut libc::c_void, self.size + offset);
        }
        log::debug!("physmap: Unmapped {:#x}", self.phys_addr);
    }
}

// MMIO registers don't have the usual memory aliasing concerns; the GPIO
// controller serializes its read-modify-write sequences itself
#[cfg(target_os = "linux")]
unsafe impl Send for PhysMap {}
#[cfg(target_os = "linux")]
unsafe impl Sync for PhysMap {}

// Stub for non-Linux platforms
#[cfg(not(target_os = "linux"))]
pub struct PhysMap {
    _private: (),
}

#[cfg(not(target_os = "linux"))]
impl PhysMap {
    pub fn new(_phys_addr: u64, _size: usize) -> Result<Self> {
        Err(LinuxError::NotSupported(
            "Physical memory mapping only supported on Linux",
        ))
    }

    pub fn read32(&self, _offset: usize) -> u32 {
        0
    }
    pub fn write32(&self, _offset: usize, _value: u32) {}
    pub fn phys_addr(&self) -> u64 {
        0
    }
    pub fn size(&self) -> usize {
        0
    }
}

impl RegisterBlock for PhysMap {
    #[inline]
    fn read(&self, word: usize) -> u32 {
        self.read32(word * 4)
    }

    #[inline]
    fn write(&self, word: usize, value: u32) {
        self.write32(word * 4, value)
    }
}
