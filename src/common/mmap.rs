use std::{io, ptr, ptr::NonNull};

/// Maps `size` bytes of private, anonymous, zero-filled memory.
pub(crate) fn map_anonymous(size: usize) -> io::Result<NonNull<u8>> {
    let addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if addr == libc::MAP_FAILED {
        let err = io::Error::last_os_error();
        #[cfg(feature = "logging")]
        log::warn!("mmap of {size} bytes failed: {err}");
        return Err(err);
    }

    NonNull::new(addr.cast::<u8>())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned a null mapping"))
}

/// Unmaps a region previously returned by [`map_anonymous`].
///
/// # Safety
///
/// `addr` and `size` must describe a live mapping, and nothing may access it
/// afterwards.
pub(crate) unsafe fn unmap(addr: NonNull<u8>, size: usize) -> io::Result<()> {
    if libc::munmap(addr.as_ptr().cast(), size) != 0 {
        let err = io::Error::last_os_error();
        #[cfg(feature = "logging")]
        log::warn!("munmap of {size} bytes at {addr:p} failed: {err}");
        return Err(err);
    }
    Ok(())
}

pub(crate) fn page_size() -> usize {
    // NOTE: sysconf returns -1 on failure; fall back to the common 4 KiB.
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        n if n > 0 => n as usize,
        _ => 4096,
    }
}
