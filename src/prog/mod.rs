// Licensed under the Apache-2.0 license

//! Collaborators driven by the two-wire slave: the programming buffer that
//! holds the page being read or written, and the bootloader control hook
//! that receives exit requests.

pub mod page_buffer;

use core::sync::atomic::{AtomicBool, Ordering};

pub use page_buffer::{MemoryPageStore, PageBuffer, PageStore};

/// Byte-addressed window onto the image being programmed.
///
/// All calls arrive from the bus interrupt, one per bus condition at most,
/// so implementations must return promptly.
pub trait ProgrammingBuffer {
    /// Select the location for following byte operations. May load the page
    /// containing `address` into a working buffer.
    fn set_address(&mut self, address: u16);

    /// Store one byte at the current position and advance.
    fn set_byte(&mut self, value: u8);

    /// Byte at the current position; advances.
    fn get_byte(&mut self) -> u8;

    /// Commit pending writes to persistent storage.
    fn flush(&mut self);
}

impl<T: ProgrammingBuffer + ?Sized> ProgrammingBuffer for &mut T {
    fn set_address(&mut self, address: u16) {
        (**self).set_address(address);
    }

    fn set_byte(&mut self, value: u8) {
        (**self).set_byte(value);
    }

    fn get_byte(&mut self) -> u8 {
        (**self).get_byte()
    }

    fn flush(&mut self) {
        (**self).flush();
    }
}

/// Receives the exit request encoded by the reserved target address.
pub trait BootControl {
    fn request_exit(&mut self);
}

/// Exit request latch shared between the bus interrupt and the main loop.
///
/// ```rust
/// use twiboot::prog::{BootControl, ExitFlag};
///
/// static EXIT: ExitFlag = ExitFlag::new();
///
/// let mut control = &EXIT;
/// control.request_exit();
/// assert!(EXIT.take());
/// assert!(!EXIT.is_requested());
/// ```
#[derive(Debug, Default)]
pub struct ExitFlag(AtomicBool);

impl ExitFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Return and clear the pending request.
    // Plain load/store: parts without compare-and-swap must build this too.
    pub fn take(&self) -> bool {
        let requested = self.0.load(Ordering::Acquire);
        if requested {
            self.0.store(false, Ordering::Release);
        }
        requested
    }
}

impl BootControl for &ExitFlag {
    fn request_exit(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}
