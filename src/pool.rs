//! Pooled visual-object lifecycle.
//!
//! Each spatial node owns one pooled visual (a mesh-renderer-like object in
//! the host application). The core only needs this narrow capability
//! surface: acquire/release, enable/disable, and placement.

use glam::Vec3;

/// Opaque handle to a pooled visual object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

pub trait VisualPool: Send {
    fn acquire(&mut self) -> VisualHandle;
    fn release(&mut self, handle: VisualHandle);
    fn set_enabled(&mut self, handle: VisualHandle, enabled: bool);
    fn set_origin(&mut self, handle: VisualHandle, origin: Vec3);
}

/// No-op pool for headless use (tests, servers, tooling).
#[derive(Debug, Default)]
pub struct NullVisualPool {
    next: u64,
}

impl VisualPool for NullVisualPool {
    fn acquire(&mut self) -> VisualHandle {
        let handle = VisualHandle(self.next);
        self.next += 1;
        handle
    }

    fn release(&mut self, _handle: VisualHandle) {}
    fn set_enabled(&mut self, _handle: VisualHandle, _enabled: bool) {}
    fn set_origin(&mut self, _handle: VisualHandle, _origin: Vec3) {}
}

/// Stack-recycling pool: released handles are handed out again before any
/// new id is minted, so a host can keep a dense table of scene objects.
#[derive(Debug, Default)]
pub struct RecyclingPool {
    free: Vec<VisualHandle>,
    next: u64,
    live: usize,
}

impl RecyclingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently acquired handles.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Total ids ever minted; stays flat once the pool warms up.
    pub fn minted(&self) -> u64 {
        self.next
    }
}

impl VisualPool for RecyclingPool {
    fn acquire(&mut self) -> VisualHandle {
        self.live += 1;
        match self.free.pop() {
            Some(handle) => handle,
            None => {
                let handle = VisualHandle(self.next);
                self.next += 1;
                handle
            }
        }
    }

    fn release(&mut self, handle: VisualHandle) {
        self.live = self.live.saturating_sub(1);
        self.free.push(handle);
    }

    fn set_enabled(&mut self, _handle: VisualHandle, _enabled: bool) {}
    fn set_origin(&mut self, _handle: VisualHandle, _origin: Vec3) {}
}
