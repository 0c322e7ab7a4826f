//! Binds owned [`Canvas`] surfaces into a [`slopos_handle::Table`] so a
//! canvas can be referenced by an opaque handle instead of a borrowed
//! reference, the way `slopos-core` binds tasks and `slopos-drivers` binds
//! sockets into their own handle-style tables.
//!
//! `DrawBuffer` borrows its backing slice and can't outlive the stack frame
//! that created it, so it can't sit behind a handle. [`OwnedCanvas`] owns
//! its pixel storage instead, and is wrapped in an `IrqMutex` so the
//! `&mut self` methods `Canvas` requires can be reached through the
//! handle table's shared `Arc<dyn Any + Send + Sync>` object slots.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use slopos_abi::damage::DamageRect;
use slopos_abi::draw::{Canvas, EncodedPixel};
use slopos_abi::pixel::PixelFormat;
use slopos_handle::{Handle, ObjectType, Table};
use slopos_lib::IrqMutex;

use crate::DamageTracker;

/// Object-type tag canvases are stored under in a [`Table`] shared with
/// other object kinds.
pub const CANVAS_OBJECT_TYPE: ObjectType = 1;

/// A heap-owned pixel buffer implementing [`Canvas`]. Unlike `DrawBuffer`,
/// which wraps a borrowed `&mut [u8]`, this owns its storage so it can
/// live for as long as a handle references it.
pub struct OwnedCanvas {
    data: Vec<u8>,
    width: u32,
    height: u32,
    pitch: usize,
    bytes_pp: u8,
    pixel_format: PixelFormat,
    damage: DamageTracker,
}

impl OwnedCanvas {
    pub fn new(width: u32, height: u32, bytes_pp: u8) -> Option<Self> {
        if bytes_pp != 3 && bytes_pp != 4 {
            return None;
        }
        let pitch = width as usize * bytes_pp as usize;
        Some(Self {
            data: vec![0u8; pitch * height as usize],
            width,
            height,
            pitch,
            bytes_pp,
            pixel_format: if bytes_pp == 4 {
                PixelFormat::Argb8888
            } else {
                PixelFormat::Rgb888
            },
            damage: DamageTracker::new(),
        })
    }

    /// The accumulated damage region since the last `drain_damage`, if any.
    pub fn drain_damage(&mut self) -> Option<DamageRect> {
        if !self.damage.is_dirty() {
            return None;
        }
        let bbox = self.damage.bounding_box();
        self.damage.clear();
        Some(bbox)
    }
}

impl Canvas for OwnedCanvas {
    #[inline]
    fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn pitch_bytes(&self) -> usize {
        self.pitch
    }

    #[inline]
    fn bytes_per_pixel(&self) -> u8 {
        self.bytes_pp
    }

    #[inline]
    fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn write_encoded_at(&mut self, byte_offset: usize, pixel: EncodedPixel) {
        let bytes = pixel.to_u32().to_le_bytes();
        match self.bytes_pp {
            4 => {
                if byte_offset + 4 <= self.data.len() {
                    self.data[byte_offset..byte_offset + 4].copy_from_slice(&bytes);
                }
            }
            3 => {
                if byte_offset + 3 <= self.data.len() {
                    self.data[byte_offset..byte_offset + 3].copy_from_slice(&bytes[..3]);
                }
            }
            _ => {}
        }
    }

    #[inline]
    fn report_damage(&mut self, rect: DamageRect) {
        self.damage.add(rect);
    }
}

/// A registered canvas: an owned surface behind an `IrqMutex`, reachable
/// from the handle table's type-erased object slot.
pub type CanvasRef = Arc<IrqMutex<OwnedCanvas>>;

/// Allocate a handle for a freshly-created canvas of the given dimensions.
/// Returns the null handle if `bytes_pp` is not 3 or 4, or if the table's
/// allocator refuses growth.
pub fn create_canvas(table: &Table, width: u32, height: u32, bytes_pp: u8) -> Handle {
    let Some(canvas) = OwnedCanvas::new(width, height, bytes_pp) else {
        return Handle::NULL;
    };
    let object: CanvasRef = Arc::new(IrqMutex::new(canvas));
    table.alloc_handle_safe(object, CANVAS_OBJECT_TYPE, true)
}

/// Run `f` against the canvas `handle` refers to, holding the canvas's own
/// lock only for the duration of the call. Returns `None` if `handle` does
/// not resolve to a live canvas.
pub fn with_canvas<R>(table: &Table, handle: Handle, f: impl FnOnce(&mut OwnedCanvas) -> R) -> Option<R> {
    let object = table.get_object_by_type(handle, CANVAS_OBJECT_TYPE)?;
    let canvas_ref = object.downcast::<IrqMutex<OwnedCanvas>>().ok()?;
    let mut guard = canvas_ref.lock();
    Some(f(&mut guard))
}

/// Release a canvas handle. The underlying `IrqMutex<OwnedCanvas>` is
/// dropped once every outstanding `Arc` clone (including the table's own)
/// goes away.
pub fn destroy_canvas(table: &Table, handle: Handle) {
    table.free_handle_safe(CANVAS_OBJECT_TYPE, handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    fn table() -> Table {
        Table::new_default(Arc::new(String::from("gfx-test-process")))
    }

    #[test]
    fn create_lock_and_draw() {
        let t = table();
        let h = create_canvas(&t, 4, 4, 4);
        assert!(!h.is_null());

        let drew = with_canvas(&t, h, |c| {
            c.put_pixel(0, 0, c.pixel_format().encode(slopos_abi::draw::Color32::WHITE));
            c.drain_damage().is_some()
        });
        assert_eq!(drew, Some(true));
    }

    #[test]
    fn destroy_then_lookup_fails() {
        let t = table();
        let h = create_canvas(&t, 2, 2, 3);
        destroy_canvas(&t, h);
        assert!(with_canvas(&t, h, |_| ()).is_none());
    }

    #[test]
    fn rejects_bad_bytes_per_pixel() {
        let t = table();
        let h = create_canvas(&t, 2, 2, 2);
        assert!(h.is_null());
    }
}
