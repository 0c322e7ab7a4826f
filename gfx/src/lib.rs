#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod canvas_font;
pub mod canvas_handles;
pub mod canvas_ops;
pub mod damage;

pub use damage::{DamageTracker, InternalDamageTracker};
