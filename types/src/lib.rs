#![no_std]

extern crate alloc;

mod device;
mod types;

pub use self::{device::*, types::*};
