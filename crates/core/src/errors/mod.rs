pub mod core;
pub mod result;

pub use core::*;
pub use result::*;
