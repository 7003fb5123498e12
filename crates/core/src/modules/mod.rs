pub mod composite;
pub mod definition;

pub use composite::*;
pub use definition::*;
