pub mod environment;
pub mod validation;

pub use environment::*;
pub use validation::*;
