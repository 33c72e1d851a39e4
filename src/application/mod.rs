pub mod interfaces;
pub mod services;

pub use interfaces::*;
pub use services::*;
