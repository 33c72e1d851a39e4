pub mod dto;
pub mod router;

pub use dto::*;
pub use router::*;
