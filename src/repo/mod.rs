pub mod lead;
pub mod remote;

pub use lead::*;
pub use remote::*;
