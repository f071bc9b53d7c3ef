mod event;
mod order;

pub use event::*;
pub use order::*;
