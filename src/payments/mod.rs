mod creem;

pub use creem::*;
