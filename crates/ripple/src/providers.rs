pub mod base;
pub mod mock;

pub use base::{Generation, PartStream, Provider, Usage};
pub use mock::MockProvider;
