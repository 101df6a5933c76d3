pub mod resolver;

pub use resolver::{InconsistentReference, Resolution, Resolver};
