pub mod model;
pub mod provider;

pub use provider::SeedanceProvider;
