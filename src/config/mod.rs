mod settings;

pub use settings::{Config, KernelConfig, WaitConfig, EXAMPLE_CONFIG};
