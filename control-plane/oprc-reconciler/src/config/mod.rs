mod types;

pub use types::ReconcilerConfig;
