pub mod use_cases;

pub use use_cases::engine_bridge::{EngineBridge, ProgressCallback};
