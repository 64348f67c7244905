pub mod engine_bridge;
