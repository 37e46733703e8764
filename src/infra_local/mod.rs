mod clock_manual;
mod kv_store_memory;
mod navigator_recording;
mod navigator_tracing;

pub use clock_manual::*;
pub use kv_store_memory::*;
pub use navigator_recording::*;
pub use navigator_tracing::*;
