mod clock;
mod http_transport;
mod kv_store;
mod navigator;

pub use clock::*;
pub use http_transport::*;
pub use kv_store::*;
pub use navigator::*;
