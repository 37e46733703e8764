mod block_state_machine;
mod credential_refresher_http;
mod page_tracker;
mod request_pipeline;
mod session;
mod telemetry_emitter;
mod token_lifecycle;

pub use block_state_machine::*;
pub use credential_refresher_http::*;
pub use page_tracker::*;
pub use request_pipeline::*;
pub use session::*;
pub use telemetry_emitter::*;
pub use token_lifecycle::*;
