mod block;
mod credential;
mod navigation;
mod outcome;
mod request;
mod telemetry;

pub use block::*;
pub use credential::*;
pub use navigation::*;
pub use outcome::*;
pub use request::*;
pub use telemetry::*;
