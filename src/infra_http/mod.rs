mod transport_fake;
mod transport_reqwest;

pub use transport_fake::*;
pub use transport_reqwest::*;
