mod credential_refresher;

pub use credential_refresher::*;
