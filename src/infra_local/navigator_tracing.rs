use crate::domain_model::Destination;
use crate::domain_port::Navigator;
use crate::logger::*;

/// Headless navigator: a redirect is a log line naming the target path.
#[derive(Debug, Clone)]
pub struct TracingNavigator {
    pub blocked_destination: String,
    pub login_destination: String,
}

impl Navigator for TracingNavigator {
    fn redirect(&self, destination: Destination) {
        let path = match destination {
            Destination::Blocked => &self.blocked_destination,
            Destination::Login => &self.login_destination,
        };
        warn!(%destination, path = %path, "redirect");
    }
}
