use std::fmt;

/// Forced navigation targets. Ordinary in-app navigation never goes here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Blocked,
    Login,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Blocked => f.write_str("blocked"),
            Destination::Login => f.write_str("login"),
        }
    }
}
