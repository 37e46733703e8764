use crate::domain_model::Destination;

/// Forced navigation, the only way to reach the blocked and login destinations.
pub trait Navigator: Send + Sync {
    fn redirect(&self, destination: Destination);
}
