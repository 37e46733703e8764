use crate::domain_model::Destination;
use crate::domain_port::Navigator;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<Destination> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, destination: Destination) -> usize {
        self.redirects().iter().filter(|d| **d == destination).count()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, destination: Destination) {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(destination);
    }
}
