use crate::domain_port::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone)]
pub enum FakeReply {
    Respond(HttpResponse),
    Fail(TransportError),
}

/// Scripted transport keyed by URL path. Records every request it sees.
///
/// One-shot replies queued with [`FakeTransport::enqueue`] are consumed in
/// order; after that the standing reply from [`FakeTransport::always`] is
/// used, and unknown paths answer 404 with an empty body.
#[derive(Debug, Default)]
pub struct FakeTransport {
    scripted: Mutex<HashMap<String, VecDeque<FakeReply>>>,
    standing: Mutex<HashMap<String, FakeReply>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, path: &str, reply: FakeReply) {
        self.scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(normalize(path).to_owned())
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.enqueue(path, FakeReply::Respond(HttpResponse::new(status, body)));
    }

    pub fn always(&self, path: &str, reply: FakeReply) {
        self.standing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(path).to_owned(), reply);
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<HttpRequest> {
        let path = normalize(path);
        self.sent()
            .into_iter()
            .filter(|r| normalize(path_of(&r.url)) == path)
            .collect()
    }
}

#[async_trait::async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let path = normalize(path_of(&request.url)).to_owned();
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        let reply = scripted.or_else(|| {
            self.standing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&path)
                .cloned()
        });

        match reply {
            Some(FakeReply::Respond(response)) => Ok(response),
            Some(FakeReply::Fail(error)) => Err(error),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}

fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("", |i| &without_scheme[i..]);
    path.split('?').next().unwrap_or(path)
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}
