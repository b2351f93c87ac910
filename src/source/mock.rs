use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FetchError, PageSource};

#[derive(Clone, Debug)]
pub enum MockReply {
    Body(String),
    Status(u16),
    Timeout,
}

/// Routes requests by URL substring. Each route replays its queue in order and
/// keeps returning the last reply once the queue is down to one entry.
#[derive(Default)]
pub struct MockSource {
    routes: Mutex<Vec<(String, VecDeque<MockReply>)>>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, replies: Vec<MockReply>) -> Self {
        self.routes.lock().unwrap().push((pattern.to_string(), replies.into()));
        self
    }

    pub fn body(self, pattern: &str, body: impl Into<String>) -> Self {
        self.route(pattern, vec![MockReply::Body(body.into())])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|u| u.contains(pattern)).count()
    }
}

#[async_trait]
impl PageSource for MockSource {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let mut routes = self.routes.lock().unwrap();
        let reply = routes
            .iter_mut()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .and_then(|(_, queue)| if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() });

        match reply {
            Some(MockReply::Body(b)) => Ok(b),
            Some(MockReply::Status(status)) => Err(FetchError::Status { url: url.to_string(), status }),
            Some(MockReply::Timeout) => Err(FetchError::Timeout { url: url.to_string() }),
            None => Err(FetchError::Status { url: url.to_string(), status: 404 }),
        }
    }
}
