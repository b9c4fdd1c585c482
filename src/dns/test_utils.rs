use crate::{core::AddressResolver, dns::ResolveError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

/// Fake address resolver for testing
pub struct FakeAddressResolver {
    // A queue of responses for a given name. The front of the queue is the next response.
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<Vec<IpAddr>, ResolveError>>>>>,
    call_count: Arc<Mutex<HashMap<String, u32>>>,
}

impl FakeAddressResolver {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a successful response to the queue for a name
    pub fn add_success(&self, name: &str, addresses: Vec<IpAddr>) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(name.to_string())
            .or_default()
            .push_back(Ok(addresses));
    }

    /// Add an error response to the queue for a name
    pub fn add_error(&self, name: &str, error: ResolveError) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(name.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Get the number of times a name was queried
    pub fn call_count(&self, name: &str) -> u32 {
        let call_count = self.call_count.lock().unwrap();
        call_count.get(name).copied().unwrap_or(0)
    }
}

/// Parses a list of address literals, panicking on bad input.
pub fn addresses(specs: &[&str]) -> Vec<IpAddr> {
    specs.iter().map(|s| s.parse().unwrap()).collect()
}

impl Default for FakeAddressResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressResolver for FakeAddressResolver {
    async fn resolve_all(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        // Increment call count
        {
            let mut call_count = self.call_count.lock().unwrap();
            *call_count.entry(name.to_string()).or_insert(0) += 1;
        }

        // Return the next configured response
        let mut responses = self.responses.lock().unwrap();
        if let Some(queue) = responses.get_mut(name) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        Err(ResolveError::Query(format!(
            "No more responses configured for {}",
            name
        )))
    }
}
