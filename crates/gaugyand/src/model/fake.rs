//! Scripted vision model for tests and offline runs.

use super::{Flow, ModelError, ModelRequest, VisionModel};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Fake model returning pre-defined responses in order.
///
/// With a single response left it keeps returning that response.
pub struct FakeVisionModel {
    responses: Mutex<Vec<Result<Value, ModelError>>>,
    calls: Mutex<Vec<Flow>>,
}

impl FakeVisionModel {
    pub fn new(responses: Vec<Result<Value, ModelError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_valid(json: Value) -> Self {
        Self::new(vec![Ok(json)])
    }

    pub fn always_error(error: ModelError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Flows in the order they were invoked
    pub fn calls(&self) -> Vec<Flow> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisionModel for FakeVisionModel {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, ModelError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.flow);
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| ModelError::HttpError("fake model poisoned".to_string()))?;

        match responses.len() {
            0 => Err(ModelError::EmptyResponse),
            1 => responses[0].clone(),
            _ => responses.remove(0),
        }
    }
}
