#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swapdeck_client::api::GenerationBackend;
use swapdeck_client::blob::ImageBlob;
use swapdeck_client::engine::QueueEngine;
use swapdeck_client::error::ClientError;
use swapdeck_client::session::SessionStore;
use swapdeck_core::dimensions::Dimensions;
use swapdeck_core::generation::GenerationResponse;
use tokio::sync::Semaphore;

pub const API_KEY: &str = "key-1";

/// PNG signature plus padding; enough for content sniffing.
pub fn png(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    bytes.resize(len.max(8), 0);
    bytes
}

pub fn face() -> ImageBlob {
    ImageBlob::new("face.png", png(64))
}

pub fn target(name: &str) -> ImageBlob {
    ImageBlob::new(name, png(32))
}

/// What the fake saw for one call.
#[derive(Debug, Clone)]
pub struct Call {
    /// Zero-based call number across the whole backend.
    pub seq: usize,
    pub face: String,
    pub target: String,
    pub api_key: String,
    pub dimensions: Dimensions,
    /// Zero-based count of earlier calls for the same target.
    pub attempt: usize,
}

type Script = Box<dyn Fn(&Call) -> Result<GenerationResponse, ClientError> + Send + Sync>;

/// Scripted [`GenerationBackend`] that records every call.
pub struct FakeBackend {
    script: Script,
    calls: Mutex<Vec<Call>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeBackend {
    pub fn new(
        script: impl Fn(&Call) -> Result<GenerationResponse, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Every call returns a unique URL naming its target and sequence number.
    pub fn succeeding() -> Self {
        Self::new(|call| {
            Ok(GenerationResponse::succeeded(format!(
                "https://cdn.test/{}/{}",
                call.target, call.seq
            )))
        })
    }

    /// Calls wait on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Poll until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.call_count() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("backend never saw the expected calls");
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    async fn process_single(
        &self,
        face: &ImageBlob,
        target: &ImageBlob,
        api_key: &str,
        dimensions: Dimensions,
    ) -> Result<GenerationResponse, ClientError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let attempt = calls.iter().filter(|c| c.target == target.name).count();
            let call = Call {
                seq: calls.len(),
                face: face.name.clone(),
                target: target.name.clone(),
                api_key: api_key.to_string(),
                dimensions,
                attempt,
            };
            calls.push(call.clone());
            call
        };

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        (self.script)(&call)
    }
}

/// Engine signed in with [`API_KEY`] and a face reference already set.
pub async fn engine_with(backend: Arc<FakeBackend>) -> QueueEngine {
    let session = Arc::new(SessionStore::new());
    session.sign_in("tester", API_KEY).await;
    let engine = QueueEngine::new(session, backend);
    engine.set_face_reference(face()).await.unwrap();
    engine
}

/// Engine with a queue built from `names`, `variations` each.
pub async fn queued_engine(
    backend: Arc<FakeBackend>,
    names: &[&str],
    variations: u32,
) -> (QueueEngine, Vec<uuid::Uuid>) {
    let engine = engine_with(backend).await;
    engine
        .add_targets(names.iter().map(|n| target(n)).collect())
        .await;
    let ids = engine.create_queue(variations).await.unwrap();
    (engine, ids)
}

/// Count of calls per target name.
pub fn calls_by_target(calls: &[Call]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for call in calls {
        *counts.entry(call.target.clone()).or_insert(0) += 1;
    }
    counts
}
