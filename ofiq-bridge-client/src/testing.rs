//! In-memory engine doubles for unit tests.

use crate::error::ClientError;
use crate::supervisor::Launcher;
use crate::transport::{Channel, Connector};
use async_trait::async_trait;
use bytes::Bytes;
use ofiq_bridge_protocol::{Assessment, ProcessImageReply, Reply, Request};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct EngineState {
    responsive: bool,
    channels_opened: usize,
    launches: usize,
    fail_next_send: bool,
    requests: Vec<Request>,
    raw_replies: VecDeque<Bytes>,
    assessment: Option<Assessment>,
    id_offset: u32,
}

/// A scripted engine shared by the connector, its channels and the launcher.
#[derive(Clone)]
pub(crate) struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                responsive: true,
                ..EngineState::default()
            })),
        }
    }

    pub(crate) fn connector(&self) -> FakeConnector {
        FakeConnector {
            engine: self.clone(),
        }
    }

    pub(crate) fn launcher(&self) -> FakeLauncher {
        FakeLauncher {
            engine: self.clone(),
        }
    }

    /// An unresponsive engine swallows requests and never replies.
    pub(crate) fn set_responsive(&self, responsive: bool) {
        self.state.lock().unwrap().responsive = responsive;
    }

    pub(crate) fn fail_next_send(&self) {
        self.state.lock().unwrap().fail_next_send = true;
    }

    /// Queues a frame returned verbatim for the next request.
    pub(crate) fn push_raw_reply(&self, frame: Bytes) {
        self.state.lock().unwrap().raw_replies.push_back(frame);
    }

    pub(crate) fn set_assessment(&self, assessment: Option<Assessment>) {
        self.state.lock().unwrap().assessment = assessment;
    }

    /// Makes image replies carry `sent id + offset`.
    pub(crate) fn set_id_offset(&self, offset: u32) {
        self.state.lock().unwrap().id_offset = offset;
    }

    pub(crate) fn channels_opened(&self) -> usize {
        self.state.lock().unwrap().channels_opened
    }

    pub(crate) fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    fn handle(&self, frame: Bytes) -> Result<Option<Bytes>, ClientError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_send {
            state.fail_next_send = false;
            return Err(ClientError::Transport("connection reset".to_string()));
        }

        let request = Request::decode(frame)?.message;
        state.requests.push(request.clone());
        if !state.responsive {
            return Ok(None);
        }
        if let Some(raw) = state.raw_replies.pop_front() {
            return Ok(Some(raw));
        }

        let reply = match request {
            Request::Ping => Reply::Ping,
            Request::Shutdown => Reply::Shutdown,
            Request::ProcessImage { image_id, .. } => Reply::ProcessImage(ProcessImageReply {
                image_id: image_id.wrapping_add(state.id_offset),
                assessment: state.assessment.clone(),
            }),
        };
        Ok(Some(reply.encode()?))
    }
}

pub(crate) struct FakeConnector {
    engine: FakeEngine,
}

impl Connector for FakeConnector {
    type Channel = FakeChannel;

    fn open(&self, _endpoint: &str) -> FakeChannel {
        self.engine.state.lock().unwrap().channels_opened += 1;
        FakeChannel {
            engine: self.engine.clone(),
            pending: None,
        }
    }
}

pub(crate) struct FakeChannel {
    engine: FakeEngine,
    pending: Option<Bytes>,
}

#[async_trait]
impl Channel for FakeChannel {
    async fn send(&mut self, frame: Bytes) -> Result<(), ClientError> {
        self.pending = self.engine.handle(frame)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, ClientError> {
        match self.pending.take() {
            Some(reply) => Ok(reply),
            None => std::future::pending().await,
        }
    }
}

pub(crate) struct FakeLauncher {
    engine: FakeEngine,
}

impl Launcher for FakeLauncher {
    fn launch(&self) -> Result<(), ClientError> {
        self.engine.state.lock().unwrap().launches += 1;
        Ok(())
    }
}
