//! Scripted in-memory link for protocol tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::Transport;
use crate::error::{Result, TransportError};

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

/// Records every written frame and replays queued replies.
///
/// Queued replies stand for bytes the unit sends after the next write, so
/// they survive the input flush a real link does before writing.
///
/// Clones share state, so a test can keep a handle after moving the
/// transport into a driver.
#[derive(Clone)]
pub struct ScriptedTransport {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    replies: Arc<Mutex<VecDeque<Vec<u8>>>>,
    responder: Arc<Mutex<Option<Responder>>>,
    write_error: Arc<Mutex<Option<io::ErrorKind>>>,
    closed: Arc<Mutex<bool>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            responder: Arc::new(Mutex::new(None)),
            write_error: Arc::new(Mutex::new(None)),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    /// Reply returned by the next read
    pub fn queue_reply(&self, reply: Vec<u8>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Compute a reply for every written frame (`None` = stay silent)
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        *self.responder.lock().unwrap() = Some(Box::new(responder));
    }

    pub fn set_write_error(&self, error: io::ErrorKind) {
        *self.write_error.lock().unwrap() = Some(error);
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::LinkNotOpen.into());
        }
        if let Some(error) = *self.write_error.lock().unwrap() {
            return Err(TransportError::Write(io::Error::new(error, "Mock write error").to_string()).into());
        }

        self.written.lock().unwrap().push(data.to_vec());

        let reply = match self.responder.lock().unwrap().as_mut() {
            Some(responder) => responder(data),
            None => None,
        };
        if let Some(reply) = reply {
            self.replies.lock().unwrap().push_back(reply);
        }
        Ok(())
    }

    async fn read_reply(&mut self, _timeout: Duration) -> Result<Vec<u8>> {
        if self.is_closed() {
            return Err(TransportError::LinkNotOpen.into());
        }
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
