use std::ops::ControlFlow;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    event::{ServiceError, UpdateEvent},
    session::Flow,
};

pub type WatchItem = Result<UpdateEvent, ServiceError>;

/// Async view of a session. Events queue up until [Watch::next] is called.
///
/// Cancelling (or dropping) the watch stops the session the next time the platform
/// delivers an event to it.
pub struct Watch {
    rx: mpsc::UnboundedReceiver<WatchItem>,
    cancel: CancellationToken,
}

impl Watch {
    pub(crate) fn channel() -> (WatchSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let sender = WatchSender {
            tx,
            cancel: cancel.clone(),
        };
        (sender, Self { rx, cancel })
    }

    /// Wait for the next event or error, `None` once the session has ended or the watch was
    /// cancelled
    pub async fn next(&mut self) -> Option<WatchItem> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The session side of a [Watch], lives inside the session's callbacks
#[derive(Clone)]
pub(crate) struct WatchSender {
    tx: mpsc::UnboundedSender<WatchItem>,
    cancel: CancellationToken,
}

impl WatchSender {
    pub fn send(&self, event: UpdateEvent) -> Flow {
        if self.cancel.is_cancelled() || self.tx.send(Ok(event)).is_err() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Queue the last event of the session, always asks the session to stop
    pub fn finish(&self, event: UpdateEvent) -> Flow {
        if !self.cancel.is_cancelled() {
            self.tx.send(Ok(event)).ok();
        }
        ControlFlow::Break(())
    }

    pub fn send_error(&self, error: &ServiceError) {
        if !self.cancel.is_cancelled() {
            // Receiver gone means the watch was dropped, the next event stops the session
            self.tx.send(Err(error.clone())).ok();
        }
    }
}
