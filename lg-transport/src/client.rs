//! Consumer-side transport handle (§4.1).

use std::collections::HashMap;
use std::sync::Arc;

use lg_common::wire::TransportHeader;

use crate::command::Command;
use crate::errors::{Result, TransportError};
use crate::queue::PendingMessage;
use crate::shared::TransportShared;

pub struct Client {
    shared: Arc<TransportShared>,
    /// This client's subscriber id on each queue it has subscribed to.
    subscriptions: HashMap<u32, u32>,
    /// Session id observed the last time `client_session_init` was
    /// called; used by callers to detect a producer restart.
    last_seen_session: Option<u32>,
}

impl Client {
    /// `client_init`: attach to an already-initialized transport. In a
    /// real deployment this is where the consumer maps the shared
    /// region and reads the header `Host::host_init` wrote.
    pub fn client_init(shared: Arc<TransportShared>) -> Self {
        Self { shared, subscriptions: HashMap::new(), last_seen_session: None }
    }

    /// `client_session_init`: returns the producer's session user-data
    /// (here, its header) and records the session id for change
    /// detection.
    pub fn client_session_init(&mut self) -> TransportHeader {
        let header = self.shared.header();
        self.last_seen_session = Some(header.session_id);
        header
    }

    /// `true` if this is the first call, or if the session id has
    /// changed since the last `client_session_init` (Testable Property 7).
    pub fn session_changed(&self) -> bool {
        match self.last_seen_session {
            None => true,
            Some(seen) => seen != self.shared.session_id(),
        }
    }

    pub fn client_subscribe(&mut self, queue_id: u32) -> Result<()> {
        let queue = self.shared.queue(queue_id).ok_or(TransportError::UnknownQueue(queue_id))?;
        let sub_id = queue.subscribe()?;
        self.subscriptions.insert(queue_id, sub_id);
        Ok(())
    }

    pub fn client_unsubscribe(&mut self, queue_id: u32) -> Result<()> {
        let queue = self.shared.queue(queue_id).ok_or(TransportError::UnknownQueue(queue_id))?;
        if let Some(sub_id) = self.subscriptions.remove(&queue_id) {
            queue.unsubscribe(sub_id);
        }
        Ok(())
    }

    pub fn client_advance_to_last(&self, queue_id: u32) -> Result<()> {
        let (queue, sub_id) = self.queue_and_sub(queue_id)?;
        queue.advance_to_last(sub_id);
        Ok(())
    }

    pub fn client_process(&self, queue_id: u32) -> Result<Option<PendingMessage>> {
        let (queue, sub_id) = self.queue_and_sub(queue_id)?;
        queue.process(sub_id)
    }

    pub fn client_message_done(&self, queue_id: u32, seq: u64) -> Result<()> {
        let (queue, sub_id) = self.queue_and_sub(queue_id)?;
        queue.message_done(sub_id, seq);
        Ok(())
    }

    /// Read the raw bytes of a pending message's payload, given the
    /// offset/len `client_process` returned.
    pub fn read_message_bytes(&self, msg: &PendingMessage) -> &[u8] {
        let abs = self.shared.absolute_offset(msg.mem.offset);
        &self.shared.region().as_bytes()[abs..abs + msg.mem.len]
    }

    /// Send a command on the small reverse channel (e.g.
    /// `SetCursorPos`); consumed by the producer's `queue_read_data`.
    pub fn send_command(&self, command: Command) {
        self.shared.commands.send(command);
    }

    fn queue_and_sub(&self, queue_id: u32) -> Result<(Arc<crate::queue::Queue>, u32)> {
        let queue = self.shared.queue(queue_id).ok_or(TransportError::UnknownQueue(queue_id))?;
        let sub_id = *self.subscriptions.get(&queue_id).ok_or(TransportError::NotSubscribed(queue_id))?;
        Ok((queue, sub_id))
    }
}
