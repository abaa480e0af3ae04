//! The small reverse channel from consumer to producer (§6): fixed-shape
//! tagged union messages, currently only `SetCursorPos`. Read and
//! acknowledged by the host from the transport-maintenance tick via
//! `queue_read_data`/`queue_ack_data`.

use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    SetCursorPos { x: i32, y: i32 },
}

#[derive(Default)]
pub struct CommandChannel {
    queue: Mutex<VecDeque<Command>>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumer side: post a command for the producer to pick up.
    pub fn send(&self, command: Command) {
        self.queue.lock().expect("command channel mutex poisoned").push_back(command);
    }

    /// Producer side: `queue_read_data` — peek the oldest unread command
    /// without removing it.
    pub fn read_data(&self) -> Option<Command> {
        self.queue.lock().expect("command channel mutex poisoned").front().copied()
    }

    /// Producer side: `queue_ack_data` — remove the command previously
    /// returned by `read_data`.
    pub fn ack_data(&self) {
        self.queue.lock().expect("command channel mutex poisoned").pop_front();
    }
}
