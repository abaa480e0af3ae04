//! Producer-side transport handle (§4.1).

use std::sync::Arc;

use crate::command::Command;
use crate::errors::Result;
use crate::heap::Memory;
use crate::queue::{Queue, QueueConfig};
use crate::region::SharedRegion;
use crate::shared::TransportShared;

pub struct Host {
    shared: Arc<TransportShared>,
    host_version: String,
}

impl Host {
    /// `host_init(region, size, session_user_data)`. `size` is implicit
    /// in `region`; `session_user_data` here is the host version string
    /// written into the header.
    pub fn host_init(region: Arc<SharedRegion>, host_version: impl Into<String>) -> Result<Self> {
        let host_version = host_version.into();
        let shared = TransportShared::new(region, 1, &host_version)?;
        Ok(Self { shared, host_version })
    }

    pub fn queue_new(&self, config: QueueConfig) -> Arc<Queue> {
        let id = config.id;
        let queue = Arc::new(Queue::new(config));
        self.shared.queues.write().expect("queues lock poisoned").insert(id, queue.clone());
        queue
    }

    pub fn mem_alloc(&self, size: usize, alignment: usize) -> Result<Memory> {
        self.shared.mem_alloc(size, alignment)
    }

    pub fn mem_free(&self, mem: Memory) {
        self.shared.mem_free(mem);
    }

    pub fn queue_post(&self, queue: &Queue, flags: u32, mem: Memory) -> Result<u64> {
        queue.post(flags, mem)
    }

    pub fn queue_pending(&self, queue: &Queue) -> usize {
        queue.pending()
    }

    pub fn queue_has_subs(&self, queue: &Queue) -> bool {
        queue.has_subs()
    }

    pub fn queue_new_subs(&self, queue: &Queue) -> u32 {
        queue.new_subs()
    }

    pub fn queue_read_data(&self) -> Option<Command> {
        self.shared.commands.read_data()
    }

    pub fn queue_ack_data(&self) {
        self.shared.commands.ack_data();
    }

    /// Absolute byte offset into the region of a heap allocation; used to
    /// locate the frame buffer embedded in a posted message.
    pub fn absolute_offset(&self, mem: Memory) -> usize {
        self.shared.absolute_offset(mem.offset)
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        self.shared.region()
    }

    pub fn session_id(&self) -> u32 {
        self.shared.session_id()
    }

    /// A cloneable handle to the shared transport state, for handing to
    /// a `Client` (in-process stand-in for a consumer mapping the same
    /// region and discovering the same queues independently).
    pub fn handle(&self) -> Arc<TransportShared> {
        self.shared.clone()
    }

    /// Periodic maintenance tick (§5: transport-maintenance thread,
    /// ~100 Hz): sweeps subscriber timeouts on every known queue and
    /// validates the header is still intact. Returns `Err(Corrupted)` at
    /// most once per corruption event, per §4.1's failure model.
    pub fn process(&self) -> Result<()> {
        self.shared.header().validate()?;
        let queues = self.shared.queues.read().expect("queues lock poisoned");
        for queue in queues.values() {
            queue.sweep_timeouts();
        }
        Ok(())
    }

    /// Reinitialize the transport in place: same shared region, fresh
    /// queues and heap, a new session id so subscribers detect the
    /// restart via `client_session_init` (Testable Property 7). Used by
    /// the producer orchestrator's `REINIT_LGMP` transition.
    pub fn reinit(self) -> Result<Self> {
        let region = self.shared.region.clone();
        let next_session = self.shared.session_id().wrapping_add(1);
        let shared = TransportShared::new(region, next_session, &self.host_version)?;
        Ok(Self { shared, host_version: self.host_version })
    }
}

impl std::ops::Deref for Host {
    type Target = TransportShared;
    fn deref(&self) -> &Self::Target {
        &self.shared
    }
}
