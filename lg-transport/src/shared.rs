use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use lg_common::constants::DEFAULT_ALIGN_SIZE;
use lg_common::wire::TransportHeader;

use crate::command::CommandChannel;
use crate::errors::Result;
use crate::heap::{Heap, Memory};
use crate::queue::Queue;
use crate::region::SharedRegion;

/// Bytes at the start of the region reserved for the fixed transport
/// header and its TLV record stream; the heap allocator owns everything
/// after this.
pub const HEADER_RESERVED_BYTES: usize = 4096;

/// State visible to both the producer and every consumer: the mapped
/// region, the message heap carved out of it, the queue set, and the
/// small reverse command channel. `Host` and `Client` are thin,
/// role-restricted views over an `Arc<TransportShared>` — in a real
/// deployment a consumer would instead arrive at this same state by
/// mapping the same BAR and reading the header `Host::host_init` wrote,
/// but within one process handing over the `Arc` directly is equivalent
/// and avoids faking inter-process discovery that is explicitly out of
/// scope (§1).
pub struct TransportShared {
    pub(crate) region: Arc<SharedRegion>,
    pub(crate) heap: Heap,
    pub(crate) queues: RwLock<HashMap<u32, Arc<Queue>>>,
    pub(crate) commands: CommandChannel,
    pub(crate) session_id: AtomicU32,
}

impl TransportShared {
    pub(crate) fn new(region: Arc<SharedRegion>, session_id: u32, host_version: &str) -> Result<Arc<Self>> {
        region.require_len(HEADER_RESERVED_BYTES)?;
        let header = TransportHeader::new(session_id, host_version);
        let bytes = bytemuck::bytes_of(&header);
        unsafe { region.slice_mut(0, bytes.len()) }.copy_from_slice(bytes);

        let heap_bytes = region.len() - HEADER_RESERVED_BYTES;
        let heap_bytes = heap_bytes - (heap_bytes % DEFAULT_ALIGN_SIZE);
        Ok(Arc::new(Self {
            region,
            heap: Heap::new(heap_bytes, DEFAULT_ALIGN_SIZE),
            queues: RwLock::new(HashMap::new()),
            commands: CommandChannel::new(),
            session_id: AtomicU32::new(session_id),
        }))
    }

    pub fn session_id(&self) -> u32 {
        self.session_id.load(Ordering::Acquire)
    }

    pub fn header(&self) -> TransportHeader {
        *bytemuck::from_bytes(&self.region.as_bytes()[..std::mem::size_of::<TransportHeader>()])
    }

    pub fn queue(&self, id: u32) -> Option<Arc<Queue>> {
        self.queues.read().expect("queues lock poisoned").get(&id).cloned()
    }

    /// Absolute region offset of a heap allocation, for computing a
    /// pointer into the shared memory (e.g. for the frame buffer that
    /// rides inside a frame-queue message).
    pub fn absolute_offset(&self, heap_offset: usize) -> usize {
        HEADER_RESERVED_BYTES + heap_offset
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    /// Allocate from the message heap directly, for callers that hold an
    /// `Arc<TransportShared>` independent of a `Host`'s own lifetime (e.g.
    /// the producer orchestrator's cursor pipeline, which must keep
    /// allocating across a `Host::reinit()` that consumes the `Host` it
    /// was handed). `Host::mem_alloc`/`mem_free` delegate here.
    pub fn mem_alloc(&self, size: usize, alignment: usize) -> Result<Memory> {
        self.heap.alloc(size, alignment)
    }

    pub fn mem_free(&self, mem: Memory) {
        self.heap.free(mem);
    }
}
