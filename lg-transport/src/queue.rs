//! A single multi-producer-in-name-only, multi-subscriber ring queue
//! (§3, §4.1). "Multi-producer" in the spec's vocabulary refers to the
//! queue type supporting it in general; the concurrency contract
//! actually used here is a single producer thread per queue, which is
//! what both `app.c` and this crate rely on.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::errors::{Result, TransportError};
use crate::heap::Memory;

pub const MAX_SUBSCRIBERS: usize = 32;

pub struct QueueConfig {
    pub id: u32,
    pub capacity: usize,
    pub sub_timeout: Duration,
}

struct Slot {
    /// 0 means the slot is free (never posted, or fully reclaimed).
    seq: AtomicU64,
    flags: AtomicU32,
    mem_offset: AtomicU32,
    mem_len: AtomicU32,
    /// Bit i set means subscriber i has acknowledged this slot.
    ack_bits: AtomicU32,
}

impl Slot {
    fn empty() -> Self {
        Self {
            seq: AtomicU64::new(0),
            flags: AtomicU32::new(0),
            mem_offset: AtomicU32::new(0),
            mem_len: AtomicU32::new(0),
            ack_bits: AtomicU32::new(0),
        }
    }
}

struct Subscriber {
    active: AtomicBool,
    last_seen: std::sync::Mutex<Instant>,
    /// Next serial this subscriber has not yet consumed.
    next_read_seq: AtomicU64,
}

impl Subscriber {
    fn new() -> Self {
        Self { active: AtomicBool::new(false), last_seen: std::sync::Mutex::new(Instant::now()), next_read_seq: AtomicU64::new(1) }
    }

    fn touch(&self) {
        *self.last_seen.lock().expect("subscriber mutex poisoned") = Instant::now();
    }
}

/// A message read from a queue but not yet acknowledged by the caller.
pub struct PendingMessage {
    pub seq: u64,
    pub flags: u32,
    pub mem: Memory,
}

pub struct Queue {
    pub id: u32,
    capacity: usize,
    sub_timeout: Duration,
    slots: Vec<Slot>,
    next_seq: AtomicU64,
    write_index: AtomicU32,
    subscribed: AtomicU32,
    new_subs_since_last: AtomicU32,
    subscribers: Vec<Subscriber>,
}

impl Queue {
    pub fn new(config: QueueConfig) -> Self {
        let slots = (0..config.capacity).map(|_| Slot::empty()).collect();
        let subscribers = (0..MAX_SUBSCRIBERS).map(|_| Subscriber::new()).collect();
        Self {
            id: config.id,
            capacity: config.capacity,
            sub_timeout: config.sub_timeout,
            slots,
            next_seq: AtomicU64::new(1),
            write_index: AtomicU32::new(0),
            subscribed: AtomicU32::new(0),
            new_subs_since_last: AtomicU32::new(0),
            subscribers,
        }
    }

    // ---- producer (host) side ----

    /// Number of slots currently holding an unreclaimed message.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.seq.load(Ordering::Acquire) != 0).count()
    }

    /// Ring capacity, for callers that need to know how long to wait
    /// before `pending() < capacity()` can possibly become true again.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_subs(&self) -> bool {
        self.subscribed.load(Ordering::Acquire) != 0
    }

    /// Count of subscribers that joined since the last call, then reset
    /// to zero (§4.1: "count-since-last-call-then-zeroed").
    pub fn new_subs(&self) -> u32 {
        self.new_subs_since_last.swap(0, Ordering::AcqRel)
    }

    /// Reclaim any slot every currently-subscribed reader has
    /// acknowledged. Called opportunistically before posting and from
    /// the periodic maintenance sweep.
    fn reclaim_acked_slots(&self) {
        let subscribed = self.subscribed.load(Ordering::Acquire);
        for slot in &self.slots {
            if slot.seq.load(Ordering::Acquire) == 0 {
                continue;
            }
            let ack = slot.ack_bits.load(Ordering::Acquire);
            if subscribed == 0 || (ack & subscribed) == subscribed {
                slot.seq.store(0, Ordering::Release);
            }
        }
    }

    /// Post `mem` into the next ring slot with `flags`. Fails with
    /// `QueueFull` if no slot is free — callers should have already
    /// waited for `pending() < capacity` per the orchestrator contract.
    pub fn post(&self, flags: u32, mem: Memory) -> Result<u64> {
        self.reclaim_acked_slots();
        let idx = self.write_index.load(Ordering::Relaxed) as usize % self.capacity;
        let slot = &self.slots[idx];
        if slot.seq.load(Ordering::Acquire) != 0 {
            return Err(TransportError::QueueFull { queue_id: self.id });
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        slot.flags.store(flags, Ordering::Relaxed);
        slot.mem_offset.store(mem.offset as u32, Ordering::Relaxed);
        slot.mem_len.store(mem.len as u32, Ordering::Relaxed);
        slot.ack_bits.store(0, Ordering::Relaxed);
        slot.seq.store(seq, Ordering::Release);
        self.write_index.store((idx as u32 + 1) % self.capacity as u32, Ordering::Relaxed);
        Ok(seq)
    }

    /// Subscriber-timeout sweep; part of `process()` on the host side.
    /// Returns the ids evicted this tick.
    pub fn sweep_timeouts(&self) -> Vec<u32> {
        let mut evicted = Vec::new();
        for (id, sub) in self.subscribers.iter().enumerate() {
            if !sub.active.load(Ordering::Acquire) {
                continue;
            }
            let elapsed = sub.last_seen.lock().expect("subscriber mutex poisoned").elapsed();
            if elapsed > self.sub_timeout {
                self.unsubscribe(id as u32);
                evicted.push(id as u32);
            }
        }
        if !evicted.is_empty() {
            self.reclaim_acked_slots();
        }
        evicted
    }

    // ---- consumer (client) side ----

    pub fn subscribe(&self) -> Result<u32> {
        for (id, sub) in self.subscribers.iter().enumerate() {
            if sub.active.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                sub.touch();
                sub.next_read_seq.store(1, Ordering::Relaxed);
                self.subscribed.fetch_or(1 << id, Ordering::AcqRel);
                self.new_subs_since_last.fetch_add(1, Ordering::AcqRel);
                return Ok(id as u32);
            }
        }
        Err(TransportError::NoMemory { requested: 1 })
    }

    pub fn unsubscribe(&self, subscriber_id: u32) {
        let bit = 1u32 << subscriber_id;
        self.subscribed.fetch_and(!bit, Ordering::AcqRel);
        self.subscribers[subscriber_id as usize].active.store(false, Ordering::Release);
        for slot in &self.slots {
            slot.ack_bits.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// Skip directly to the newest posted serial, implicitly
    /// acknowledging everything older (§4.1).
    pub fn advance_to_last(&self, subscriber_id: u32) {
        let latest = self.next_seq.load(Ordering::Acquire).saturating_sub(1);
        let sub = &self.subscribers[subscriber_id as usize];
        let bit = 1u32 << subscriber_id;
        for slot in &self.slots {
            let seq = slot.seq.load(Ordering::Acquire);
            if seq != 0 && seq <= latest {
                slot.ack_bits.fetch_or(bit, Ordering::AcqRel);
            }
        }
        sub.next_read_seq.store(latest + 1, Ordering::Release);
        sub.touch();
    }

    /// Returns the next unread message for `subscriber_id`, if its
    /// serial is still resident in the ring. Does not acknowledge it;
    /// call `message_done` to do that.
    pub fn process(&self, subscriber_id: u32) -> Result<Option<PendingMessage>> {
        let sub = self.subscribers.get(subscriber_id as usize).ok_or(TransportError::NotSubscribed(subscriber_id))?;
        sub.touch();
        let want = sub.next_read_seq.load(Ordering::Acquire);
        for slot in &self.slots {
            let seq = slot.seq.load(Ordering::Acquire);
            if seq == want {
                let flags = slot.flags.load(Ordering::Relaxed);
                let mem = Memory {
                    offset: slot.mem_offset.load(Ordering::Relaxed) as usize,
                    len: slot.mem_len.load(Ordering::Relaxed) as usize,
                };
                return Ok(Some(PendingMessage { seq, flags, mem }));
            }
        }
        Ok(None)
    }

    pub fn message_done(&self, subscriber_id: u32, seq: u64) {
        let bit = 1u32 << subscriber_id;
        for slot in &self.slots {
            if slot.seq.load(Ordering::Acquire) == seq {
                slot.ack_bits.fetch_or(bit, Ordering::AcqRel);
                break;
            }
        }
        let sub = &self.subscribers[subscriber_id as usize];
        sub.next_read_seq.store(seq + 1, Ordering::Release);
        sub.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(offset: usize) -> Memory {
        Memory { offset, len: 16 }
    }

    #[test]
    fn serials_increase_monotonically() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 4, sub_timeout: Duration::from_millis(1000) });
        let s1 = q.post(0, mem(0)).unwrap();
        let s2 = q.post(0, mem(16)).unwrap();
        assert_eq!(s2, s1 + 1);
    }

    #[test]
    fn late_subscriber_sees_most_recent_unacked_messages() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 4, sub_timeout: Duration::from_millis(1000) });
        q.post(0, mem(0)).unwrap();
        q.post(0, mem(16)).unwrap();
        let id = q.subscribe().unwrap();
        let msg = q.process(id).unwrap().unwrap();
        assert_eq!(msg.seq, 1);
    }

    #[test]
    fn new_subs_counter_resets_after_read() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 4, sub_timeout: Duration::from_millis(1000) });
        q.subscribe().unwrap();
        assert_eq!(q.new_subs(), 1);
        assert_eq!(q.new_subs(), 0);
    }

    #[test]
    fn full_queue_rejects_post_until_reclaimed() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 2, sub_timeout: Duration::from_millis(1000) });
        let id = q.subscribe().unwrap();
        q.post(0, mem(0)).unwrap();
        let s2 = q.post(0, mem(16)).unwrap();
        assert!(q.post(0, mem(32)).is_err());
        q.message_done(id, s2 - 1);
        q.message_done(id, s2);
        assert!(q.post(0, mem(32)).is_ok());
    }

    #[test]
    fn advance_to_last_acknowledges_older_messages() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 4, sub_timeout: Duration::from_millis(1000) });
        let id = q.subscribe().unwrap();
        q.post(0, mem(0)).unwrap();
        q.post(0, mem(16)).unwrap();
        q.advance_to_last(id);
        assert!(q.process(id).unwrap().is_none());
    }

    #[test]
    fn unsubscribe_clears_acknowledgement_and_allows_reclaim() {
        let q = Queue::new(QueueConfig { id: 1, capacity: 1, sub_timeout: Duration::from_millis(1000) });
        let id = q.subscribe().unwrap();
        q.post(0, mem(0)).unwrap();
        assert!(q.post(0, mem(16)).is_err());
        q.unsubscribe(id);
        assert!(q.post(0, mem(16)).is_ok());
    }
}
