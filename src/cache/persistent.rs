// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Cross-process persistent solid store over a memory-mapped arena
//!
//! The backing file is a fixed-size pool: a header, a slot directory
//! keyed by 64-bit content hashes, and a data region holding each
//! entry's original string key plus its bincode-serialized boundary.
//! Entries are referenced by integer offsets only; nothing in the file
//! is a pointer. When the pool fills up, least-recently-used entries
//! are evicted and the data region is compacted in place — the file
//! never grows.
//!
//! Cross-process coordination uses an advisory file lock acquired with
//! a bounded wait; on timeout the store reports a storage error and the
//! caller degrades to memory-only caching. A writer that died
//! mid-mutation leaves the header's dirty flag set, which the next
//! opener detects and answers by reinitializing the arena.

use crate::config::PersistentCacheConfig;
use crate::error::{GeometryError, GeometryResult};
use crate::exact::ExactSolid;
use fs2::FileExt;
use memmap2::MmapMut;
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::time::{Duration, Instant};

const MAGIC: u64 = 0x4547_524f_4647_5343; // "CSGFORGE"
const VERSION: u32 = 1;

const HEADER_SIZE: usize = 32;
const SLOT_SIZE: usize = 40;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 8;
const OFF_DIRTY: usize = 12;
const OFF_CLOCK: usize = 16;
const OFF_SLOT_COUNT: usize = 24;
const OFF_POOL_USED: usize = 28;

const SLOT_HASH: usize = 0;
const SLOT_KEY_OFF: usize = 8;
const SLOT_KEY_LEN: usize = 12;
const SLOT_DATA_OFF: usize = 16;
const SLOT_DATA_LEN: usize = 20;
const SLOT_LAST_USED: usize = 24;
const SLOT_STATE: usize = 32;

const STATE_FREE: u32 = 0;
const STATE_USED: u32 = 1;

/// 64-bit content hash of a cache key.
pub fn content_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    u64::from_le_bytes(digest[..8].try_into().unwrap_or([0; 8]))
}

pub struct PersistentStore {
    file: File,
    mmap: MmapMut,
    slot_count: usize,
    pool_off: usize,
    pool_size: usize,
    lock_timeout: Duration,
}

/// Holds the advisory lock through a duplicated handle, so mutating
/// borrows of the store stay available while the lock is held. The
/// duplicate shares the original's open file description, which is
/// what the lock is attached to.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            log::debug!("persistent store unlock failed: {err}");
        }
    }
}

impl PersistentStore {
    pub fn open(cfg: &PersistentCacheConfig) -> GeometryResult<Self> {
        let capacity = cfg.capacity_bytes.max(1024 * 1024);
        let slot_count = (capacity / (64 * 1024)).clamp(64, 8192);
        let pool_off = HEADER_SIZE + slot_count * SLOT_SIZE;
        if pool_off >= capacity {
            return Err(GeometryError::storage(
                "persistent cache capacity too small for its slot directory",
            ));
        }

        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&cfg.path)?;
        let existing = file.metadata()?.len() as usize;
        if existing != capacity {
            file.set_len(capacity as u64)?;
        }

        // Safety: the mapping stays private to this handle; concurrent
        // mutation is serialized by the advisory file lock.
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| GeometryError::storage(format!("mmap failed: {e}")))?;

        let mut store = Self {
            file,
            mmap,
            slot_count,
            pool_off,
            pool_size: capacity - pool_off,
            lock_timeout: Duration::from_millis(cfg.lock_timeout_ms),
        };

        let guard = store.lock()?;
        let stale = store.read_u64(OFF_MAGIC) != MAGIC
            || store.read_u32(OFF_VERSION) != VERSION
            || store.read_u32(OFF_SLOT_COUNT) as usize != slot_count;
        let dirty = store.read_u32(OFF_DIRTY) != 0;
        if stale || dirty {
            if dirty {
                log::warn!(
                    "persistent cache {} was left dirty by a crashed writer; reinitializing",
                    cfg.path.display()
                );
            }
            store.initialize();
        }
        drop(guard);
        Ok(store)
    }

    fn initialize(&mut self) {
        self.mmap[..self.pool_off].fill(0);
        self.write_u64(OFF_MAGIC, MAGIC);
        self.write_u32(OFF_VERSION, VERSION);
        self.write_u32(OFF_DIRTY, 0);
        self.write_u64(OFF_CLOCK, 0);
        self.write_u32(OFF_SLOT_COUNT, self.slot_count as u32);
        self.write_u32(OFF_POOL_USED, 0);
        self.flush();
    }

    fn lock(&self) -> GeometryResult<LockGuard> {
        let file = self
            .file
            .try_clone()
            .map_err(|e| GeometryError::storage(format!("lock handle unavailable: {e}")))?;
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(LockGuard { file }),
                Err(err) => {
                    if Instant::now() >= deadline {
                        return Err(GeometryError::storage(format!(
                            "persistent cache lock not acquired within {:?}: {err}",
                            self.lock_timeout
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
    }

    pub fn contains(&mut self, key: &str) -> GeometryResult<bool> {
        let _guard = self.lock()?;
        Ok(self.find_slot(key).is_some())
    }

    /// Look a solid up by its string key, refreshing its LRU stamp.
    pub fn get(&mut self, key: &str) -> GeometryResult<Option<ExactSolid>> {
        let _guard = self.lock()?;
        let Some(slot) = self.find_slot(key) else {
            return Ok(None);
        };

        let data_off = self.read_slot_u32(slot, SLOT_DATA_OFF) as usize;
        let data_len = self.read_slot_u32(slot, SLOT_DATA_LEN) as usize;
        let start = self.pool_off + data_off;
        let bytes = &self.mmap[start..start + data_len];

        match bincode::deserialize::<ExactSolid>(bytes) {
            Ok(solid) => {
                let clock = self.read_u64(OFF_CLOCK) + 1;
                self.write_u32(OFF_DIRTY, 1);
                self.write_u64(OFF_CLOCK, clock);
                self.write_slot_u64(slot, SLOT_LAST_USED, clock);
                self.write_u32(OFF_DIRTY, 0);
                Ok(Some(solid))
            }
            Err(err) => {
                log::warn!("persistent cache entry for a key failed to decode ({err}); dropping it");
                self.write_u32(OFF_DIRTY, 1);
                self.write_slot_u32(slot, SLOT_STATE, STATE_FREE);
                self.write_u32(OFF_DIRTY, 0);
                Ok(None)
            }
        }
    }

    /// Store a solid under `key`, evicting least-recently-used entries
    /// (and compacting the pool) until it fits. Returns false when the
    /// serialized entry can never fit.
    pub fn insert(&mut self, key: &str, solid: &ExactSolid) -> GeometryResult<bool> {
        let data = bincode::serialize(solid)
            .map_err(|e| GeometryError::storage(format!("serialization failed: {e}")))?;
        let key_bytes = key.as_bytes();
        let need = key_bytes.len() + data.len();
        if need > self.pool_size {
            log::debug!(
                "solid of {} bytes exceeds the whole persistent pool of {} bytes",
                need,
                self.pool_size
            );
            return Ok(false);
        }

        let _guard = self.lock()?;
        self.write_u32(OFF_DIRTY, 1);

        if let Some(slot) = self.find_slot(key) {
            self.write_slot_u32(slot, SLOT_STATE, STATE_FREE);
        }

        // Make room: evict by LRU until the live bytes plus the new
        // entry fit, then compact the surviving blobs to the front
        while self.live_bytes() + need > self.pool_size || self.free_slot().is_none() {
            let Some(victim) = self.lru_slot() else {
                self.write_u32(OFF_DIRTY, 0);
                return Ok(false);
            };
            self.write_slot_u32(victim, SLOT_STATE, STATE_FREE);
        }
        self.compact();

        let pool_used = self.read_u32(OFF_POOL_USED) as usize;
        let slot = match self.free_slot() {
            Some(slot) => slot,
            None => {
                self.write_u32(OFF_DIRTY, 0);
                return Ok(false);
            }
        };
        let key_off = pool_used;
        let data_off = pool_used + key_bytes.len();
        let start = self.pool_off + key_off;
        self.mmap[start..start + key_bytes.len()].copy_from_slice(key_bytes);
        let start = self.pool_off + data_off;
        self.mmap[start..start + data.len()].copy_from_slice(&data);

        let clock = self.read_u64(OFF_CLOCK) + 1;
        self.write_u64(OFF_CLOCK, clock);
        self.write_slot_u64(slot, SLOT_HASH, content_hash(key));
        self.write_slot_u32(slot, SLOT_KEY_OFF, key_off as u32);
        self.write_slot_u32(slot, SLOT_KEY_LEN, key_bytes.len() as u32);
        self.write_slot_u32(slot, SLOT_DATA_OFF, data_off as u32);
        self.write_slot_u32(slot, SLOT_DATA_LEN, data.len() as u32);
        self.write_slot_u64(slot, SLOT_LAST_USED, clock);
        self.write_slot_u32(slot, SLOT_STATE, STATE_USED);
        self.write_u32(OFF_POOL_USED, (pool_used + need) as u32);

        self.write_u32(OFF_DIRTY, 0);
        self.flush();
        Ok(true)
    }

    fn find_slot(&self, key: &str) -> Option<usize> {
        let hash = content_hash(key);
        let key_bytes = key.as_bytes();
        (0..self.slot_count).find(|&slot| {
            self.read_slot_u32(slot, SLOT_STATE) == STATE_USED
                && self.read_slot_u64(slot, SLOT_HASH) == hash
                && {
                    let off = self.read_slot_u32(slot, SLOT_KEY_OFF) as usize;
                    let len = self.read_slot_u32(slot, SLOT_KEY_LEN) as usize;
                    let start = self.pool_off + off;
                    &self.mmap[start..start + len] == key_bytes
                }
        })
    }

    fn free_slot(&self) -> Option<usize> {
        (0..self.slot_count).find(|&slot| self.read_slot_u32(slot, SLOT_STATE) == STATE_FREE)
    }

    fn lru_slot(&self) -> Option<usize> {
        (0..self.slot_count)
            .filter(|&slot| self.read_slot_u32(slot, SLOT_STATE) == STATE_USED)
            .min_by_key(|&slot| self.read_slot_u64(slot, SLOT_LAST_USED))
    }

    fn live_bytes(&self) -> usize {
        (0..self.slot_count)
            .filter(|&slot| self.read_slot_u32(slot, SLOT_STATE) == STATE_USED)
            .map(|slot| {
                self.read_slot_u32(slot, SLOT_KEY_LEN) as usize
                    + self.read_slot_u32(slot, SLOT_DATA_LEN) as usize
            })
            .sum()
    }

    /// Move all live blobs to the front of the pool and update their
    /// slot offsets.
    fn compact(&mut self) {
        let mut cursor = 0usize;
        for slot in 0..self.slot_count {
            if self.read_slot_u32(slot, SLOT_STATE) != STATE_USED {
                continue;
            }
            let key_off = self.read_slot_u32(slot, SLOT_KEY_OFF) as usize;
            let key_len = self.read_slot_u32(slot, SLOT_KEY_LEN) as usize;
            let data_len = self.read_slot_u32(slot, SLOT_DATA_LEN) as usize;
            let blob_len = key_len + data_len;

            if key_off != cursor {
                let src = self.pool_off + key_off;
                let dst = self.pool_off + cursor;
                self.mmap.copy_within(src..src + blob_len, dst);
                self.write_slot_u32(slot, SLOT_KEY_OFF, cursor as u32);
                self.write_slot_u32(slot, SLOT_DATA_OFF, (cursor + key_len) as u32);
            }
            cursor += blob_len;
        }
        self.write_u32(OFF_POOL_USED, cursor as u32);
    }

    fn flush(&self) {
        if let Err(err) = self.mmap.flush() {
            log::debug!("persistent cache flush failed: {err}");
        }
    }

    fn slot_base(&self, slot: usize) -> usize {
        HEADER_SIZE + slot * SLOT_SIZE
    }

    fn read_u32(&self, off: usize) -> u32 {
        u32::from_le_bytes(self.mmap[off..off + 4].try_into().unwrap_or([0; 4]))
    }

    fn read_u64(&self, off: usize) -> u64 {
        u64::from_le_bytes(self.mmap[off..off + 8].try_into().unwrap_or([0; 8]))
    }

    fn write_u32(&mut self, off: usize, value: u32) {
        self.mmap[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, off: usize, value: u64) {
        self.mmap[off..off + 8].copy_from_slice(&value.to_le_bytes());
    }

    fn read_slot_u32(&self, slot: usize, field: usize) -> u32 {
        self.read_u32(self.slot_base(slot) + field)
    }

    fn read_slot_u64(&self, slot: usize, field: usize) -> u64 {
        self.read_u64(self.slot_base(slot) + field)
    }

    fn write_slot_u32(&mut self, slot: usize, field: usize, value: u32) {
        self.write_u32(self.slot_base(slot) + field, value)
    }

    fn write_slot_u64(&mut self, slot: usize, field: usize, value: u64) {
        self.write_u64(self.slot_base(slot) + field, value)
    }
}
