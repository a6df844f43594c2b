//! In-memory page buffer pool with pin-aware LRU eviction (spec §4.L
//! scenario S6; grounded on
//! `original_source/.../page_manager.cpp`'s `PageManager::evict_page`
//! and `add_to_cache`, which walk the LRU list from the back, skip
//! pinned pages, and write back only if dirty).

use crate::status::{KdbResult, Status};
use crate::storage::file::FileManager;
use crate::storage::page::{Page, PageType};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

struct CacheEntry {
    page: Page,
    pin_count: u32,
    dirty: bool,
}

struct Inner {
    entries: FxHashMap<u64, CacheEntry>,
    /// Front = most recently used, back = least recently used.
    lru: VecDeque<u64>,
}

impl Inner {
    fn touch(&mut self, id: u64) {
        self.lru.retain(|&x| x != id);
        self.lru.push_front(id);
    }
}

/// A fixed-capacity page cache fronting a [`FileManager`].
pub struct PageManager {
    file_manager: Arc<FileManager>,
    cache_size: usize,
    inner: Mutex<Inner>,
}

impl PageManager {
    pub fn new(file_manager: Arc<FileManager>, cache_size: usize) -> KdbResult<Self> {
        if cache_size == 0 {
            return Err(Status::invalid_argument("cache_size must be greater than zero"));
        }
        Ok(Self {
            file_manager,
            cache_size,
            inner: Mutex::new(Inner { entries: FxHashMap::default(), lru: VecDeque::new() }),
        })
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn cached_page_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Evicts one unpinned victim from the back of the LRU list, writing
    /// it back first if dirty. Errors if every cached page is pinned.
    fn evict_one(&self, inner: &mut Inner) -> KdbResult<()> {
        let victim = inner
            .lru
            .iter()
            .rev()
            .find(|id| inner.entries.get(id).map(|e| e.pin_count == 0).unwrap_or(false))
            .copied();
        let victim = victim.ok_or_else(|| Status::failed_precondition("page cache full of pinned pages"))?;
        if let Some(entry) = inner.entries.get(&victim) {
            if entry.dirty {
                self.file_manager.write_page(&entry.page)?;
            }
        }
        inner.entries.remove(&victim);
        inner.lru.retain(|&x| x != victim);
        Ok(())
    }

    fn ensure_room(&self, inner: &mut Inner) -> KdbResult<()> {
        while inner.entries.len() >= self.cache_size {
            self.evict_one(inner)?;
        }
        Ok(())
    }

    /// Loads a page into the cache (if not already resident), pins it,
    /// and returns a copy of its current contents.
    pub fn fetch_page(&self, id: u64) -> KdbResult<Page> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.pin_count += 1;
            let page = entry.page.clone();
            inner.touch(id);
            return Ok(page);
        }
        let page = self.file_manager.read_page(id)?;
        self.ensure_room(&mut inner)?;
        inner.entries.insert(id, CacheEntry { page: page.clone(), pin_count: 1, dirty: false });
        inner.touch(id);
        Ok(page)
    }

    /// Allocates a fresh page on disk and seats it in the cache pinned.
    pub fn new_page(&self, page_type: PageType) -> KdbResult<Page> {
        let page = self.file_manager.allocate_page(page_type)?;
        let id = page.header.page_num;
        let mut inner = self.inner.lock();
        self.ensure_room(&mut inner)?;
        inner.entries.insert(id, CacheEntry { page: page.clone(), pin_count: 1, dirty: false });
        inner.touch(id);
        Ok(page)
    }

    pub fn unpin(&self, id: u64) -> KdbResult<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("page {} is not cached", id)))?;
        entry.pin_count = entry.pin_count.saturating_sub(1);
        Ok(())
    }

    pub fn mark_dirty(&self, id: u64) -> KdbResult<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("page {} is not cached", id)))?;
        entry.dirty = true;
        entry.page.header.set_dirty(true);
        Ok(())
    }

    /// Replaces the cached image of `page` (e.g. after an in-place edit)
    /// and marks it dirty, without touching the file yet.
    pub fn store_page(&self, mut page: Page) -> KdbResult<()> {
        page.update_checksum();
        let id = page.header.page_num;
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("page {} is not cached", id)))?;
        entry.page = page;
        entry.dirty = true;
        inner.touch(id);
        Ok(())
    }

    /// Writes a cached page back to disk if dirty (or unconditionally
    /// when `force` is set), clearing the dirty flag either way.
    pub fn write_page(&self, id: u64, force: bool) -> KdbResult<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("page {} is not cached", id)))?;
        if entry.dirty || force {
            self.file_manager.write_page(&entry.page)?;
            entry.dirty = false;
            entry.page.header.set_dirty(false);
        }
        Ok(())
    }

    pub fn flush_all(&self) -> KdbResult<()> {
        let ids: Vec<u64> = self.inner.lock().entries.keys().copied().collect();
        for id in ids {
            self.write_page(id, false)?;
        }
        self.file_manager.flush()
    }

    /// Drops a page from the cache (discarding any unwritten edits) and
    /// returns it to the file manager's free list.
    pub fn free_page(&self, id: u64) -> KdbResult<()> {
        {
            let mut inner = self.inner.lock();
            inner.entries.remove(&id);
            inner.lru.retain(|&x| x != id);
        }
        self.file_manager.free_page(id)
    }
}
