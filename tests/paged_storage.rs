use kadedb::storage::{FileManager, PageManager, PageType};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn scenario_s6_cache_eviction_writes_back_only_dirty_unpinned_pages() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s6.kdb");
    let fm = Arc::new(FileManager::create(&path, 4096).unwrap());
    let pm = PageManager::new(fm, 3).unwrap();

    let p1 = pm.new_page(PageType::Data).unwrap();
    let p2 = pm.new_page(PageType::Data).unwrap();
    let p3 = pm.new_page(PageType::Data).unwrap();
    pm.unpin(p1.header.page_num).unwrap();
    pm.unpin(p2.header.page_num).unwrap();
    pm.unpin(p3.header.page_num).unwrap();
    assert_eq!(pm.cached_page_count(), 3);

    // Mark page 2 dirty with a distinguishing byte, then force it to the
    // back of the LRU list by touching 1 and 3 again.
    let mut edited = p2.clone();
    edited.body[0] = 0x42;
    pm.store_page(edited).unwrap();
    pm.fetch_page(p1.header.page_num).unwrap();
    pm.unpin(p1.header.page_num).unwrap();
    pm.fetch_page(p3.header.page_num).unwrap();
    pm.unpin(p3.header.page_num).unwrap();

    // p2 is now the least-recently-used unpinned page; allocating a 4th
    // page must evict it, writing its dirty edit back to disk first.
    pm.new_page(PageType::Data).unwrap();
    assert_eq!(pm.cached_page_count(), 3);

    let reloaded = pm.fetch_page(p2.header.page_num).unwrap();
    assert_eq!(reloaded.body[0], 0x42);
}

#[test]
fn file_manager_rejects_reopening_with_mismatched_page_size_bounds() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.kdb");
    assert!(FileManager::create(&path, 100).is_err());
}
