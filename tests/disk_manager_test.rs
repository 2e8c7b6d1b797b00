//! Integration tests for the disk manager and its extent allocator

use std::sync::Arc;
use std::thread;

use quarry::common::{PageId, QuarryError, PAGE_SIZE};
use quarry::storage::disk::DiskManager;
use tempfile::NamedTempFile;

#[test]
fn test_disk_manager_create_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    assert_eq!(dm.get_num_pages(), 0);
    assert_eq!(dm.num_extents(), 0);
    assert_eq!(dm.get_num_writes(), 1); // meta page
}

#[test]
fn test_disk_manager_allocate_sequential() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    for i in 0..10 {
        assert_eq!(dm.allocate_page().unwrap(), PageId::new(i));
    }
    assert_eq!(dm.get_num_pages(), 10);
    assert_eq!(dm.num_extents(), 1);
}

#[test]
fn test_disk_manager_read_write_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();
    let page_id = dm.allocate_page().unwrap();

    let mut write_buf = [0u8; PAGE_SIZE];
    for (i, byte) in write_buf.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }
    dm.write_page(page_id, &write_buf).unwrap();

    let mut read_buf = [0u8; PAGE_SIZE];
    dm.read_page(page_id, &mut read_buf).unwrap();
    assert_eq!(write_buf, read_buf);
}

#[test]
fn test_disk_manager_unwritten_page_reads_zero() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();
    let page_id = dm.allocate_page().unwrap();

    let mut buf = [0xAAu8; PAGE_SIZE];
    dm.read_page(page_id, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0));
}

#[test]
fn test_disk_manager_reuses_lowest_free_page() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    for _ in 0..6 {
        dm.allocate_page().unwrap();
    }
    assert!(dm.deallocate_page(PageId::new(4)).unwrap());
    assert!(dm.deallocate_page(PageId::new(2)).unwrap());
    assert!(dm.is_page_free(PageId::new(2)).unwrap());
    assert!(!dm.is_page_free(PageId::new(3)).unwrap());

    assert_eq!(dm.allocate_page().unwrap(), PageId::new(2));
    assert_eq!(dm.allocate_page().unwrap(), PageId::new(4));
    assert_eq!(dm.allocate_page().unwrap(), PageId::new(6));
}

#[test]
fn test_disk_manager_double_free_is_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let page_id = dm.allocate_page().unwrap();
    assert!(dm.deallocate_page(page_id).unwrap());
    assert!(!dm.deallocate_page(page_id).unwrap());
    assert!(!dm.deallocate_page(PageId::new(1_000_000)).unwrap());
    assert_eq!(dm.get_num_pages(), 0);
}

#[test]
fn test_disk_manager_extents_do_not_overlap() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::with_extent_size(temp_file.path(), 4).unwrap();

    // Three extents; every page gets a distinct pattern
    let ids: Vec<PageId> = (0..10).map(|_| dm.allocate_page().unwrap()).collect();
    assert_eq!(dm.num_extents(), 3);
    for &pid in &ids {
        let buf = [pid.as_u32() as u8 + 1; PAGE_SIZE];
        dm.write_page(pid, &buf).unwrap();
    }
    for &pid in &ids {
        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(pid, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == pid.as_u32() as u8 + 1), "page {} clobbered", pid);
    }

    // Bitmaps survive data writes
    assert!(!dm.is_page_free(PageId::new(5)).unwrap());
    assert_eq!(dm.extent_used_pages(0), 4);
    assert_eq!(dm.extent_used_pages(2), 2);
}

#[test]
fn test_disk_manager_trims_trailing_extents() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::with_extent_size(temp_file.path(), 2).unwrap();

    for _ in 0..5 {
        dm.allocate_page().unwrap();
    }
    assert_eq!(dm.num_extents(), 3);

    assert!(dm.deallocate_page(PageId::new(4)).unwrap());
    assert_eq!(dm.num_extents(), 2);

    // Emptying a middle extent keeps it
    assert!(dm.deallocate_page(PageId::new(0)).unwrap());
    assert!(dm.deallocate_page(PageId::new(1)).unwrap());
    assert_eq!(dm.num_extents(), 2);
    assert_eq!(dm.extent_used_pages(0), 0);

    assert_eq!(dm.allocate_page().unwrap(), PageId::new(0));
}

#[test]
fn test_disk_manager_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();
    let test_data = b"Hello, Quarry!";

    let page_id;
    {
        let dm = DiskManager::with_extent_size(&path, 8).unwrap();
        for _ in 0..3 {
            dm.allocate_page().unwrap();
        }
        page_id = PageId::new(1);
        let mut buf = [0u8; PAGE_SIZE];
        buf[..test_data.len()].copy_from_slice(test_data);
        dm.write_page(page_id, &buf).unwrap();
        dm.deallocate_page(PageId::new(0)).unwrap();
    }

    {
        let dm = DiskManager::with_extent_size(&path, 8).unwrap();
        assert_eq!(dm.get_num_pages(), 2);
        assert!(dm.is_page_free(PageId::new(0)).unwrap());

        let mut buf = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut buf).unwrap();
        assert_eq!(&buf[..test_data.len()], test_data);

        assert_eq!(dm.allocate_page().unwrap(), PageId::new(0));
    }
}

#[test]
fn test_disk_manager_extent_size_mismatch() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let dm = DiskManager::with_extent_size(temp_file.path(), 8).unwrap();
        dm.allocate_page().unwrap();
    }
    let result = DiskManager::with_extent_size(temp_file.path(), 16);
    assert!(matches!(result, Err(QuarryError::InvalidDatabaseFile(_))));
}

#[test]
fn test_disk_manager_rejects_invalid_page_id() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = DiskManager::new(temp_file.path()).unwrap();

    let mut buf = [0u8; PAGE_SIZE];
    assert!(matches!(
        dm.read_page(PageId::new(u32::MAX), &mut buf),
        Err(QuarryError::InvalidPageId(_))
    ));
    assert!(matches!(
        DiskManager::with_extent_size(NamedTempFile::new().unwrap().path(), 0),
        Err(QuarryError::InvalidConfig(_))
    ));
}

#[test]
fn test_disk_manager_concurrent_allocation() {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::with_extent_size(temp_file.path(), 16).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dm = Arc::clone(&dm);
            thread::spawn(move || (0..20).map(|_| dm.allocate_page().unwrap()).collect::<Vec<_>>())
        })
        .collect();

    let mut all: Vec<PageId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 80);
    assert_eq!(dm.get_num_pages(), 80);
    assert_eq!(dm.num_extents(), 5);
}
