use quarry::index::{GenericKey, IntegerComparator};
use quarry::{IndexId, PageId, RecordId, SlotId, StorageConfig, StorageEngine};
use tracing::Level;

fn main() -> quarry::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    println!("Quarry - a page-addressed storage engine");
    println!("========================================\n");

    let db_path = std::env::temp_dir().join(format!("quarry-demo-{}.db", std::process::id()));
    let engine = StorageEngine::open(StorageConfig::new(&db_path).with_pool_size(16))?;
    println!("Opened {} with 16 frames\n", db_path.display());

    let mut index = engine.open_index::<8, _>(IndexId::new(1), IntegerComparator, 16, 16)?;

    // Scatter the keys so inserts split pages all over the tree
    let count = 1_000u32;
    for i in 0..count {
        let key = (i * 7919) % count;
        let rid = RecordId::new(PageId::new(key / 100), SlotId::new((key % 100) as u16));
        index.insert(GenericKey::from_u32(key), rid)?;
    }
    println!("Inserted {} keys, root is {}", count, index.root_page_id());

    let scanned = index.range_scan(&GenericKey::from_u32(100), &GenericKey::from_u32(109))?;
    println!("Keys in [100, 109]:");
    for (key, rid) in &scanned {
        println!("  - {} -> {:?}", key.as_u32(), rid);
    }

    for key in (0..count).step_by(2) {
        index.remove(&GenericKey::from_u32(key))?;
    }
    index.verify_integrity()?;
    let remaining = index.begin()?.count();
    println!("\nRemoved even keys, {} remain", remaining);

    engine.flush()?;
    let dm = engine.disk_manager();
    println!("\nStats:");
    println!("  - Allocated pages: {}", dm.get_num_pages());
    println!("  - Extents: {}", dm.num_extents());
    println!("  - Disk reads: {}", dm.get_num_reads());
    println!("  - Disk writes: {}", dm.get_num_writes());
    println!("  - No pins leaked: {}", index.check());

    drop(index);
    drop(engine);
    std::fs::remove_file(&db_path).ok();
    println!("\nDemo completed successfully!");
    Ok(())
}
