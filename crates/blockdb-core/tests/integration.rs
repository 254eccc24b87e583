use blockdb_core::bptree::node_size_for;
use blockdb_core::loader::parse_records;
use blockdb_core::{
    BPlusTree, BlockHandle, Config, Database, DuplicatePolicy, Error, IndexField, RecordRef,
};
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str =
    "GAME_DATE_EST TEAM_ID_home PTS_home FG_PCT_home FT_PCT_home FG3_PCT_home AST_home REB_home HOME_TEAM_WINS";

fn write_games(count: u32) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for i in 0..count {
        let fg_pct = (i % 50) as f32 / 50.0;
        writeln!(
            file,
            "{}/1/2022 16106127{:02} {} {:.3} 0.750 0.{:03} 20 40 {}",
            i % 28 + 1,
            i % 30,
            90 + i % 40,
            fg_pct,
            i % 1000,
            i % 2
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn small_config() -> Config {
    Config::new(1_000_000, 200).with_node_size(node_size_for(5))
}

#[test]
fn test_import_file_and_query() {
    let file = write_games(500);
    let mut db = Database::open(small_config()).unwrap();

    let inserted = db.import_file(file.path()).unwrap();
    assert_eq!(inserted, 500);
    assert_eq!(db.len(), 500);
    db.index().check_invariants().unwrap();

    let report = db.query(0.5).unwrap();
    assert_eq!(report.records.len(), 10);
    assert!(report.records.iter().all(|r| r.fg_pct_home == 0.5));
    assert!(report.overflow_nodes >= 1);
}

#[test]
fn test_range_query_agrees_with_linear_scan() {
    let file = write_games(1000);
    let mut db = Database::open(small_config()).unwrap();
    db.import_file(file.path()).unwrap();

    for (lo, hi) in [(0.6, 1.0), (0.0, 0.1), (0.25, 0.26), (0.9, 0.5)] {
        let indexed = db.query_range(lo, hi).unwrap();
        let scanned = db.linear_scan(lo, hi).unwrap();
        let mut a: Vec<_> = indexed.records.iter().map(|r| r.record_id).collect();
        let mut b: Vec<_> = scanned.records.iter().map(|r| r.record_id).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b, "range [{}, {})", lo, hi);
        assert!(indexed.data_blocks <= scanned.data_blocks);
    }
}

#[test]
fn test_delete_below_then_reinsert() {
    let file = write_games(600);
    let mut db = Database::open(small_config()).unwrap();
    db.import_file(file.path()).unwrap();
    let blocks_before = db.disk().blocks_in_use();

    let report = db.delete_below(0.35).unwrap();
    assert_eq!(report.records_deleted, 600 * 18 / 50);
    assert_eq!(db.len(), 600 - report.records_deleted);
    assert_eq!(db.disk().blocks_in_use(), blocks_before - report.blocks_freed);
    assert!(db.query_range(0.0, 0.35).unwrap().records.is_empty());
    db.index().check_invariants().unwrap();

    let loaded = parse_records(std::fs::File::open(file.path()).map(std::io::BufReader::new).unwrap()).unwrap();
    let reinsert: Vec<_> = loaded
        .records
        .into_iter()
        .filter(|r| r.fg_pct_home < 0.35)
        .collect();
    let count = reinsert.len();
    db.import(reinsert).unwrap();
    assert_eq!(db.len(), 600);
    assert_eq!(db.query_range(0.0, 0.35).unwrap().records.len(), count);
    assert!(db.disk().blocks_in_use() <= blocks_before);
    db.index().check_invariants().unwrap();
}

#[test]
fn test_index_on_points() {
    let file = write_games(200);
    let config = small_config().with_index_field(IndexField::PtsHome);
    let mut db = Database::open(config).unwrap();
    db.import_file(file.path()).unwrap();

    let report = db.query_range(100.0, 110.0).unwrap();
    assert_eq!(report.records.len(), 50);
    assert!(report.records.iter().all(|r| (100..110).contains(&r.pts_home)));
}

#[test]
fn test_disk_exhaustion() {
    let config = Config::new(400, 200).with_node_size(node_size_for(5));
    let mut db = Database::open(config).unwrap();
    let file = write_games(20);

    let err = db.import_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::StorageFull));
    assert_eq!(db.len(), 8);
}

#[test]
fn test_missing_file() {
    let mut db = Database::open(small_config()).unwrap();
    assert!(matches!(db.import_file("/nonexistent/games.txt"), Err(Error::Io(_))));
}

#[test]
fn test_epsilon_collision_surfaces() {
    let mut tree = BPlusTree::with_max_keys(4)
        .unwrap()
        .with_duplicate_policy(DuplicatePolicy::EpsilonShift { epsilon: 1e-7 });
    let record = |id| RecordRef::new(BlockHandle(0), id);

    tree.insert(1000.0, record(1)).unwrap();
    assert!(matches!(
        tree.insert(1000.0, record(2)),
        Err(Error::KeyCollision { .. })
    ));
    tree.check_invariants().unwrap();
}

#[test]
fn test_tree_survives_interleaved_workload() {
    let mut tree = BPlusTree::new(200).unwrap();
    let mut live = std::collections::BTreeSet::new();

    for round in 0u32..5 {
        for i in 0..2000u32 {
            let k = (i * 7919 + round * 13) % 5000;
            tree.insert(k as f32, RecordRef::new(BlockHandle(k), i)).unwrap();
            live.insert(k);
        }
        let victims: Vec<u32> = live.iter().copied().filter(|k| k % 3 == round % 3).collect();
        for k in victims {
            assert!(!tree.delete(k as f32).is_empty());
            live.remove(&k);
        }
        tree.check_invariants().unwrap();
    }

    let keys: Vec<f32> = tree.keys().collect();
    let expected: Vec<f32> = live.iter().map(|&k| k as f32).collect();
    assert_eq!(keys, expected);
}
