use super::*;
use crate::source::Position;
use chrono::TimeZone;
use tempfile::TempDir;

fn parkings(free: &[(&str, u32)]) -> Parkings {
    Parkings {
        items: free
            .iter()
            .map(|(id, free_places)| Parking {
                id: Some(id.to_string()),
                free_places: Some(*free_places),
                position: Some(Position {
                    lat: Some(55.7),
                    lon: Some(37.6),
                }),
                ..Default::default()
            })
            .collect(),
    }
}

fn ts(unix: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(unix, 0).unwrap()
}

#[test]
fn test_parse_snapshot_name() {
    assert_eq!(
        parse_snapshot_name("parkings-1500000000.json").unwrap().unwrap(),
        ts(1_500_000_000)
    );
    assert_eq!(
        parse_snapshot_name("parkings-1500000060.json.gz").unwrap().unwrap(),
        ts(1_500_000_060)
    );
    assert!(parse_snapshot_name("README.md").is_none());
    assert!(parse_snapshot_name("stations-1500000000.json").is_none());
    assert!(parse_snapshot_name("parkings-abc.json").unwrap().is_err());
}

#[test]
fn test_snapshot_file_name() {
    assert_eq!(snapshot_file_name(ts(1_500_000_000), false), "parkings-1500000000.json");
    assert_eq!(snapshot_file_name(ts(1_500_000_000), true), "parkings-1500000000.json.gz");
}

#[test]
fn test_save_and_load_compressed() {
    let temp_dir = TempDir::new().unwrap();
    let original = parkings(&[("0001", 3), ("0002", 0)]);

    let path = save_snapshot(temp_dir.path(), ts(1_500_000_000), &original, true).unwrap();
    assert!(path.to_str().unwrap().ends_with(".json.gz"));

    let snapshot = ArchivedSnapshot {
        timestamp: ts(1_500_000_000),
        path,
    };
    let loaded = snapshot.load().unwrap();
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.items[0].id.as_deref(), Some("0001"));
    assert_eq!(loaded.items[1].free_places, Some(0));

    // No temp files left behind
    let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_open_orders_by_timestamp_and_skips_noise() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();

    save_snapshot(dir, ts(1_500_000_120), &parkings(&[("a", 1)]), false).unwrap();
    save_snapshot(dir, ts(1_500_000_000), &parkings(&[("a", 1)]), true).unwrap();
    save_snapshot(dir, ts(1_500_000_060), &parkings(&[("a", 2)]), false).unwrap();
    fs::write(dir.join("notes.txt"), "not a snapshot").unwrap();
    fs::write(dir.join("parkings-1500000030.json"), "").unwrap();
    fs::create_dir(dir.join("parkings-1500000090.json")).unwrap();

    let archive = Archive::open(dir).unwrap();
    let timestamps: Vec<i64> = archive
        .snapshots()
        .iter()
        .map(|s| s.timestamp.timestamp())
        .collect();
    assert_eq!(timestamps, vec![1_500_000_000, 1_500_000_060, 1_500_000_120]);
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.directory(), dir);
}

#[test]
fn test_open_rejects_bad_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("parkings-yesterday.json"), "{}").unwrap();

    let err = Archive::open(temp_dir.path()).unwrap_err();
    assert!(err.to_string().contains("parkings-yesterday.json"));
}

#[test]
fn test_open_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    assert!(Archive::open(temp_dir.path().join("missing")).is_err());
}

#[test]
fn test_load_corrupt_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("parkings-1500000000.json");
    fs::write(&path, "{\"Items\": [").unwrap();

    let snapshot = ArchivedSnapshot {
        timestamp: ts(1_500_000_000),
        path,
    };
    assert!(snapshot.load().is_err());
}

#[tokio::test]
async fn test_archived_snapshot_as_source() {
    let temp_dir = TempDir::new().unwrap();
    save_snapshot(temp_dir.path(), ts(1_500_000_000), &parkings(&[("x", 4)]), true).unwrap();

    let archive = Archive::open(temp_dir.path()).unwrap();
    let items = archive.snapshots()[0].list_parkings().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].free_places, Some(4));
}

#[test]
fn test_save_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let first = parkings(&[("0001", 5)]);
    let path = save_snapshot(temp_dir.path(), ts(1_500_000_000), &first, true).unwrap();

    let err = save_snapshot(temp_dir.path(), ts(1_500_000_000), &parkings(&[("0001", 0)]), true)
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));

    let kept = ArchivedSnapshot {
        timestamp: ts(1_500_000_000),
        path,
    };
    assert_eq!(kept.load().unwrap().items[0].free_places, Some(5));
}

#[tokio::test]
async fn test_archiving_source_names_snapshot_after_cycle() {
    let temp_dir = TempDir::new().unwrap();
    let inner = parkings(&[("0001", 5)]).items;

    let source = ArchivingSource::new(&inner, temp_dir.path(), ts(1_600_000_000));
    let items = source.list_parkings().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(source.name(), "static");

    let archive = Archive::open(temp_dir.path()).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.snapshots()[0].timestamp, ts(1_600_000_000));
    let replayed = archive.snapshots()[0].load().unwrap();
    assert_eq!(replayed.items[0].id.as_deref(), Some("0001"));
}

#[tokio::test]
async fn test_archiving_failure_does_not_fail_fetch() {
    let temp_dir = TempDir::new().unwrap();
    let inner = parkings(&[("0001", 5)]).items;
    let missing = temp_dir.path().join("missing");

    let source = ArchivingSource::new(&inner, &missing, ts(1_600_000_000));
    assert_eq!(source.list_parkings().await.unwrap().len(), 1);
}
