//! End-to-end tests for worldkeep-retention.
//!
//! These drive the public API against real directory trees: configuration
//! loading, full maintenance cycles and budget enforcement.

use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;
use worldkeep_retention::{
    MaintenanceConfig, MaintenanceOrchestrator, RetentionPruner, SizeAccountant, SnapshotStatus,
    WorldConfig,
};

const MB: u64 = 1_000_000;

/// Backup entry directory holding a single file of `bytes` apparent size.
fn make_entry(backup_dir: &Path, name: &str, bytes: u64) {
    let entry = backup_dir.join(name);
    fs::create_dir_all(&entry).unwrap();
    File::create(entry.join("region.mca"))
        .unwrap()
        .set_len(bytes)
        .unwrap();
}

fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// PRUNING
// ============================================================================

mod pruning {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_over_budget_area_loses_only_oldest_entry() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path();
        make_entry(backups, "alpha_2024-01-01", 4 * MB);
        make_entry(backups, "alpha_2024-01-02", 4 * MB);
        make_entry(backups, "alpha_2024-01-03", 4 * MB);

        let result = RetentionPruner::default().prune(backups, 10 * MB).unwrap();

        assert_eq!(result.removed, vec![backups.join("alpha_2024-01-01")]);
        assert_eq!(result.size_before, 12 * MB);
        assert_eq!(result.size_after, 8 * MB);
        assert_eq!(
            entry_names(backups),
            vec!["alpha_2024-01-02", "alpha_2024-01-03"]
        );
        assert_eq!(SizeAccountant::new().measure(backups), 8 * MB);
    }

    #[test]
    fn test_large_newest_entry_evicts_everything_older() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path();
        make_entry(backups, "alpha_2024-01-01", 2 * MB);
        make_entry(backups, "alpha_2024-01-02", 2 * MB);
        make_entry(backups, "alpha_2024-01-03", 9 * MB);

        let result = RetentionPruner::default().prune(backups, 10 * MB).unwrap();

        assert_eq!(result.removed_count(), 2);
        assert!(result.within_budget());
        assert_eq!(entry_names(backups), vec!["alpha_2024-01-03"]);
    }
}

// ============================================================================
// MAINTENANCE CYCLES
// ============================================================================

mod maintenance {
    use super::*;
    use pretty_assertions::assert_eq;

    fn load_config(dir: &Path, json: &str) -> MaintenanceConfig {
        let path = dir.join("config.json");
        fs::write(&path, json).unwrap();
        MaintenanceConfig::load(&path).unwrap()
    }

    #[test]
    fn test_absent_source_still_enforces_budget() {
        let temp_dir = TempDir::new().unwrap();
        let backups = temp_dir.path().join("backups");
        make_entry(&backups, "alpha_2024-01-01", 4 * MB);
        make_entry(&backups, "alpha_2024-01-02", 4 * MB);
        make_entry(&backups, "alpha_2024-01-03", 4 * MB);

        let world = WorldConfig {
            name: "alpha".to_string(),
            source_dir: temp_dir.path().join("missing-world"),
            backup_dir: backups.clone(),
            max_backup_size_mb: 10.0,
            output_dir: None,
            compress: false,
        };

        let report = MaintenanceOrchestrator::new(vec![world]).run_on(date(2024, 1, 4));

        assert!(report.success());
        let alpha = &report.worlds[0];
        assert_eq!(alpha.snapshot_status, Some(SnapshotStatus::SourceMissing));
        assert!(alpha.archive.is_none());
        assert_eq!(alpha.prune.as_ref().unwrap().removed_count(), 1);
        assert_eq!(
            entry_names(&backups),
            vec!["alpha_2024-01-02", "alpha_2024-01-03"]
        );
    }

    #[test]
    fn test_daily_cycles_from_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let source = root.join("server/world");
        fs::create_dir_all(source.join("region")).unwrap();
        fs::write(source.join("level.dat"), vec![1u8; 2000]).unwrap();
        fs::write(source.join("region/r.0.0.mca"), vec![2u8; 3000]).unwrap();

        let config = load_config(
            root,
            &format!(
                r#"{{
                    "worlds": [
                        {{
                            "name": "alpha",
                            "source_dir": {source},
                            "backup_dir": {backups},
                            "max_backup_size_mb": 0.011
                        }}
                    ]
                }}"#,
                source = serde_json::to_string(&source).unwrap(),
                backups = serde_json::to_string(&root.join("backups")).unwrap(),
            ),
        );
        let orchestrator = MaintenanceOrchestrator::from_config(&config);
        let backups = root.join("backups");

        for day in 1..=3 {
            let report = orchestrator.run_on(date(2024, 2, day));
            assert!(report.success(), "day {} failed: {:?}", day, report.worlds);
        }

        // Each snapshot is 5000 bytes; an 11000 byte budget keeps two.
        assert_eq!(
            entry_names(&backups),
            vec!["alpha_2024-02-02", "alpha_2024-02-03"]
        );
        assert_eq!(
            fs::read(backups.join("alpha_2024-02-03/region/r.0.0.mca")).unwrap(),
            vec![2u8; 3000]
        );

        // Re-running the same day changes nothing.
        let again = orchestrator.run_on(date(2024, 2, 3));
        assert_eq!(
            again.worlds[0].snapshot_status,
            Some(SnapshotStatus::AlreadyPresent)
        );
        assert_eq!(again.worlds[0].prune.as_ref().unwrap().removed_count(), 0);
    }

    #[test]
    fn test_compressed_cycle_keeps_only_archives() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let source = root.join("world");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("level.dat"), "level").unwrap();

        let world = WorldConfig {
            name: "alpha".to_string(),
            source_dir: source,
            backup_dir: root.join("backups"),
            max_backup_size_mb: 1.0,
            output_dir: None,
            compress: true,
        };
        let orchestrator = MaintenanceOrchestrator::new(vec![world]);

        orchestrator.run_on(date(2024, 5, 1));
        orchestrator.run_on(date(2024, 5, 2));

        assert_eq!(
            entry_names(&root.join("backups")),
            vec!["alpha_2024-05-01.zip", "alpha_2024-05-02.zip"]
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"worlds": []}"#).unwrap();

        let err = MaintenanceConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
