use std::io::Write;
use std::path::{Path, PathBuf};

use crate::stats::BenchmarkStats;

/// Inserts a `_YYYY-MM-DD-HH-MM-SS` timestamp before the extension (or at
/// the end, if there is none), matching the original tool's
/// `AddTimestampToFilename` behavior.
pub fn timestamped_path(base: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    let stamp = now.format("%Y-%m-%d-%H-%M-%S");
    match (base.file_stem(), base.extension()) {
        (Some(stem), Some(ext)) => {
            let mut name = stem.to_os_string();
            name.push(format!("_{stamp}."));
            name.push(ext);
            base.with_file_name(name)
        }
        (Some(stem), None) => {
            let mut name = stem.to_os_string();
            name.push(format!("_{stamp}"));
            base.with_file_name(name)
        }
        _ => base.with_file_name(format!("report_{stamp}.csv")),
    }
}

pub fn write_csv(path: &Path, results: &[BenchmarkStats]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "{}", BenchmarkStats::csv_header())?;
    for stats in results {
        writeln!(file, "{}", stats.to_csv_row())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn inserts_timestamp_before_extension() {
        let now = chrono::Local
            .with_ymd_and_hms(2026, 7, 31, 12, 0, 0)
            .unwrap();
        let path = timestamped_path(Path::new("results.csv"), now);
        assert_eq!(path, PathBuf::from("results_2026-07-31-12-00-00.csv"));
    }

    #[test]
    fn writes_header_and_one_row_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let stats = BenchmarkStats {
            test_name: "t".into(),
            iterations: 1,
            payload_size: 64,
            avg_latency_ns: 1.0,
            min_latency_ns: 1.0,
            max_latency_ns: 1.0,
            p50_latency_ns: 1.0,
            p90_latency_ns: 1.0,
            p95_latency_ns: 1.0,
            p99_latency_ns: 1.0,
            stddev_ns: 0.0,
            packets_per_sec: 1.0,
            mb_per_sec: 1.0,
            total_bytes: 64,
            total_elapsed_ns: 1,
        };
        write_csv(&path, &[stats]).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with(BenchmarkStats::csv_header()));
    }
}
