//! # 结果导出
//!
//! 距离数组、统计表与 Voronoi 质量的 CSV 读写。
//!
//! ## 文件格式
//! - `distances.csv`: seed, level, distance, status（缺失条目 distance 为空）
//! - `summary.csv`: level, mean, std, count, missing
//! - `masses.csv`: index, x, y, z, mass
//!
//! ## 依赖关系
//! - 被 `commands/` 调用
//! - 使用 `csv` 与 `serde`

use crate::batch::aggregate::{DistanceArray, DistanceEntry, EntryKey, MissingReason};
use crate::batch::stats::LevelSummary;
use crate::error::{Result, WeaverError};
use crate::models::PointSet;
use crate::voronoi::VoronoiMass;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// distances.csv 的一行
#[derive(Debug, Serialize, Deserialize)]
struct DistanceRecord {
    seed: u64,
    level: u64,
    distance: Option<f64>,
    status: String,
}

/// masses.csv 的一行
#[derive(Debug, Serialize)]
struct MassRecord {
    index: usize,
    x: f64,
    y: f64,
    z: f64,
    mass: f64,
}

fn flush<W: std::io::Write>(mut wtr: csv::Writer<W>, path: &Path) -> Result<()> {
    wtr.flush().map_err(|e| WeaverError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 导出距离数组
pub fn write_distances_csv(array: &DistanceArray, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    for (key, entry) in array.iter() {
        wtr.serialize(DistanceRecord {
            seed: key.seed,
            level: key.level,
            distance: entry.value(),
            status: entry.status().to_string(),
        })?;
    }

    flush(wtr, path)
}

/// 读取距离数组
pub fn read_distances_csv(path: &Path) -> Result<DistanceArray> {
    if !path.exists() {
        return Err(WeaverError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let mut rdr = csv::Reader::from_path(path)?;
    let mut entries = Vec::new();

    for (line, record) in rdr.deserialize::<DistanceRecord>().enumerate() {
        let record = record?;
        let key = EntryKey::new(record.seed, record.level);

        let entry = match (record.status.as_str(), record.distance) {
            ("ok", Some(d)) => DistanceEntry::Computed(d),
            ("ok", None) => {
                return Err(parse_error(path, line, "status 'ok' without a distance"));
            }
            (status, _) => {
                let reason = status
                    .parse::<MissingReason>()
                    .map_err(|e| parse_error(path, line, &e))?;
                DistanceEntry::Missing(reason)
            }
        };
        entries.push((key, entry));
    }

    Ok(DistanceArray::from_entries(entries))
}

fn parse_error(path: &Path, line: usize, reason: &str) -> WeaverError {
    WeaverError::ParseError {
        format: "distances CSV".to_string(),
        path: path.display().to_string(),
        // 表头占第 1 行
        reason: format!("record {}: {}", line + 2, reason),
    }
}

/// 导出统计表
pub fn write_summary_csv(summary: &[LevelSummary], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in summary {
        wtr.serialize(row)?;
    }
    flush(wtr, path)
}

/// 导出参考点的 Voronoi 质量
pub fn write_masses_csv(reference: &PointSet, mass: &VoronoiMass, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for (index, (p, m)) in reference.points().iter().zip(mass.weights()).enumerate() {
        wtr.serialize(MassRecord {
            index,
            x: p[0],
            y: p[1],
            z: p[2],
            mass: *m,
        })?;
    }
    flush(wtr, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::stats::summarize;
    use tempfile::tempdir;

    fn sample() -> DistanceArray {
        DistanceArray::from_entries(vec![
            (EntryKey::new(0, 10), DistanceEntry::Computed(0.125)),
            (EntryKey::new(0, 20), DistanceEntry::Computed(0.3)),
            (
                EntryKey::new(1, 10),
                DistanceEntry::Missing(MissingReason::LatticeMismatch),
            ),
        ])
    }

    #[test]
    fn test_distances_csv_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("distances.csv");
        let array = sample();

        write_distances_csv(&array, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("seed,level,distance,status"));
        assert!(content.contains("1,10,,lattice-mismatch"));
        assert!(content.contains("1,20,,not-found"));

        let loaded = read_distances_csv(&path).unwrap();
        assert_eq!(loaded, array);
    }

    #[test]
    fn test_rejects_unknown_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("distances.csv");
        std::fs::write(&path, "seed,level,distance,status\n0,1,,exploded\n").unwrap();

        let err = read_distances_csv(&path).unwrap_err();
        assert!(matches!(err, WeaverError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_distances_csv(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, WeaverError::FileNotFound { .. }));
    }

    #[test]
    fn test_summary_csv_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_summary_csv(&summarize(&sample()), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("level,mean,std,count,missing"));
        assert_eq!(lines.next(), Some("10,0.125,0.0,1,1"));
        assert_eq!(lines.next(), Some("20,0.3,0.0,1,1"));
    }

    #[test]
    fn test_masses_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("masses.csv");
        let points = PointSet::from_xy(&[[0.0, 0.0], [0.5, 0.5]]);
        write_masses_csv(&points, &VoronoiMass::uniform(2), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("index,x,y,z,mass"));
        assert!(content.contains("1,0.5,0.5,0.0,0.5"));
    }
}
