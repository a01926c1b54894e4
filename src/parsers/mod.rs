//! # 解析器模块
//!
//! 提供参考结构与弛豫结构文件的解析器。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/collector.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: xyz, poscar

pub mod poscar;
pub mod xyz;

use crate::error::{Result, WeaverError};
use crate::models::Structure;
use std::path::Path;

/// 从文件路径推断格式并解析
pub fn parse_structure_file(path: &Path) -> Result<Structure> {
    if !path.exists() {
        return Err(WeaverError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xyz" | "extxyz" => xyz::parse_xyz_file(path),
        "vasp" | "poscar" => poscar::parse_poscar_file(path),
        _ => {
            // 可能是 POSCAR/CONTCAR (无扩展名)
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                    return poscar::parse_poscar_file(path);
                }
            }
            Err(WeaverError::UnsupportedFormat(format!(
                "Cannot determine format for: {}",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        let dir = tempdir().unwrap();

        let contcar = dir.path().join("CONTCAR");
        std::fs::write(
            &contcar,
            "Cu\n1.0\n3.6 0 0\n0 3.6 0\n0 0 3.6\nCu\n1\nDirect\n0 0 0\n",
        )
        .unwrap();
        let s = parse_structure_file(&contcar).unwrap();
        assert_eq!(s.source_format.as_deref(), Some("poscar"));

        let xyz = dir.path().join("cu.extxyz");
        std::fs::write(&xyz, "1\nLattice=\"3.6 0 0 0 3.6 0 0 0 3.6\"\nCu 0 0 0\n").unwrap();
        let s = parse_structure_file(&xyz).unwrap();
        assert_eq!(s.source_format.as_deref(), Some("extxyz"));

        let cif = dir.path().join("cu.cif");
        std::fs::write(&cif, "data_cu\n").unwrap();
        assert!(matches!(
            parse_structure_file(&cif),
            Err(WeaverError::UnsupportedFormat(_))
        ));

        assert!(matches!(
            parse_structure_file(&dir.path().join("missing.xyz")),
            Err(WeaverError::FileNotFound { .. })
        ));
    }
}
