//! # Extended XYZ 格式解析器
//!
//! 解析弛豫器输出的 extended XYZ 文件（ASE 写出的格式）。
//!
//! ## 格式说明
//! ```text
//! 3
//! Lattice="a1 a2 a3 b1 b2 b3 c1 c2 c3" Properties=species:S:1:pos:R:3:atom_types:I:1 energy=-12.5
//! Mo  0.000  0.000  10.000  0
//! S   1.592  0.919  11.560  3
//! S   1.592  0.919   8.440  3
//! ```
//!
//! - `Properties` 缺省为 `species:S:1:pos:R:3`
//! - 整数原子类型取自 `atom_types` 列，其次 `tags` 列
//! - 多帧文件（轨迹）取最后一帧
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{Result, WeaverError};
use crate::models::{Atom, Lattice, Structure};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// 解析 extended XYZ 文件
pub fn parse_xyz_file(path: &Path) -> Result<Structure> {
    let content = fs::read_to_string(path).map_err(|e| WeaverError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");

    parse_xyz_content(&content, name).map_err(|e| match e {
        WeaverError::ParseError { format, reason, .. } => WeaverError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

fn parse_error(name: &str, reason: impl Into<String>) -> WeaverError {
    WeaverError::ParseError {
        format: "extxyz".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 从字符串内容解析，返回最后一帧
pub fn parse_xyz_content(content: &str, name: &str) -> Result<Structure> {
    let lines: Vec<&str> = content.lines().collect();
    let mut idx = 0;
    let mut last = None;

    while idx < lines.len() {
        if lines[idx].trim().is_empty() {
            idx += 1;
            continue;
        }

        let count: usize = lines[idx].trim().parse().map_err(|_| {
            parse_error(name, format!("Expected atom count at line {}", idx + 1))
        })?;

        let comment = lines
            .get(idx + 1)
            .ok_or_else(|| parse_error(name, "Missing comment line"))?;
        let body_start = idx + 2;
        let available = lines.len().saturating_sub(body_start);
        if count > available {
            return Err(parse_error(
                name,
                format!(
                    "Frame at line {} declares {} atoms but only {} lines follow",
                    idx + 1,
                    count, available
                ),
            ));
        }
        let body_end = body_start + count;

        last = Some(parse_frame(comment, &lines[body_start..body_end], name, body_start)?);
        idx = body_end;
    }

    last.ok_or_else(|| parse_error(name, "No frames found"))
}

/// 单帧
fn parse_frame(comment: &str, body: &[&str], name: &str, first_line: usize) -> Result<Structure> {
    let info = parse_comment(comment);

    let lattice_str = info
        .get("lattice")
        .ok_or_else(|| parse_error(name, "Missing Lattice=\"...\" in comment line"))?;
    let values: Vec<f64> = lattice_str
        .split_whitespace()
        .map(|s| s.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| parse_error(name, format!("Invalid lattice '{}'", lattice_str)))?;
    if values.len() != 9 {
        return Err(parse_error(
            name,
            format!("Lattice needs 9 values, found {}", values.len()),
        ));
    }
    let lattice = Lattice::from_vectors([
        [values[0], values[1], values[2]],
        [values[3], values[4], values[5]],
        [values[6], values[7], values[8]],
    ]);

    let columns = info
        .get("properties")
        .map(|p| Columns::parse(p, name))
        .transpose()?
        .unwrap_or_default();

    let mut atoms = Vec::with_capacity(body.len());
    for (k, line) in body.iter().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < columns.width {
            return Err(parse_error(
                name,
                format!(
                    "Line {} has {} columns, expected {}",
                    first_line + k + 1,
                    fields.len(),
                    columns.width
                ),
            ));
        }

        let number = |col: usize| -> Result<f64> {
            fields[col].parse().map_err(|_| {
                parse_error(
                    name,
                    format!("Invalid number '{}' at line {}", fields[col], first_line + k + 1),
                )
            })
        };
        let position = [number(columns.pos)?, number(columns.pos + 1)?, number(columns.pos + 2)?];

        let mut atom = Atom::new(fields[columns.species], position);
        if let Some(col) = columns.atom_type {
            let t: i64 = fields[col].parse().map_err(|_| {
                parse_error(
                    name,
                    format!("Invalid atom type '{}' at line {}", fields[col], first_line + k + 1),
                )
            })?;
            atom = atom.with_type(t);
        }
        atoms.push(atom);
    }

    let mut structure = Structure::new(name, lattice, atoms);
    structure.energy = info.get("energy").and_then(|e| e.parse().ok());
    structure.source_format = Some("extxyz".to_string());
    Ok(structure)
}

/// 列布局
#[derive(Debug, Clone, PartialEq)]
struct Columns {
    species: usize,
    pos: usize,
    atom_type: Option<usize>,
    width: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            species: 0,
            pos: 1,
            atom_type: None,
            width: 4,
        }
    }
}

impl Columns {
    /// 解析 `name:type:ncols:...`
    fn parse(spec: &str, name: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        if parts.len() % 3 != 0 {
            return Err(parse_error(name, format!("Malformed Properties '{}'", spec)));
        }

        let mut species = None;
        let mut pos = None;
        let mut atom_types = None;
        let mut tags = None;
        let mut offset = 0;

        for chunk in parts.chunks(3) {
            let ncols: usize = chunk[2]
                .parse()
                .map_err(|_| parse_error(name, format!("Malformed Properties '{}'", spec)))?;
            match (chunk[0].to_lowercase().as_str(), chunk[1]) {
                ("species", "S") => species = Some(offset),
                ("pos", "R") if ncols == 3 => pos = Some(offset),
                ("atom_types", "I") if ncols == 1 => atom_types = Some(offset),
                ("tags", "I") if ncols == 1 => tags = Some(offset),
                _ => {}
            }
            offset += ncols;
        }

        Ok(Columns {
            species: species.ok_or_else(|| parse_error(name, "Properties lacks species:S:1"))?,
            pos: pos.ok_or_else(|| parse_error(name, "Properties lacks pos:R:3"))?,
            atom_type: atom_types.or(tags),
            width: offset,
        })
    }
}

/// 解析注释行中的 key=value 对（键统一小写，值可带引号）
fn parse_comment(comment: &str) -> HashMap<String, String> {
    let mut info = HashMap::new();
    let mut chars = comment.trim().chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c.is_whitespace() {
                break;
            }
            key.push(c);
            chars.next();
        }

        let mut value = String::from("T");
        if chars.peek() == Some(&'=') {
            chars.next();
            value.clear();
            match chars.peek() {
                Some(&q) if q == '"' || q == '\'' => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == q {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        value.push(c);
                        chars.next();
                    }
                }
            }
        }

        if !key.is_empty() {
            info.insert(key.to_lowercase(), value);
        }
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MOS2: &str = r#"3
Lattice="3.1841 0.0 0.0 -1.5920 2.7575 0.0 0.0 0.0 20.0" Properties=species:S:1:pos:R:3:atom_types:I:1 energy=-21.75 pbc="T T T"
Mo 0.000 0.000 10.000 0
S 1.592 0.919 11.560 3
S 1.592 0.919 8.440 3
"#;

    #[test]
    fn test_parse_single_frame() {
        let s = parse_xyz_content(MOS2, "mos2").unwrap();
        assert_eq!(s.atoms.len(), 3);
        assert_eq!(s.lattice.matrix[1], [-1.5920, 2.7575, 0.0]);
        assert_eq!(s.energy, Some(-21.75));
        assert_eq!(s.atoms[0].atom_type, Some(0));
        assert_eq!(s.atoms[2].atom_type, Some(3));
        assert_eq!(s.atoms[1].element, "S");
        assert_eq!(s.atoms[1].position, [1.592, 0.919, 11.560]);
        assert_eq!(s.source_format.as_deref(), Some("extxyz"));
    }

    #[test]
    fn test_last_frame_wins() {
        let trajectory = format!(
            "{}{}",
            MOS2,
            MOS2.replace("Mo 0.000 0.000 10.000", "Mo 0.100 0.000 10.000")
                .replace("-21.75", "-22.00")
        );
        let s = parse_xyz_content(&trajectory, "traj").unwrap();
        assert_eq!(s.atoms[0].position[0], 0.1);
        assert_eq!(s.energy, Some(-22.0));
    }

    #[test]
    fn test_default_properties_and_tags() {
        let plain = "2\nLattice=\"2 0 0 0 2 0 0 0 2\"\nFe 0 0 0\nFe 1 1 1\n";
        let s = parse_xyz_content(plain, "fe").unwrap();
        assert_eq!(s.atoms.len(), 2);
        assert!(s.atoms.iter().all(|a| a.atom_type.is_none()));

        let tagged = "1\nLattice=\"2 0 0 0 2 0 0 0 2\" Properties=species:S:1:pos:R:3:forces:R:3:tags:I:1\nFe 0 0 0 0.1 0.2 0.3 7\n";
        let s = parse_xyz_content(tagged, "fe").unwrap();
        assert_eq!(s.atoms[0].atom_type, Some(7));
    }

    #[test]
    fn test_missing_lattice_rejected() {
        let err = parse_xyz_content("1\ncomment\nH 0 0 0\n", "h").unwrap_err();
        assert!(matches!(err, WeaverError::ParseError { .. }));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let truncated = MOS2.lines().take(4).collect::<Vec<_>>().join("\n");
        let err = parse_xyz_content(&truncated, "mos2").unwrap_err();
        assert!(matches!(err, WeaverError::ParseError { .. }));
    }

    #[test]
    fn test_huge_atom_count_rejected() {
        let content = format!(
            "{}\nLattice=\"4 0 0 0 4 0 0 0 20\"\nMo 0 0 0\n",
            usize::MAX
        );
        let err = parse_xyz_content(&content, "huge").unwrap_err();
        assert!(matches!(err, WeaverError::ParseError { .. }));
    }

    #[test]
    fn test_parse_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relaxed_SEED_1_idx_2_lowest_energy.xyz");
        std::fs::write(&path, MOS2).unwrap();

        let s = parse_xyz_file(&path).unwrap();
        assert_eq!(s.name, "relaxed_SEED_1_idx_2_lowest_energy");

        let bad = dir.path().join("bad.xyz");
        std::fs::write(&bad, "x\n").unwrap();
        match parse_xyz_file(&bad) {
            Err(WeaverError::ParseError { path, .. }) => assert!(path.ends_with("bad.xyz")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
