//! # 凸胞裁剪
//!
//! Voronoi 胞由包围盒被一系列中垂半空间逐次裁剪得到。
//!
//! ## 功能
//! - `ConvexPolygon`: 二维 Sutherland–Hodgman 半平面裁剪 + 鞋带公式面积
//! - `ConvexPolyhedron`: 三维逐面裁剪并补齐截面 + 四面体分解体积
//!
//! ## 依赖关系
//! - 被 `voronoi/mass.rs` 调用
//! - 使用 `geometry/` 的向量运算

use crate::geometry::{add, cross, dot, norm, scale, sub};

/// 截面顶点去重的相对容差
const MERGE_TOLERANCE: f64 = 1e-10;

/// 保留半空间 n·x <= offset 内的部分，返回裁剪后的多边形与落在平面上的点
fn clip_loop(vertices: &[[f64; 3]], normal: &[f64; 3], offset: f64) -> (Vec<[f64; 3]>, Vec<[f64; 3]>) {
    let n = vertices.len();
    let mut kept = Vec::with_capacity(n + 2);
    let mut on_plane = Vec::new();

    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let da = dot(normal, &a) - offset;
        let db = dot(normal, &b) - offset;

        if da <= 0.0 {
            kept.push(a);
            if da == 0.0 {
                on_plane.push(a);
            }
            if db > 0.0 {
                let x = lerp(&a, &b, da / (da - db));
                kept.push(x);
                on_plane.push(x);
            }
        } else if db <= 0.0 {
            let x = lerp(&a, &b, da / (da - db));
            kept.push(x);
            on_plane.push(x);
        }
    }

    (kept, on_plane)
}

fn lerp(a: &[f64; 3], b: &[f64; 3], t: f64) -> [f64; 3] {
    add(a, &scale(&sub(b, a), t))
}

fn max_distance(vertices: impl Iterator<Item = [f64; 3]>, center: &[f64; 3]) -> f64 {
    vertices
        .map(|v| norm(&sub(&v, center)))
        .fold(0.0_f64, f64::max)
}

// ─────────────────────────────────────────────────────────────
// 二维
// ─────────────────────────────────────────────────────────────

/// 凸多边形（顶点按边序排列，z = 0）
#[derive(Debug, Clone)]
pub struct ConvexPolygon {
    vertices: Vec<[f64; 3]>,
}

impl ConvexPolygon {
    /// 以 center 为中心、半边长 half 的正方形
    pub fn square(center: &[f64; 3], half: f64) -> Self {
        let [x, y, _] = *center;
        ConvexPolygon {
            vertices: vec![
                [x - half, y - half, 0.0],
                [x + half, y - half, 0.0],
                [x + half, y + half, 0.0],
                [x - half, y + half, 0.0],
            ],
        }
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    /// 保留 n·x <= offset 的部分
    pub fn clip(&mut self, normal: &[f64; 3], offset: f64) {
        if self.is_empty() {
            return;
        }
        let (kept, _) = clip_loop(&self.vertices, normal, offset);
        self.vertices = kept;
    }

    /// 鞋带公式面积
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let n = self.vertices.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.vertices[i];
                let b = self.vertices[(i + 1) % n];
                a[0] * b[1] - b[0] * a[1]
            })
            .sum();
        twice.abs() / 2.0
    }

    /// 顶点到 center 的最大距离
    pub fn radius(&self, center: &[f64; 3]) -> f64 {
        max_distance(self.vertices.iter().copied(), center)
    }
}

// ─────────────────────────────────────────────────────────────
// 三维
// ─────────────────────────────────────────────────────────────

/// 凸多面体（面列表，每个面为按边序排列的顶点环）
#[derive(Debug, Clone)]
pub struct ConvexPolyhedron {
    faces: Vec<Vec<[f64; 3]>>,
}

impl ConvexPolyhedron {
    /// 以 center 为中心、半边长 half 的立方体
    pub fn cube(center: &[f64; 3], half: f64) -> Self {
        let corner = |sx: f64, sy: f64, sz: f64| {
            [
                center[0] + sx * half,
                center[1] + sy * half,
                center[2] + sz * half,
            ]
        };
        let faces = vec![
            vec![corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(-1.0, 1.0, -1.0)],
            vec![corner(-1.0, -1.0, 1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0)],
            vec![corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, -1.0, 1.0), corner(-1.0, -1.0, 1.0)],
            vec![corner(-1.0, 1.0, -1.0), corner(1.0, 1.0, -1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0)],
            vec![corner(-1.0, -1.0, -1.0), corner(-1.0, 1.0, -1.0), corner(-1.0, 1.0, 1.0), corner(-1.0, -1.0, 1.0)],
            vec![corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(1.0, 1.0, 1.0), corner(1.0, -1.0, 1.0)],
        ];
        ConvexPolyhedron { faces }
    }

    pub fn faces(&self) -> &[Vec<[f64; 3]>] {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.len() < 4
    }

    /// 保留 n·x <= offset 的部分，并用截面封闭
    pub fn clip(&mut self, normal: &[f64; 3], offset: f64) {
        if self.is_empty() {
            return;
        }

        let all_inside = self
            .faces
            .iter()
            .flatten()
            .all(|v| dot(normal, v) - offset <= 0.0);
        if all_inside {
            return;
        }

        let mut faces = Vec::with_capacity(self.faces.len() + 1);
        let mut section: Vec<[f64; 3]> = Vec::new();

        for face in &self.faces {
            let (kept, on_plane) = clip_loop(face, normal, offset);
            if kept.len() >= 3 {
                faces.push(kept);
            }
            section.extend(on_plane);
        }

        let section = order_section(dedup_points(section), normal);
        if section.len() >= 3 {
            faces.push(section);
        }

        self.faces = faces;
    }

    /// 以顶点质心为锥顶的四面体分解体积
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let count = self.faces.iter().map(|f| f.len()).sum::<usize>() as f64;
        let sum = self
            .faces
            .iter()
            .flatten()
            .fold([0.0; 3], |acc, v| add(&acc, v));
        let centroid = scale(&sum, 1.0 / count);

        self.faces
            .iter()
            .map(|face| {
                let a = sub(&face[0], &centroid);
                (1..face.len() - 1)
                    .map(|k| {
                        let b = sub(&face[k], &centroid);
                        let c = sub(&face[k + 1], &centroid);
                        dot(&a, &cross(&b, &c)).abs() / 6.0
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// 顶点到 center 的最大距离
    pub fn radius(&self, center: &[f64; 3]) -> f64 {
        max_distance(self.faces.iter().flatten().copied(), center)
    }
}

/// 合并几乎重合的截面顶点
fn dedup_points(points: Vec<[f64; 3]>) -> Vec<[f64; 3]> {
    let extent = points
        .iter()
        .flat_map(|p| p.iter())
        .fold(1.0_f64, |m, x| m.max(x.abs()));
    let tol = MERGE_TOLERANCE * extent;

    let mut unique: Vec<[f64; 3]> = Vec::with_capacity(points.len());
    for p in points {
        if !unique.iter().any(|u| norm(&sub(u, &p)) <= tol) {
            unique.push(p);
        }
    }
    unique
}

/// 按绕平面法向的极角排序截面顶点
fn order_section(mut points: Vec<[f64; 3]>, normal: &[f64; 3]) -> Vec<[f64; 3]> {
    if points.len() < 3 {
        return points;
    }

    let n = points.len() as f64;
    let centroid = scale(&points.iter().fold([0.0; 3], |acc, p| add(&acc, p)), 1.0 / n);

    // 取与法向最不平行的坐标轴构造平面内基
    let axis = if normal[0].abs() <= normal[1].abs() && normal[0].abs() <= normal[2].abs() {
        [1.0, 0.0, 0.0]
    } else if normal[1].abs() <= normal[2].abs() {
        [0.0, 1.0, 0.0]
    } else {
        [0.0, 0.0, 1.0]
    };
    let u = cross(normal, &axis);
    let w = cross(normal, &u);

    points.sort_by(|a, b| {
        let da = sub(a, &centroid);
        let db = sub(b, &centroid);
        let ta = dot(&da, &w).atan2(dot(&da, &u));
        let tb = dot(&db, &w).atan2(dot(&db, &u));
        ta.total_cmp(&tb)
    });
    points
}
