//! # 离散最优输运求解
//!
//! 二部图最小费用流：逐次最短路（带势函数的 Dijkstra），
//! 在稠密残量图上求精确输运方案。
//!
//! ## 算法概述
//! 1. 所有尚有余量的源点作为 Dijkstra 起点（距离 0）
//! 2. 正向边 源→汇 容量无限、费用 c_ij；反向边 汇→源 容量为当前流量、费用 -c_ij
//! 3. 找到尚有需求的最近汇点后更新势函数，沿路径按瓶颈增广
//! 4. 直到全部供给输运完毕
//!
//! ## 依赖关系
//! - 被 `transport/distance.rs` 调用

use crate::error::{Result, WeaverError};

/// 质量小于 total * MASS_EPSILON 视为零
const MASS_EPSILON: f64 = 1e-14;

/// 供需总量允许的相对偏差
const BALANCE_TOLERANCE: f64 = 1e-9;

/// 稠密费用矩阵（行: 源，列: 汇）
#[derive(Debug, Clone)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl CostMatrix {
    /// 由 f(i, j) 逐元素生成
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        CostMatrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }
}

/// 一条输运流
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub source: usize,
    pub target: usize,
    pub mass: f64,
}

/// 输运方案（仅在求距离时临时存在）
#[derive(Debug, Clone)]
pub struct TransportPlan {
    pub flows: Vec<Flow>,
    pub cost: f64,
}

/// 求解平衡输运问题 min Σ c_ij·γ_ij, s.t. Σ_j γ_ij = supply_i, Σ_i γ_ij = demand_j
pub fn solve(supply: &[f64], demand: &[f64], cost: &CostMatrix) -> Result<TransportPlan> {
    let n = supply.len();
    let m = demand.len();

    if n == 0 || m == 0 {
        return Err(WeaverError::shape("Transport problem has no sources or sinks"));
    }
    if cost.rows() != n || cost.cols() != m {
        return Err(WeaverError::shape(format!(
            "Cost matrix is {}x{} but problem is {}x{}",
            cost.rows(),
            cost.cols(),
            n,
            m
        )));
    }
    if supply.iter().chain(demand).any(|w| !w.is_finite() || *w < 0.0) {
        return Err(WeaverError::InvalidArgument(
            "Transport masses must be finite and non-negative".to_string(),
        ));
    }
    if cost.data.iter().any(|c| !c.is_finite()) {
        return Err(WeaverError::InvalidArgument(
            "Transport costs must be finite".to_string(),
        ));
    }

    let total_supply: f64 = supply.iter().sum();
    let total_demand: f64 = demand.iter().sum();
    if (total_supply - total_demand).abs() > BALANCE_TOLERANCE * total_supply.max(1.0) {
        return Err(WeaverError::InvalidArgument(format!(
            "Unbalanced transport problem: supply {} vs demand {}",
            total_supply, total_demand
        )));
    }

    let eps = MASS_EPSILON * total_supply.max(1.0);
    let nodes = n + m;

    let mut rs = supply.to_vec();
    let mut rt = demand.to_vec();
    let mut flow = vec![0.0; n * m];
    let mut pot = vec![0.0; nodes];

    let mut dist = vec![f64::INFINITY; nodes];
    let mut parent: Vec<Option<usize>> = vec![None; nodes];
    let mut done = vec![false; nodes];

    while rs.iter().any(|r| *r > eps) && rt.iter().any(|r| *r > eps) {
        dist.iter_mut().for_each(|d| *d = f64::INFINITY);
        parent.iter_mut().for_each(|p| *p = None);
        done.iter_mut().for_each(|d| *d = false);

        for i in 0..n {
            if rs[i] > eps {
                dist[i] = 0.0;
            }
        }

        // 稠密 Dijkstra
        let mut target = None;
        loop {
            let next = (0..nodes)
                .filter(|&v| !done[v] && dist[v].is_finite())
                .min_by(|&a, &b| dist[a].total_cmp(&dist[b]));
            let Some(u) = next else { break };
            done[u] = true;

            if u >= n {
                let j = u - n;
                if rt[j] > eps {
                    target = Some(u);
                    break;
                }
                for i in 0..n {
                    if done[i] || flow[i * m + j] <= eps {
                        continue;
                    }
                    let reduced = (-cost.get(i, j) + pot[u] - pot[i]).max(0.0);
                    let nd = dist[u] + reduced;
                    if nd < dist[i] {
                        dist[i] = nd;
                        parent[i] = Some(u);
                    }
                }
            } else {
                let i = u;
                for j in 0..m {
                    let v = n + j;
                    if done[v] {
                        continue;
                    }
                    let reduced = (cost.get(i, j) + pot[i] - pot[v]).max(0.0);
                    let nd = dist[u] + reduced;
                    if nd < dist[v] {
                        dist[v] = nd;
                        parent[v] = Some(u);
                    }
                }
            }
        }

        let Some(target) = target else {
            let left: f64 = rs.iter().sum();
            return Err(WeaverError::Other(format!(
                "Transport solver found no augmenting path with {:.3e} mass left",
                left
            )));
        };

        let reach = dist[target];
        for v in 0..nodes {
            pot[v] += dist[v].min(reach);
        }

        // 瓶颈
        let mut bottleneck = rt[target - n];
        let mut v = target;
        while let Some(u) = parent[v] {
            if v < n {
                // 反向边 汇 u → 源 v
                bottleneck = bottleneck.min(flow[v * m + (u - n)]);
            }
            v = u;
        }
        let start = v;
        bottleneck = bottleneck.min(rs[start]);

        // 增广
        let mut v = target;
        while let Some(u) = parent[v] {
            if v >= n {
                flow[u * m + (v - n)] += bottleneck;
            } else {
                flow[v * m + (u - n)] -= bottleneck;
            }
            v = u;
        }
        rs[start] -= bottleneck;
        rt[target - n] -= bottleneck;
    }

    let mut flows = Vec::new();
    let mut total_cost = 0.0;
    for i in 0..n {
        for j in 0..m {
            let mass = flow[i * m + j];
            if mass > eps {
                total_cost += mass * cost.get(i, j);
                flows.push(Flow {
                    source: i,
                    target: j,
                    mass,
                });
            }
        }
    }

    Ok(TransportPlan {
        flows,
        cost: total_cost,
    })
}
