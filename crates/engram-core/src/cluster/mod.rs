//! Density-based clustering of graph nodes (DBSCAN).
//!
//! Distance is cosine distance over embeddings, falling back to Jaccard
//! distance over term sets for pairs where either side has no embedding. The neighbor count of a point includes the point itself.
//! Points that are neither core points nor reachable from one are noise.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{EngramError, EngramResult};
use crate::text::{cosine_distance, jaccard_distance};
use crate::types::ItemKind;

/// Distance used to build neighborhoods.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DistanceKind {
    /// `1 - cosine` over embeddings; Jaccard when an embedding is missing.
    #[default]
    Cosine,
    /// `1 - jaccard` over term sets.
    Jaccard,
}

/// DBSCAN parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Neighborhood radius. Default: 0.3
    pub eps: f32,
    /// Minimum neighborhood size, the point included. Default: 3
    pub min_points: usize,
    pub distance_kind: DistanceKind,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            eps: 0.3,
            min_points: 3,
            distance_kind: DistanceKind::Cosine,
        }
    }
}

impl ClusterOptions {
    pub fn validate(&self) -> EngramResult<()> {
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(EngramError::validation("eps must be finite and non-negative"));
        }
        if self.min_points == 0 {
            return Err(EngramError::validation("min_points must be at least 1"));
        }
        Ok(())
    }
}

/// Input point.
#[derive(Debug, Clone)]
pub struct ClusterPoint {
    pub id: String,
    pub kind: ItemKind,
    pub embedding: Option<Vec<f32>>,
    pub terms: HashSet<String>,
}

/// One discovered cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub size: usize,
    pub member_ids: Vec<String>,
    /// Mean embedding; `None` under Jaccard distance.
    pub centroid: Option<Vec<f32>>,
    /// Most frequent kind(s) among members.
    pub dominant_kinds: Vec<ItemKind>,
    /// Average neighbor count of members divided by corpus size.
    pub density: f32,
}

/// Clusters plus the ids labeled noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub clusters: Vec<Cluster>,
    pub noise: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Noise,
    Member(usize),
}

fn distance(a: &ClusterPoint, b: &ClusterPoint, kind: DistanceKind) -> f32 {
    match kind {
        DistanceKind::Cosine => match (&a.embedding, &b.embedding) {
            (Some(x), Some(y)) => cosine_distance(x, y),
            _ => jaccard_distance(&a.terms, &b.terms),
        },
        DistanceKind::Jaccard => jaccard_distance(&a.terms, &b.terms),
    }
}

fn check(cancel: &CancellationToken) -> EngramResult<()> {
    if cancel.is_cancelled() {
        return Err(EngramError::Cancelled("cluster analysis".to_string()));
    }
    Ok(())
}

/// Run DBSCAN synchronously, checking `cancel` between points.
pub fn dbscan(
    points: &[ClusterPoint],
    options: &ClusterOptions,
    cancel: &CancellationToken,
) -> EngramResult<ClusterReport> {
    options.validate()?;
    let n = points.len();

    let mut neighborhoods: Vec<Vec<usize>> = Vec::with_capacity(n);
    for i in 0..n {
        check(cancel)?;
        let hood = (0..n)
            .filter(|&j| i == j || distance(&points[i], &points[j], options.distance_kind) <= options.eps)
            .collect();
        neighborhoods.push(hood);
    }

    let mut labels: Vec<Option<Label>> = vec![None; n];
    let mut cluster_count = 0;

    for i in 0..n {
        check(cancel)?;
        if labels[i].is_some() {
            continue;
        }
        if neighborhoods[i].len() < options.min_points {
            labels[i] = Some(Label::Noise);
            continue;
        }

        let cluster = cluster_count;
        cluster_count += 1;
        labels[i] = Some(Label::Member(cluster));

        let mut queue: VecDeque<usize> = neighborhoods[i].iter().copied().filter(|&j| j != i).collect();
        while let Some(j) = queue.pop_front() {
            match labels[j] {
                Some(Label::Noise) => {
                    // Border point: joins but does not expand.
                    labels[j] = Some(Label::Member(cluster));
                    continue;
                }
                Some(Label::Member(_)) => continue,
                None => {}
            }
            labels[j] = Some(Label::Member(cluster));
            if neighborhoods[j].len() >= options.min_points {
                queue.extend(neighborhoods[j].iter().copied());
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    let mut noise = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        match label {
            Some(Label::Member(c)) => members[*c].push(idx),
            _ => noise.push(points[idx].id.clone()),
        }
    }

    let mut clusters: Vec<Cluster> = members
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(|m| summarize(points, &neighborhoods, &m, options.distance_kind))
        .collect();
    clusters.sort_by(|a, b| b.size.cmp(&a.size));
    for (id, cluster) in clusters.iter_mut().enumerate() {
        cluster.id = id;
    }

    debug!(
        points = n,
        clusters = clusters.len(),
        noise = noise.len(),
        "Cluster analysis complete"
    );
    Ok(ClusterReport { clusters, noise })
}

fn summarize(
    points: &[ClusterPoint],
    neighborhoods: &[Vec<usize>],
    members: &[usize],
    kind: DistanceKind,
) -> Cluster {
    let size = members.len();

    let centroid = match kind {
        DistanceKind::Jaccard => None,
        DistanceKind::Cosine => {
            let vectors: Vec<&Vec<f32>> = members
                .iter()
                .filter_map(|&m| points[m].embedding.as_ref())
                .collect();
            vectors.first().map(|first| {
                let mut sum = vec![0.0f32; first.len()];
                for v in &vectors {
                    for (acc, x) in sum.iter_mut().zip(v.iter()) {
                        *acc += x;
                    }
                }
                sum.iter().map(|x| x / vectors.len() as f32).collect()
            })
        }
    };

    let mut kind_counts: BTreeMap<ItemKind, usize> = BTreeMap::new();
    for &m in members {
        *kind_counts.entry(points[m].kind).or_insert(0) += 1;
    }
    let top = kind_counts.values().copied().max().unwrap_or(0);
    let dominant_kinds = kind_counts
        .into_iter()
        .filter(|(_, count)| *count == top)
        .map(|(k, _)| k)
        .collect();

    let total_neighbors: usize = members.iter().map(|&m| neighborhoods[m].len()).sum();
    let density = total_neighbors as f32 / size as f32 / points.len() as f32;

    Cluster {
        id: 0,
        size,
        member_ids: members.iter().map(|&m| points[m].id.clone()).collect(),
        centroid,
        dominant_kinds,
        density,
    }
}

/// Run DBSCAN on a blocking thread.
pub async fn analyze(
    points: Vec<ClusterPoint>,
    options: ClusterOptions,
    cancel: CancellationToken,
) -> EngramResult<ClusterReport> {
    tokio::task::spawn_blocking(move || dbscan(&points, &options, &cancel))
        .await
        .map_err(|e| EngramError::internal(format!("cluster task failed: {}", e)))?
}
