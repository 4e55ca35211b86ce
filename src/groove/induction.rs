// Tempo Induction - beat period hypotheses from inter-onset intervals
// Clusters IOIs, ranks clusters by size and integer relations, folds into the beat range

use serde::{Deserialize, Serialize};

use super::config::{CLUSTER_WIDTH, MAX_IBI, MAX_IOI, MIN_IBI, MIN_IOI, TOP_N};
use crate::events::Event;

/// A cluster of similar inter-onset intervals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IoiCluster {
    /// Running weighted average of the IOIs assigned to the cluster (s)
    pub interval: f64,

    /// Number of IOIs in the cluster
    pub count: u32,

    /// Ranking score: 10 * count, then raised by related clusters
    pub score: i32,
}

impl IoiCluster {
    fn new(interval: f64) -> Self {
        IoiCluster {
            interval,
            count: 1,
            score: 0,
        }
    }
}

/// Induce candidate beat periods (s) from a time-sorted event list
///
/// Algorithm:
/// 1. Collect IOIs of all event pairs within [MIN_IOI, MAX_IOI]
/// 2. Cluster them, then merge clusters closer than CLUSTER_WIDTH
/// 3. Score clusters by size, reinforced by integer-related clusters
/// 4. For the TOP_N clusters, combine related intervals into one beat period
///    and fold it into [MIN_IBI, MAX_IBI]
///
/// Returns an ascending list without duplicates; empty if nothing qualifies
pub fn induce_tempi(events: &[Event]) -> Vec<f64> {
    if events.len() < 2 {
        return Vec::new();
    }

    let iois = qualifying_iois(events);
    if iois.is_empty() {
        return Vec::new();
    }

    let mut clusters = cluster_iois(&iois);
    merge_similar_clusters(&mut clusters);
    set_initial_scores(&mut clusters);
    rank_related_clusters(&mut clusters);

    let best = best_clusters(&clusters);

    let mut tempi: Vec<f64> = best
        .iter()
        .filter_map(|&idx| combined_beat_period(&clusters[idx], &clusters))
        .collect();

    tempi.sort_by(|a, b| a.total_cmp(b));
    tempi.dedup();

    log::debug!(
        "Induction: {} IOIs, {} clusters, {} tempo hypotheses",
        iois.len(),
        clusters.len(),
        tempi.len()
    );

    tempi
}

/// IOIs of all ordered event pairs inside [MIN_IOI, MAX_IOI]
/// Relies on events being time-sorted to stop each scan early
pub fn qualifying_iois(events: &[Event]) -> Vec<f64> {
    let mut iois = Vec::new();

    for (i, first) in events.iter().enumerate() {
        for second in &events[i + 1..] {
            let ioi = second.time - first.time;
            if ioi < MIN_IOI {
                continue;
            }
            if ioi > MAX_IOI {
                break;
            }
            iois.push(ioi);
        }
    }

    iois
}

/// Assign each IOI to the nearest cluster, or open a new one
/// The result is ordered by cluster interval
pub fn cluster_iois(iois: &[f64]) -> Vec<IoiCluster> {
    let mut clusters: Vec<IoiCluster> = Vec::new();

    for &ioi in iois {
        if !add_to_closest_cluster(ioi, &mut clusters) {
            let pos = clusters.partition_point(|c| c.interval < ioi);
            clusters.insert(pos, IoiCluster::new(ioi));
        }
    }

    clusters
}

/// Add `ioi` to the nearer of its two neighbouring clusters
/// Returns false when neither is strictly nearer and within CLUSTER_WIDTH
fn add_to_closest_cluster(ioi: f64, clusters: &mut Vec<IoiCluster>) -> bool {
    let upper = clusters.partition_point(|c| c.interval <= ioi);

    let diff_above = clusters
        .get(upper)
        .map(|c| (c.interval - ioi).abs())
        .unwrap_or(f64::MAX);
    let diff_below = upper
        .checked_sub(1)
        .map(|i| (ioi - clusters[i].interval).abs())
        .unwrap_or(f64::MAX);

    let found = if diff_above < diff_below && diff_above < CLUSTER_WIDTH {
        upper
    } else if diff_below < diff_above && diff_below < CLUSTER_WIDTH {
        upper - 1
    } else {
        return false;
    };

    let cluster = clusters[found];
    let Some(interval) = weighted_mean(cluster.interval, cluster.count, ioi, 1) else {
        return false;
    };

    // The key moved, so keep the list ordered
    clusters.remove(found);
    let pos = clusters.partition_point(|c| c.interval < interval);
    clusters.insert(
        pos,
        IoiCluster {
            interval,
            count: cluster.count + 1,
            score: cluster.score,
        },
    );

    true
}

/// Merge neighbouring clusters whose intervals are closer than CLUSTER_WIDTH
/// Single forward pass; a merged cluster is compared again with its next neighbour
pub fn merge_similar_clusters(clusters: &mut Vec<IoiCluster>) {
    let mut i = 0;

    while i + 1 < clusters.len() {
        let first = clusters[i];
        let second = clusters[i + 1];

        if (second.interval - first.interval).abs() < CLUSTER_WIDTH {
            let interval = weighted_mean(first.interval, first.count, second.interval, second.count)
                .unwrap_or(first.interval);

            // The merged interval lies between the two, so order is preserved
            clusters[i] = IoiCluster {
                interval,
                count: first.count + second.count,
                score: first.score,
            };
            clusters.remove(i + 1);
            continue;
        }

        i += 1;
    }
}

/// Weighted average of two intervals; None if both counts are zero
/// Returns `a` unchanged when `b == a`, so repeated IOIs keep an exact key
fn weighted_mean(a: f64, a_count: u32, b: f64, b_count: u32) -> Option<f64> {
    let total = a_count as u64 + b_count as u64;
    if total == 0 {
        return None;
    }

    Some(a + (b - a) * (b_count as f64 / total as f64))
}

fn set_initial_scores(clusters: &mut [IoiCluster]) {
    for cluster in clusters.iter_mut() {
        cluster.score = 10 * cluster.count as i32;
    }
}

/// Integer relation degree between two intervals, if they are near-multiples
///
/// The degree is round(max / min) and must be in [2, 8]. The tolerance on
/// |min * degree - max| is degree * CLUSTER_WIDTH when `a` is the larger
/// interval, CLUSTER_WIDTH otherwise.
pub fn relation_degree(a: f64, b: f64) -> Option<u32> {
    let max = a.max(b);
    let min = a.min(b);
    if min <= 0.0 {
        return None;
    }

    let degree = (max / min).round_ties_even();
    if !(2.0..=8.0).contains(&degree) {
        return None;
    }

    let diff = (min * degree - max).abs();
    let tolerance = if a > b {
        degree * CLUSTER_WIDTH
    } else {
        CLUSTER_WIDTH
    };
    if diff >= tolerance {
        return None;
    }

    Some(degree as u32)
}

/// Reinforcement weight of a relation: closer integer ratios count more
fn relation_weight(degree: u32) -> i32 {
    if degree >= 5 {
        1
    } else {
        6 - degree as i32
    }
}

/// Raise the score of every pair of integer-related clusters
/// Each cluster gains weight * (IOI count of the other)
pub fn rank_related_clusters(clusters: &mut [IoiCluster]) {
    for i in 0..clusters.len() {
        for j in i + 1..clusters.len() {
            let Some(degree) = relation_degree(clusters[i].interval, clusters[j].interval) else {
                continue;
            };

            let weight = relation_weight(degree);
            let count_i = clusters[i].count as i32;
            let count_j = clusters[j].count as i32;

            clusters[i].score += weight * count_j;
            clusters[j].score += weight * count_i;
        }
    }
}

/// Indices of the TOP_N highest-scoring clusters
/// Equal scores keep interval order
fn best_clusters(clusters: &[IoiCluster]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..clusters.len()).collect();
    indices.sort_by(|&a, &b| clusters[b].score.cmp(&clusters[a].score));
    indices.truncate(TOP_N);
    indices
}

/// Beat period of a cluster adjusted by its sub- and super-multiples
/// Folded by doubling/halving into [MIN_IBI, MAX_IBI]
fn combined_beat_period(best: &IoiCluster, clusters: &[IoiCluster]) -> Option<f64> {
    let mut sum = best.interval * best.score as f64;
    let mut weight = best.score as f64;

    for cluster in clusters {
        if cluster.interval == best.interval {
            continue;
        }

        let Some(degree) = relation_degree(best.interval, cluster.interval) else {
            continue;
        };

        let factor = if best.interval < cluster.interval {
            1.0 / degree as f64
        } else {
            degree as f64
        };

        sum += cluster.interval * factor * cluster.score as f64;
        weight += cluster.score as f64;
    }

    if weight <= 0.0 {
        return None;
    }

    let mut beat = sum / weight;
    if !(beat > 0.0) || !beat.is_finite() {
        return None;
    }

    while beat < MIN_IBI {
        beat *= 2.0;
    }
    while beat > MAX_IBI {
        beat /= 2.0;
    }

    if beat >= MIN_IBI {
        Some(beat)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(count: usize, interval: f64) -> Vec<Event> {
        (0..count)
            .map(|i| Event::new(i as f64 * interval, 1.0))
            .collect()
    }

    #[test]
    fn test_constant_iois_form_one_cluster() {
        let iois = vec![0.4; 12];
        let clusters = cluster_iois(&iois);

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].interval, 0.4);
        assert_eq!(clusters[0].count, 12);
    }

    #[test]
    fn test_constant_iois_keep_exact_key() {
        for k in [0.1, 0.3, 0.7, 1.1, 1.9, 2.3] {
            for n in [3, 7, 20, 100, 1000] {
                let clusters = cluster_iois(&vec![k; n]);

                assert_eq!(clusters.len(), 1);
                assert_eq!(clusters[0].interval, k, "{} x {}", n, k);
                assert_eq!(clusters[0].count, n as u32);
            }
        }
    }

    #[test]
    fn test_constant_event_spacing_counts_qualifying_pairs() {
        // 1.5s spacing: only neighbouring pairs fit under MAX_IOI
        let events = click_track(5, 1.5);
        let iois = qualifying_iois(&events);
        let clusters = cluster_iois(&iois);

        assert_eq!(iois.len(), 4);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].interval, 1.5);
        assert_eq!(clusters[0].count, 4);
    }

    #[test]
    fn test_out_of_range_iois_are_skipped() {
        let events = vec![
            Event::new(0.0, 1.0),
            Event::new(0.05, 1.0), // too short
            Event::new(3.0, 1.0),  // too long from both
        ];

        assert!(qualifying_iois(&events).is_empty());
        assert!(induce_tempi(&events).is_empty());
    }

    #[test]
    fn test_nearby_iois_share_cluster() {
        let clusters = cluster_iois(&[0.50, 0.51, 0.49, 0.80]);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 3);
        assert!((clusters[0].interval - 0.50).abs() < 1e-9);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_merge_keeps_clusters_apart() {
        let mut clusters = vec![
            IoiCluster { interval: 0.50, count: 2, score: 0 },
            IoiCluster { interval: 0.52, count: 2, score: 0 },
            IoiCluster { interval: 0.60, count: 1, score: 0 },
        ];

        merge_similar_clusters(&mut clusters);

        assert_eq!(clusters.len(), 2);
        assert!((clusters[0].interval - 0.51).abs() < 1e-12);
        assert_eq!(clusters[0].count, 4);
        for pair in clusters.windows(2) {
            assert!(pair[1].interval - pair[0].interval >= CLUSTER_WIDTH);
        }
    }

    #[test]
    fn test_weighted_mean_zero_count() {
        assert_eq!(weighted_mean(0.5, 0, 0.6, 0), None);
        let mean = weighted_mean(0.5, 1, 0.7, 1).unwrap();
        assert!((mean - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_relation_degree() {
        assert_eq!(relation_degree(0.4, 0.8), Some(2));
        assert_eq!(relation_degree(0.3, 0.9), Some(3));
        assert_eq!(relation_degree(0.4, 0.57), None); // ratio rounds to 1
        assert_eq!(relation_degree(0.1, 2.0), None); // ratio 20
    }

    #[test]
    fn test_relation_tolerance_depends_on_order() {
        // 0.4 * 3 = 1.2, off by 0.04: beyond CLUSTER_WIDTH, within 3 * CLUSTER_WIDTH
        assert_eq!(relation_degree(0.4, 1.24), None);
        assert_eq!(relation_degree(1.24, 0.4), Some(3));
    }

    #[test]
    fn test_octave_reinforcement() {
        let iois = [0.4, 0.4, 0.4, 0.8, 0.8, 0.8];
        let mut clusters = cluster_iois(&iois);
        merge_similar_clusters(&mut clusters);
        set_initial_scores(&mut clusters);

        assert_eq!(clusters.len(), 2);
        let isolated: Vec<i32> = clusters.iter().map(|c| c.score).collect();
        assert_eq!(isolated, vec![30, 30]);

        rank_related_clusters(&mut clusters);

        // degree 2 -> weight 4, times 3 IOIs in the partner
        assert_eq!(clusters[0].score, 42);
        assert_eq!(clusters[1].score, 42);
    }

    #[test]
    fn test_unrelated_cluster_keeps_score() {
        let iois = [0.4, 0.4, 0.4, 0.57, 0.57, 0.57];
        let mut clusters = cluster_iois(&iois);
        merge_similar_clusters(&mut clusters);
        set_initial_scores(&mut clusters);
        rank_related_clusters(&mut clusters);

        assert!(clusters.iter().all(|c| c.score == 30));
    }

    #[test]
    fn test_best_clusters_ties_keep_order() {
        let clusters: Vec<IoiCluster> = (0..12)
            .map(|i| IoiCluster {
                interval: 0.1 + i as f64 * 0.1,
                count: 1,
                score: if i == 7 { 50 } else { 10 },
            })
            .collect();

        let best = best_clusters(&clusters);

        assert_eq!(best.len(), TOP_N);
        assert_eq!(best[0], 7);
        assert_eq!(&best[1..4], &[0, 1, 2]);
    }

    #[test]
    fn test_combined_period_is_folded_into_range() {
        let clusters = vec![IoiCluster { interval: 2.0, count: 3, score: 30 }];
        let beat = combined_beat_period(&clusters[0], &clusters).unwrap();

        assert!((beat - 1.0).abs() < 1e-12);

        let clusters = vec![IoiCluster { interval: 0.125, count: 3, score: 30 }];
        let beat = combined_beat_period(&clusters[0], &clusters).unwrap();

        assert!((beat - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_click_track_induces_its_period() {
        let tempi = induce_tempi(&click_track(20, 0.5));

        assert!(!tempi.is_empty());
        assert!(tempi.iter().any(|t| (t - 0.5).abs() < 1e-6));
        assert!(tempi.iter().all(|t| *t >= MIN_IBI && *t <= MAX_IBI));
        for pair in tempi.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_too_few_events() {
        assert!(induce_tempi(&[]).is_empty());
        assert!(induce_tempi(&[Event::new(0.0, 1.0)]).is_empty());
    }
}
