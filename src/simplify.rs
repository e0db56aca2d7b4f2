//! Point-budget track simplification.
//!
//! Reduction works per segment: the budget is split proportionally to
//! segment size, then each segment drops the interior points that sit
//! closest to the straight line through their original neighbors until it
//! fits its share. Endpoints are never dropped and surviving points keep
//! their original order.

use crate::geom::point_segment_distance;
use crate::model::{Gpx, TrackSegment};

impl Gpx {
    /// Reduce the total track-point count to at most `max_points`,
    /// mutating segments in place. A document already within the budget
    /// is left untouched.
    pub fn reduce_points(&mut self, max_points: usize) {
        reduce_points(self, max_points)
    }
}

pub fn reduce_points(gpx: &mut Gpx, max_points: usize) {
    let total = gpx.total_points();
    if total <= max_points {
        return;
    }

    let sizes: Vec<usize> = gpx
        .tracks
        .iter()
        .flat_map(|t| &t.segments)
        .map(|s| s.points.len())
        .collect();
    let allocations = allocate_budget(&sizes, max_points, total);

    let segments = gpx.tracks.iter_mut().flat_map(|t| &mut t.segments);
    for (segment, target) in segments.zip(allocations) {
        reduce_segment(segment, target);
    }
}

/// Split `max_points` across segments proportionally to their size.
///
/// Each segment gets `max_points * size / total`, floored at two points
/// (its endpoints) and capped at its size so it is never padded. The
/// integer-division remainder is granted one point at a time to the
/// largest segments first, ties broken by segment position. Flooring can
/// push the sum over the budget; the excess is taken back from the
/// segments holding the largest allocations, so the total only exceeds
/// `max_points` when the endpoint floors alone do.
fn allocate_budget(sizes: &[usize], max_points: usize, total: usize) -> Vec<usize> {
    let floor = |size: usize| size.min(2);
    let mut allocations: Vec<usize> = sizes
        .iter()
        .map(|&size| (max_points * size / total).clamp(floor(size), size))
        .collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

    let mut granted: usize = allocations.iter().sum();
    while granted < max_points {
        let mut progressed = false;
        for &i in &order {
            if granted == max_points {
                break;
            }
            if allocations[i] < sizes[i] {
                allocations[i] += 1;
                granted += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    while granted > max_points {
        let reclaim = (0..allocations.len())
            .filter(|&i| allocations[i] > floor(sizes[i]))
            .max_by_key(|&i| (allocations[i], std::cmp::Reverse(i)));
        let Some(i) = reclaim else { break };
        allocations[i] -= 1;
        granted -= 1;
    }

    allocations
}

/// Drop interior points from a segment until it holds at most `target`
/// points. The points removed are the ones contributing least to the
/// path shape: smallest distance to the chord between their immediate
/// original neighbors, index as a deterministic tie-break.
fn reduce_segment(segment: &mut TrackSegment, target: usize) {
    let len = segment.points.len();
    if len <= target || len <= 2 {
        return;
    }

    let mut scored: Vec<(f64, usize)> = (1..len - 1)
        .map(|i| {
            let p = &segment.points[i];
            let a = &segment.points[i - 1];
            let b = &segment.points[i + 1];
            let score = point_segment_distance((p.lat, p.lon), (a.lat, a.lon), (b.lat, b.lon));
            (score, i)
        })
        .collect();
    scored.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

    let mut remove = vec![false; len];
    for &(_, i) in scored.iter().take(len - target) {
        remove[i] = true;
    }

    let mut kept = Vec::with_capacity(target);
    for (i, point) in segment.points.drain(..).enumerate() {
        if !remove[i] {
            kept.push(point);
        }
    }
    segment.points = kept;
}
