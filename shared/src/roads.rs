//! Road network generation and point/segment geometry.
//!
//! The network is drawn from its own RNG seeded with the world seed alone, so
//! it never depends on the order chunks are generated in.

use crate::random::WorldRng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

const RING_RADIUS_FRACTION: f32 = 0.3;
const RING_SEGMENTS: usize = 36;
const RING_JITTER: f32 = 0.2;
const RADIAL_JITTER: f32 = 0.05;

/// A point on the ground plane.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub z: f32,
}

impl Point2 {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RoadSegment {
    pub start: Point2,
    pub end: Point2,
}

impl RoadSegment {
    pub fn distance_to(&self, x: f32, z: f32) -> f32 {
        point_to_segment_distance(x, z, self.start, self.end)
    }

    /// True if any part of the segment lies inside the closed rectangle.
    pub fn intersects_rect(&self, min: Point2, max: Point2) -> bool {
        // Liang-Barsky clipping against the four rectangle edges.
        let dx = self.end.x - self.start.x;
        let dz = self.end.z - self.start.z;
        let checks = [
            (-dx, self.start.x - min.x),
            (dx, max.x - self.start.x),
            (-dz, self.start.z - min.z),
            (dz, max.z - self.start.z),
        ];

        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for (p, q) in checks {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
            } else {
                let t = q / p;
                if p < 0.0 {
                    t0 = t0.max(t);
                } else {
                    t1 = t1.min(t);
                }
                if t0 > t1 {
                    return false;
                }
            }
        }
        true
    }
}

/// The polylines making up a world's roads. Immutable once generated.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadNetwork {
    roads: Vec<Vec<Point2>>,
}

impl RoadNetwork {
    /// Builds the network for a world: one jittered ring around the world
    /// centre, 4-8 radial roads from the centre to the edge and 5-10 short
    /// wandering roads.
    pub fn generate(seed: u32, world_size: f32) -> Self {
        let mut rng = WorldRng::new(u64::from(seed));
        let center = Point2::new(world_size * 0.5, world_size * 0.5);

        let mut roads = Vec::new();
        roads.push(ring_road(&mut rng, center, world_size * RING_RADIUS_FRACTION));

        let radial_count = rng.range_inclusive(4, 8);
        for i in 0..radial_count {
            let angle = (i as f32 / radial_count as f32) * TAU;
            roads.push(radial_road(&mut rng, center, angle, world_size));
        }

        let wandering_count = rng.range_inclusive(5, 10);
        for _ in 0..wandering_count {
            roads.push(wandering_road(&mut rng, world_size));
        }

        Self { roads }
    }

    pub fn roads(&self) -> &[Vec<Point2>] {
        &self.roads
    }

    pub fn segments(&self) -> impl Iterator<Item = RoadSegment> + '_ {
        self.roads.iter().flat_map(|road| {
            road.windows(2).map(|pair| RoadSegment {
                start: pair[0],
                end: pair[1],
            })
        })
    }

    pub fn segment_count(&self) -> usize {
        self.roads.iter().map(|road| road.len().saturating_sub(1)).sum()
    }

    /// Distance from `(x, z)` to the closest centreline of any road.
    pub fn distance_to_nearest(&self, x: f32, z: f32) -> f32 {
        self.segments()
            .map(|segment| segment.distance_to(x, z))
            .fold(f32::INFINITY, f32::min)
    }

    /// Segments crossing the rectangle `[min, max]`.
    pub fn segments_in_rect(&self, min: Point2, max: Point2) -> Vec<RoadSegment> {
        self.segments()
            .filter(|segment| segment.intersects_rect(min, max))
            .collect()
    }
}

fn ring_road(rng: &mut WorldRng, center: Point2, radius: f32) -> Vec<Point2> {
    let mut road = Vec::with_capacity(RING_SEGMENTS + 1);
    for i in 0..RING_SEGMENTS {
        let angle = (i as f32 / RING_SEGMENTS as f32) * TAU;
        let mut x = center.x + angle.cos() * radius;
        let mut z = center.z + angle.sin() * radius;

        if i > 0 {
            x += (rng.next_f32() - 0.5) * radius * RING_JITTER;
            z += (rng.next_f32() - 0.5) * radius * RING_JITTER;
        }
        road.push(Point2::new(x, z));
    }
    // Closed loop: the last vertex is the unjittered first one.
    road.push(road[0]);
    road
}

fn radial_road(rng: &mut WorldRng, center: Point2, angle: f32, world_size: f32) -> Vec<Point2> {
    let end = Point2::new(
        center.x + angle.cos() * world_size * 0.5,
        center.z + angle.sin() * world_size * 0.5,
    );

    let mut road = vec![center];
    let steps = rng.range_inclusive(3, 6);
    for j in 1..steps {
        let t = j as f32 / steps as f32;
        let deviation = world_size * RADIAL_JITTER * (1.0 - t);
        let x = center.x + (end.x - center.x) * t + (rng.next_f32() - 0.5) * deviation;
        let z = center.z + (end.z - center.z) * t + (rng.next_f32() - 0.5) * deviation;
        road.push(Point2::new(x, z));
    }
    road.push(end);
    road
}

fn wandering_road(rng: &mut WorldRng, world_size: f32) -> Vec<Point2> {
    let mut current = Point2::new(rng.next_f32() * world_size, rng.next_f32() * world_size);
    let segments = rng.range_inclusive(3, 8);
    let mut heading = rng.next_f32() * TAU;

    let mut road = Vec::with_capacity(segments as usize + 1);
    road.push(current);
    for _ in 0..segments {
        heading += (rng.next_f32() - 0.5) * 0.5;
        let length = rng.range_inclusive(100, 300) as f32;
        current = Point2::new(
            (current.x + heading.cos() * length).clamp(0.0, world_size),
            (current.z + heading.sin() * length).clamp(0.0, world_size),
        );
        road.push(current);
    }
    road
}

/// Shortest distance from `(x, z)` to the segment `a`-`b`, projecting onto
/// the segment and clamping to its endpoints.
pub fn point_to_segment_distance(x: f32, z: f32, a: Point2, b: Point2) -> f32 {
    let seg_x = b.x - a.x;
    let seg_z = b.z - a.z;
    let to_x = x - a.x;
    let to_z = z - a.z;

    let length_sq = seg_x * seg_x + seg_z * seg_z;
    if length_sq == 0.0 {
        return (to_x * to_x + to_z * to_z).sqrt();
    }

    let t = ((seg_x * to_x + seg_z * to_z) / length_sq).clamp(0.0, 1.0);
    let dx = x - (a.x + t * seg_x);
    let dz = z - (a.z + t * seg_z);
    (dx * dx + dz * dz).sqrt()
}
