use std::collections::BTreeMap;

use bevy::prelude::*;
use tilenav::nav::{GridConfig, GridRect, Position, SpatialIndex, SpatialIndexConfig};

const WIDTH: i32 = 12;
const HEIGHT: i32 = 9;
const LAYERS: i32 = 2;

/// Reference model: each entity sits in at most one cell.
#[derive(Default)]
struct Model {
    at: BTreeMap<Entity, Position>,
}

impl Model {
    fn occupants(&self, pos: Position) -> usize {
        self.at.values().filter(|&&p| p == pos).count()
    }

    fn in_rect(&self, rect: GridRect) -> Vec<Entity> {
        self.at.iter().filter(|(_, &p)| rect.contains(p)).map(|(&e, _)| e).collect()
    }
}

fn random_pos(rng: &mut fastrand::Rng) -> Position {
    // Occasionally out of bounds.
    Position::new(rng.i32(-1..=WIDTH), rng.i32(-1..=HEIGHT), rng.i32(0..LAYERS))
}

fn in_bounds(pos: Position) -> bool {
    (0..WIDTH).contains(&pos.x) && (0..HEIGHT).contains(&pos.y) && (0..LAYERS).contains(&pos.z)
}

fn sorted(mut v: Vec<Entity>) -> Vec<Entity> {
    v.sort();
    v
}

fn check_consistency(index: &SpatialIndex, model: &Model, step: usize) {
    assert_eq!(index.total_entries(), model.at.len(), "entry count diverged at step {step}");
    let mut out = Vec::new();
    for (&entity, &pos) in &model.at {
        index.query_point(pos, &mut out);
        assert!(out.contains(&entity), "{entity:?} missing from {pos} at step {step}");
        assert_eq!(out.len(), model.occupants(pos), "occupant count at {pos} at step {step}");
    }
}

fn run_model(seed: u64, steps: usize) {
    let config = GridConfig::new(WIDTH, HEIGHT, LAYERS, true).unwrap();
    let mut index = SpatialIndex::new(config, &SpatialIndexConfig { max_pooled_overflow_lists: 4 });
    let mut model = Model::default();
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut out = Vec::new();

    for step in 0..steps {
        let entity = Entity::from_bits(rng.u64(1..=40));
        let pos = random_pos(&mut rng);
        match rng.u8(0..5) {
            0 => {
                if model.at.contains_key(&entity) {
                    continue;
                }
                let inserted = index.insert(pos, entity);
                assert_eq!(inserted, in_bounds(pos), "insert {entity:?} at {pos}, step {step}");
                if inserted {
                    model.at.insert(entity, pos);
                }
            }
            1 => {
                let expected = model.at.get(&entity) == Some(&pos);
                assert_eq!(index.remove(pos, entity), expected, "remove {entity:?} at {pos}, step {step}");
                if expected {
                    model.at.remove(&entity);
                }
            }
            2 => {
                let Some(&from) = model.at.get(&entity) else {
                    continue;
                };
                let moved = index.update(from, pos, entity);
                assert_eq!(moved, in_bounds(pos), "update {entity:?} {from} -> {pos}, step {step}");
                if moved {
                    model.at.insert(entity, pos);
                }
            }
            3 => {
                let Some(&from) = model.at.get(&entity) else {
                    continue;
                };
                let expected = in_bounds(pos) && pos != from && model.occupants(pos) == 0;
                let moved = index.try_move(from, pos, entity);
                assert_eq!(moved, expected, "try_move {entity:?} {from} -> {pos}, step {step}");
                if moved {
                    model.at.insert(entity, pos);
                }
            }
            _ => {
                let other = random_pos(&mut rng);
                let rect = GridRect::from_corners(pos, Position::new(other.x, other.y, pos.z));
                index.query_rect(rect, &mut out);
                assert_eq!(
                    sorted(out.clone()),
                    model.in_rect(rect),
                    "rect query {rect:?} at step {step}"
                );

                let radius = rng.i32(0..5);
                index.query_circle(pos, radius, &mut out);
                let r2 = radius * radius;
                let expected: Vec<Entity> = model
                    .at
                    .iter()
                    .filter(|(_, p)| {
                        let (dx, dy) = (p.x - pos.x, p.y - pos.y);
                        p.z == pos.z && dx * dx + dy * dy <= r2
                    })
                    .map(|(&e, _)| e)
                    .collect();
                assert_eq!(sorted(out.clone()), expected, "circle query at {pos} r={radius}, step {step}");
            }
        }
        check_consistency(&index, &model, step);
        assert!(index.pooled_overflow_lists() <= 4, "pool exceeded its cap at step {step}");
    }
}

#[test]
fn test_random_operations_match_model() {
    for seed in [1, 2, 3, 0xdead_beef] {
        run_model(seed, 3_000);
    }
}

#[test]
fn test_crowded_cells_match_model() {
    // Tiny grid so cells overflow constantly.
    let config = GridConfig::new(2, 2, 1, true).unwrap();
    let mut index = SpatialIndex::new(config, &SpatialIndexConfig::default());
    let mut model = Model::default();
    let mut rng = fastrand::Rng::with_seed(99);

    for step in 0..2_000 {
        let entity = Entity::from_bits(rng.u64(1..=24));
        let pos = Position::new(rng.i32(0..2), rng.i32(0..2), 0);
        match model.at.get(&entity).copied() {
            None => {
                assert!(index.insert(pos, entity));
                model.at.insert(entity, pos);
            }
            Some(from) if rng.bool() => {
                assert!(index.update(from, pos, entity));
                model.at.insert(entity, pos);
            }
            Some(from) => {
                assert!(index.remove(from, entity));
                model.at.remove(&entity);
            }
        }
        check_consistency(&index, &model, step);
    }
    index.clear();
    assert_eq!(index.total_entries(), 0);
    assert_eq!(index.non_empty_cells(), 0);
}
