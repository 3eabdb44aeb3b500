use serde::Serialize;

use crate::{resources::ResourceKind, workers::WorkerPool};

/// A clickable resource spot. Position is a percentage of the map area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    pub resource: ResourceKind,
    pub glyph: &'static str,
    pub x: f32,
    pub y: f32,
}

fn node(resource: ResourceKind, glyph: &'static str, x: f32, y: f32) -> ResourceNode {
    ResourceNode { resource, glyph, x, y }
}

/// The village map. Indices are stable for the whole session.
pub fn default_nodes() -> Vec<ResourceNode> {
    use ResourceKind::*;
    vec![
        node(Wood, "🌲", 15.0, 20.0),
        node(Wood, "🌳", 25.0, 15.0),
        node(Wood, "🌲", 35.0, 25.0),
        node(Wood, "🌳", 20.0, 35.0),
        node(Wood, "🌲", 30.0, 40.0),
        node(Stone, "⛰️", 70.0, 15.0),
        node(Stone, "🗿", 80.0, 25.0),
        node(Stone, "⛰️", 85.0, 35.0),
        node(Stone, "🗻", 75.0, 45.0),
        node(Food, "🌾", 45.0, 70.0),
        node(Food, "🥦", 55.0, 75.0),
        node(Food, "🌾", 65.0, 70.0),
        node(Food, "🌽", 50.0, 80.0),
        node(Food, "🥕", 60.0, 85.0),
        node(Water, "🏞️", 20.0, 60.0),
        node(Water, "💧", 15.0, 70.0),
        node(Water, "🌊", 25.0, 75.0),
        node(Water, "⛲", 30.0, 65.0),
    ]
}

pub fn indices_of(nodes: &[ResourceNode], resource: ResourceKind) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.resource == resource)
        .map(|(index, _)| index)
        .collect()
}

/// Spreads each job's gatherers over its nodes; the first nodes of a type
/// take the remainder. Indexed like `nodes`.
pub fn distribute_workers(nodes: &[ResourceNode], pool: &WorkerPool) -> Vec<u64> {
    let mut per_node = vec![0; nodes.len()];
    for resource in WorkerPool::GATHERING {
        let indices = indices_of(nodes, resource);
        if indices.is_empty() {
            continue;
        }
        let count = pool.gatherers(resource);
        let base = count / indices.len() as u64;
        let remainder = (count % indices.len() as u64) as usize;
        for (position, index) in indices.into_iter().enumerate() {
            per_node[index] = base + u64::from(position < remainder);
        }
    }
    per_node
}
