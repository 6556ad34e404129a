// scene.rs — 场景目录 (实体数组 + 名称索引)
//
// Nodes live in an arena addressed by `NodeId`. The name index is built as
// nodes are inserted during setup; lookups after that never walk the arena.

use std::collections::HashMap;

use glam::{Quat, Vec3};

pub const HOTSPOT_PREFIX: &str = "Hotspot_";
pub const INFOSPOT_PREFIX: &str = "Infospot_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Position-only node (stands in for a model node).
    Anchor,
    /// Invisible room geometry the reticle lands on.
    Surface,
    Hotspot { panorama: String },
    Infospot { bubble_text: String },
}

/// Triangle soup in world space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Flat square facing `normal`, centered on `center`.
    pub fn quad(center: Vec3, half_extent: f32, normal: Vec3) -> Self {
        let n = normal.normalize_or(Vec3::Y);
        let helper = if n.dot(Vec3::Y).abs() > 0.99 { Vec3::Z } else { Vec3::Y };
        let u = helper.cross(n).normalize() * half_extent;
        let v = n.cross(u).normalize() * half_extent;
        Self {
            vertices: vec![
                center - u - v,
                center + u - v,
                center + u + v,
                center - u + v,
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(move |tri| {
            let a = *self.vertices.get(tri[0] as usize)?;
            let b = *self.vertices.get(tri[1] as usize)?;
            let c = *self.vertices.get(tri[2] as usize)?;
            Some([a, b, c])
        })
    }

    pub fn min_y(&self) -> Option<f32> {
        self.vertices.iter().map(|v| v.y).reduce(f32::min)
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub visible: bool,
    pub opacity: f32,
    pub mesh: Option<Mesh>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, position: Vec3) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            rotation: Quat::IDENTITY,
            visible: true,
            opacity: 1.0,
            mesh: None,
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn is_hotspot(&self) -> bool {
        matches!(self.kind, NodeKind::Hotspot { .. })
    }

    pub fn is_infospot(&self) -> bool {
        matches!(self.kind, NodeKind::Infospot { .. })
    }

    pub fn hotspot_panorama(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Hotspot { panorama } => Some(panorama),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneDirectory {
    nodes: Vec<SceneNode>,
    index: HashMap<String, NodeId>,
}

impl SceneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later nodes with a duplicate name stay reachable by id only.
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        if self.index.contains_key(&node.name) {
            log::warn!("duplicate scene node name {:?}; keeping the first", node.name);
        } else {
            self.index.insert(node.name.clone(), id);
        }
        self.nodes.push(node);
        id
    }

    pub fn id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn by_name(&self, name: &str) -> Option<&SceneNode> {
        self.id(name).and_then(|id| self.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn traverse_mut(&mut self, mut visit: impl FnMut(NodeId, &mut SceneNode)) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            visit(NodeId(i as u32), node);
        }
    }

    pub fn hotspots(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.iter().filter(|(_, n)| n.is_hotspot())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lowest vertex of the room surfaces, if any were loaded.
    pub fn floor_level(&self) -> Option<f32> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Surface)
            .filter_map(|n| n.mesh.as_ref().and_then(Mesh::min_y))
            .reduce(f32::min)
    }
}
