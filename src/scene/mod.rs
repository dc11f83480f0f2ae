//! Arena-backed scene graph
//!
//! Nodes live in a slotmap and refer to each other by generational ids, so a
//! handle held past a destroy dereferences to None instead of freed memory.
//! Parent/child links are ownership only (destroying a parent destroys the
//! subtree); positions are world-absolute.

pub mod character;
pub mod trail;

pub use character::{Animation, Character, ChatBubble};
pub use trail::TrailWall;

use slotmap::{new_key_type, SlotMap};

use crate::geom::Vector2;

new_key_type! {
    /// Generational handle to a scene node
    pub struct NodeId;
}

/// Back-to-front draw ordering. HUD draws last and ignores the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DrawLayer {
    Floor,
    Ground,
    Base,
    Hud,
}

/// Transient visual spawned for deaths and wall breaks
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub kind: EffectKind,
    pub started_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    Explosion,
    WallBreak,
}

/// Node payloads the simulation knows how to step and draw
#[derive(Debug)]
pub enum NodeKind {
    Character(Character),
    TrailWall(TrailWall),
    Effect(Effect),
}

#[derive(Debug)]
pub struct Node {
    pub position: Vector2,
    pub layer: DrawLayer,
    pub solid: bool,
    /// Eligible for distance culling during draw
    pub omittable: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Insertion order, stable within a draw layer
    pub seq: u64,
    pub kind: NodeKind,
}

impl Node {
    pub fn character(position: Vector2, character: Character) -> Self {
        Self::bare(position, DrawLayer::Base, NodeKind::Character(character))
    }

    pub fn trail_wall(cell: Vector2, wall: TrailWall) -> Self {
        let mut node = Self::bare(cell, DrawLayer::Ground, NodeKind::TrailWall(wall));
        node.solid = true;
        node.omittable = true;
        node
    }

    pub fn effect(position: Vector2, layer: DrawLayer, effect: Effect) -> Self {
        Self::bare(position, layer, NodeKind::Effect(effect))
    }

    fn bare(position: Vector2, layer: DrawLayer, kind: NodeKind) -> Self {
        Self {
            position,
            layer,
            solid: false,
            omittable: false,
            parent: None,
            children: Vec::new(),
            seq: 0,
            kind,
        }
    }

    pub fn as_character(&self) -> Option<&Character> {
        match &self.kind {
            NodeKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut Character> {
        match &mut self.kind {
            NodeKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_trail_wall(&self) -> Option<&TrailWall> {
        match &self.kind {
            NodeKind::TrailWall(wall) => Some(wall),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct Scene {
    nodes: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    next_seq: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node at the root level
    pub fn spawn(&mut self, mut node: Node) -> NodeId {
        self.next_seq += 1;
        node.seq = self.next_seq;
        node.parent = None;
        let id = self.nodes.insert(node);
        self.roots.push(id);
        id
    }

    /// Make `child` a child of `parent`, detaching it from wherever it
    /// currently hangs. Parent pointer and child membership always agree.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child || !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return false;
        }
        self.unlink(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        true
    }

    /// Move a node back to the root level
    pub fn detach(&mut self, id: NodeId) {
        if !self.nodes.contains_key(id) {
            return;
        }
        self.unlink(id);
        self.roots.push(id);
    }

    /// Destroy a node and its whole subtree, depth-first. Idempotent: a
    /// stale id removes nothing. Returns the removed payloads so the caller
    /// can cancel their timers and index entries.
    pub fn destroy(&mut self, id: NodeId) -> Vec<Node> {
        if !self.nodes.contains_key(id) {
            return Vec::new();
        }
        self.unlink(id);

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                stack.extend(node.children.iter().copied());
                removed.push(node);
            }
        }
        removed
    }

    /// Drain every node. Used on level teardown.
    pub fn clear(&mut self) -> Vec<Node> {
        self.roots.clear();
        self.next_seq = 0;
        let mut removed = Vec::with_capacity(self.nodes.len());
        let ids: Vec<NodeId> = self.nodes.keys().collect();
        for id in ids {
            if let Some(node) = self.nodes.remove(id) {
                removed.push(node);
            }
        }
        removed
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn character(&self, id: NodeId) -> Option<&Character> {
        self.get(id).and_then(Node::as_character)
    }

    pub fn character_mut(&mut self, id: NodeId) -> Option<&mut Character> {
        self.get_mut(id).and_then(Node::as_character_mut)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// All node ids sorted back-to-front: by layer, then insertion order
    pub fn draw_order(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().collect();
        ids.sort_by_key(|id| {
            let node = &self.nodes[*id];
            (node.layer, node.seq)
        });
        ids
    }

    /// Ids of every character node
    pub fn character_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Character(_)))
            .map(|(id, _)| id)
            .collect()
    }

    fn unlink(&mut self, id: NodeId) {
        match self.nodes.get(id).and_then(|node| node.parent) {
            Some(parent) => {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.retain(|&child| child != id);
                }
            }
            None => self.roots.retain(|&root| root != id),
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = None;
        }
    }
}
