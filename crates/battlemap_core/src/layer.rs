//! Layer tree: groups and paintable layers with roles and effect settings
//!
//! Sibling lists are ordered bottom to top; flattening the tree depth-first
//! yields the paint order. Exactly one `Background` layer (bottommost) and one
//! `Lighting` layer (topmost) exist, both pinned. Every structural edit is
//! applied to a copy and validated before it replaces the live tree.

use crate::error::LayerError;
use crate::tile::PlacedTile;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Semantic tag constraining a layer's position and behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    #[default]
    Normal,
    Background,
    Grid,
    Tokens,
    Fog,
    Lighting,
}

impl LayerRole {
    /// Whether tiles may be painted onto a layer with this role
    pub fn is_paintable(self) -> bool {
        !matches!(self, LayerRole::Grid | LayerRole::Tokens | LayerRole::Fog)
    }

    /// Pinned roles keep their extreme position and cannot be removed
    pub fn is_pinned(self) -> bool {
        matches!(self, LayerRole::Background | LayerRole::Lighting)
    }

    /// Roles drawn as special overlays instead of tile layers
    pub fn is_overlay(self) -> bool {
        matches!(self, LayerRole::Grid | LayerRole::Tokens | LayerRole::Fog)
    }

    pub fn key(self) -> &'static str {
        match self {
            LayerRole::Normal => "normal",
            LayerRole::Background => "background",
            LayerRole::Grid => "grid",
            LayerRole::Tokens => "tokens",
            LayerRole::Fog => "fog",
            LayerRole::Lighting => "lighting",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "normal" => Some(LayerRole::Normal),
            "background" => Some(LayerRole::Background),
            "grid" => Some(LayerRole::Grid),
            "tokens" => Some(LayerRole::Tokens),
            "fog" => Some(LayerRole::Fog),
            "lighting" => Some(LayerRole::Lighting),
            _ => None,
        }
    }
}

/// Solid color multiplied over a layer's tiles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub color: [u8; 3],
    pub alpha: f32,
}

impl Default for Tint {
    fn default() -> Self {
        Self {
            color: [255, 255, 255],
            alpha: 0.0,
        }
    }
}

/// Per-layer effect configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerEffects {
    pub tint: Tint,
    /// Use the procedural shading texture instead of the solid tint color
    pub shade: bool,
    pub has_outline: bool,
    /// Outline width in screen pixels at zoom 1
    pub outline_width: f32,
    pub has_shadow: bool,
    /// Maximum shadow falloff in cells
    pub shadow_distance: f32,
    /// Light radius in cells (lighting layer)
    pub light_radius: f32,
    pub light_intensity: f32,
}

impl Default for LayerEffects {
    fn default() -> Self {
        Self {
            tint: Tint::default(),
            shade: false,
            has_outline: false,
            outline_width: 2.0,
            has_shadow: false,
            shadow_distance: 0.5,
            light_radius: 6.0,
            light_intensity: 1.0,
        }
    }
}

impl LayerEffects {
    pub fn has_tint(&self) -> bool {
        self.shade || self.tint.alpha > 0.0
    }
}

/// Shadow and shade opacity, kept beside the layer tree keyed by layer id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOpacity {
    pub shadow: f32,
    pub shade: f32,
}

impl Default for EffectOpacity {
    fn default() -> Self {
        Self {
            shadow: 0.6,
            shade: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerProps {
    #[serde(default)]
    pub role: LayerRole,
    #[serde(default)]
    pub effects: LayerEffects,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProps {
    #[serde(default)]
    pub child_ids: Vec<Uuid>,
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LayerKind {
    Layer(LayerProps),
    Group(GroupProps),
}

/// A node in the layer tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerNode {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: LayerKind,
}

fn default_true() -> bool {
    true
}

impl LayerNode {
    pub fn new_layer(name: impl Into<String>, role: LayerRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            parent_id: None,
            kind: LayerKind::Layer(LayerProps {
                role,
                effects: LayerEffects::default(),
            }),
        }
    }

    pub fn new_group(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            locked: false,
            parent_id: None,
            kind: LayerKind::Group(GroupProps {
                child_ids: Vec::new(),
                expanded: true,
            }),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, LayerKind::Group(_))
    }

    /// Role of a layer; groups have none
    pub fn role(&self) -> Option<LayerRole> {
        match &self.kind {
            LayerKind::Layer(props) => Some(props.role),
            LayerKind::Group(_) => None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.role().is_some_and(LayerRole::is_pinned)
    }

    pub fn effects(&self) -> Option<&LayerEffects> {
        match &self.kind {
            LayerKind::Layer(props) => Some(&props.effects),
            LayerKind::Group(_) => None,
        }
    }

    pub fn child_ids(&self) -> &[Uuid] {
        match &self.kind {
            LayerKind::Group(group) => &group.child_ids,
            LayerKind::Layer(_) => &[],
        }
    }
}

/// Where to put a node when moving or inserting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePlacement {
    /// Sibling directly above the target
    Above(Uuid),
    /// Sibling directly below the target
    Below(Uuid),
    /// Topmost child of the target group
    Inside(Uuid),
}

/// The layer tree for one map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStack {
    nodes: Vec<LayerNode>,
    root_ids: Vec<Uuid>,
    /// Designated floor layer; cleared under new floor placements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    floor_id: Option<Uuid>,
    #[serde(default)]
    effect_opacity: HashMap<Uuid, EffectOpacity>,
    #[serde(skip)]
    solo: Option<Uuid>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new_default()
    }
}

impl LayerStack {
    /// Background, Floor, Props, Grid, Tokens, Fog and Lighting, bottom to top
    pub fn new_default() -> Self {
        let mut background = LayerNode::new_layer("Background", LayerRole::Background);
        background.locked = true;
        let floor = LayerNode::new_layer("Floor", LayerRole::Normal);
        let props = LayerNode::new_layer("Props", LayerRole::Normal);
        let grid = LayerNode::new_layer("Grid", LayerRole::Grid);
        let tokens = LayerNode::new_layer("Tokens", LayerRole::Tokens);
        let mut fog = LayerNode::new_layer("Fog", LayerRole::Fog);
        fog.visible = false;
        let lighting = LayerNode::new_layer("Lighting", LayerRole::Lighting);

        let floor_id = floor.id;
        let nodes = vec![background, floor, props, grid, tokens, fog, lighting];
        let root_ids = nodes.iter().map(|n| n.id).collect();
        Self {
            nodes,
            root_ids,
            floor_id: Some(floor_id),
            effect_opacity: HashMap::new(),
            solo: None,
        }
    }

    /// Build a stack from raw parts and check its invariants
    pub fn from_parts(
        nodes: Vec<LayerNode>,
        root_ids: Vec<Uuid>,
        floor_id: Option<Uuid>,
    ) -> Result<Self, LayerError> {
        let stack = Self {
            nodes,
            root_ids,
            floor_id,
            effect_opacity: HashMap::new(),
            solo: None,
        };
        stack.validate()?;
        Ok(stack)
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn get(&self, id: Uuid) -> Option<&LayerNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut LayerNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    fn require(&self, id: Uuid) -> Result<&LayerNode, LayerError> {
        self.get(id).ok_or(LayerError::UnknownNode(id))
    }

    pub fn nodes(&self) -> &[LayerNode] {
        &self.nodes
    }

    pub fn root_ids(&self) -> &[Uuid] {
        &self.root_ids
    }

    pub fn floor_id(&self) -> Option<Uuid> {
        self.floor_id
    }

    pub fn set_floor(&mut self, id: Uuid) -> Result<(), LayerError> {
        match self.require(id)?.role() {
            Some(LayerRole::Normal) => {
                self.floor_id = Some(id);
                Ok(())
            }
            _ => Err(LayerError::Invariant(
                "floor must be a normal layer".to_string(),
            )),
        }
    }

    pub fn solo(&self) -> Option<Uuid> {
        self.solo
    }

    /// First layer carrying `role`
    pub fn role_layer(&self, role: LayerRole) -> Option<&LayerNode> {
        self.nodes.iter().find(|n| n.role() == Some(role))
    }

    /// Every node in depth-first order, bottom to top
    pub fn flatten(&self) -> Vec<&LayerNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.flatten_into(&self.root_ids, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, ids: &[Uuid], out: &mut Vec<&'a LayerNode>) {
        for id in ids {
            if let Some(node) = self.get(*id) {
                out.push(node);
                self.flatten_into(node.child_ids(), out);
            }
        }
    }

    /// Concrete layers bottom to top
    pub fn paint_order(&self) -> Vec<&LayerNode> {
        self.flatten().into_iter().filter(|n| !n.is_group()).collect()
    }

    /// Index of each concrete layer in paint order
    pub fn paint_index(&self) -> HashMap<Uuid, usize> {
        self.paint_order()
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect()
    }

    fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.get(parent).and_then(|n| n.parent_id);
        }
        out
    }

    /// Whether `id` is `ancestor` or lies under it
    pub fn is_within(&self, id: Uuid, ancestor: Uuid) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Ids of `id` and all its descendants
    pub fn subtree_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        if let Some(node) = self.get(id) {
            let mut flat = Vec::new();
            self.flatten_into(std::slice::from_ref(&node.id), &mut flat);
            out.extend(flat.iter().map(|n| n.id));
        }
        out
    }

    /// Visibility after ancestors and solo are taken into account
    pub fn is_visible(&self, id: Uuid) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        let ancestors = self.ancestors(id);
        match self.solo {
            Some(solo) => {
                if id == solo {
                    return true;
                }
                let Some(pos) = ancestors.iter().position(|a| *a == solo) else {
                    return false;
                };
                node.visible
                    && ancestors[..pos]
                        .iter()
                        .all(|a| self.get(*a).is_some_and(|n| n.visible))
            }
            None => {
                node.visible && ancestors.iter().all(|a| self.get(*a).is_some_and(|n| n.visible))
            }
        }
    }

    /// Locked if the node or any ancestor is locked
    pub fn is_locked(&self, id: Uuid) -> bool {
        self.get(id).is_some_and(|n| n.locked)
            || self
                .ancestors(id)
                .iter()
                .any(|a| self.get(*a).is_some_and(|n| n.locked))
    }

    pub fn effects(&self, id: Uuid) -> Option<&LayerEffects> {
        self.get(id).and_then(LayerNode::effects)
    }

    pub fn effects_mut(&mut self, id: Uuid) -> Option<&mut LayerEffects> {
        match &mut self.get_mut(id)?.kind {
            LayerKind::Layer(props) => Some(&mut props.effects),
            LayerKind::Group(_) => None,
        }
    }

    pub fn opacity(&self, id: Uuid) -> EffectOpacity {
        self.effect_opacity.get(&id).copied().unwrap_or_default()
    }

    pub fn set_opacity(&mut self, id: Uuid, opacity: EffectOpacity) {
        self.effect_opacity.insert(id, opacity);
    }

    /// Concrete layer a tile belongs to: `layer_id` when it names a layer,
    /// else the legacy role key (`"floor"` maps to the floor layer, other
    /// keys match a role or a layer name)
    pub fn resolve_tile_layer(&self, tile: &PlacedTile) -> Option<Uuid> {
        if let Some(id) = tile.layer_id {
            if self.get(id).is_some_and(|n| !n.is_group()) {
                return Some(id);
            }
        }
        let key = tile.layer.as_deref()?;
        if key.eq_ignore_ascii_case("floor") {
            if let Some(floor) = self.floor_id {
                return Some(floor);
            }
        }
        if let Some(role) = LayerRole::from_key(key) {
            if role != LayerRole::Normal {
                return self.role_layer(role).map(|n| n.id);
            }
        }
        self.paint_order()
            .into_iter()
            .find(|n| n.name.eq_ignore_ascii_case(key))
            .map(|n| n.id)
    }

    // ─── Invariants ──────────────────────────────────────────────────────────

    /// Check tree consistency and the background/lighting role invariants
    pub fn validate(&self) -> Result<(), LayerError> {
        let mut seen = HashSet::new();
        self.validate_siblings(&self.root_ids, None, &mut seen)?;
        if seen.len() != self.nodes.len() {
            return Err(LayerError::Invariant(
                "layer tree has unreachable nodes".to_string(),
            ));
        }

        let count = |role| self.nodes.iter().filter(|n| n.role() == Some(role)).count();
        if count(LayerRole::Background) != 1 {
            return Err(LayerError::Invariant(
                "exactly one background layer is required".to_string(),
            ));
        }
        if count(LayerRole::Lighting) != 1 {
            return Err(LayerError::Invariant(
                "exactly one lighting layer is required".to_string(),
            ));
        }

        let order = self.paint_order();
        if order.first().and_then(|n| n.role()) != Some(LayerRole::Background) {
            return Err(LayerError::Invariant(
                "background must be the bottommost layer".to_string(),
            ));
        }
        if order.last().and_then(|n| n.role()) != Some(LayerRole::Lighting) {
            return Err(LayerError::Invariant(
                "lighting must be the topmost layer".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_siblings(
        &self,
        ids: &[Uuid],
        parent: Option<Uuid>,
        seen: &mut HashSet<Uuid>,
    ) -> Result<(), LayerError> {
        for id in ids {
            let node = self.require(*id)?;
            if !seen.insert(*id) {
                return Err(LayerError::Invariant(format!(
                    "node {} appears twice in the tree",
                    id
                )));
            }
            if node.parent_id != parent {
                return Err(LayerError::Invariant(format!(
                    "node {} has a stale parent reference",
                    id
                )));
            }
            self.validate_siblings(node.child_ids(), Some(*id), seen)?;
        }
        Ok(())
    }

    /// Apply `edit` to a copy; keep it only if the result validates
    fn transact<T>(
        &mut self,
        edit: impl FnOnce(&mut LayerStack) -> Result<T, LayerError>,
    ) -> Result<T, LayerError> {
        let mut draft = self.clone();
        let value = edit(&mut draft)?;
        draft.validate()?;
        *self = draft;
        Ok(value)
    }

    // ─── Structural helpers ──────────────────────────────────────────────────

    fn siblings_mut(&mut self, parent: Option<Uuid>) -> Option<&mut Vec<Uuid>> {
        match parent {
            None => Some(&mut self.root_ids),
            Some(pid) => match &mut self.get_mut(pid)?.kind {
                LayerKind::Group(group) => Some(&mut group.child_ids),
                LayerKind::Layer(_) => None,
            },
        }
    }

    fn detach(&mut self, id: Uuid) -> Result<(), LayerError> {
        let parent = self.require(id)?.parent_id;
        if let Some(siblings) = self.siblings_mut(parent) {
            siblings.retain(|s| *s != id);
        }
        if let Some(node) = self.get_mut(id) {
            node.parent_id = None;
        }
        Ok(())
    }

    fn attach(&mut self, id: Uuid, placement: NodePlacement) -> Result<(), LayerError> {
        let (parent, index) = match placement {
            NodePlacement::Above(target) | NodePlacement::Below(target) => {
                let parent = self.require(target)?.parent_id;
                let siblings = self
                    .siblings_mut(parent)
                    .ok_or(LayerError::UnknownNode(target))?;
                let pos = siblings
                    .iter()
                    .position(|s| *s == target)
                    .ok_or(LayerError::UnknownNode(target))?;
                let index = if matches!(placement, NodePlacement::Above(_)) {
                    pos + 1
                } else {
                    pos
                };
                (parent, index)
            }
            NodePlacement::Inside(group) => {
                if !self.require(group)?.is_group() {
                    return Err(LayerError::NotAGroup(group));
                }
                let len = self.require(group)?.child_ids().len();
                (Some(group), len)
            }
        };
        let siblings = self
            .siblings_mut(parent)
            .ok_or(LayerError::Invariant("missing parent".to_string()))?;
        siblings.insert(index, id);
        if let Some(node) = self.get_mut(id) {
            node.parent_id = parent;
        }
        Ok(())
    }

    fn reject_pinned(&self, id: Uuid) -> Result<(), LayerError> {
        for sub in self.subtree_ids(id) {
            if let Some(node) = self.get(sub) {
                if node.is_pinned() {
                    return Err(LayerError::Pinned(node.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Root-level slot below the first overlay/lighting root
    fn default_insert_placement(&self) -> Option<NodePlacement> {
        let first_special = self.root_ids.iter().find(|id| {
            self.get(**id)
                .and_then(|n| n.role())
                .is_some_and(|r| r.is_overlay() || r == LayerRole::Lighting)
        })?;
        Some(NodePlacement::Below(*first_special))
    }

    // ─── Edits ───────────────────────────────────────────────────────────────

    /// Add a normal layer; defaults to just below the overlay layers
    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        placement: Option<NodePlacement>,
    ) -> Result<Uuid, LayerError> {
        let node = LayerNode::new_layer(name, LayerRole::Normal);
        let id = node.id;
        let placement = placement.or_else(|| self.default_insert_placement());
        self.transact(move |stack| {
            stack.nodes.push(node);
            match placement {
                Some(p) => stack.attach(id, p)?,
                None => stack.root_ids.push(id),
            }
            Ok(id)
        })
    }

    pub fn rename(&mut self, id: Uuid, name: impl Into<String>) -> Result<(), LayerError> {
        let node = self.get_mut(id).ok_or(LayerError::UnknownNode(id))?;
        node.name = name.into();
        Ok(())
    }

    pub fn set_visible(&mut self, id: Uuid, visible: bool) -> Result<(), LayerError> {
        self.get_mut(id).ok_or(LayerError::UnknownNode(id))?.visible = visible;
        Ok(())
    }

    pub fn toggle_visible(&mut self, id: Uuid) -> Result<bool, LayerError> {
        let node = self.get_mut(id).ok_or(LayerError::UnknownNode(id))?;
        node.visible = !node.visible;
        Ok(node.visible)
    }

    pub fn toggle_locked(&mut self, id: Uuid) -> Result<bool, LayerError> {
        let node = self.get_mut(id).ok_or(LayerError::UnknownNode(id))?;
        node.locked = !node.locked;
        Ok(node.locked)
    }

    pub fn set_expanded(&mut self, id: Uuid, expanded: bool) -> Result<(), LayerError> {
        match &mut self.get_mut(id).ok_or(LayerError::UnknownNode(id))?.kind {
            LayerKind::Group(group) => {
                group.expanded = expanded;
                Ok(())
            }
            LayerKind::Layer(_) => Err(LayerError::NotAGroup(id)),
        }
    }

    /// Render only `id` and its descendants; `None` ends solo mode
    pub fn set_solo(&mut self, id: Option<Uuid>) -> Result<(), LayerError> {
        if let Some(id) = id {
            self.require(id)?;
        }
        self.solo = id;
        Ok(())
    }

    /// Move a node next to or inside another. Moves that would break the
    /// background/lighting ordering are rejected.
    pub fn move_node(&mut self, id: Uuid, placement: NodePlacement) -> Result<(), LayerError> {
        self.reject_pinned(id)?;
        let target = match placement {
            NodePlacement::Above(t) | NodePlacement::Below(t) | NodePlacement::Inside(t) => t,
        };
        if target == id || self.is_within(target, id) {
            return Err(LayerError::Cycle);
        }
        self.transact(|stack| {
            stack.detach(id)?;
            stack.attach(id, placement)
        })
    }

    /// Deep-copy a node (and its subtree) directly above the original
    pub fn duplicate(&mut self, id: Uuid) -> Result<Uuid, LayerError> {
        self.reject_pinned(id)?;
        self.transact(|stack| {
            let mut remap = HashMap::new();
            for old in stack.subtree_ids(id) {
                remap.insert(old, Uuid::new_v4());
            }
            let copies: Vec<LayerNode> = stack
                .subtree_ids(id)
                .iter()
                .filter_map(|old| stack.get(*old))
                .map(|node| {
                    let mut copy = node.clone();
                    copy.id = remap[&node.id];
                    copy.parent_id = node.parent_id.and_then(|p| remap.get(&p).copied());
                    if let LayerKind::Group(group) = &mut copy.kind {
                        group.child_ids = group.child_ids.iter().map(|c| remap[c]).collect();
                    }
                    copy
                })
                .collect();
            for (old, new) in &remap {
                if let Some(opacity) = stack.effect_opacity.get(old).copied() {
                    stack.effect_opacity.insert(*new, opacity);
                }
            }
            let new_root = remap[&id];
            if let Some(root) = stack.get(id) {
                let name = format!("{} copy", root.name);
                stack.nodes.extend(copies);
                if let Some(copy) = stack.get_mut(new_root) {
                    copy.name = name;
                    copy.parent_id = None;
                }
            }
            stack.attach(new_root, NodePlacement::Above(id))?;
            Ok(new_root)
        })
    }

    /// Remove a node and its subtree. Returns the removed concrete layer ids.
    pub fn delete(&mut self, id: Uuid) -> Result<Vec<Uuid>, LayerError> {
        self.reject_pinned(id)?;
        self.transact(|stack| {
            let doomed = stack.subtree_ids(id);
            stack.detach(id)?;
            let removed_layers = doomed
                .iter()
                .filter(|d| stack.get(**d).is_some_and(|n| !n.is_group()))
                .copied()
                .collect();
            stack.nodes.retain(|n| !doomed.contains(&n.id));
            for d in &doomed {
                stack.effect_opacity.remove(d);
            }
            if stack.floor_id.is_some_and(|f| doomed.contains(&f)) {
                stack.floor_id = None;
            }
            if stack.solo.is_some_and(|s| doomed.contains(&s)) {
                stack.solo = None;
            }
            Ok(removed_layers)
        })
    }

    /// Wrap the given nodes in a new group placed where the topmost of them
    /// was. Children keep their relative paint order.
    pub fn group_from_selection(
        &mut self,
        ids: &[Uuid],
        name: impl Into<String>,
    ) -> Result<Uuid, LayerError> {
        for id in ids {
            self.require(*id)?;
            self.reject_pinned(*id)?;
        }
        // Drop nodes already covered by another selected ancestor
        let selected: Vec<Uuid> = ids
            .iter()
            .copied()
            .filter(|id| !ids.iter().any(|other| other != id && self.is_within(*id, *other)))
            .collect();
        if selected.is_empty() {
            return Err(LayerError::EmptySelection);
        }
        let flat: Vec<Uuid> = self.flatten().iter().map(|n| n.id).collect();
        let mut ordered = selected;
        ordered.sort_by_key(|id| flat.iter().position(|f| f == id));
        let topmost = *ordered.last().ok_or(LayerError::EmptySelection)?;

        let group = LayerNode::new_group(name);
        let group_id = group.id;
        self.transact(move |stack| {
            stack.nodes.push(group);
            stack.attach(group_id, NodePlacement::Above(topmost))?;
            for id in &ordered {
                stack.detach(*id)?;
                stack.attach(*id, NodePlacement::Inside(group_id))?;
            }
            Ok(group_id)
        })
    }
}
