//! Scene graph and hierarchical scene organization.
//!
//! The graph has a single implicit root. Content is inserted at the top level
//! and addressed by [`NodeId`]; each node may carry children of its own. Every
//! node exposes the same small capability set ([`SceneNode`]): a transform the
//! caller can mutate, its children, what to render, and a way to release the
//! GPU resources backing it. The concrete node kinds are tagged by [`NodeKind`].

use std::fmt::Debug;

use cgmath::{InnerSpace, Vector3};

use crate::{
    data_structures::{
        instance::{Instance, NodeTransform},
        model::{GeometryData, Material, Mesh},
    },
    error::{Result, SceneError},
    render::{Drawn, LightKind, Lit, Render},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Mesh,
    Light,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Mesh => "mesh",
            NodeKind::Light => "light",
        }
    }
}

pub trait SceneNode {
    fn kind(&self) -> NodeKind;

    fn transform(&self) -> &NodeTransform;

    fn transform_mut(&mut self) -> &mut NodeTransform;

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>>;

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>>;

    /// Free the GPU resources backing this node (not its children).
    ///
    /// Called exactly once per node by the scene manager during disposal.
    fn release_resources(&mut self) -> Result<()>;

    fn get_render(&self) -> Render<'_> {
        Render::None
    }

    fn name(&self) -> &str {
        self.kind().label()
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.get_children_mut().push(child);
    }

    fn apply_transform(&mut self, mutation: &mut dyn FnMut(&mut Instance)) {
        mutation(&mut self.transform_mut().local);
    }

    fn get_local_transform(&self) -> Instance {
        self.transform().local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.transform_mut().local = instance;
    }

    fn get_world_transform(&self) -> Instance {
        self.transform().world
    }

    fn update_world_transforms(&mut self, parent: &Instance) {
        let world = parent * &self.transform().local;
        self.transform_mut().world = world;
        for child in self.get_children_mut().iter_mut() {
            child.update_world_transforms(&world);
        }
    }
}

/// Outcome of releasing a (sub)graph. Failures don't stop the remaining nodes
/// from being released.
#[derive(Debug, Default, PartialEq)]
pub struct DisposeReport {
    pub released: usize,
    pub failures: Vec<SceneError>,
}

impl DisposeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Releases children first, then the node itself.
fn release_subtree(mut node: Box<dyn SceneNode>, report: &mut DisposeReport) {
    let children = std::mem::take(node.get_children_mut());
    for child in children {
        release_subtree(child, report);
    }
    match node.release_resources() {
        Ok(()) => report.released += 1,
        Err(e) => {
            log::error!("could not release {}: {}", node.name(), e);
            report.failures.push(e);
        }
    }
}

fn visit(node: &dyn SceneNode, f: &mut dyn FnMut(&dyn SceneNode)) {
    f(node);
    for child in node.get_children() {
        visit(child.as_ref(), f);
    }
}

fn collect_renders<'a>(node: &'a dyn SceneNode, out: &mut Vec<Render<'a>>) {
    out.push(node.get_render());
    for child in node.get_children() {
        collect_renders(child.as_ref(), out);
    }
}

#[derive(Default)]
pub struct SceneGraph {
    next_id: u64,
    nodes: Vec<(NodeId, Box<dyn SceneNode>)>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Box<dyn SceneNode>) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.push((id, node));
        id
    }

    pub fn remove(&mut self, id: NodeId) -> Option<Box<dyn SceneNode>> {
        let idx = self.nodes.iter().position(|(node_id, _)| *node_id == id)?;
        Some(self.nodes.remove(idx).1)
    }

    pub fn get(&self, id: NodeId) -> Option<&(dyn SceneNode + 'static)> {
        self.nodes
            .iter()
            .find(|(node_id, _)| *node_id == id)
            .map(|(_, node)| node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut (dyn SceneNode + 'static)> {
        self.nodes
            .iter_mut()
            .find(|(node_id, _)| *node_id == id)
            .map(|(_, node)| node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|(node_id, _)| *node_id == id)
    }

    /// Top-level ids in insertion order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|(id, _)| *id).collect()
    }

    /// Number of top-level nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk over every node, children after their parent.
    pub fn traverse(&self, f: &mut dyn FnMut(&dyn SceneNode)) {
        for (_, node) in &self.nodes {
            visit(node.as_ref(), f);
        }
    }

    /// Number of nodes in the whole tree.
    pub fn count_nodes(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |_| count += 1);
        count
    }

    pub fn update_world_transforms(&mut self) {
        let root = Instance::default();
        for (_, node) in self.nodes.iter_mut() {
            node.update_world_transforms(&root);
        }
    }

    pub fn renders(&self) -> Vec<Render<'_>> {
        let mut out = Vec::new();
        for (_, node) in &self.nodes {
            collect_renders(node.as_ref(), &mut out);
        }
        out
    }

    /// Detach every node and release its resources. The graph is empty afterwards.
    pub fn release_all(&mut self) -> DisposeReport {
        let mut report = DisposeReport::default();
        for (_, node) in self.nodes.drain(..) {
            release_subtree(node, &mut report);
        }
        report
    }
}

impl Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.nodes.iter().map(|(id, node)| (id, node.kind())))
            .finish()
    }
}

/// A group without visual representation of its own.
pub struct ContainerNode {
    name: String,
    transform: NodeTransform,
    children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: NodeTransform::default(),
            children: Vec::new(),
        }
    }

    pub fn at(mut self, instance: Instance) -> Self {
        self.transform = NodeTransform::new(instance);
        self
    }
}

impl SceneNode for ContainerNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Group
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut NodeTransform {
        &mut self.transform
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn release_resources(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Ambient, hemisphere or directional light. Lights hold no GPU resources of their own,
/// the renderer folds them into its light uniform each frame.
pub struct LightNode {
    name: String,
    pub light: LightKind,
    pub colour: [f32; 3],
    pub intensity: f32,
    transform: NodeTransform,
    children: Vec<Box<dyn SceneNode>>,
}

impl LightNode {
    pub fn ambient(colour: [f32; 3], intensity: f32) -> Self {
        Self {
            name: "ambient light".to_string(),
            light: LightKind::Ambient,
            colour,
            intensity,
            transform: NodeTransform::default(),
            children: Vec::new(),
        }
    }

    /// Sky-to-ground gradient light; `colour` is the sky colour.
    pub fn hemisphere(sky: [f32; 3], ground: [f32; 3], intensity: f32) -> Self {
        Self {
            name: "hemisphere light".to_string(),
            light: LightKind::Hemisphere { ground },
            colour: sky,
            intensity,
            transform: NodeTransform::default(),
            children: Vec::new(),
        }
    }

    /// A directional light shining from `position` towards the origin.
    pub fn directional(colour: [f32; 3], intensity: f32, position: Vector3<f32>) -> Self {
        Self {
            name: "directional light".to_string(),
            light: LightKind::Directional,
            colour,
            intensity,
            transform: NodeTransform::new(position.into()),
            children: Vec::new(),
        }
    }

    fn direction(&self) -> Vector3<f32> {
        let from = self.transform.world.position;
        if from.magnitude2() <= f32::EPSILON {
            return -Vector3::unit_y();
        }
        (-from).normalize()
    }
}

impl SceneNode for LightNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Light
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut NodeTransform {
        &mut self.transform
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    fn release_resources(&mut self) -> Result<()> {
        Ok(())
    }

    fn get_render(&self) -> Render<'_> {
        Render::Light(Lit {
            kind: self.light,
            colour: self.colour,
            intensity: self.intensity,
            direction: self.direction(),
        })
    }
}

/// Geometry drawn with a flat colour material.
pub struct MeshNode {
    name: String,
    mesh: Mesh,
    material: Material,
    transform: NodeTransform,
    children: Vec<Box<dyn SceneNode>>,
}

impl MeshNode {
    pub fn new(
        device: &wgpu::Device,
        name: &str,
        geometry: &GeometryData,
        colour: [f32; 4],
    ) -> Self {
        Self {
            name: name.to_string(),
            mesh: Mesh::new(device, name, geometry),
            material: Material::new(device, colour),
            transform: NodeTransform::default(),
            children: Vec::new(),
        }
    }

    pub fn at(mut self, instance: Instance) -> Self {
        self.transform = NodeTransform::new(instance);
        self
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }
}

impl SceneNode for MeshNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Mesh
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    fn transform_mut(&mut self) -> &mut NodeTransform {
        &mut self.transform
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }

    /// Both geometry and material are released even if one of them fails.
    fn release_resources(&mut self) -> Result<()> {
        let geometry = self.mesh.release();
        let material = self.material.release();
        geometry.and(material).map_err(|e| match e {
            SceneError::ResourceRelease { reason, .. } => SceneError::ResourceRelease {
                node: self.name.clone(),
                reason,
            },
            other => other,
        })
    }

    fn get_render(&self) -> Render<'_> {
        if self.mesh.is_released() {
            log::warn!("{} was released but is still in the scene", self.name);
            return Render::None;
        }
        Render::Mesh(Drawn {
            mesh: &self.mesh,
            material: &self.material,
            world: self.transform.world,
        })
    }
}
