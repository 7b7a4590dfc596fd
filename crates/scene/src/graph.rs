use crate::mesh::Mesh;
use crate::normalize::NormalizedModel;
use glam::{Mat4, Vec3};
use modelview_common::{Aabb, LightConfig, Transform};
use std::sync::Arc;

/// A node in the model hierarchy: local transform, ordered children, optional mesh.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: Option<String>,
    pub transform: Transform,
    pub children: Vec<SceneNode>,
    pub mesh: Option<Arc<Mesh>>,
}

impl SceneNode {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Default::default()
        }
    }

    pub fn with_mesh(transform: Transform, mesh: Arc<Mesh>) -> Self {
        Self {
            transform,
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Depth-first walk calling `f` with each node and its world matrix.
    pub fn visit<'a>(&'a self, parent: Mat4, f: &mut impl FnMut(&'a SceneNode, Mat4)) {
        let world = parent * self.transform.to_matrix();
        f(self, world);
        for child in &self.children {
            child.visit(world, f);
        }
    }

    /// World-space bounds of this node's and all descendants' geometry.
    ///
    /// Every vertex is transformed, so the box is tight under rotation.
    pub fn world_bounds(&self, parent: Mat4) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.visit(parent, &mut |node, world| {
            if let Some(mesh) = &node.mesh {
                for p in mesh.positions() {
                    bounds.extend(world.transform_point3(*p));
                }
            }
        });
        bounds
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    /// Number of nodes in this subtree carrying a mesh.
    pub fn mesh_count(&self) -> usize {
        let own = usize::from(self.mesh.is_some());
        own + self.children.iter().map(SceneNode::mesh_count).sum::<usize>()
    }
}

/// Fixed scene lighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient {
        color: [f32; 3],
        intensity: f32,
    },
    /// Shines from `position` towards `target`.
    Directional {
        color: [f32; 3],
        intensity: f32,
        position: Vec3,
        target: Vec3,
    },
}

impl Light {
    /// Unit vector pointing from the lit surface towards the light.
    pub fn direction_to_light(&self) -> Option<Vec3> {
        match self {
            Light::Ambient { .. } => None,
            Light::Directional {
                position, target, ..
            } => Some((*position - *target).normalize_or(Vec3::Y)),
        }
    }
}

/// Errors from scene graph mutations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SceneError {
    #[error("a model is already present in the scene")]
    ModelAlreadyPresent,
}

/// One mesh to draw with its world matrix.
#[derive(Debug, Clone)]
pub struct DrawItem<'a> {
    pub mesh: &'a Arc<Mesh>,
    pub world: Mat4,
}

/// The set of visible objects: the fixed lights and at most one model.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    lights: Vec<Light>,
    model: Option<NormalizedModel>,
}

impl SceneGraph {
    /// Create a graph holding the two fixed lights.
    pub fn with_lights(config: &LightConfig) -> Self {
        let mut graph = Self::default();
        graph.add_light(Light::Ambient {
            color: config.ambient_color,
            intensity: config.ambient_intensity,
        });
        graph.add_light(Light::Directional {
            color: config.directional_color,
            intensity: config.directional_intensity,
            position: config.directional_position,
            target: Vec3::ZERO,
        });
        graph
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// Insert the normalized model. Only one model may ever be present.
    pub fn add_model(&mut self, model: NormalizedModel) -> Result<(), SceneError> {
        if self.model.is_some() {
            return Err(SceneError::ModelAlreadyPresent);
        }
        tracing::debug!(
            nodes = model.root().node_count(),
            meshes = model.root().mesh_count(),
            "model added to scene"
        );
        self.model = Some(model);
        Ok(())
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn model(&self) -> Option<&NormalizedModel> {
        self.model.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Number of top-level objects: lights plus the model root, if any.
    pub fn top_level_count(&self) -> usize {
        self.lights.len() + usize::from(self.model.is_some())
    }

    /// Rotate the model about the vertical axis. No-op without a model.
    pub fn spin_model(&mut self, radians: f32) {
        if let Some(model) = &mut self.model {
            model.spin(radians);
        }
    }

    /// Meshes to draw this frame, with world matrices.
    pub fn draw_list(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        if let Some(model) = &self.model {
            model.root().visit(Mat4::IDENTITY, &mut |node, world| {
                if let Some(mesh) = &node.mesh {
                    items.push(DrawItem { mesh, world });
                }
            });
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cube;
    use crate::normalize::Normalizer;
    use approx::assert_relative_eq;
    use glam::Quat;

    fn cube_node(half: f32, position: Vec3) -> SceneNode {
        SceneNode::with_mesh(Transform::from_translation(position), Arc::new(cube(half, [1.0; 4])))
    }

    #[test]
    fn fresh_graph_has_two_lights_and_no_model() {
        let graph = SceneGraph::with_lights(&LightConfig::default());
        assert_eq!(graph.lights().len(), 2);
        assert!(!graph.has_model());
        assert_eq!(graph.top_level_count(), 2);
        assert!(graph.draw_list().is_empty());
    }

    #[test]
    fn directional_light_points_from_origin_to_light() {
        let graph = SceneGraph::with_lights(&LightConfig::default());
        let dir = graph.lights()[1].direction_to_light().unwrap();
        assert_relative_eq!(dir.x, 1.0 / 3.0_f32.sqrt(), epsilon = 1e-6);
        assert!(graph.lights()[0].direction_to_light().is_none());
    }

    #[test]
    fn world_bounds_include_descendants() {
        let mut root = SceneNode::new(Transform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        root.add_child(cube_node(1.0, Vec3::new(0.0, 2.0, 0.0)));
        root.add_child(cube_node(0.5, Vec3::ZERO));
        let bounds = root.world_bounds(Mat4::IDENTITY);
        assert_eq!(bounds.min, Vec3::new(0.0, -0.5, -1.0));
        assert_eq!(bounds.max, Vec3::new(2.0, 3.0, 1.0));
        assert_eq!(root.node_count(), 3);
        assert_eq!(root.mesh_count(), 2);
    }

    #[test]
    fn world_bounds_follow_rotation() {
        let mut node = cube_node(1.0, Vec3::ZERO);
        node.transform.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let bounds = node.world_bounds(Mat4::IDENTITY);
        assert_relative_eq!(bounds.max.x, 2.0_f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn only_one_model_may_be_added() {
        let normalizer = Normalizer::default();
        let mut graph = SceneGraph::with_lights(&LightConfig::default());
        graph
            .add_model(normalizer.normalize(cube_node(1.0, Vec3::ZERO)).unwrap())
            .unwrap();
        let second = normalizer.normalize(cube_node(1.0, Vec3::ZERO)).unwrap();
        assert_eq!(graph.add_model(second), Err(SceneError::ModelAlreadyPresent));
        assert_eq!(graph.top_level_count(), 3);
        assert_eq!(graph.lights().len(), 2);
    }

    #[test]
    fn spin_without_model_is_noop() {
        let mut graph = SceneGraph::with_lights(&LightConfig::default());
        graph.spin_model(0.01);
        assert!(!graph.has_model());
    }

    #[test]
    fn draw_list_lists_every_mesh() {
        let mut root = SceneNode::new(Transform::default());
        root.add_child(cube_node(1.0, Vec3::X));
        root.add_child(cube_node(1.0, Vec3::NEG_X));
        let mut graph = SceneGraph::with_lights(&LightConfig::default());
        graph
            .add_model(Normalizer::default().normalize(root).unwrap())
            .unwrap();
        assert_eq!(graph.draw_list().len(), 2);
    }
}
