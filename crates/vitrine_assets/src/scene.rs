use vitrine_core::{
    material::MaterialData, mesh::MeshData, scene_graph::SpotLight, transform::Transform,
};

/// Raw loader output: flat node list with index links.
#[derive(Clone, Debug, Default)]
pub struct SceneData {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub nodes: Vec<SceneNode>,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh_index: Option<usize>, // Index into the meshes list above
    pub material_index: Option<usize>,
    /// The light's `target` is expressed in this node's local frame.
    pub light: Option<SpotLight>,
    pub children: Vec<usize>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            mesh_index: None,
            material_index: None,
            light: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh_index: usize) -> Self {
        self.mesh_index = Some(mesh_index);
        self
    }

    pub fn with_material(mut self, material_index: usize) -> Self {
        self.material_index = Some(material_index);
        self
    }

    pub fn with_light(mut self, light: SpotLight) -> Self {
        self.light = Some(light);
        self
    }
}

impl SceneData {
    pub fn add_mesh(&mut self, mesh: MeshData) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: MaterialData) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_node(&mut self, node: SceneNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_child(&mut self, parent: usize, node: SceneNode) -> usize {
        let index = self.add_node(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(index);
        }
        index
    }

    /// Convenience for procedural content: one mesh node with its own
    /// geometry and material.
    pub fn add_mesh_node(
        &mut self,
        parent: Option<usize>,
        name: impl Into<String>,
        mesh: MeshData,
        material: MaterialData,
        transform: Transform,
    ) -> usize {
        let mesh_index = self.add_mesh(mesh);
        let material_index = self.add_material(material);
        let node = SceneNode::new(name)
            .with_transform(transform)
            .with_mesh(mesh_index)
            .with_material(material_index);
        match parent {
            Some(p) => self.add_child(p, node),
            None => self.add_node(node),
        }
    }
}
