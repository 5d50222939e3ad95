#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSettings {
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metallic: f32,
    pub emissive: [f32; 3],
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            roughness: 0.5,
            metallic: 0.0,
            emissive: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub settings: MaterialSettings,
    pub double_sided: bool,
}

impl MaterialData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_base_color(mut self, base_color: [f32; 4]) -> Self {
        self.settings.base_color = base_color;
        self
    }
}
