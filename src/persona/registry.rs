//! Bundled personality template used to provision `default` from scratch.

/// Built-in profile files compiled into the binary.
pub struct TemplateRegistry;

impl TemplateRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Get the bundled content for a profile file, if the template has one.
    pub fn get_bundled_file(&self, file_name: &str) -> Option<&'static str> {
        match file_name {
            "SOUL.md" => Some(include_str!("../../templates/default/SOUL.md")),
            "IDENTITY.md" => Some(include_str!("../../templates/default/IDENTITY.md")),
            _ => None,
        }
    }

    /// The bundled files among `wanted`, in order.
    pub fn files_for<'a>(&self, wanted: &'a [String]) -> Vec<(&'a str, &'static str)> {
        wanted
            .iter()
            .filter_map(|f| self.get_bundled_file(f).map(|content| (f.as_str(), content)))
            .collect()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
