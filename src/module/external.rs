//! Modules kept outside the bundle

use indexmap::IndexMap;

use crate::identifier::make_legal_identifier;
use crate::symbol::DeclId;

#[derive(Debug, Clone)]
pub struct ExternalModule {
    pub id: String,
    /// Binding name of the module object in the output
    pub name: String,
    /// Imported names (`default`, `*` or a named export) to declarations
    pub declarations: IndexMap<String, DeclId>,
    /// Some named export other than `default` is imported.
    pub exports_names: bool,
    name_suggestions: IndexMap<String, usize>,
    most_common_suggestion: usize,
}

impl ExternalModule {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: make_legal_identifier(&id),
            id,
            declarations: IndexMap::new(),
            exports_names: false,
            name_suggestions: IndexMap::new(),
            most_common_suggestion: 0,
        }
    }

    /// Importers' local names for the default or namespace import; the most
    /// common one becomes the module name, first one wins ties.
    pub fn suggest_name(&mut self, name: &str) {
        let count = self.name_suggestions.entry(name.to_string()).or_insert(0);
        *count += 1;
        if *count > self.most_common_suggestion {
            self.most_common_suggestion = *count;
            self.name = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_suggestions() {
        let mut module = ExternalModule::new("lodash-es");
        assert_eq!(module.name, "lodashEs");

        module.suggest_name("_");
        module.suggest_name("lodash");
        assert_eq!(module.name, "_");
        module.suggest_name("lodash");
        assert_eq!(module.name, "lodash");
    }
}
