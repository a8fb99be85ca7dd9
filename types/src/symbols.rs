//! Symbol records built from module-browse and module-list replies.
//!
//! These are ephemeral: built per call, never cached.

use serde::Serialize;

/// Coarse classification of a browsed declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Class,
    Data,
    Newtype,
    Function,
}

impl DeclarationKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Data => "data",
            Self::Newtype => "newtype",
            Self::Function => "function",
        }
    }
}

/// One declaration from a `browse -d -o` reply line (`name :: decl`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    name: String,
    kind: DeclarationKind,
    signature: String,
}

impl Declaration {
    #[must_use]
    pub fn new(name: String, kind: DeclarationKind, signature: String) -> Self {
        Self {
            name,
            kind,
            signature,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    /// Declaration text as reported by the tool, e.g. `a -> a`.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Declarations of one module, from a module browse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSymbols {
    name: String,
    declarations: Vec<Declaration>,
}

impl ModuleSymbols {
    #[must_use]
    pub fn new(name: String, declarations: Vec<Declaration>) -> Self {
        Self { name, declarations }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }
}

/// One module in scope, from a `list -d` reply line (`package module`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeModule {
    name: String,
    package: String,
}

impl ScopeModule {
    #[must_use]
    pub fn new(name: String, package: String) -> Self {
        Self { name, package }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_kind_labels() {
        assert_eq!(DeclarationKind::Class.label(), "class");
        assert_eq!(DeclarationKind::Data.label(), "data");
        assert_eq!(DeclarationKind::Newtype.label(), "newtype");
        assert_eq!(DeclarationKind::Function.label(), "function");
    }

    #[test]
    fn module_symbols_accessors() {
        let decl = Declaration::new(
            "fmap".to_string(),
            DeclarationKind::Function,
            "(a -> b) -> f a -> f b".to_string(),
        );
        let module = ModuleSymbols::new("Data.Functor".to_string(), vec![decl.clone()]);
        assert_eq!(module.name(), "Data.Functor");
        assert_eq!(module.declarations(), &[decl]);
    }
}
