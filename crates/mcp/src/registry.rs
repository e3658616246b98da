#![forbid(unsafe_code)]

use crate::ServerContext;
use crate::envelope::ToolError;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use wb_core::contract::ContractError;
use wb_core::{FieldSpec, ToolContract};

pub(crate) type ToolHandler =
    fn(&ServerContext, &Map<String, Value>) -> Result<Value, ToolError>;

/// One callable capability: unique name, catalog description, argument
/// contract, handler. Created when the capability modules are assembled at
/// startup and never removed or hot-swapped.
#[derive(Debug)]
pub(crate) struct ToolSpec {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) contract: ToolContract,
    pub(crate) handler: ToolHandler,
}

impl ToolSpec {
    pub(crate) fn new(
        name: &'static str,
        description: &'static str,
        fields: Vec<FieldSpec>,
        handler: ToolHandler,
    ) -> Result<Self, RegistryError> {
        let contract = ToolContract::new(fields)
            .map_err(|err| RegistryError::BadContract { tool: name, err })?;
        Ok(Self {
            name,
            description,
            contract,
            handler,
        })
    }
}

#[derive(Debug)]
pub(crate) enum RegistryError {
    DuplicateTool(&'static str),
    BadContract { tool: &'static str, err: ContractError },
}

impl RegistryError {
    pub(crate) fn message(&self) -> String {
        match self {
            Self::DuplicateTool(name) => format!("duplicate tool name: {name}"),
            Self::BadContract { tool, err } => {
                format!("invalid contract for {tool}: {}", err.message())
            }
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for RegistryError {}

/// Write-once at startup, read-only afterwards; shared across transport
/// threads without synchronization. A duplicate name is a build-time
/// misconfiguration and aborts startup, never a runtime condition.
#[derive(Debug)]
pub(crate) struct ToolRegistry {
    specs: Vec<ToolSpec>,
    by_name: BTreeMap<&'static str, usize>,
}

impl ToolRegistry {
    pub(crate) fn build(specs: Vec<ToolSpec>) -> Result<Self, RegistryError> {
        let mut by_name = BTreeMap::new();
        for (idx, spec) in specs.iter().enumerate() {
            if by_name.insert(spec.name, idx).is_some() {
                return Err(RegistryError::DuplicateTool(spec.name));
            }
        }
        Ok(Self { specs, by_name })
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<&ToolSpec> {
        self.by_name.get(name).and_then(|idx| self.specs.get(*idx))
    }

    /// Catalog in registration order, for `tools/list`.
    pub(crate) fn definitions(&self) -> Vec<Value> {
        self.specs
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "description": spec.description,
                    "inputSchema": spec.contract.input_schema()
                })
            })
            .collect()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|spec| spec.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wb_core::FieldKind;

    fn noop(_ctx: &ServerContext, _args: &Map<String, Value>) -> Result<Value, ToolError> {
        Ok(json!({}))
    }

    fn spec(name: &'static str) -> ToolSpec {
        ToolSpec::new(name, "test tool", Vec::new(), noop).expect("spec")
    }

    #[test]
    fn duplicate_names_abort_registry_construction() {
        let err = ToolRegistry::build(vec![spec("echo"), spec("echo")]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateTool("echo")));
    }

    #[test]
    fn lookup_is_by_exact_name() {
        let registry = ToolRegistry::build(vec![spec("echo"), spec("add")]).expect("registry");
        assert!(registry.lookup("echo").is_some());
        assert!(registry.lookup("Echo").is_none());
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn definitions_preserve_registration_order() {
        let registry = ToolRegistry::build(vec![spec("b"), spec("a")]).expect("registry");
        let names = registry
            .definitions()
            .iter()
            .filter_map(|tool| tool.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn bad_contract_is_a_build_error() {
        let err = ToolSpec::new(
            "broken",
            "duplicate field",
            vec![
                FieldSpec::required("x", FieldKind::String),
                FieldSpec::required("x", FieldKind::String),
            ],
            noop,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::BadContract { tool: "broken", .. }));
    }
}
