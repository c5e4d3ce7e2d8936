use std::collections::HashMap;

use jsonschema::{validator_for, Validator};
use serde_json::Value;

use crate::tools::ToolDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("Schema compile error for {tool}: {reason}")]
    SchemaCompile { tool: String, reason: String },
    #[error("Invalid arguments for {tool}: {}", .errors.join("; "))]
    Invalid { tool: String, errors: Vec<String> },
}

/// Validates `tools/call` arguments against each tool's published input
/// schema. Schemas are compiled once, when the validator is built.
pub struct ArgumentValidator {
    validators: HashMap<&'static str, Validator>,
}

impl ArgumentValidator {
    pub fn compile<'a, I>(descriptors: I) -> Result<Self, SchemaValidationError>
    where
        I: IntoIterator<Item = &'a ToolDescriptor>,
    {
        let mut validators = HashMap::new();
        for descriptor in descriptors {
            let validator = validator_for(&descriptor.input_schema).map_err(|e| {
                SchemaValidationError::SchemaCompile {
                    tool: descriptor.name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            validators.insert(descriptor.name, validator);
        }
        Ok(Self { validators })
    }

    /// Check `arguments` for `tool`. Absent arguments are checked as `{}`;
    /// tools without a compiled schema pass.
    pub fn validate(&self, tool: &str, arguments: Option<&Value>) -> Result<(), SchemaValidationError> {
        let Some(validator) = self.validators.get(tool) else {
            return Ok(());
        };

        let empty = Value::Object(Default::default());
        let instance = match arguments {
            None | Some(Value::Null) => &empty,
            Some(v) => v,
        };

        check(tool, validator, instance)
    }
}

fn check(tool: &str, validator: &Validator, instance: &Value) -> Result<(), SchemaValidationError> {
    let errors: Vec<String> = validator.iter_errors(instance).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaValidationError::Invalid {
            tool: tool.to_string(),
            errors,
        })
    }
}

/// Validate a JSON instance against a JSON Schema (draft 2020-12).
pub fn validate_json(schema: &Value, instance: &Value) -> Result<(), SchemaValidationError> {
    let validator = validator_for(schema).map_err(|e| SchemaValidationError::SchemaCompile {
        tool: "<inline>".into(),
        reason: e.to_string(),
    })?;
    check("<inline>", &validator, instance)
}
