//! The `remap` transform rewrites log fields.
//!
//! Operations run in order on each log:
//!
//! ```json
//! { "kind": "remap", "operations": [
//!     { "op": "set", "field": "message", "value": "[{{level}}] {{message}}" },
//!     { "op": "rename", "from": "msg", "to": "message" },
//!     { "op": "remove", "field": "level" }
//! ] }
//! ```
//!
//! String values of `set` are templates: `{{path}}` is replaced by the field's
//! current value. A missing template field fails the event, or drops it when
//! `drop_on_error` is set. Non-string values are set as constants.

use super::{Transform, TransformError, TransformRegistry};
use crate::config::{ConfigError, TransformConfig};
use crate::event::{DataType, DataTypeSet, Event, LogEvent, Value};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Kind name.
pub const KIND: &str = "remap";

/// One field operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldOp {
    /// Sets a field to a constant or a rendered template.
    Set {
        /// Target field path.
        field: String,
        /// Value or template.
        value: serde_json::Value,
    },
    /// Moves a field. Missing source fields are ignored.
    Rename {
        /// Source field path.
        from: String,
        /// Target field path.
        to: String,
    },
    /// Removes a field.
    Remove {
        /// Field path.
        field: String,
    },
}

/// Options of the `remap` kind.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RemapOptions {
    /// Operations, applied in order.
    #[validate(length(min = 1, message = "remap needs at least one operation"))]
    pub operations: Vec<FieldOp>,

    /// Drop events that fail instead of reporting an error.
    #[serde(default)]
    pub drop_on_error: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A string with `{{path}}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns a message if a placeholder is unclosed or empty.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| format!("unclosed placeholder in template '{source}'"))?;
            let path = after[..end].trim();
            if path.is_empty() {
                return Err(format!("empty placeholder in template '{source}'"));
            }
            segments.push(Segment::Field(path.to_string()));
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Renders the template against a log.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::MissingField`] if a placeholder field is absent.
    pub fn render(&self, log: &LogEvent) -> Result<String, TransformError> {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field(path) => {
                    let value = log.get(path).ok_or_else(|| TransformError::MissingField {
                        field: path.clone(),
                        data_type: DataType::Log,
                    })?;
                    rendered.push_str(&value.to_string_lossy());
                }
            }
        }
        Ok(rendered)
    }
}

#[derive(Debug, Clone)]
enum Operation {
    SetConstant { field: String, value: Value },
    SetTemplate { field: String, template: Template },
    Rename { from: String, to: String },
    Remove { field: String },
}

impl Operation {
    fn compile(op: FieldOp) -> Result<Self, String> {
        Ok(match op {
            FieldOp::Set {
                field,
                value: serde_json::Value::String(source),
            } => Self::SetTemplate {
                field,
                template: Template::parse(&source)?,
            },
            FieldOp::Set { field, value } => Self::SetConstant {
                field,
                value: Value::from_json(value),
            },
            FieldOp::Rename { from, to } => Self::Rename { from, to },
            FieldOp::Remove { field } => Self::Remove { field },
        })
    }

    fn apply(&self, log: &mut LogEvent) -> Result<(), TransformError> {
        match self {
            Self::SetConstant { field, value } => {
                log.insert(field, value.clone());
            }
            Self::SetTemplate { field, template } => {
                let rendered = template.render(log)?;
                log.insert(field, rendered);
            }
            Self::Rename { from, to } => {
                if let Some(value) = log.remove(from) {
                    log.insert(to, value);
                }
            }
            Self::Remove { field } => {
                log.remove(field);
            }
        }
        Ok(())
    }
}

/// Applies field operations to logs.
#[derive(Debug, Clone)]
pub struct Remap {
    operations: Vec<Operation>,
    drop_on_error: bool,
}

impl Remap {
    /// Compiles the operations.
    ///
    /// # Errors
    ///
    /// Returns a message if a template is malformed.
    pub fn new(operations: Vec<FieldOp>, drop_on_error: bool) -> Result<Self, String> {
        let operations = operations
            .into_iter()
            .map(Operation::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            operations,
            drop_on_error,
        })
    }
}

impl Transform for Remap {
    fn input(&self) -> DataTypeSet {
        DataTypeSet::LOG
    }

    fn process(&self, event: Event) -> Result<Vec<Event>, TransformError> {
        let data_type = event.data_type();
        let Event::Log(mut log) = event else {
            return Err(TransformError::UnsupportedDataType {
                kind: KIND.to_string(),
                data_type,
            });
        };

        let result = self
            .operations
            .iter()
            .try_for_each(|operation| operation.apply(&mut log));

        match result {
            Ok(()) => Ok(vec![Event::Log(log)]),
            Err(error) if self.drop_on_error => {
                tracing::debug!(error = %error, "Dropped event failing remap");
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }
}

/// Builds a `remap` step.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOptions`] if the operations are malformed.
pub fn build(
    config: &TransformConfig,
    _registry: &TransformRegistry,
) -> Result<Box<dyn Transform>, ConfigError> {
    let options: RemapOptions = config.parse_options()?;
    let remap = Remap::new(options.operations, options.drop_on_error).map_err(|reason| {
        ConfigError::InvalidOptions {
            kind: config.kind.clone(),
            reason,
        }
    })?;
    Ok(Box::new(remap))
}
