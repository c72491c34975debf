//! Field selectors for list operations (`name=kind-kind,product!=minikube`).

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals { field: String, value: String },
    NotEquals { field: String, value: String },
}

/// A conjunction of field equality requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<Requirement>,
}

impl FieldSelector {
    /// Selector that matches everything.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self> {
        let mut requirements = Vec::new();
        for term in selector.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((field, value)) = term.split_once("!=") {
                Requirement::NotEquals {
                    field: field.trim().to_string(),
                    value: value.trim().to_string(),
                }
            } else if let Some((field, value)) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
            {
                Requirement::Equals {
                    field: field.trim().to_string(),
                    value: value.trim().to_string(),
                }
            } else {
                return Err(Error::Validation(format!(
                    "invalid field selector term {term:?}: expected field=value or field!=value"
                )));
            };
            requirements.push(requirement);
        }
        Ok(Self { requirements })
    }

    /// Selector on a single field.
    pub fn field_equals(field: &str, value: &str) -> Self {
        Self {
            requirements: vec![Requirement::Equals {
                field: field.to_string(),
                value: value.to_string(),
            }],
        }
    }

    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate against an object whose fields are resolved by `field`.
    ///
    /// Unknown fields never equal anything.
    pub fn matches<'a>(&self, field: impl Fn(&str) -> Option<&'a str>) -> bool {
        self.requirements.iter().all(|req| match req {
            Requirement::Equals { field: f, value } => field(f) == Some(value.as_str()),
            Requirement::NotEquals { field: f, value } => field(f) != Some(value.as_str()),
        })
    }
}
