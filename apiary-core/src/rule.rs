//! URL rules with typed path segments.
//!
//! Rules use angle brackets for path arguments, with an optional converter:
//! `/items/<int:item_id>`. A rule maps to an axum route path
//! (`/items/{item_id}`) and to an OpenAPI path (`/items/{item_id}`).

use std::collections::HashMap;

use crate::error::DeclarationError;

/// One path argument of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleArgument {
    pub name: String,
    pub converter: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    rule: String,
    axum_path: String,
    openapi_path: String,
    arguments: Vec<RuleArgument>,
}

impl Rule {
    pub fn parse(rule: &str) -> Result<Self, DeclarationError> {
        let invalid = |reason: &str| DeclarationError::InvalidRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };
        if !rule.starts_with('/') {
            return Err(invalid("rules must start with a slash"));
        }

        let mut axum_path = String::with_capacity(rule.len());
        let mut openapi_path = String::with_capacity(rule.len());
        let mut arguments: Vec<RuleArgument> = Vec::new();
        let mut rest = rule;

        while let Some(start) = rest.find('<') {
            let (literal, tail) = rest.split_at(start);
            if literal.contains('>') {
                return Err(invalid("unbalanced '>'"));
            }
            axum_path.push_str(literal);
            openapi_path.push_str(literal);
            let end = tail.find('>').ok_or_else(|| invalid("unclosed '<'"))?;
            let spec = &tail[1..end];
            let (converter, name) = match spec.split_once(':') {
                Some((converter, name)) => (converter.trim(), name.trim()),
                None => ("default", spec.trim()),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid("invalid argument name"));
            }
            if arguments.iter().any(|a| a.name == name) {
                return Err(invalid("duplicate argument name"));
            }
            if converter == "path" {
                axum_path.push_str(&format!("{{*{name}}}"));
            } else {
                axum_path.push_str(&format!("{{{name}}}"));
            }
            openapi_path.push_str(&format!("{{{name}}}"));
            arguments.push(RuleArgument {
                name: name.to_string(),
                converter: converter.to_string(),
            });
            rest = &tail[end + 1..];
        }
        if rest.contains('>') {
            return Err(invalid("unbalanced '>'"));
        }
        axum_path.push_str(rest);
        openapi_path.push_str(rest);

        Ok(Self {
            rule: rule.to_string(),
            axum_path,
            openapi_path,
            arguments,
        })
    }

    /// The rule as written.
    pub fn as_str(&self) -> &str {
        &self.rule
    }

    pub fn axum_path(&self) -> &str {
        &self.axum_path
    }

    pub fn openapi_path(&self) -> &str {
        &self.openapi_path
    }

    pub fn arguments(&self) -> &[RuleArgument] {
        &self.arguments
    }

    /// Argument name to converter name.
    pub fn converters(&self) -> HashMap<String, String> {
        self.arguments
            .iter()
            .map(|a| (a.name.clone(), a.converter.clone()))
            .collect()
    }

    /// The same rule under a URL prefix.
    pub fn prefixed(&self, prefix: &str) -> Result<Self, DeclarationError> {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        let joined = if self.rule == "/" {
            prefix.to_string()
        } else {
            format!("{prefix}{}", self.rule)
        };
        Rule::parse(&joined)
    }

    /// Whether the raw path segments match the built-in converters.
    ///
    /// Custom converters accept any segment.
    pub fn matches(&self, params: &HashMap<String, String>) -> bool {
        self.arguments.iter().all(|arg| match params.get(&arg.name) {
            Some(value) => converter_accepts(&arg.converter, value),
            None => false,
        })
    }
}

fn converter_accepts(converter: &str, value: &str) -> bool {
    match converter {
        "int" => !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()),
        "float" => {
            value.contains('.')
                && value
                    .split_once('.')
                    .is_some_and(|(a, b)| {
                        !a.is_empty()
                            && !b.is_empty()
                            && a.chars().all(|c| c.is_ascii_digit())
                            && b.chars().all(|c| c.is_ascii_digit())
                    })
        }
        "uuid" => uuid::Uuid::parse_str(value).is_ok(),
        "default" | "string" => !value.is_empty() && !value.contains('/'),
        _ => true,
    }
}
