//! Reference Resolver and Expression Rewriter
//!
//! Translates CWL references into Argo's double-brace templating syntax.
//! This is purely textual: nothing is evaluated.
//!
//! # Syntax Mapping
//!
//! | CWL                        | Argo                                              |
//! |----------------------------|---------------------------------------------------|
//! | source `global/<key>`      | `{{workflow.parameters.<key>}}`                   |
//! | source `<step>/<key>`      | `{{steps.<step-name>.outputs.parameters.<key>}}`  |
//! | `$(inputs.<field>)`        | `{{inputs.parameters.<field>}}`                   |
//! | `$(steps.<step>.<key>)`    | `{{steps.<step-name>.outputs.parameters.<key>}}`  |
//!
//! Step names replace `_` with `-` to satisfy Argo's step-name grammar.

use crate::cwl::workflow::Workflow;
use crate::error::{EmissionError, ResolutionError};

/// Argo step names may not contain underscores.
pub fn normalize_step_name(id: &str) -> String {
    id.replace('_', "-")
}

/// Reference to a template input parameter.
pub fn input_parameter(id: &str) -> String {
    format!("{{{{inputs.parameters.{}}}}}", id)
}

/// Reference to a workflow argument.
pub fn workflow_parameter(key: &str) -> String {
    format!("{{{{workflow.parameters.{}}}}}", key)
}

/// Reference to an earlier step's output parameter.
pub fn step_output(step: &str, key: &str) -> String {
    format!(
        "{{{{steps.{}.outputs.parameters.{}}}}}",
        normalize_step_name(step),
        key
    )
}

/// A parsed step-input `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef<'a> {
    Global(&'a str),
    Step { step: &'a str, key: &'a str },
}

impl<'a> SourceRef<'a> {
    /// Splits `<scope>/<key>`; a source without `/` is a workflow input.
    pub fn parse(source: &'a str) -> Self {
        match source.split_once('/') {
            Some(("global", key)) => Self::Global(key),
            Some((step, key)) => Self::Step { step, key },
            None => Self::Global(source),
        }
    }

    /// The Argo template expression for this source.
    pub fn to_template(&self) -> String {
        match self {
            Self::Global(key) => workflow_parameter(key),
            Self::Step { step, key } => step_output(step, key),
        }
    }
}

/// Resolves a step input's source against the workflow.
///
/// Global sources must name a declared workflow input. Step sources must
/// name a step declared before `position` that lists the key in `out`.
pub fn resolve_source(
    workflow: &Workflow,
    position: usize,
    step: &str,
    source: &str,
) -> Result<String, ResolutionError> {
    let unresolvable = |reason: String| ResolutionError::UnresolvableSource {
        step: step.to_string(),
        source_ref: source.to_string(),
        reason,
    };

    let parsed = SourceRef::parse(source);
    match parsed {
        SourceRef::Global(key) => {
            if !workflow.inputs.contains_key(key) {
                return Err(unresolvable(format!("'{}' is not a workflow input", key)));
            }
        }
        SourceRef::Step { step: producer, key } => {
            let earlier = &workflow.steps[..position.min(workflow.steps.len())];
            let producer_step = earlier
                .iter()
                .find(|s| s.id == producer)
                .ok_or_else(|| unresolvable(format!("no earlier step named '{}'", producer)))?;
            if !producer_step.out.iter().any(|o| o == key) {
                return Err(unresolvable(format!(
                    "step '{}' does not list '{}' in out",
                    producer, key
                )));
            }
        }
    }

    Ok(parsed.to_template())
}

fn rewrite_reference(inner: &str, text: &str) -> Result<String, EmissionError> {
    let malformed = |reason: &str| EmissionError::MalformedReference {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = inner.split('.').collect();
    match segments.as_slice() {
        ["steps", step, key] if !step.is_empty() && !key.is_empty() => Ok(step_output(step, key)),
        [scope, field] if !scope.is_empty() && !field.is_empty() => {
            Ok(format!("{{{{{}.parameters.{}}}}}", scope, field))
        }
        [_] | [_, _] => Err(malformed("expected a '<scope>.<field>' reference")),
        _ => Err(malformed(&format!(
            "'{}' contains multiple '.' can only contain one",
            inner
        ))),
    }
}

/// Rewrites every `$(...)` span of `text` into Argo template syntax.
///
/// An unmatched `$(` leaves the rest of the string unchanged, unless the
/// unterminated span holds more than one `.`.
///
/// # Example
///
/// ```
/// use cwl2argo::argo::references::rewrite_expression;
///
/// let rewritten = rewrite_expression("--name=$(inputs.sample)").unwrap();
/// assert_eq!(rewritten, "--name={{inputs.parameters.sample}}");
/// ```
pub fn rewrite_expression(text: &str) -> Result<String, EmissionError> {
    let mut rewritten = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("$(") {
        let after = &rest[start + 2..];
        match after.find(')') {
            Some(end) => {
                rewritten.push_str(&rest[..start]);
                rewritten.push_str(&rewrite_reference(after[..end].trim(), text)?);
                rest = &after[end + 1..];
            }
            None => {
                if after.matches('.').count() > 1 {
                    return Err(EmissionError::MalformedReference {
                        text: text.to_string(),
                        reason: "unterminated reference contains multiple '.'".to_string(),
                    });
                }
                break;
            }
        }
    }

    rewritten.push_str(rest);
    Ok(rewritten)
}

/// Rewrites each argument in order.
pub fn rewrite_arguments(arguments: &[String]) -> Result<Vec<String>, EmissionError> {
    arguments.iter().map(|arg| rewrite_expression(arg)).collect()
}
