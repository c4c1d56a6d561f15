//! The decision format produced by the model each turn.
//!
//! ```json
//! {
//!     "thoughts": { "text": "...", "reasoning": "...", "plan": "...", "criticism": "..." },
//!     "command": { "name": "google", "args": { "input": "rust agents" } }
//! }
//! ```
//!
//! Only `command.name` is mandatory. Thoughts are diagnostic and never
//! affect control flow.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The model's self-reported reasoning for a turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thoughts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
}

/// The command the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub thoughts: Thoughts,
    pub command: CommandCall,
}

/// Why a syntactically valid JSON value is not a usable [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    /// The top-level value is not an object.
    NotAnObject,
    /// No `command` object.
    MissingCommand,
    /// `command` present but `command.name` missing or not a string.
    MissingCommandName,
    /// `command.args` is neither an object nor empty.
    InvalidArgs,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ShapeError::NotAnObject => "Response is not a JSON object",
            ShapeError::MissingCommand => "Missing 'command' object in JSON",
            ShapeError::MissingCommandName => "Missing 'name' field in 'command' object",
            ShapeError::InvalidArgs => "'args' in 'command' object must be a JSON object",
        };
        f.write_str(msg)
    }
}

impl Decision {
    /// Coerce an already-parsed JSON value into a decision.
    ///
    /// Lenient where the model commonly drifts: `args` may be absent, `null`
    /// or `""`, and `thoughts.plan` may be a list of lines.
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let obj = value.as_object().ok_or(ShapeError::NotAnObject)?;

        let command = obj
            .get("command")
            .and_then(Value::as_object)
            .ok_or(ShapeError::MissingCommand)?;

        let name = command
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ShapeError::MissingCommandName)?;

        let args = match command.get("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::String(s)) if s.trim().is_empty() => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(ShapeError::InvalidArgs),
        };

        let thoughts = obj.get("thoughts").map(parse_thoughts).unwrap_or_default();

        Ok(Decision {
            thoughts,
            command: CommandCall {
                name: name.to_string(),
                args,
            },
        })
    }
}

fn parse_thoughts(value: &Value) -> Thoughts {
    let field = |key: &str| -> Option<String> {
        match value.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                (!lines.is_empty()).then(|| lines.join("\n"))
            }
            _ => None,
        }
    };

    Thoughts {
        text: field("text"),
        reasoning: field("reasoning"),
        plan: field("plan"),
        criticism: field("criticism"),
        speak: field("speak"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_decision() {
        let value = json!({
            "thoughts": {
                "text": "search first",
                "reasoning": "need sources",
                "plan": "- search\n- browse",
                "criticism": "be quick"
            },
            "command": { "name": "google", "args": { "input": "rust" } }
        });
        let d = Decision::from_value(&value).unwrap();
        assert_eq!(d.command.name, "google");
        assert_eq!(d.command.args["input"], "rust");
        assert_eq!(d.thoughts.text.as_deref(), Some("search first"));
    }

    #[test]
    fn args_default_to_empty() {
        for args in [json!(null), json!("")] {
            let value = json!({ "command": { "name": "task_complete", "args": args } });
            assert!(Decision::from_value(&value).unwrap().command.args.is_empty());
        }
        let value = json!({ "command": { "name": "list_agents" } });
        assert!(Decision::from_value(&value).unwrap().command.args.is_empty());
    }

    #[test]
    fn plan_list_is_joined() {
        let value = json!({
            "thoughts": { "plan": ["search", "browse"] },
            "command": { "name": "google", "args": {} }
        });
        let d = Decision::from_value(&value).unwrap();
        assert_eq!(d.thoughts.plan.as_deref(), Some("search\nbrowse"));
    }

    #[test]
    fn missing_command_is_distinct_from_missing_name() {
        assert_eq!(
            Decision::from_value(&json!({ "thoughts": {} })),
            Err(ShapeError::MissingCommand)
        );
        assert_eq!(
            Decision::from_value(&json!({ "command": { "args": {} } })),
            Err(ShapeError::MissingCommandName)
        );
        assert_eq!(
            Decision::from_value(&json!({ "command": { "name": 7 } })),
            Err(ShapeError::MissingCommandName)
        );
    }

    #[test]
    fn command_list_is_not_a_command() {
        let value = json!({ "commands": [{ "name": "google", "args": {} }] });
        assert_eq!(Decision::from_value(&value), Err(ShapeError::MissingCommand));
    }

    #[test]
    fn scalar_args_rejected() {
        let value = json!({ "command": { "name": "google", "args": 3 } });
        assert_eq!(Decision::from_value(&value), Err(ShapeError::InvalidArgs));
        assert_eq!(Decision::from_value(&json!([1, 2])), Err(ShapeError::NotAnObject));
    }
}
