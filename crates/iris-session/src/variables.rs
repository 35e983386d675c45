//! Grip rendering: turning server-side value references into DAP variables
//! and display strings.

use iris_dap::Variable;
use serde_json::{Map, Value};

/// What a variables-reference id resolves to. Providers issued during a
/// pause die with it; console-output providers live as long as the thread.
#[derive(Debug, Clone)]
pub enum VariablesProvider {
    /// The bindings of one stack frame's environment.
    FrameScope { thread_id: u32, environment: Value },
    /// A server-side object, expanded on demand.
    Object { thread_id: u32, actor: String },
    /// A long string; children are its chunks.
    LongString { thread_id: u32, grip: Value },
}

impl VariablesProvider {
    pub fn thread_id(&self) -> u32 {
        match self {
            VariablesProvider::FrameScope { thread_id, .. }
            | VariablesProvider::Object { thread_id, .. }
            | VariablesProvider::LongString { thread_id, .. } => *thread_id,
        }
    }
}

/// Render a grip for display.
pub fn render_grip(grip: &Value) -> String {
    match grip {
        Value::String(s) => format!("\"{s}\""),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Object(map) => render_object_grip(map),
        Value::Array(_) => grip.to_string(),
    }
}

fn render_object_grip(map: &Map<String, Value>) -> String {
    match map.get("type").and_then(Value::as_str) {
        Some("undefined") => "undefined".to_string(),
        Some("null") => "null".to_string(),
        Some("Infinity") => "Infinity".to_string(),
        Some("-Infinity") => "-Infinity".to_string(),
        Some("NaN") => "NaN".to_string(),
        Some("-0") => "-0".to_string(),
        Some("symbol") => map
            .get("name")
            .and_then(Value::as_str)
            .map(|name| format!("Symbol({name})"))
            .unwrap_or_else(|| "Symbol()".to_string()),
        Some("longString") => {
            let initial = map.get("initial").and_then(Value::as_str).unwrap_or("");
            format!("\"{initial}…\"")
        },
        Some("object") => {
            if let Some(text) = preview_error_text(map) {
                return text;
            }
            let class = map.get("class").and_then(Value::as_str).unwrap_or("Object");
            match array_length(map) {
                Some(length) => format!("{class}({length})"),
                None => class.to_string(),
            }
        },
        _ => Value::Object(map.clone()).to_string(),
    }
}

fn array_length(map: &Map<String, Value>) -> Option<u64> {
    map.get("preview")?
        .get("length")
        .and_then(Value::as_u64)
        .filter(|_| map.get("class").and_then(Value::as_str) == Some("Array"))
}

fn preview_error_text(map: &Map<String, Value>) -> Option<String> {
    let preview = map.get("preview")?;
    if preview.get("kind").and_then(Value::as_str) != Some("Error") {
        return None;
    }
    let name = preview
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("Error");
    let message = preview.get("message").and_then(Value::as_str).unwrap_or("");
    Some(format!("{name}: {message}"))
}

/// Exception text for a `stopped` event: error previews render as
/// `Name: message`, everything else as its display form.
pub fn exception_text(grip: &Value) -> String {
    if let Value::Object(map) = grip {
        if let Some(text) = preview_error_text(map) {
            return text;
        }
    }
    render_grip(grip)
}

/// Whether a grip needs a server round-trip (and thus a variables
/// reference) to expand.
pub fn grip_is_expandable(grip: &Value) -> bool {
    matches!(
        grip.get("type").and_then(Value::as_str),
        Some("object") | Some("longString")
    ) && grip.get("actor").and_then(Value::as_str).is_some()
}

/// The named bindings of a frame environment, innermost scope only.
pub fn scope_bindings(environment: &Value) -> Vec<(String, Value)> {
    let mut bindings = Vec::new();
    let Some(binding_obj) = environment.get("bindings") else {
        return bindings;
    };

    // Arguments come as an array of single-entry objects, in call order.
    if let Some(arguments) = binding_obj.get("arguments").and_then(Value::as_array) {
        for argument in arguments {
            if let Some(map) = argument.as_object() {
                for (name, descriptor) in map {
                    bindings.push((name.clone(), descriptor_value(descriptor)));
                }
            }
        }
    }
    if let Some(variables) = binding_obj.get("variables").and_then(Value::as_object) {
        for (name, descriptor) in variables {
            bindings.push((name.clone(), descriptor_value(descriptor)));
        }
    }
    bindings
}

/// Properties of an object grip, skipping accessors without a value.
pub fn property_bindings(own_properties: &Map<String, Value>) -> Vec<(String, Value)> {
    own_properties
        .iter()
        .map(|(name, descriptor)| (name.clone(), descriptor_value(descriptor)))
        .collect()
}

fn descriptor_value(descriptor: &Value) -> Value {
    match descriptor.get("value") {
        Some(value) => value.clone(),
        // Accessor properties and raw grips used directly as descriptors.
        None => descriptor.clone(),
    }
}

/// Build a DAP variable from a binding, registering a provider through
/// `register` when the grip is expandable.
pub fn variable_from_grip(
    name: &str,
    grip: &Value,
    register: &mut dyn FnMut(&Value) -> i64,
) -> Variable {
    let variables_reference = if grip_is_expandable(grip) {
        register(grip)
    } else {
        0
    };
    Variable {
        name: name.to_string(),
        value: render_grip(grip),
        type_: grip_type_name(grip),
        variables_reference,
    }
}

fn grip_type_name(grip: &Value) -> Option<String> {
    match grip {
        Value::String(_) => Some("string".to_string()),
        Value::Number(_) => Some("number".to_string()),
        Value::Bool(_) => Some("boolean".to_string()),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("object") => map
                .get("class")
                .and_then(Value::as_str)
                .map(str::to_string),
            Some("longString") => Some("string".to_string()),
            Some("undefined") => Some("undefined".to_string()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn primitives_render_directly() {
        assert_eq!(render_grip(&json!(3)), "3");
        assert_eq!(render_grip(&json!("hi")), "\"hi\"");
        assert_eq!(render_grip(&json!(true)), "true");
        assert_eq!(render_grip(&json!({"type": "undefined"})), "undefined");
        assert_eq!(render_grip(&json!({"type": "NaN"})), "NaN");
    }

    #[test]
    fn object_grips_render_class_and_length() {
        let array = json!({
            "type": "object",
            "class": "Array",
            "actor": "obj12",
            "preview": { "length": 4 }
        });
        assert_eq!(render_grip(&array), "Array(4)");
        assert!(grip_is_expandable(&array));

        let plain = json!({ "type": "object", "class": "Window", "actor": "obj13" });
        assert_eq!(render_grip(&plain), "Window");
    }

    #[test]
    fn error_previews_become_exception_text() {
        let grip = json!({
            "type": "object",
            "class": "Error",
            "actor": "obj9",
            "preview": { "kind": "Error", "name": "Error", "message": "x" }
        });
        assert_eq!(exception_text(&grip), "Error: x");
        // Non-object exceptions fall back to plain rendering.
        assert_eq!(exception_text(&json!("boom")), "\"boom\"");
    }

    #[test]
    fn scope_bindings_list_arguments_then_variables() {
        let environment = json!({
            "type": "function",
            "bindings": {
                "arguments": [ { "n": { "value": 1 } } ],
                "variables": { "i": { "value": 2 } }
            }
        });
        let bindings = scope_bindings(&environment);
        assert_eq!(bindings[0].0, "n");
        assert_eq!(bindings[1], ("i".to_string(), json!(2)));
    }

    #[test]
    fn expandable_grips_get_references() {
        let mut issued = Vec::new();
        {
            let mut register = |grip: &Value| {
                issued.push(grip.clone());
                42i64
            };
            let variable = variable_from_grip(
                "obj",
                &json!({ "type": "object", "class": "Object", "actor": "obj1" }),
                &mut register,
            );
            assert_eq!(variable.variables_reference, 42);
        }
        assert_eq!(issued.len(), 1);

        let mut register = |grip: &Value| {
            issued.push(grip.clone());
            42i64
        };
        let plain = variable_from_grip("n", &json!(7), &mut register);
        assert_eq!(plain.variables_reference, 0);
    }
}
