//! Merge same-turn context mutations into a single call.
//!
//! Models often issue several `update_context` calls in one response. They
//! are folded into one call, placed where the first one was and carrying its
//! id, so the store sees one batch. Everything else keeps its order.

use parrot_core::message::ToolCall;
use serde_json::{Map, Value};

/// Merge every parseable call to `tool_name` into one.
///
/// Fewer than two such calls leaves the list untouched. Calls whose
/// arguments are not a JSON object are not merged and stay where they are.
pub fn consolidate(calls: Vec<ToolCall>, tool_name: &str) -> Vec<ToolCall> {
    let mergeable: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, call)| call.name == tool_name && parse_object(&call.arguments).is_some())
        .map(|(i, _)| i)
        .collect();

    if mergeable.len() < 2 {
        return calls;
    }

    // key -> (collected values, number of calls that had the key)
    let mut merged: Vec<(String, Vec<Value>, usize)> = Vec::new();
    for &index in &mergeable {
        let Some(object) = parse_object(&calls[index].arguments) else {
            continue;
        };
        for (key, value) in object {
            let slot = match merged.iter().position(|(k, _, _)| *k == key) {
                Some(pos) => &mut merged[pos],
                None => {
                    merged.push((key, Vec::new(), 0));
                    let last = merged.len() - 1;
                    &mut merged[last]
                }
            };
            slot.2 += 1;
            slot.1.push(value);
        }
    }

    let mut arguments = Map::new();
    for (key, mut values, seen) in merged {
        let value = if seen == 1 {
            values.remove(0)
        } else {
            Value::Array(
                values
                    .into_iter()
                    .flat_map(|v| match v {
                        Value::Array(items) => items,
                        other => vec![other],
                    })
                    .collect(),
            )
        };
        arguments.insert(key, value);
    }

    let first = mergeable[0];
    tracing::debug!(merged = mergeable.len(), call_id = %calls[first].id, "Consolidated {tool_name} calls");

    let mut out = Vec::with_capacity(calls.len() - mergeable.len() + 1);
    for (index, call) in calls.into_iter().enumerate() {
        if index == first {
            out.push(ToolCall::new(call.id, call.name, Value::Object(arguments.clone()).to_string()));
        } else if !mergeable.contains(&index) {
            out.push(call);
        }
    }
    out
}

fn parse_object(arguments: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(arguments) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
