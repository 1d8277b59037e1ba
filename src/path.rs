//! Dotted path resolution over JSON resources.
//!
//! A path such as `category.coding.code` is walked one segment at a time.
//! Arrays fan out to every element, so the path above yields each code of
//! each coding of each category. Missing segments yield nothing for that
//! branch; they are never an error.

use serde_json::Value;

/// Lazy iterator over the values a dotted path reaches.
///
/// Values are produced in document order. Resolving again with a fresh
/// iterator always produces the same sequence.
#[derive(Debug, Clone)]
pub struct Resolve<'a> {
    segments: Vec<&'a str>,
    stack: Vec<(&'a Value, usize)>,
}

impl<'a> Iterator for Resolve<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, depth)) = self.stack.pop() {
            if let Value::Array(items) = node {
                self.stack
                    .extend(items.iter().rev().map(|item| (item, depth)));
                continue;
            }

            let Some(segment) = self.segments.get(depth) else {
                return Some(node);
            };

            if let Some(child) = node.as_object().and_then(|object| object.get(*segment)) {
                self.stack.push((child, depth + 1));
            }
        }
        None
    }
}

/// Resolve `path` against a resource, or against every resource of an array
pub fn resolve<'a>(node: &'a Value, path: &'a str) -> Resolve<'a> {
    Resolve {
        segments: split(path),
        stack: vec![(node, 0)],
    }
}

/// Resolve `path` against each resource of a slice, in order
pub fn resolve_all<'a>(nodes: &'a [Value], path: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
    nodes.iter().flat_map(move |node| resolve(node, path))
}

/// True as soon as a resolved value satisfies `predicate`
pub fn exists<F>(node: &Value, path: &str, mut predicate: F) -> bool
where
    F: FnMut(&Value) -> bool,
{
    resolve(node, path).any(|value| predicate(value))
}

/// True when the path reaches at least one populated value
pub fn has_value(node: &Value, path: &str) -> bool {
    exists(node, path, is_populated)
}

/// First string the path reaches
pub fn first_str<'a>(node: &'a Value, path: &'a str) -> Option<&'a str> {
    resolve(node, path).find_map(Value::as_str)
}

pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Removes a leading `Resource.` qualifier, e.g. `CarePlan.text` -> `text`
pub fn strip_resource_prefix<'a>(path: &'a str, resource_type: &str) -> &'a str {
    path.strip_prefix(resource_type)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(path)
}

fn split(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}
