//! Query Encoder (spec §4.1, §6) — encodes a tree of scalars, maps, and arrays into
//! `application/x-www-form-urlencoded` using PHP-style bracket notation.
//!
//! The encoder is pure: [`encode_pairs`] and [`to_query_string`] never perform I/O and always
//! produce the same bytes for the same input (spec §8's idempotence property).

// self
use crate::_prelude::*;

/// A node in the parameter tree passed to [`encode_pairs`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	/// Absent/empty value — encodes to `""`.
	Null,
	/// Boolean — encodes to `"1"` / `"0"`.
	Bool(bool),
	/// Integer — encodes to its decimal representation (`0` included).
	Int(i64),
	/// Floating point — encodes via its default `Display` representation.
	Float(f64),
	/// A string scalar.
	Str(String),
	/// An ordered list; encoded with stringified index keys (`xs[0]`, `xs[1]`, ...).
	Array(Vec<Value>),
	/// An ordered map; nested keys are appended as `parent[child]`.
	Map(Map),
}
impl Value {
	/// Convenience constructor for [`Value::Str`].
	pub fn str(value: impl Into<String>) -> Self {
		Self::Str(value.into())
	}

	/// Encodes this value's scalar representation, or `None` if this is a container
	/// (`Array`/`Map`), which has no single scalar representation.
	fn scalar(&self) -> Option<String> {
		match self {
			Self::Null => Some(String::new()),
			Self::Bool(true) => Some("1".to_owned()),
			Self::Bool(false) => Some("0".to_owned()),
			Self::Int(n) => Some(n.to_string()),
			Self::Float(n) => Some(n.to_string()),
			Self::Str(s) => Some(s.clone()),
			Self::Array(_) | Self::Map(_) => None,
		}
	}
}
impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}
impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}
impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}
impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Str(value)
	}
}
impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Str(value.to_owned())
	}
}
impl<T> From<Vec<T>> for Value
where
	T: Into<Value>,
{
	fn from(values: Vec<T>) -> Self {
		Self::Array(values.into_iter().map(Into::into).collect())
	}
}
impl From<Map> for Value {
	fn from(map: Map) -> Self {
		Self::Map(map)
	}
}
impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => n
				.as_i64()
				.map(Self::Int)
				.or_else(|| n.as_f64().map(Self::Float))
				.unwrap_or(Self::Null),
			serde_json::Value::String(s) => Self::Str(s),
			serde_json::Value::Array(items) => {
				Self::Array(items.into_iter().map(Value::from).collect())
			},
			serde_json::Value::Object(entries) => {
				let mut map = Map::new();

				for (key, value) in entries {
					map.insert(key, Value::from(value));
				}

				Self::Map(map)
			},
		}
	}
}

/// Insertion-ordered map of string keys to [`Value`]s.
///
/// Re-inserting an existing key overwrites its value in place, preserving the key's
/// original position (spec §4.1: "duplicate keys overwrite previous values within the same
/// call").
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
	entries: Vec<(String, Value)>,
	index: HashMap<String, usize>,
}
impl Map {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or overwrites `key` with `value`, returning `self` for chaining.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
		let key = key.into();
		let value = value.into();

		if let Some(&position) = self.index.get(&key) {
			self.entries[position].1 = value;
		} else {
			self.index.insert(key.clone(), self.entries.len());
			self.entries.push((key, value));
		}

		self
	}

	/// Merges `other` into `self`, with `other`'s values taking precedence on key conflicts
	/// (used by the orchestrator to merge `auth` into the caller's params, spec §4.6).
	pub fn merge(mut self, other: Map) -> Self {
		for (key, value) in other.entries {
			self.insert(key, value);
		}

		self
	}

	/// Returns an iterator over `(key, value)` pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Returns `true` if the map has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl FromIterator<(String, Value)> for Map {
	fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
		let mut map = Self::new();

		for (key, value) in iter {
			map.insert(key, value);
		}

		map
	}
}

/// Flattens `value` into bracket-notation key/value pairs (spec §4.1, §6).
///
/// `{a: {b: 1, c: 2}}` flattens to `[("a[b]", "1"), ("a[c]", "2")]`; `{xs: [10, 20]}` flattens
/// to `[("xs[0]", "10"), ("xs[1]", "20")]`. A bare scalar at the root encodes to a single pair
/// keyed by the empty string and should not normally be passed to this function directly —
/// callers always flatten a [`Map`].
pub fn encode_pairs(value: &Value) -> Vec<(String, String)> {
	let mut pairs = Vec::new();

	flatten("", value, &mut pairs);

	pairs
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
	match value {
		Value::Map(map) =>
			for (key, child) in map.iter() {
				flatten(&bracket_key(prefix, key), child, out);
			},
		Value::Array(items) =>
			for (index, child) in items.iter().enumerate() {
				flatten(&bracket_key(prefix, &index.to_string()), child, out);
			},
		scalar => {
			let rendered = scalar.scalar().unwrap_or_default();

			out.push((prefix.to_owned(), rendered));
		},
	}
}

fn bracket_key(prefix: &str, segment: &str) -> String {
	if prefix.is_empty() { segment.to_owned() } else { format!("{prefix}[{segment}]") }
}

/// Encodes `value` (expected to be a [`Value::Map`]) into a
/// `application/x-www-form-urlencoded` string suitable for a query string or a POST body.
pub fn to_query_string(value: &Value) -> String {
	let mut serializer = url::form_urlencoded::Serializer::new(String::new());

	for (key, rendered) in encode_pairs(value) {
		serializer.append_pair(&key, &rendered);
	}

	serializer.finish()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn nested_map_uses_bracket_notation() {
		let mut inner = Map::new();

		inner.insert("b", 1_i64).insert("c", 2_i64);

		let mut root = Map::new();

		root.insert("a", inner);

		assert_eq!(
			encode_pairs(&Value::Map(root)),
			vec![("a[b]".to_owned(), "1".to_owned()), ("a[c]".to_owned(), "2".to_owned())]
		);
	}

	#[test]
	fn array_uses_stringified_index_keys() {
		let mut root = Map::new();

		root.insert("xs", vec![10_i64, 20_i64]);

		assert_eq!(
			encode_pairs(&Value::Map(root)),
			vec![("xs[0]".to_owned(), "10".to_owned()), ("xs[1]".to_owned(), "20".to_owned())]
		);
	}

	#[test]
	fn booleans_and_null_map_to_spec_literals() {
		let mut root = Map::new();

		root.insert("a", true).insert("b", false).insert("c", Value::Null);

		assert_eq!(
			encode_pairs(&Value::Map(root)),
			vec![
				("a".to_owned(), "1".to_owned()),
				("b".to_owned(), "0".to_owned()),
				("c".to_owned(), String::new()),
			]
		);
	}

	#[test]
	fn duplicate_keys_overwrite_in_place() {
		let mut root = Map::new();

		root.insert("a", 1_i64).insert("b", 2_i64).insert("a", 3_i64);

		assert_eq!(
			encode_pairs(&Value::Map(root)),
			vec![("a".to_owned(), "3".to_owned()), ("b".to_owned(), "2".to_owned())]
		);
	}

	#[test]
	fn query_string_percent_encodes_values() {
		let mut root = Map::new();

		root.insert("q", "a b&c");

		assert_eq!(to_query_string(&Value::Map(root)), "q=a+b%26c");
	}

	#[test]
	fn merge_prefers_later_map_values() {
		let mut base = Map::new();

		base.insert("auth", "old").insert("keep", "me");

		let mut overlay = Map::new();

		overlay.insert("auth", "new");

		let merged = base.merge(overlay);

		assert_eq!(
			encode_pairs(&Value::Map(merged)),
			vec![("auth".to_owned(), "new".to_owned()), ("keep".to_owned(), "me".to_owned())]
		);
	}

	#[test]
	fn emission_is_idempotent_for_equal_insertion_order() {
		let mut a = Map::new();
		let mut b = Map::new();

		a.insert("x", 1_i64).insert("y", 2_i64);
		b.insert("x", 1_i64).insert("y", 2_i64);

		assert_eq!(encode_pairs(&Value::Map(a)), encode_pairs(&Value::Map(b)));
	}
}
