//! Record-of-checks validator combinator.
//!
//! A [`Record`] wraps one JSON object and offers one typed accessor per
//! primitive shape. Each accessor either returns the field's value in its
//! Rust type or an [`Invalid`] naming the field path and what was expected.
//! Nothing is coerced: a number sent as a string is rejected, a float is
//! not an integer. Fields the accessor is never asked about are ignored.

use serde_json::{Map, Value};

/// Why a value did not match a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalid {
    /// Dotted path of the offending field (`""` for the value itself).
    pub path: String,
    /// What kind of failure it was.
    pub reason: Reason,
}

/// Failure category of an [`Invalid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Required field absent.
    Missing,
    /// Field present with the wrong JSON type or out of range.
    Expected(&'static str),
    /// Discriminant present but naming a different kind.
    WrongTag {
        /// The discriminant value that was found.
        found: String,
    },
    /// Discriminant matched no registered kind.
    UnknownKind {
        /// The discriminant value that was found.
        found: String,
    },
}

impl Invalid {
    fn new(path: String, reason: Reason) -> Self {
        Self { path, reason }
    }

    /// No registered schema claims this discriminant.
    #[must_use]
    pub fn unknown_kind(path: &str, found: &str) -> Self {
        Self::new(
            path.to_string(),
            Reason::UnknownKind {
                found: found.to_string(),
            },
        )
    }

    /// True when the value was rejected only because its discriminant
    /// belongs to a different schema.
    #[must_use]
    pub fn is_tag_mismatch(&self) -> bool {
        matches!(self.reason, Reason::WrongTag { .. })
    }
}

impl std::fmt::Display for Invalid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { &self.path };
        match &self.reason {
            Reason::Missing => write!(f, "{path}: missing"),
            Reason::Expected(what) => write!(f, "{path}: expected {what}"),
            Reason::WrongTag { found } => write!(f, "{path}: unexpected tag '{found}'"),
            Reason::UnknownKind { found } => write!(f, "{path}: unknown kind '{found}'"),
        }
    }
}

impl std::error::Error for Invalid {}

/// A type decoded from the fields of one JSON object.
pub trait Shape: Sized {
    /// Read every field this shape needs from `record`.
    fn from_record(record: &Record<'_>) -> Result<Self, Invalid>;
}

/// A top-level or reply-payload message identified by its `type` field.
pub trait Schema: Shape {
    /// Accepted discriminant values. The first one is canonical.
    const TAGS: &'static [&'static str];

    /// Check discriminant and fields, returning the typed message.
    fn validate(raw: &Value) -> Result<Self, Invalid> {
        let record = Record::new(raw)?;
        record.tag("type", Self::TAGS)?;
        Self::from_record(&record)
    }

    /// Type-narrowing predicate: does `raw` satisfy this schema?
    fn matches(raw: &Value) -> bool {
        Self::validate(raw).is_ok()
    }
}

/// Typed view over one JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    fields: &'a Map<String, Value>,
    prefix: &'a str,
}

/// Join a record prefix and a field name into a dotted path.
fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

impl<'a> Record<'a> {
    /// Wrap `raw`, which must be a JSON object.
    pub fn new(raw: &'a Value) -> Result<Self, Invalid> {
        Self::at(raw, "")
    }

    fn at(raw: &'a Value, prefix: &'a str) -> Result<Self, Invalid> {
        match raw {
            Value::Object(fields) => Ok(Self { fields, prefix }),
            _ => Err(Invalid::new(prefix.to_string(), Reason::Expected("object"))),
        }
    }

    /// Path of a field of this record, for error reporting.
    #[must_use]
    pub fn path(&self, field: &str) -> String {
        join(self.prefix, field)
    }

    /// Raw access, `None` when absent.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field)
    }

    fn require(&self, field: &str) -> Result<&'a Value, Invalid> {
        self.fields
            .get(field)
            .ok_or_else(|| Invalid::new(self.path(field), Reason::Missing))
    }

    fn expected(&self, field: &str, what: &'static str) -> Invalid {
        Invalid::new(self.path(field), Reason::Expected(what))
    }

    /// Discriminant check: `field` must be a string equal to one of `tags`.
    pub fn tag(&self, field: &str, tags: &[&str]) -> Result<(), Invalid> {
        let found = self.string(field)?;
        if tags.contains(&found.as_str()) {
            Ok(())
        } else {
            Err(Invalid::new(self.path(field), Reason::WrongTag { found }))
        }
    }

    /// Any JSON number.
    pub fn number(&self, field: &str) -> Result<f64, Invalid> {
        self.require(field)?
            .as_f64()
            .ok_or_else(|| self.expected(field, "number"))
    }

    /// JSON number with no fractional part that fits in `i64`.
    pub fn integer(&self, field: &str) -> Result<i64, Invalid> {
        self.require(field)?
            .as_i64()
            .ok_or_else(|| self.expected(field, "integer"))
    }

    /// Non-negative integer narrowed to `T` (e.g. `u8` for GPIO pins).
    pub fn unsigned<T: TryFrom<u64>>(&self, field: &str) -> Result<T, Invalid> {
        self.require(field)?
            .as_u64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| self.expected(field, "unsigned integer in range"))
    }

    /// JSON boolean.
    pub fn boolean(&self, field: &str) -> Result<bool, Invalid> {
        self.require(field)?
            .as_bool()
            .ok_or_else(|| self.expected(field, "boolean"))
    }

    /// JSON string.
    pub fn string(&self, field: &str) -> Result<String, Invalid> {
        self.require(field)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.expected(field, "string"))
    }

    /// Array of strings.
    pub fn strings(&self, field: &str) -> Result<Vec<String>, Invalid> {
        let items = self
            .require(field)?
            .as_array()
            .ok_or_else(|| self.expected(field, "array"))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    Invalid::new(format!("{}[{i}]", self.path(field)), Reason::Expected("string"))
                })
            })
            .collect()
    }

    /// String restricted to a literal enumeration, mapped to `T`.
    pub fn one_of<T: Copy>(&self, field: &str, variants: &[(&str, T)]) -> Result<T, Invalid> {
        let found = self.string(field)?;
        variants
            .iter()
            .find(|(name, _)| *name == found)
            .map(|(_, v)| *v)
            .ok_or_else(|| self.expected(field, "one of the listed literals"))
    }

    /// Nested object decoded as `T`.
    pub fn shape<T: Shape>(&self, field: &str) -> Result<T, Invalid> {
        let path = self.path(field);
        let raw = self.require(field)?;
        let record = Record::at(raw, &path)?;
        T::from_record(&record)
    }

    /// Array of nested objects decoded as `T`.
    pub fn shapes<T: Shape>(&self, field: &str) -> Result<Vec<T>, Invalid> {
        let items = self
            .require(field)?
            .as_array()
            .ok_or_else(|| self.expected(field, "array"))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let path = format!("{}[{i}]", self.path(field));
                let record = Record::at(item, &path)?;
                T::from_record(&record)
            })
            .collect()
    }

    /// Optional field: absent or `null` yields `None`, anything else must
    /// pass `check`.
    pub fn optional<T>(
        &self,
        field: &str,
        check: impl FnOnce(&Self, &str) -> Result<T, Invalid>,
    ) -> Result<Option<T>, Invalid> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => check(self, field).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_rejects_string_without_coercion() {
        let raw = json!({ "x": "1.5" });
        let record = Record::new(&raw).unwrap();
        let err = record.number("x").unwrap_err();
        assert_eq!(err.reason, Reason::Expected("number"));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let raw = json!({ "n": 1.5, "m": 3 });
        let record = Record::new(&raw).unwrap();
        assert!(record.integer("n").is_err());
        assert_eq!(record.integer("m").unwrap(), 3);
        // An integer is still a number.
        assert!((record.number("m").unwrap() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unsigned_enforces_target_range() {
        let raw = json!({ "pin": 300, "ok": 18 });
        let record = Record::new(&raw).unwrap();
        assert!(record.unsigned::<u8>("pin").is_err());
        assert_eq!(record.unsigned::<u8>("ok").unwrap(), 18);
    }

    #[test]
    fn test_missing_field_reports_path() {
        let raw = json!({ "outer": { "a": 1 } });
        let record = Record::new(&raw).unwrap();

        struct Inner {
            _b: bool,
        }
        impl Shape for Inner {
            fn from_record(record: &Record<'_>) -> Result<Self, Invalid> {
                Ok(Self {
                    _b: record.boolean("b")?,
                })
            }
        }

        let err = record.shape::<Inner>("outer").err().unwrap();
        assert_eq!(err.path, "outer.b");
        assert_eq!(err.reason, Reason::Missing);
        assert_eq!(err.to_string(), "outer.b: missing");
    }

    #[test]
    fn test_optional_treats_null_as_absent() {
        let raw = json!({ "a": null, "c": "x" });
        let record = Record::new(&raw).unwrap();
        assert_eq!(record.optional("a", Record::string).unwrap(), None);
        assert_eq!(record.optional("b", Record::string).unwrap(), None);
        assert_eq!(
            record.optional("c", Record::string).unwrap(),
            Some("x".to_string())
        );
        assert!(record.optional("c", Record::boolean).is_err());
    }

    #[test]
    fn test_one_of_rejects_unlisted_literal() {
        let raw = json!({ "lvl": "debug" });
        let record = Record::new(&raw).unwrap();
        assert!(record.one_of("lvl", &[("info", 0), ("error", 1)]).is_err());
    }

    #[test]
    fn test_tag_mismatch_is_distinguishable() {
        let raw = json!({ "type": "status" });
        let record = Record::new(&raw).unwrap();
        let err = record.tag("type", &["position"]).unwrap_err();
        assert!(err.is_tag_mismatch());
    }

    #[test]
    fn test_strings_reports_bad_item_index() {
        let raw = json!({ "dirs": ["a", 2] });
        let record = Record::new(&raw).unwrap();
        let err = record.strings("dirs").unwrap_err();
        assert_eq!(err.path, "dirs[1]");
    }

    #[test]
    fn test_non_object_is_invalid() {
        assert!(Record::new(&json!([1, 2])).is_err());
        assert!(Record::new(&json!("position")).is_err());
    }
}
