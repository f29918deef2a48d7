#![forbid(unsafe_code)]

//! Schema-driven forms.
//!
//! A [`QuickForm`] is built from an ordered set of [`FieldSchema`]s. Each
//! field's control kind is taken from the schema or inferred from its default
//! value. The form holds no value of its own: [`QuickForm::rows`] describes
//! the controls for a caller-owned [`FormValue`], and [`QuickForm::commit`]
//! returns the updated copy for the caller to store.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// CSS class of the form element.
pub const FORM_CLASS: &str = "quickForm";

/// CSS class of each label/control row.
pub const ROW_CLASS: &str = "quickFormRow";

static FIELD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_field_id() -> String {
    let n = FIELD_ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("randID-{n}")
}

/// Control used to edit a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    File,
    /// Shown as pretty-printed JSON, never edited.
    Readonly,
    /// Multi-line text. Never inferred.
    Textarea,
}

impl FieldKind {
    /// Kind inferred from a default value.
    #[must_use]
    pub fn infer(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(_) => Self::String,
            FieldValue::Number(_) => Self::Number,
            FieldValue::Bool(_) => Self::Boolean,
            FieldValue::File(_) => Self::File,
            FieldValue::Json(_) => Self::Readonly,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Readonly => "readonly",
            Self::Textarea => "textarea",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file picked in a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub size: u64,
    pub mime: String,
}

impl FileRef {
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime: mime.into(),
        }
    }
}

/// Value of one form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
    File(FileRef),
    /// Anything else; rendered read-only.
    Json(Value),
}

impl FieldValue {
    /// JSON form of the value. Non-finite numbers become `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::File(file) => serde_json::json!({
                "name": file.name,
                "size": file.size,
                "type": file.mime,
            }),
            Self::Json(value) => value.clone(),
        }
    }

    fn display_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::File(_) => String::new(),
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<FileRef> for FieldValue {
    fn from(file: FileRef) -> Self {
        Self::File(file)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Ordered field values of a form, keyed by field name.
pub type FormValue = IndexMap<String, FieldValue>;

/// JSON object form of a [`FormValue`], keys in form order.
#[must_use]
pub fn form_value_to_json(value: &FormValue) -> Value {
    Value::Object(
        value
            .iter()
            .map(|(key, field)| (key.clone(), field.to_json()))
            .collect(),
    )
}

/// Description of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub label: Option<String>,
    pub kind: Option<FieldKind>,
    /// Default value.
    pub value: FieldValue,
    /// Step of number inputs.
    pub step: Option<f64>,
    /// Extra attributes passed through to the control.
    pub attrs: IndexMap<String, String>,
}

impl FieldSchema {
    #[must_use]
    pub fn new(value: impl Into<FieldValue>) -> Self {
        Self {
            label: None,
            kind: None,
            value: value.into(),
            step: None,
            attrs: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// The explicit kind, or the one inferred from the default value.
    #[must_use]
    pub fn resolved_kind(&self) -> FieldKind {
        self.kind.unwrap_or_else(|| FieldKind::infer(&self.value))
    }

    fn effective_step(&self) -> f64 {
        match self.step {
            Some(step) if step != 0.0 && !step.is_nan() => step,
            _ => 1.0,
        }
    }
}

/// Input delivered by a control.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    /// Raw text of a text, textarea or number input.
    Text(String),
    /// New state of a checkbox.
    Checked(bool),
    /// Files currently selected in a file input.
    Files(Vec<FileRef>),
}

/// Control of one row, with its displayed state.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Text { value: String },
    Textarea { value: String },
    Number { value: String, step: f64 },
    Checkbox { checked: bool },
    /// File inputs always render empty.
    File,
    Readonly { json: String },
}

/// One label/control row.
#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    /// Element id linking label and control, `randID-<n>`.
    pub id: String,
    pub key: String,
    pub label: String,
    pub control: Control,
    pub attrs: IndexMap<String, String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("unknown form field `{0}`")]
    UnknownField(String),
    #[error("form field `{0}` is read-only")]
    ReadOnly(String),
    #[error("input does not fit {kind} field `{key}`")]
    InputMismatch { key: String, kind: FieldKind },
}

/// A form over a fixed, ordered field schema.
#[derive(Debug)]
pub struct QuickForm {
    fields: IndexMap<String, FieldSchema>,
    ids: RefCell<IndexMap<String, String>>,
}

impl QuickForm {
    /// Build a form; fields without an explicit kind get the inferred one.
    #[must_use]
    pub fn new<K: Into<String>>(fields: impl IntoIterator<Item = (K, FieldSchema)>) -> Self {
        let fields: IndexMap<String, FieldSchema> = fields
            .into_iter()
            .map(|(key, mut field)| {
                field.kind = Some(field.resolved_kind());
                (key.into(), field)
            })
            .collect();
        Self {
            fields,
            ids: RefCell::new(IndexMap::new()),
        }
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn kind_of(&self, key: &str) -> Option<FieldKind> {
        self.fields.get(key).map(FieldSchema::resolved_kind)
    }

    /// Default value of every field, in schema order.
    #[must_use]
    pub fn default_value(&self) -> FormValue {
        self.fields
            .iter()
            .map(|(key, field)| (key.clone(), field.value.clone()))
            .collect()
    }

    /// Element id of the row for `key`, assigned on first use and kept for
    /// the life of the form.
    pub fn field_id(&self, key: &str) -> String {
        self.ids
            .borrow_mut()
            .entry(key.to_owned())
            .or_insert_with(next_field_id)
            .clone()
    }

    /// Rows for `value`, one per key of `value` in its order.
    ///
    /// Keys the schema does not know render read-only.
    pub fn rows(&self, value: &FormValue) -> Vec<FormRow> {
        value
            .iter()
            .map(|(key, field_value)| {
                let schema = self.fields.get(key);
                let kind = schema.map_or(FieldKind::Readonly, FieldSchema::resolved_kind);
                let control = match kind {
                    FieldKind::String => Control::Text {
                        value: field_value.display_text(),
                    },
                    FieldKind::Textarea => Control::Textarea {
                        value: field_value.display_text(),
                    },
                    FieldKind::Number => Control::Number {
                        value: field_value.display_text(),
                        step: schema.map_or(1.0, FieldSchema::effective_step),
                    },
                    FieldKind::Boolean => Control::Checkbox {
                        checked: matches!(field_value, FieldValue::Bool(true)),
                    },
                    FieldKind::File => Control::File,
                    FieldKind::Readonly => Control::Readonly {
                        json: pretty_json(field_value),
                    },
                };
                FormRow {
                    id: self.field_id(key),
                    key: key.clone(),
                    label: schema
                        .and_then(|s| s.label.clone())
                        .filter(|label| !label.is_empty())
                        .unwrap_or_else(|| key.clone()),
                    control,
                    attrs: schema.map(|s| s.attrs.clone()).unwrap_or_default(),
                }
            })
            .collect()
    }

    /// Apply `input` to field `key` of `value`.
    ///
    /// Returns the updated copy, or `Ok(None)` when the input commits
    /// nothing (a file input with no file selected). `value` itself is never
    /// modified.
    pub fn commit(
        &self,
        value: &FormValue,
        key: &str,
        input: FieldInput,
    ) -> Result<Option<FormValue>, FormError> {
        let kind = self
            .kind_of(key)
            .ok_or_else(|| FormError::UnknownField(key.to_owned()))?;
        let new_field = match (kind, input) {
            (FieldKind::String | FieldKind::Textarea, FieldInput::Text(text)) => {
                FieldValue::Text(text)
            }
            (FieldKind::Number, FieldInput::Text(text)) => {
                FieldValue::Number(coerce_number(&text))
            }
            (FieldKind::Boolean, FieldInput::Checked(checked)) => FieldValue::Bool(checked),
            (FieldKind::File, FieldInput::Files(files)) => {
                let Some(first) = files.into_iter().next() else {
                    debug!(field = key, "file input cleared, nothing committed");
                    return Ok(None);
                };
                FieldValue::File(first)
            }
            (FieldKind::Readonly, _) => return Err(FormError::ReadOnly(key.to_owned())),
            (kind, _) => {
                return Err(FormError::InputMismatch {
                    key: key.to_owned(),
                    kind,
                });
            }
        };
        let mut next = value.clone();
        next.insert(key.to_owned(), new_field);
        Ok(Some(next))
    }
}

/// Numeric coercion of form input text.
///
/// Surrounding whitespace is ignored, empty text is `0`, `Infinity` and
/// `0x`/`0o`/`0b` integer literals are understood, and anything else that is
/// not a decimal number is NaN.
#[must_use]
pub fn coerce_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = text.strip_prefix(prefix) {
            if !digits.chars().all(|c| c.is_ascii_alphanumeric()) {
                return f64::NAN;
            }
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }
    let decimal = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !decimal {
        return f64::NAN;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::from("NaN")
    } else if n.is_infinite() {
        String::from(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        n.to_string()
    }
}

fn pretty_json(value: &FieldValue) -> String {
    serde_json::to_string_pretty(&value.to_json()).unwrap_or_else(|_| String::from("null"))
}
