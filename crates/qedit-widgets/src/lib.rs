#![forbid(unsafe_code)]

//! Dialog host and schema-driven forms for quickedit.

pub mod dialog;
pub mod form;

pub use dialog::{
    ContentStyle, DIALOG_HIT_BACKDROP, DIALOG_HIT_CLOSE_BUTTON, DIALOG_HIT_CONTENT, DialogAction,
    DialogCtl, DialogHost, DialogId, DialogView, QuickDialogProps,
};
pub use form::{
    Control, FieldInput, FieldKind, FieldSchema, FieldValue, FileRef, FormError, FormRow,
    FormValue, QuickForm, coerce_number, form_value_to_json,
};
