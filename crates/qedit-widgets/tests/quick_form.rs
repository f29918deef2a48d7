use proptest::prelude::*;
use qedit_widgets::{
    Control, FieldInput, FieldKind, FieldSchema, FieldValue, FileRef, FormError, FormValue,
    QuickForm, coerce_number, form_value_to_json,
};
use serde_json::json;

fn profile_form() -> QuickForm {
    QuickForm::new([
        ("name", FieldSchema::new("Ann").label("Full name")),
        ("age", FieldSchema::new(30).step(1.0)),
        ("admin", FieldSchema::new(false)),
        ("avatar", FieldSchema::new(FileRef::new("a.png", 12, "image/png"))),
        ("meta", FieldSchema::new(json!({"tags": ["x"]}))),
        (
            "bio",
            FieldSchema::new("")
                .kind(FieldKind::Textarea)
                .attr("rows", "4"),
        ),
    ])
}

#[test]
fn default_value_lists_every_field_in_order() {
    let form = profile_form();
    let value = form.default_value();
    let keys: Vec<&str> = value.keys().map(String::as_str).collect();
    assert_eq!(keys, ["name", "age", "admin", "avatar", "meta", "bio"]);
    assert_eq!(value["age"], FieldValue::Number(30.0));
}

#[test]
fn rows_follow_the_value_keys() {
    let form = profile_form();
    let mut value = FormValue::new();
    value.insert("admin".into(), FieldValue::Bool(true));
    value.insert("name".into(), FieldValue::from("Bo"));

    let rows = form.rows(&value);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, "admin");
    assert_eq!(rows[0].label, "admin");
    assert_eq!(rows[0].control, Control::Checkbox { checked: true });
    assert_eq!(rows[1].label, "Full name");
    assert_eq!(
        rows[1].control,
        Control::Text {
            value: "Bo".into()
        }
    );
}

#[test]
fn readonly_and_unknown_fields_show_pretty_json() {
    let form = profile_form();
    let mut value = form.default_value();
    value.insert("extra".into(), FieldValue::Number(1.5));

    let rows = form.rows(&value);
    let meta = rows.iter().find(|r| r.key == "meta").unwrap();
    assert_eq!(
        meta.control,
        Control::Readonly {
            json: "{\n  \"tags\": [\n    \"x\"\n  ]\n}".into()
        }
    );
    let extra = rows.iter().find(|r| r.key == "extra").unwrap();
    assert_eq!(extra.control, Control::Readonly { json: "1.5".into() });

    let bio = rows.iter().find(|r| r.key == "bio").unwrap();
    assert_eq!(bio.attrs.get("rows").map(String::as_str), Some("4"));
    let avatar = rows.iter().find(|r| r.key == "avatar").unwrap();
    assert_eq!(avatar.control, Control::File);
}

#[test]
fn row_ids_are_stable_per_form_and_distinct_across_forms() {
    let a = profile_form();
    let b = profile_form();
    let first = a.rows(&a.default_value());
    let again = a.rows(&a.default_value());
    let other = b.rows(&b.default_value());

    for (x, y) in first.iter().zip(&again) {
        assert_eq!(x.id, y.id);
        assert!(x.id.starts_with("randID-"));
    }
    for (x, y) in first.iter().zip(&other) {
        assert_ne!(x.id, y.id);
    }
}

#[test]
fn commit_returns_a_new_value() {
    let form = profile_form();
    let value = form.default_value();

    let next = form
        .commit(&value, "age", FieldInput::Text("41".into()))
        .unwrap()
        .unwrap();
    assert_eq!(next["age"], FieldValue::Number(41.0));
    assert_eq!(value["age"], FieldValue::Number(30.0));
    assert_eq!(next.get_index_of("age"), value.get_index_of("age"));

    let cleared = form
        .commit(&value, "age", FieldInput::Text(String::new()))
        .unwrap()
        .unwrap();
    assert_eq!(cleared["age"], FieldValue::Number(0.0));

    let junk = form
        .commit(&value, "age", FieldInput::Text("abc".into()))
        .unwrap()
        .unwrap();
    assert!(matches!(junk["age"], FieldValue::Number(n) if n.is_nan()));
}

#[test]
fn commit_adds_a_missing_key_at_the_end() {
    let form = profile_form();
    let mut value = FormValue::new();
    value.insert("name".into(), FieldValue::from("x"));
    let next = form
        .commit(&value, "admin", FieldInput::Checked(true))
        .unwrap()
        .unwrap();
    let keys: Vec<&str> = next.keys().map(String::as_str).collect();
    assert_eq!(keys, ["name", "admin"]);
}

#[test]
fn empty_file_selection_commits_nothing() {
    let form = profile_form();
    let value = form.default_value();
    assert_eq!(
        form.commit(&value, "avatar", FieldInput::Files(Vec::new())),
        Ok(None)
    );

    let picked = FileRef::new("b.jpg", 99, "image/jpeg");
    let next = form
        .commit(
            &value,
            "avatar",
            FieldInput::Files(vec![picked.clone(), FileRef::new("c", 1, "")]),
        )
        .unwrap()
        .unwrap();
    assert_eq!(next["avatar"], FieldValue::File(picked));
}

#[test]
fn commit_rejects_bad_targets() {
    let form = profile_form();
    let value = form.default_value();
    assert_eq!(
        form.commit(&value, "nope", FieldInput::Checked(true)),
        Err(FormError::UnknownField("nope".into()))
    );
    assert_eq!(
        form.commit(&value, "meta", FieldInput::Text("{}".into())),
        Err(FormError::ReadOnly("meta".into()))
    );
    assert_eq!(
        form.commit(&value, "admin", FieldInput::Text("yes".into())),
        Err(FormError::InputMismatch {
            key: "admin".into(),
            kind: FieldKind::Boolean
        })
    );
}

#[test]
fn form_value_converts_to_json_in_order() {
    let form = profile_form();
    let json = form_value_to_json(&form.default_value());
    assert_eq!(json["name"], "Ann");
    assert_eq!(json["age"], 30.0);
    assert_eq!(json["avatar"]["type"], "image/png");
}

proptest! {
    #[test]
    fn finite_numbers_survive_coercion(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        prop_assert_eq!(coerce_number(&n.to_string()), n);
    }

    #[test]
    fn integers_survive_padding(n in any::<i32>(), pad in 0usize..4) {
        let text = format!("{}{}{}", " ".repeat(pad), n, " ".repeat(pad));
        prop_assert_eq!(coerce_number(&text), f64::from(n));
    }
}
