use kpiwidget::aggregate::Comparison;
use kpiwidget::models::{Column, Payload, SelectionEvent, Value};
use kpiwidget::{Kpi, Severity};

#[test]
fn full_payload_decodes() {
    let p = Payload::from_json(
        r#"{
            "data": [1, "2", null],
            "group1_filter": [true, false, 1],
            "group2_filter": [false, true, 0],
            "key": ["1", "2", "3"],
            "settings": {
                "kpi": "distinctCount",
                "comparison": "ratio",
                "prefix": "",
                "suffix": "x",
                "big_mark": ",",
                "decimals": 1,
                "crosstalk_group": "grp"
            }
        }"#,
    )
    .unwrap();
    let out = p.decode();
    assert!(out.diagnostics.is_empty());
    let input = out.value;
    assert_eq!(input.data, vec![Value::from(1), Value::from("2"), Value::Null]);
    assert_eq!(input.group1, vec![true, false, true]);
    assert_eq!(input.group2, vec![false, true, false]);
    assert_eq!(input.keys.len(), 3);
    assert_eq!(input.config.kpi, Kpi::DistinctCount);
    assert_eq!(input.config.comparison, Some(Comparison::Ratio));
    assert_eq!(input.config.format.decimals, 1);
    assert_eq!(input.config.filter_group.as_deref(), Some("grp"));
}

#[test]
fn json_encoded_data_and_key_are_decoded() {
    let p = Payload::from_json(r#"{"data":"[3, 4.5]","key":"[\"a\",\"b\"]"}"#).unwrap();
    let input = p.decode().value;
    assert_eq!(input.data, vec![Value::Number(3.0), Value::Number(4.5)]);
    assert_eq!(input.keys, vec![Value::from("a"), Value::from("b")]);
}

#[test]
fn unparsable_string_column_is_kept_as_one_text_value() {
    let p = Payload::from_json(r#"{"data":"[1, 2","settings":{"kpi":"sum"}}"#).unwrap();
    let out = p.decode();
    assert_eq!(out.value.data, vec![Value::from("[1, 2")]);
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].severity, Severity::Error);
    assert!(out.diagnostics[0].message.contains("data"));
}

#[test]
fn plain_string_scalar_counts_as_one_row() {
    let p = Payload::from_json(r#"{"data":"abc","settings":{"kpi":"count"}}"#).unwrap();
    let out = p.decode();
    assert_eq!(out.value.data, vec![Value::from("abc")]);
    assert_eq!(Kpi::Count.apply(&out.value.data), 1.0);
}

#[test]
fn nested_column_shape_is_reported_not_fatal() {
    let p = Payload::from_json(r#"{"data":{"a":1},"settings":{"kpi":"count"}}"#).unwrap();
    let out = p.decode();
    assert!(out.value.data.is_empty());
    assert_eq!(out.diagnostics[0].severity, Severity::Error);
    assert!(out.diagnostics[0].message.contains("unsupported shape for data"));
}

#[test]
fn wrong_typed_settings_degrade_with_warnings() {
    let p = Payload::from_json(r#"{"data":[1],"settings":{"kpi":"sum","decimals":"two"}}"#)
        .unwrap();
    let out = p.decode();
    assert_eq!(out.value.config.kpi, Kpi::Sum);
    assert_eq!(out.value.config.format.decimals, 0);
    assert_eq!(out.diagnostics.len(), 1);
    assert_eq!(out.diagnostics[0].severity, Severity::Warning);
    assert!(out.diagnostics[0].message.contains("decimals"));

    let p = Payload::from_json(r#"{"settings":{"kpi":"sum","prefix":5}}"#).unwrap();
    let out = p.decode();
    assert_eq!(out.value.config.format.prefix, "");
    assert!(out.diagnostics[0].message.contains("prefix"));

    let p = Payload::from_json(r#"{"settings":{"kpi":"sum","crosstalk_group":7}}"#).unwrap();
    let out = p.decode();
    assert_eq!(out.value.config.filter_group, None);
    assert!(out.has_warnings());
}

#[test]
fn non_object_settings_fall_back_to_defaults() {
    let out = Payload::from_json(r#"{"data":[1,2],"settings":"sum"}"#).unwrap().decode();
    assert_eq!(out.value.config.kpi, Kpi::Count);
    assert!(out.diagnostics.iter().any(|d| d.message.contains("ignoring settings")));
}

#[test]
fn unboxed_scalar_column() {
    let p = Payload::from_json(r#"{"data":42,"group1_filter":true}"#).unwrap();
    assert_eq!(p.data, Some(Column::Scalar(Value::Number(42.0))));
    let input = p.decode().value;
    assert_eq!(input.data, vec![Value::Number(42.0)]);
    assert_eq!(input.group1, vec![true]);
}

#[test]
fn missing_settings_use_defaults() {
    let out = Payload::from_json(r#"{"data":[1]}"#).unwrap().decode();
    let cfg = out.value.config;
    assert_eq!(cfg.kpi, Kpi::Count);
    assert_eq!(cfg.comparison, None);
    assert_eq!(cfg.format.big_mark, " ");
    // missing kpi name is reported like any unknown name
    assert_eq!(out.diagnostics.len(), 1);
}

#[test]
fn comparison_false_means_plain_mode() {
    let p = Payload::from_json(r#"{"settings":{"kpi":"sum","comparison":false}}"#).unwrap();
    let out = p.decode();
    assert_eq!(out.value.config.comparison, None);
    assert!(out.diagnostics.is_empty());
}

#[test]
fn malformed_payload_is_a_hard_error() {
    let err = Payload::from_json("{not json").unwrap_err();
    assert!(err.to_string().starts_with("could not decode payload"));
}

#[test]
fn selection_event_wire_shapes() {
    let ev = SelectionEvent::from_json(r#"{"group":"g","value":["1","3"]}"#).unwrap();
    assert_eq!(ev.group.as_deref(), Some("g"));
    assert!(ev.is_filter());

    let ev = SelectionEvent::from_json("[2, 3]").unwrap();
    assert_eq!(ev.value, Some(vec![Value::from(2), Value::from(3)]));

    assert!(!SelectionEvent::from_json("null").unwrap().is_filter());
    assert!(!SelectionEvent::from_json(r#"{"value":null}"#).unwrap().is_filter());
    assert!(!SelectionEvent::from_json("[]").unwrap().is_filter());
    assert!(SelectionEvent::from_json("{oops").is_err());
}
