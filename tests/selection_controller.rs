use kpiwidget::controller::{SelectionController, SelectionState};
use kpiwidget::models::{Payload, SelectionEvent, Value};
use kpiwidget::Severity;

fn payload(json: &str) -> Payload {
    Payload::from_json(json).unwrap()
}

fn widget(json: &str) -> SelectionController<Vec<String>> {
    let mut w = SelectionController::new(Vec::new());
    w.initialize(payload(json));
    w
}

#[test]
fn initial_render_goes_to_sink() {
    let w = widget(r#"{"data":[1000,2000,500],"settings":{"kpi":"sum"}}"#);
    assert_eq!(w.state(), SelectionState::Full);
    assert_eq!(w.display(), "3 500");
    assert_eq!(w.sink(), &["3 500"]);
}

#[test]
fn selection_round_trip_restores_baseline() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum"}}"#);

    let r = w.on_selection_event(&SelectionEvent::select([2, 3])).unwrap();
    assert_eq!(r.state, SelectionState::Filtered);
    assert_eq!(r.rows, 2);
    assert_eq!(r.value, 50.0);

    let r = w.on_selection_event(&SelectionEvent::clear()).unwrap();
    assert_eq!(r.state, SelectionState::Full);
    assert_eq!(r.value, 60.0);
    assert_eq!(w.baseline().data, vec![Value::from(10), Value::from(20), Value::from(30)]);
    assert_eq!(w.sink(), &["60", "50", "60"]);
}

#[test]
fn events_replace_rather_than_merge() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum"}}"#);
    w.on_selection_event(&SelectionEvent::select([1]));
    let r = w.on_selection_event(&SelectionEvent::select([3])).unwrap();
    assert_eq!(r.value, 30.0);
    assert_eq!(w.state(), SelectionState::Filtered);
}

#[test]
fn empty_id_list_clears_the_filter() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum"}}"#);
    w.on_selection_event(&SelectionEvent::select([1]));
    let r = w.on_selection_event(&SelectionEvent::select(Vec::<i32>::new())).unwrap();
    assert_eq!(r.state, SelectionState::Full);
    assert_eq!(r.value, 60.0);
}

#[test]
fn duplicate_ids_give_duplicate_rows_in_order() {
    let mut w = widget(r#"{"data":["a","b","c"],"settings":{"kpi":"duplicates"}}"#);
    let r = w.on_selection_event(&SelectionEvent::select(["2", "2", "3"])).unwrap();
    assert_eq!(r.rows, 3);
    assert_eq!(r.value, 1.0);
}

#[test]
fn out_of_range_ids_are_skipped_with_warning() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum"}}"#);
    let r = w.on_selection_event(&SelectionEvent::select([0, 2, 9])).unwrap();
    assert_eq!(r.value, 20.0);
    assert_eq!(r.diagnostics.len(), 1);
    assert_eq!(r.diagnostics[0].severity, Severity::Warning);

    // every id bad: still filtered, over nothing
    let r = w.on_selection_event(&SelectionEvent::select([99])).unwrap();
    assert_eq!(r.state, SelectionState::Filtered);
    assert_eq!(r.rows, 0);
    assert_eq!(r.text, "0");
}

#[test]
fn comparison_mode_filters_masks_alongside_data() {
    let mut w = widget(
        r#"{
            "data": [1, 1, 1, 1],
            "group1_filter": [true, true, false, false],
            "group2_filter": [true, true, true, true],
            "settings": {"kpi": "sum", "comparison": "share", "suffix": "%"}
        }"#,
    );
    assert_eq!(w.display(), "50%");

    let r = w.on_selection_event(&SelectionEvent::select([1, 3, 4])).unwrap();
    // group1 = [1], group2 = [1,1,1]
    assert_eq!(r.text, "33%");

    let r = w.on_selection_event(&SelectionEvent::select([3, 4])).unwrap();
    assert_eq!(r.text, "0%");
}

#[test]
fn comparison_without_data_counts_rows() {
    let w = widget(
        r#"{
            "data": [],
            "group1_filter": [true, false, true, false],
            "group2_filter": [true, true, true, true],
            "settings": {"kpi": "count", "comparison": "ratio", "decimals": 2}
        }"#,
    );
    assert_eq!(w.display(), "0.50");
    assert_eq!(w.baseline().len(), 4);
    assert!(w.last_diagnostics().iter().any(|d| d.message.contains("defaulting to counts")));
}

#[test]
fn comparison_without_any_rows_renders_zero() {
    let w = widget(
        r#"{
            "data": [],
            "group1_filter": [],
            "group2_filter": [],
            "settings": {"kpi": "count", "comparison": "ratio"}
        }"#,
    );
    assert_eq!(w.display(), "0");
    assert!(w.baseline().is_empty());
    let warning = w
        .last_diagnostics()
        .iter()
        .find(|d| d.message.contains("defaulting to counts"))
        .unwrap();
    assert_eq!(warning.severity, Severity::Warning);
}

#[test]
fn key_length_mismatch_is_reported() {
    let w = widget(r#"{"data":[1,2],"key":["a"],"settings":{"kpi":"sum"}}"#);
    assert_eq!(w.display(), "3");
    assert_eq!(w.keys(), &[Value::from("a")]);
    assert!(
        w.last_diagnostics()
            .iter()
            .any(|d| d.severity == Severity::Warning
                && d.message.contains("key has 1 entries but data has 2"))
    );
}

#[test]
fn unparsable_string_data_is_counted_as_one_row() {
    let w = widget(r#"{"data":"abc","settings":{"kpi":"count"}}"#);
    assert_eq!(w.display(), "1");
    assert!(w.last_diagnostics().iter().any(|d| d.severity == Severity::Error));
}

#[test]
fn events_for_other_groups_are_ignored() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum","crosstalk_group":"sales"}}"#);
    assert_eq!(w.filter_group(), Some("sales"));

    let ignored = w.on_selection_event(&SelectionEvent::select([1]).in_group("other"));
    assert!(ignored.is_none());
    assert_eq!(w.display(), "60");
    assert_eq!(w.sink().len(), 1);

    let r = w.on_selection_event(&SelectionEvent::select([1]).in_group("sales")).unwrap();
    assert_eq!(r.value, 10.0);
}

#[test]
fn reinitialize_replaces_baseline_and_resets_state() {
    let mut w = widget(r#"{"data":[10,20,30],"settings":{"kpi":"sum"}}"#);
    w.on_selection_event(&SelectionEvent::select([1]));
    let r = w.initialize(payload(r#"{"data":[5,5],"key":["a","b"],"settings":{"kpi":"mean"}}"#));
    assert_eq!(r.state, SelectionState::Full);
    assert_eq!(r.value, 5.0);
    assert_eq!(w.keys(), &[Value::from("a"), Value::from("b")]);
}

#[test]
fn unknown_kpi_and_comparison_do_not_break_rendering() {
    let w = widget(r#"{"data":[1,2,3],"settings":{"kpi":"median","comparison":"diff"}}"#);
    assert_eq!(w.display(), "3");
    assert_eq!(w.last_diagnostics().len(), 2);
}
