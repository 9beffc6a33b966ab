use std::sync::{Arc, Mutex};

use compendium::filter::{perform_check, unique_keys, Filter, FilterEngine};
use compendium::CompendiumError;
use serde_json::{json, Value};

fn records() -> Vec<Value> {
    vec![
        json!({"name": "Fireball", "type": "spell", "system": {"level": 3, "tags": ["fire", "area"]}}),
        json!({"name": "Longsword", "type": "weapon", "system": {"damage": 8, "tags": ["martial"]}}),
        json!({"name": "Frost Ray", "type": "spell", "system": {"level": 1, "tags": ["cold"]}}),
        json!({"name": null, "type": "trapping"}),
    ]
}

fn leaves() -> Vec<Value> {
    vec![
        json!({"key": "type", "value": "spell"}),
        json!({"key": "system.level", "value": 2, "operator": "gte"}),
        json!({"key": "system.tags", "value": "fire", "operator": "has"}),
        json!({"key": "name", "value": "ray", "operator": "icontains"}),
    ]
}

fn check(record: &Value, filter: Value) -> bool {
    perform_check(record, &filter).expect("well formed filter")
}

#[test]
fn single_element_sequence_equals_its_element() {
    for record in &records() {
        for leaf in leaves() {
            assert_eq!(check(record, json!([leaf.clone()])), check(record, leaf));
        }
    }
}

#[test]
fn empty_and_is_true_empty_or_is_false() {
    let record = &records()[0];
    assert!(check(record, json!({"operator": "AND", "value": []})));
    assert!(!check(record, json!({"operator": "OR", "value": []})));
    assert!(!check(record, json!({"operator": "XOR", "value": []})));
    assert!(check(record, json!([])), "an empty sequence passes everything");
}

#[test]
fn negations_are_dual() {
    let sequences = [
        vec![leaves()[0].clone(), leaves()[1].clone()],
        vec![leaves()[2].clone(), leaves()[3].clone()],
        vec![],
    ];
    for record in &records() {
        for leaf in leaves() {
            assert_eq!(check(record, json!({"operator": "NOT", "value": leaf.clone()})), !check(record, leaf));
        }
        for seq in &sequences {
            let and = check(record, json!({"operator": "AND", "value": seq}));
            let or = check(record, json!({"operator": "OR", "value": seq}));
            assert_eq!(check(record, json!({"operator": "NAND", "value": seq})), !and);
            assert_eq!(check(record, json!({"operator": "NOR", "value": seq})), !or);
        }
    }
}

#[test]
fn xor_folds_left_to_right() {
    let record = json!({"a": 1, "b": 2, "c": 3});
    let t1 = json!({"key": "a", "value": 1});
    let f = json!({"key": "b", "value": 0});
    let t2 = json!({"key": "c", "value": 3});
    assert!(!check(&record, json!({"operator": "XOR", "value": [t1, f, t2]})));
    assert!(check(&record, json!({"operator": "XOR", "value": [t1, f]})));
    assert!(check(&record, json!({"operator": "XOR", "value": [t1]})));
}

#[test]
fn unique_keys_recurse_through_connectives_only() {
    let filter = Filter::parse(&json!([
        {"key": "a", "value": 1},
        {"operator": "AND", "value": [{"key": "b", "value": 2}, {"key": "c", "value": 3}]}
    ]))
    .unwrap();
    let keys: Vec<String> = unique_keys(&[filter]).into_iter().collect();
    assert_eq!(keys, vec!["a", "b", "c"]);

    let nested = Filter::parse(&json!({"operator": "NOT", "value": {"operator": "or", "value": [
        {"key": "d", "value": 1},
        {"key": "effects", "operator": "has", "value": {"key": "inner", "value": true}}
    ]}}))
    .unwrap();
    let keys: Vec<String> = unique_keys(&[nested]).into_iter().collect();
    assert_eq!(keys, vec!["d", "effects"], "comparison operands are not filters to walk");
}

#[test]
fn unknown_operator_is_an_error_not_a_miss() {
    let record = &records()[0];
    let err = perform_check(record, &json!({"key": "name", "value": "x", "operator": "soundslike"})).unwrap_err();
    assert!(matches!(err, CompendiumError::UnknownOperator(_)));
    let err = perform_check(record, &json!([{"operator": "OR", "value": [{"key": "a", "operator": "??"}]}])).unwrap_err();
    assert!(format!("{err}").contains("Unknown operator"));
}

#[test]
fn browser_narrowing() {
    let records = records();
    let engine = FilterEngine::default();
    let spells_or_fire = Filter::parse(&json!({"operator": "or", "value": [
        {"key": "system.level", "value": 3, "operator": "gte"},
        {"key": "name", "value": ["frost", "sword"], "operator": "icontainsany"}
    ]}))
    .unwrap();
    let matched = engine.filter_records(&records, &[spells_or_fire]);
    let names: Vec<&Value> = matched.iter().map(|r| &r["name"]).collect();
    assert_eq!(names, vec!["Fireball", "Longsword", "Frost Ray"]);

    let by_type = Filter::parse(&json!({"key": "type", "value": ["weapon", "trapping"], "operator": "in"})).unwrap();
    assert_eq!(engine.filter_records(records.clone(), &[by_type]).len(), 2);
}

#[test]
fn null_fields_stringify() {
    let trapping = &records()[3];
    assert!(check(trapping, json!({"key": "name", "value": "null", "operator": "contains"})));
    assert!(!check(trapping, json!({"key": "name", "value": "null"})), "exact does not stringify");
    assert!(check(trapping, json!({"key": "missing", "value": "UNDEF", "operator": "istartswith"})));
}

type Visits = Arc<Mutex<Vec<&'static str>>>;

// A leaf that records its name each time it is evaluated.
fn visited(visits: &Visits, name: &'static str, outcome: bool) -> Filter {
    let visits = Arc::clone(visits);
    Filter::exact(name, json!(true)).with_getter(move |_| {
        visits.lock().unwrap().push(name);
        Some(json!(outcome))
    })
}

#[test]
fn sub_filters_run_left_to_right_and_stop_when_decided() {
    let visits: Visits = Arc::default();
    let engine = FilterEngine::default();
    let record = json!({});

    let and = Filter::And(vec![visited(&visits, "a", true), visited(&visits, "b", false), visited(&visits, "c", true)]);
    assert!(!engine.evaluate(&record, &and));
    assert_eq!(*visits.lock().unwrap(), ["a", "b"]);

    visits.lock().unwrap().clear();
    let or = Filter::Or(vec![visited(&visits, "d", false), visited(&visits, "e", true), visited(&visits, "f", true)]);
    assert!(engine.evaluate(&record, &or));
    assert_eq!(*visits.lock().unwrap(), ["d", "e"]);

    visits.lock().unwrap().clear();
    let xor = Filter::Xor(vec![visited(&visits, "g", true), visited(&visits, "h", true), visited(&visits, "i", false)]);
    assert!(!engine.evaluate(&record, &xor));
    assert_eq!(*visits.lock().unwrap(), ["g", "h", "i"]);

    visits.lock().unwrap().clear();
    let nand = Filter::Nand(vec![visited(&visits, "j", false), visited(&visits, "k", true)]);
    assert!(engine.evaluate(&record, &nand));
    assert_eq!(*visits.lock().unwrap(), ["j"]);
}
