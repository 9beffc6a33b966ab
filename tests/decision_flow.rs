use compendium::choice::ChoiceModel;
use serde_json::{json, Value};

fn placeholders(ids: &[&str]) -> Vec<Value> {
    ids.iter().map(|id| json!({"id": id, "name": id, "type": "placeholder"})).collect()
}

fn model(ids: &[&str], structure: Value) -> ChoiceModel {
    ChoiceModel::from_value(json!({"options": placeholders(ids), "structure": structure})).unwrap()
}

#[test]
fn or_choice_invalidates_siblings() {
    let model = model(&["A", "B", "C"], json!({"id": "root", "type": "or", "options": [
        {"type": "option", "id": "A"}, {"type": "option", "id": "B"}, {"type": "option", "id": "C"}]}));
    let mut decision = model.decision();
    assert!(decision.selection().is_empty(), "OR leaves start unchosen");

    assert!(decision.toggle("A"));
    assert!(decision.is_chosen("A"));
    for id in ["B", "C"] {
        assert!(decision.is_invalid(id));
        assert!(!decision.is_chosen(id));
    }

    assert!(decision.toggle("A"));
    for id in ["A", "B", "C"] {
        assert!(!decision.is_invalid(id));
        assert!(!decision.is_chosen(id), "{id} is not re-chosen");
    }
}

#[test]
fn and_choice_moves_in_lockstep() {
    let model = model(&["A", "B"], json!({"id": "root", "type": "and", "options": [
        {"type": "option", "id": "A"}, {"type": "option", "id": "B"}]}));
    let mut decision = model.decision();
    assert!(decision.is_chosen("A") && decision.is_chosen("B"));

    decision.toggle("A");
    assert!(!decision.is_chosen("A"));
    assert!(!decision.is_chosen("B"));

    decision.toggle("B");
    assert_eq!(decision.selection(), vec!["A".to_string(), "B".to_string()]);
}

#[test]
fn single_option_is_chosen_outright() {
    let model = model(&["A"], json!({"id": "root", "type": "or", "options": [{"type": "option", "id": "A"}]}));
    let decision = model.decision();
    assert!(decision.is_chosen("A"));
    assert_eq!(decision.selection(), vec!["A".to_string()]);
}

#[test]
fn mixed_tree_walkthrough() {
    // Sword OR (Shield, Buckler)
    let model = model(&["sword", "shield", "buckler"], json!({"id": "root", "type": "or", "options": [
        {"type": "option", "id": "sword"},
        {"type": "and", "id": "pair", "options": [
            {"type": "option", "id": "shield"}, {"type": "option", "id": "buckler"}]}]}));
    let mut decision = model.decision();
    assert!(decision.selection().is_empty());

    decision.toggle("shield");
    assert_eq!(decision.selection(), vec!["shield".to_string(), "buckler".to_string()]);
    assert!(!decision.is_invalid("sword"), "AND toggles leave the outer OR alone");

    decision.toggle("sword");
    assert!(decision.is_invalid("shield") && decision.is_invalid("buckler"));
    assert_eq!(decision.selection(), vec!["sword".to_string()]);

    let compiled = serde_json::to_value(decision.tree()).unwrap();
    assert_eq!(compiled["options"][0]["content"]["name"], "sword");
    assert_eq!(compiled["options"][1]["options"][0]["invalid"], true);
}
