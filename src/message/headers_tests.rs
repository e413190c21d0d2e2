//! Tests for `HeaderMap`.

use super::HeaderMap;

#[test]
fn set_appends_new_names_in_order() {
    let mut headers = HeaderMap::new();
    headers.set("B", "2");
    headers.set("A", "1");

    let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["B", "A"]);
}

#[test]
fn set_replaces_existing_value_in_place() {
    let mut headers: HeaderMap = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
    headers.set("B", "changed");

    let pairs: Vec<_> = headers.iter().collect();
    assert_eq!(pairs, [("A", "1"), ("B", "changed"), ("C", "3")]);
}

#[test]
fn names_are_case_sensitive() {
    let mut headers = HeaderMap::new();
    headers.set("Content-Type", "text/plain");

    assert_eq!(headers.get("content-type"), None);
    headers.set("content-type", "x");
    assert_eq!(headers.len(), 2);
}

#[test]
fn remove_returns_value_and_keeps_order() {
    let mut headers: HeaderMap = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();

    assert_eq!(headers.remove("B").as_deref(), Some("2"));
    assert_eq!(headers.remove("B"), None);

    let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["A", "C"]);
}

#[test]
fn clear_empties_the_list() {
    let mut headers: HeaderMap = [("A", "1")].into_iter().collect();
    headers.clear();

    assert!(headers.is_empty());
    assert!(!headers.contains("A"));
}
