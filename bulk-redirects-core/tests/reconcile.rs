use bulk_redirects_core::contract::RuleEntry;
use bulk_redirects_core::matcher::rule_in_list;
use bulk_redirects_core::reconcile::diff;

fn rule(path: &str) -> RuleEntry {
    RuleEntry {
        source_url: format!("https://www.example.com{path}"),
        target_url: "https://www.example.com/home".to_string(),
        status_code: 301,
    }
}

#[test]
fn diff_of_identical_lists_is_empty() {
    let list = vec![rule("/a"), rule("/b"), rule("/c")];
    let changes = diff(&list, &list);
    assert!(changes.added.is_empty());
    assert!(changes.removed.is_empty());
    assert!(changes.is_empty());
}

#[test]
fn diff_reports_added_and_removed() {
    let (a, b, c) = (rule("/a"), rule("/b"), rule("/c"));
    let changes = diff(&[a.clone(), b.clone()], &[b, c.clone()]);
    assert_eq!(changes.added, vec![a]);
    assert_eq!(changes.removed, vec![c]);
}

#[test]
fn status_code_change_is_an_add_and_a_remove() {
    let current = rule("/a");
    let mut desired = current.clone();
    desired.status_code = 308;

    let changes = diff(&[desired.clone()], &[current.clone()]);
    assert_eq!(changes.added, vec![desired]);
    assert_eq!(changes.removed, vec![current]);
}

#[test]
fn diff_matches_linear_definition() {
    let desired = vec![rule("/a"), rule("/b"), rule("/a"), rule("/d")];
    let current = vec![rule("/d"), rule("/e"), rule("/b")];

    let changes = diff(&desired, &current);
    let expected_added: Vec<_> = desired
        .iter()
        .filter(|d| !rule_in_list(d, &current))
        .cloned()
        .collect();
    let expected_removed: Vec<_> = current
        .iter()
        .filter(|c| !rule_in_list(c, &desired))
        .cloned()
        .collect();
    assert_eq!(changes.added, expected_added);
    assert_eq!(changes.removed, expected_removed);
    assert_eq!(changes.added.len(), 2, "repeats in desired are preserved");
}

#[test]
fn diff_against_empty_remote_adds_everything() {
    let desired = vec![rule("/a"), rule("/b")];
    let changes = diff(&desired, &[]);
    assert_eq!(changes.added, desired);
    assert!(changes.removed.is_empty());
}
