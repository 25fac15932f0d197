use lead_aggregator::fetcher::extract_comment_tree;
use serde_json::{json, Value};

const WINDOW_START: i64 = 1_700_000_000;
const FRESH: i64 = WINDOW_START + 1_000;
const STALE: i64 = WINDOW_START - 1_000;

fn comment(id: &str, created_utc: i64, replies: Value) -> Value {
    json!({
        "kind": "t1",
        "data": {
            "id": id,
            "body": format!("body of {}", id),
            "author": "someone",
            "score": 3,
            "created_utc": created_utc,
            "replies": replies,
        }
    })
}

fn listing(children: Vec<Value>) -> Value {
    json!({ "kind": "Listing", "data": { "children": children } })
}

#[test]
fn flattens_nested_replies_depth_first() {
    let tree = vec![
        comment(
            "a",
            FRESH,
            listing(vec![comment(
                "a1",
                FRESH,
                listing(vec![comment("a1a", FRESH, json!(""))]),
            )]),
        ),
        comment("b", FRESH, json!("")),
    ];

    let comments = extract_comment_tree(&tree, WINDOW_START);
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "a1", "a1a", "b"]);
}

#[test]
fn survives_arbitrary_nesting_depth() {
    // 512 levels would overflow a recursive traversal long before Reddit
    // ever returns one; the work-list must not care.
    let mut node = comment("leaf", FRESH, json!(""));
    for level in 0..512 {
        node = comment(&format!("n{}", level), FRESH, listing(vec![node]));
    }

    let comments = extract_comment_tree(&[node], WINDOW_START);
    assert_eq!(comments.len(), 513);
    assert_eq!(comments.last().map(|c| c.id.as_str()), Some("leaf"));
}

#[test]
fn time_window_filters_each_node_independently() {
    // A stale parent still has its fresh child extracted.
    let tree = vec![comment(
        "old-parent",
        STALE,
        listing(vec![comment("fresh-child", FRESH, json!(""))]),
    )];

    let comments = extract_comment_tree(&tree, WINDOW_START);
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["fresh-child"]);
}

#[test]
fn boundary_timestamp_is_included() {
    let tree = vec![comment("edge", WINDOW_START, json!(""))];
    assert_eq!(extract_comment_tree(&tree, WINDOW_START).len(), 1);
}

#[test]
fn skips_continuation_stubs_and_malformed_nodes() {
    let tree = vec![
        json!({ "kind": "more", "data": { "count": 12, "children": ["abc"] } }),
        json!({ "kind": "t1" }),
        json!({ "no_kind": true }),
        comment("real", FRESH, json!("")),
    ];

    let comments = extract_comment_tree(&tree, WINDOW_START);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, "real");
    assert_eq!(comments[0].body, "body of real");
    assert_eq!(comments[0].score, 3);
}

#[test]
fn missing_fields_default_rather_than_fail() {
    let tree = vec![json!({
        "kind": "t1",
        "data": { "created_utc": FRESH }
    })];

    let comments = extract_comment_tree(&tree, WINDOW_START);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id, "");
    assert_eq!(comments[0].body, "");
    assert_eq!(comments[0].score, 0);
}

#[test]
fn empty_input_yields_empty_output() {
    assert!(extract_comment_tree(&[], WINDOW_START).is_empty());
}
