use custver::{Config, Host, Outcome};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

const NESTED: &str = "\
.. custver:: client in ('A', 'B')

   For A and B.

   .. custver:: client == 'B'

      Only B.

   Back to A and B.
";

fn build(client: Value) -> (String, Vec<Outcome>) {
    let built = Host::with_custver(Config::new().with_value("client", client)).build("n.rst", NESTED);
    let outcomes = built.resolutions[0]
        .markers
        .iter()
        .map(|m| m.outcome.clone())
        .collect();
    (built.output, outcomes)
}

#[test]
fn test_inner_marker_resolved_after_outer_is_spliced() {
    let (out, outcomes) = build(json!("B"));
    assert_eq!(out, "For A and B.\n\nOnly B.\n\nBack to A and B.\n");
    assert_eq!(outcomes, vec![Outcome::Kept, Outcome::Kept]);

    let (out, outcomes) = build(json!("A"));
    assert_eq!(out, "For A and B.\n\nBack to A and B.\n");
    assert_eq!(outcomes, vec![Outcome::Kept, Outcome::Dropped]);
}

#[test]
fn test_inner_marker_discarded_with_outer() {
    let (out, outcomes) = build(json!("C"));
    assert_eq!(out, "");
    assert_eq!(outcomes, vec![Outcome::Dropped, Outcome::Discarded]);
}

#[test]
fn test_nested_preview_annotates_both_levels() {
    let (out, outcomes) = build(Value::Null);
    assert_eq!(
        out,
        "\
:sub:`client in ('A', 'B')`

For A and B.

:sub:`client == 'B'`

Only B.

Back to A and B.
"
    );
    assert_eq!(outcomes, vec![Outcome::Annotated, Outcome::Annotated]);
}

#[test]
fn test_kept_content_stays_inside_surrounding_directive() {
    let src = "\
.. note::

   .. custver:: client == 'A'

      Inside the note.

   Also in the note.
";
    let out = Host::with_custver(Config::new().with_value("client", json!("A")))
        .build("d.rst", src)
        .output;
    assert_eq!(out, ".. note::\n\n   Inside the note.\n\n   Also in the note.\n");
}
