use custver::{Config, Host, Outcome};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Expressions with their truth value for `client = 'A'`, `release = 3`.
const EXPRS: &[(&str, bool)] = &[
    ("client == 'A'", true),
    ("client in ('B', 'C')", false),
    ("True", true),
    ("builder == 'html' and release >= 3", true),
    ("release > 5 or client is None", false),
    ("client not in ('Company B')", true),
];

#[derive(Debug, Clone)]
enum Block {
    Text,
    Cond(usize, Vec<Block>),
}

fn block() -> impl Strategy<Value = Block> {
    Just(Block::Text).prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            Just(Block::Text),
            (0..EXPRS.len(), prop::collection::vec(inner, 0..4))
                .prop_map(|(e, body)| Block::Cond(e, body)),
        ]
    })
}

fn document() -> impl Strategy<Value = Vec<Block>> {
    prop::collection::vec(block(), 0..6)
}

struct Source {
    text: String,
    /// Every word with whether it survives for client 'A'.
    words: Vec<(String, bool)>,
    markers: usize,
}

fn emit(blocks: &[Block], indent: usize, visible: bool, src: &mut Source) {
    let pad = " ".repeat(indent);
    for b in blocks {
        match b {
            Block::Text => {
                let word = format!("w{}.", src.words.len());
                src.text.push_str(&format!("{pad}{word}\n\n"));
                src.words.push((word, visible));
            }
            Block::Cond(e, body) => {
                let (expr, truth) = EXPRS[*e];
                src.markers += 1;
                src.text.push_str(&format!("{pad}.. custver:: {expr}\n\n"));
                emit(body, indent + 3, visible && truth, src);
            }
        }
    }
}

fn source(blocks: &[Block]) -> Source {
    let mut src = Source {
        text: String::new(),
        words: Vec::new(),
        markers: 0,
    };
    emit(blocks, 0, true, &mut src);
    src
}

fn host(client: Value) -> Host {
    Host::with_custver(
        Config::new()
            .with_value("client", client)
            .with_value("release", json!(3)),
    )
}

proptest! {
    #[test]
    fn selected_content_matches_conditions(blocks in document()) {
        let src = source(&blocks);
        let built = host(json!("A")).build("p.rst", &src.text);
        for (word, visible) in &src.words {
            prop_assert_eq!(built.output.contains(word.as_str()), *visible, "word {} in:\n{}", word, built.output);
        }
        prop_assert!(!built.output.contains(".. custver::"));
        prop_assert_eq!(built.resolutions[0].markers.len(), src.markers);
        prop_assert_eq!(built.resolutions[0].failures().count(), 0);
    }

    #[test]
    fn preview_keeps_everything(blocks in document()) {
        let src = source(&blocks);
        let built = host(Value::Null).build("p.rst", &src.text);
        for (word, _) in &src.words {
            prop_assert!(built.output.contains(word.as_str()));
        }
        let annotated = built.resolutions[0].count(|o| *o == Outcome::Annotated);
        prop_assert_eq!(annotated, src.markers);
        for report in &built.resolutions[0].markers {
            let annotation = format!(":sub:`{}`", report.expression);
            prop_assert!(built.output.contains(&annotation));
        }
    }

    #[test]
    fn resolving_again_is_a_no_op(blocks in document()) {
        let src = source(&blocks);
        let host = host(json!("A"));
        let once = host.build("p.rst", &src.text);
        let twice = host.build("p.rst", &once.output);
        prop_assert_eq!(&once.output, &twice.output);
        prop_assert!(twice.resolutions[0].markers.is_empty());
    }
}
