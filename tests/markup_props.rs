//! Property tests: the final rendered document must not depend on how the
//! fragment stream was chunked.

use pokemood::markup::parse_markup;
use pokemood::reconcile::Document;
use proptest::prelude::*;

fn render_incremental(fragments: &[String]) -> (String, String) {
    let mut doc = Document::new();
    let mut accumulator = String::new();
    for fragment in fragments {
        accumulator.push_str(fragment);
        doc.apply_markup(&parse_markup(&accumulator));
    }
    (doc.to_html(), doc.text())
}

fn render_one_shot(full: &str) -> (String, String) {
    let mut doc = Document::new();
    doc.apply_markup(&parse_markup(full));
    (doc.to_html(), doc.text())
}

fn md_fragment() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "# A team for you\n\n",
        "Hello there. ",
        "**bold** ",
        "*gentle* ",
        "\n\n",
        "1. Pikachu: zappy\n",
        "- a list entry\n",
        "<pokemon-card pokemon-name=\"pikachu\"></pokemon-card>",
        "<pokemon-card pokemon-na",
        "me=\"eevee\"></pokemon-card>",
        "`quick attack` ",
        "plain text with a < sign ",
    ])
    .prop_map(str::to_string)
}

proptest! {
    #[test]
    fn chunk_boundary_independence_arbitrary(
        fragments in prop::collection::vec(".*", 0..8)
    ) {
        let full: String = fragments.concat();
        prop_assert_eq!(render_incremental(&fragments), render_one_shot(&full));
    }

    #[test]
    fn chunk_boundary_independence_markdownish(
        fragments in prop::collection::vec(md_fragment(), 1..12)
    ) {
        let full: String = fragments.concat();
        prop_assert_eq!(render_incremental(&fragments), render_one_shot(&full));
    }

    #[test]
    fn reparsing_same_accumulator_is_stable(source in ".*") {
        let mut doc = Document::new();
        doc.apply_markup(&parse_markup(&source));
        let first = doc.to_html();
        doc.apply_markup(&parse_markup(&source));
        prop_assert_eq!(first, doc.to_html());
    }
}
