//! Property-based tests for link resolution.

use folio_links::{LinkResolver, normalize_section};
use proptest::prelude::*;

fn heading_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 ]{0,30}".prop_map(String::from)
}

fn document_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

proptest! {
    #[test]
    fn anchors_have_no_spaces_or_uppercase(section in heading_strategy()) {
        let anchor = normalize_section(&section);
        prop_assert!(!anchor.contains(' '));
        prop_assert!(!anchor.chars().any(char::is_uppercase));
        prop_assert!(!anchor.contains("--"));
    }

    #[test]
    fn normalization_is_idempotent(section in heading_strategy()) {
        let once = normalize_section(&section);
        prop_assert_eq!(normalize_section(&once), once.clone());
    }

    #[test]
    fn extra_spaces_do_not_change_anchor(words in proptest::collection::vec("[a-z]{1,6}", 1..5), gap in 1usize..4) {
        let single = words.join(" ");
        let wide = words.join(&" ".repeat(gap));
        prop_assert_eq!(normalize_section(&single), normalize_section(&wide));
    }

    #[test]
    fn relative_url_shape(document in document_strategy(), section in heading_strategy()) {
        let resolver = LinkResolver::relative();
        let plain = resolver.resolve(&document, None, "label").unwrap();
        prop_assert_eq!(&plain.url, &format!("{document}.html"));

        let anchored = resolver.resolve(&document, Some(&section), "label").unwrap();
        prop_assert_eq!(anchored.url, format!("{document}.html#{}", normalize_section(&section)));
    }
}

#[test]
fn link_serializes_url_and_label() {
    let link = LinkResolver::relative()
        .resolve("foo", Some("My Section"), "see here")
        .unwrap();
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(json["url"], "foo.html#my-section");
    assert_eq!(json["label"], "see here");
}
