//! Property tests for command-line templating.

use proptest::prelude::*;
use supersast_domain::{render_template, tokenize};

fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ./_-]{0,24}"
}

proptest! {
    #[test]
    fn text_without_braces_is_unchanged(text in plain_text()) {
        let out = render_template(&text, &[("args", "x")]).unwrap();
        prop_assert_eq!(out, text);
    }

    #[test]
    fn placeholder_is_replaced_verbatim(
        prefix in plain_text(),
        value in "[a-z{}]{0,12}",
        suffix in plain_text(),
    ) {
        let template = format!("{prefix}{{args}}{suffix}");
        let out = render_template(&template, &[("args", value.as_str())]).unwrap();
        prop_assert_eq!(out, format!("{prefix}{value}{suffix}"));
    }

    #[test]
    fn doubled_braces_become_single(inner in "[a-z_]{0,10}") {
        let template = format!("{{{{{inner}}}}}");
        let out = render_template(&template, &[]).unwrap();
        prop_assert_eq!(out, format!("{{{inner}}}"));
    }

    #[test]
    fn single_quoted_words_survive_tokenizing(
        words in prop::collection::vec("[a-z =./-]{1,10}", 1..5)
    ) {
        let line = words
            .iter()
            .map(|w| format!("'{w}'"))
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(tokenize(&line).unwrap(), words);
    }
}
