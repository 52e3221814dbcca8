//! Context assembly from retrieved documents

use crate::types::Document;

/// Provenance marker that starts every document in a context block
pub const SOURCE_MARKER: &str = ">>> From: ";

/// Format a single document as `>>> From: {id}\n{content}`
pub fn format_document(document: &Document) -> String {
    format!("{}{}\n{}", SOURCE_MARKER, document.id, document.content)
}

/// Join documents in input order, separated by a newline
///
/// An empty set yields an empty string.
pub fn assemble_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(format_document)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recover the source ids from a context block, in order
pub fn source_ids(context: &str) -> Vec<&str> {
    context
        .lines()
        .filter_map(|line| line.strip_prefix(SOURCE_MARKER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_set_is_empty_context() {
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn test_single_document() {
        let docs = vec![Document::new("doc1", "Jane Doe is CEO.")];
        assert_eq!(assemble_context(&docs), ">>> From: doc1\nJane Doe is CEO.");
    }

    #[test]
    fn test_order_preserved() {
        let docs = vec![Document::new("b", "second"), Document::new("a", "first")];
        let context = assemble_context(&docs);
        assert_eq!(context, ">>> From: b\nsecond\n>>> From: a\nfirst");
        assert_eq!(source_ids(&context), vec!["b", "a"]);
    }

    #[test]
    fn test_duplicates_kept() {
        let doc = Document::new("same", "text");
        let context = assemble_context(&[doc.clone(), doc]);
        assert_eq!(source_ids(&context), vec!["same", "same"]);
    }

    fn document() -> impl Strategy<Value = Document> {
        ("[a-z0-9_-]{1,12}", "[^\n]{0,40}").prop_map(|(id, content)| Document::new(id, content))
    }

    proptest! {
        #[test]
        fn prop_join_is_order_preserving_fold(docs in prop::collection::vec(document(), 0..8)) {
            let expected = docs
                .iter()
                .map(|d| assemble_context(std::slice::from_ref(d)))
                .collect::<Vec<_>>()
                .join("\n");
            prop_assert_eq!(assemble_context(&docs), expected);
        }

        #[test]
        fn prop_concatenation_splits(a in prop::collection::vec(document(), 1..4), b in prop::collection::vec(document(), 1..4)) {
            let mut all = a.clone();
            all.extend(b.iter().cloned());
            prop_assert_eq!(
                assemble_context(&all),
                format!("{}\n{}", assemble_context(&a), assemble_context(&b))
            );
        }
    }
}
