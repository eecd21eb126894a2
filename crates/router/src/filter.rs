//! Start-word content filter.
//!
//! Backends configured with start-words only receive messages that begin
//! with one of them; backends without start-words are catch-alls that
//! receive whatever no filtered backend claimed. When no backend has
//! start-words at all, filtering is off and every backend gets everything.

use crate::router::BackendRegistration;

/// Select the backends that should receive a note for `text`.
///
/// Pure and order-preserving. Matching is a case-insensitive prefix test on
/// the trimmed text, so `"todo"` also matches `"todolist"`. An empty result
/// means the message is not stored anywhere.
pub fn select_targets<'a>(
    text: &str,
    registrations: &'a [BackendRegistration],
) -> Vec<&'a BackendRegistration> {
    let (filtered, catch_all): (Vec<_>, Vec<_>) = registrations
        .iter()
        .partition(|r| !r.start_words.is_empty());

    if filtered.is_empty() {
        return registrations.iter().collect();
    }

    let normalized = text.trim().to_lowercase();
    let matched: Vec<_> = filtered
        .into_iter()
        .filter(|r| starts_with_any(&normalized, &r.start_words))
        .collect();

    if matched.is_empty() { catch_all } else { matched }
}

fn starts_with_any(normalized: &str, start_words: &[String]) -> bool {
    start_words
        .iter()
        .any(|word| normalized.starts_with(&word.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notebridge_core::{BackendError, NoteBackend};
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait]
    impl NoteBackend for Named {
        fn name(&self) -> &str {
            self.0
        }
        async fn create_note(&self, _text: &str) -> Result<(), BackendError> {
            Ok(())
        }
        async fn get_undone_note_titles(&self) -> Result<Vec<String>, BackendError> {
            Ok(vec![])
        }
    }

    fn reg(name: &'static str, start_words: &[&str]) -> BackendRegistration {
        BackendRegistration {
            backend: Arc::new(Named(name)),
            delete_done_notes: false,
            start_words: start_words.iter().map(|w| w.to_string()).collect(),
        }
    }

    fn names(selected: &[&BackendRegistration]) -> Vec<String> {
        selected.iter().map(|r| r.backend.name().to_string()).collect()
    }

    #[test]
    fn no_start_words_selects_everything_in_order() {
        let table = vec![reg("a", &[]), reg("b", &[]), reg("c", &[])];
        for text in ["", "hello", "  TODO x "] {
            assert_eq!(names(&select_targets(text, &table)), vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn matching_start_word_selects_filtered_backend() {
        let table = vec![reg("a", &["todo"]), reg("b", &[])];
        assert_eq!(names(&select_targets("TODO buy milk", &table)), vec!["a"]);
    }

    #[test]
    fn unmatched_text_falls_back_to_catch_all() {
        let table = vec![reg("a", &["todo"]), reg("b", &[])];
        assert_eq!(names(&select_targets("random text", &table)), vec!["b"]);
    }

    #[test]
    fn unmatched_text_without_catch_all_selects_nothing() {
        let table = vec![reg("a", &["todo"])];
        assert!(select_targets("random text", &table).is_empty());
    }

    #[test]
    fn prefix_match_ignores_token_boundaries() {
        let table = vec![reg("a", &["todo"]), reg("b", &[])];
        assert_eq!(
            names(&select_targets("todolist needs doing", &table)),
            vec!["a"]
        );
    }

    #[test]
    fn leading_whitespace_is_trimmed() {
        let table = vec![reg("a", &["Note:"]), reg("b", &[])];
        assert_eq!(names(&select_targets("   note: call mom", &table)), vec!["a"]);
    }

    #[test]
    fn start_word_must_be_a_prefix() {
        let table = vec![reg("a", &["todo"]), reg("b", &[])];
        assert_eq!(names(&select_targets("my todo list", &table)), vec!["b"]);
    }

    #[test]
    fn several_filtered_backends_can_match() {
        let table = vec![
            reg("work", &["todo", "work"]),
            reg("misc", &[]),
            reg("home", &["todo"]),
            reg("shop", &["buy"]),
        ];
        assert_eq!(
            names(&select_targets("Todo: fix sink", &table)),
            vec!["work", "home"]
        );
    }

    #[test]
    fn case_insensitive_for_non_ascii() {
        let table = vec![reg("ru", &["Заметка"]), reg("rest", &[])];
        assert_eq!(names(&select_targets("ЗАМЕТКА купить хлеб", &table)), vec!["ru"]);
    }

    #[test]
    fn end_to_end_scenario() {
        let table = vec![reg("x", &[]), reg("y", &["note:"])];
        assert_eq!(names(&select_targets("note: buy milk", &table)), vec!["y"]);
        assert_eq!(names(&select_targets("hello", &table)), vec!["x"]);
    }
}
