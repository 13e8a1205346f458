//! Search box over the forum's live thread list. Purely local: it never
//! touches the store or the subscription, it only projects the latest
//! snapshot.

use std::sync::Arc;

use crate::{
    models::ForumThread,
    sync::{Doc, Snapshot},
};

/// Case-insensitive substring match.
pub fn matches(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(&needle.to_lowercase())
}

/// Threads whose title or body contains `needle`, in their original order.
pub fn filter_threads(items: &[Doc<ForumThread>], needle: &str) -> Vec<Doc<ForumThread>> {
    let needle = needle.trim();
    items
        .iter()
        .filter(|doc| {
            needle.is_empty() || matches(&doc.data.title, needle) || matches(&doc.data.main_comment, needle)
        })
        .cloned()
        .collect()
}

/// Remembers the last projection, keyed by snapshot version and needle.
#[derive(Default)]
pub struct SearchMemo {
    key: Option<(u64, String)>,
    result: Arc<Vec<Doc<ForumThread>>>,
}

impl SearchMemo {
    pub fn project(&mut self, snapshot: &Snapshot<ForumThread>, needle: &str) -> Arc<Vec<Doc<ForumThread>>> {
        let key = (snapshot.version, needle.trim().to_owned());
        if self.key.as_ref() != Some(&key) {
            self.result = Arc::new(filter_threads(&snapshot.items, needle));
            self.key = Some(key);
        }
        Arc::clone(&self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread(id: &str, title: &str, body: &str) -> Doc<ForumThread> {
        Doc {
            id: id.into(),
            data: ForumThread {
                title: title.into(),
                main_comment: body.into(),
                image_url: None,
                author_id: None,
                author_username: None,
                created_at: None,
            },
        }
    }

    fn snapshot(version: u64) -> Snapshot<ForumThread> {
        Snapshot {
            version,
            items: Arc::new(vec![
                thread("1", "Renda Fixa Hoje", ""),
                thread("2", "Ações em Alta", ""),
                thread("3", "Dúvida sobre Renda Variável", ""),
            ]),
        }
    }

    #[test]
    fn filters_titles_case_insensitively_in_order() {
        let found = filter_threads(&snapshot(1).items, "renda");
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
    }

    #[test]
    fn non_ascii_case_folds() {
        let found = filter_threads(&snapshot(1).items, "AÇÕES");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");
    }

    #[test]
    fn bodies_match_too() {
        let items = vec![thread("a", "Pergunta", "Vale a pena o Tesouro Direto?")];
        assert_eq!(filter_threads(&items, "tesouro").len(), 1);
    }

    #[test]
    fn empty_needle_keeps_everything() {
        assert_eq!(filter_threads(&snapshot(1).items, "  ").len(), 3);
    }

    #[test]
    fn memo_recomputes_only_on_new_inputs() {
        let mut memo = SearchMemo::default();
        let first = snapshot(1);
        let a = memo.project(&first, "renda");
        let b = memo.project(&first, "renda");
        assert!(Arc::ptr_eq(&a, &b));

        let c = memo.project(&first, "alta");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.len(), 1);

        let d = memo.project(&snapshot(2), "alta");
        assert!(!Arc::ptr_eq(&c, &d));
        assert_eq!(first.items.len(), 3);
    }
}
