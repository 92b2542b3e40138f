//! Prefix tree over usernames

use std::collections::BTreeMap;

use crate::config::CaseSensitivity;
use crate::error::{EngineError, Result};

#[derive(Debug, Default, Clone)]
struct TrieNode {
    /// Ordered so a depth-first walk yields keys lexicographically
    children: BTreeMap<char, TrieNode>,

    /// Display form of the username whose key ends here
    terminal: Option<String>,

    /// Usernames at or below this node
    count: usize,
}

/// Username index supporting ordered prefix suggestions.
///
/// Under [`CaseSensitivity::Insensitive`] keys are lowercased, so `Alice`
/// and `alice` collide, while suggestions keep the spelling that was inserted.
#[derive(Debug, Clone)]
pub struct UsernameTrie {
    root: TrieNode,
    case: CaseSensitivity,
}

impl UsernameTrie {
    pub fn new(case: CaseSensitivity) -> Self {
        Self {
            root: TrieNode::default(),
            case,
        }
    }

    /// Build a fresh index from the current username set
    pub fn from_usernames<I, S>(case: CaseSensitivity, usernames: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = Self::new(case);
        for username in usernames {
            trie.insert(username.as_ref())?;
        }
        Ok(trie)
    }

    fn key(&self, username: &str) -> String {
        match self.case {
            CaseSensitivity::Insensitive => username.to_lowercase(),
            CaseSensitivity::Sensitive => username.to_string(),
        }
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    pub fn insert(&mut self, username: &str) -> Result<()> {
        if self.contains(username) {
            return Err(EngineError::DuplicateUsername(format!("username {}", username)));
        }

        let key = self.key(username);
        let mut node = &mut self.root;
        node.count += 1;
        for c in key.chars() {
            node = node.children.entry(c).or_default();
            node.count += 1;
        }
        node.terminal = Some(username.to_string());
        Ok(())
    }

    /// Remove a username, returning the spelling it was stored with
    pub fn remove(&mut self, username: &str) -> Result<String> {
        let key: Vec<char> = self.key(username).chars().collect();
        Self::remove_path(&mut self.root, &key)
            .ok_or_else(|| EngineError::NotFound(format!("username {}", username)))
    }

    fn remove_path(node: &mut TrieNode, key: &[char]) -> Option<String> {
        let removed = match key.split_first() {
            None => node.terminal.take()?,
            Some((c, rest)) => {
                let child = node.children.get_mut(c)?;
                let removed = Self::remove_path(child, rest)?;
                if child.count == 0 {
                    // Prune branches that no longer lead to a username
                    node.children.remove(c);
                }
                removed
            }
        };
        node.count -= 1;
        Some(removed)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.find(&self.key(username))
            .map_or(false, |node| node.terminal.is_some())
    }

    /// Stored spelling of the username matching `username` under the case policy
    pub fn lookup(&self, username: &str) -> Option<&str> {
        self.find(&self.key(username))
            .and_then(|node| node.terminal.as_deref())
    }

    fn find(&self, key: &str) -> Option<&TrieNode> {
        key.chars()
            .try_fold(&self.root, |node, c| node.children.get(&c))
    }

    /// Lazily yield up to `limit` usernames starting with `prefix`, in key order
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Autocomplete<'_> {
        let start = self.find(&self.key(prefix));
        Autocomplete {
            stack: start.into_iter().collect(),
            remaining: limit,
        }
    }

    pub fn len(&self) -> usize {
        self.root.count
    }

    pub fn is_empty(&self) -> bool {
        self.root.count == 0
    }
}

/// Depth-first iterator behind [`UsernameTrie::autocomplete`]
pub struct Autocomplete<'a> {
    stack: Vec<&'a TrieNode>,
    remaining: usize,
}

impl<'a> Iterator for Autocomplete<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while let Some(node) = self.stack.pop() {
            // Reverse push so the smallest child is visited first
            self.stack.extend(node.children.values().rev());

            if let Some(username) = node.terminal.as_deref() {
                self.remaining -= 1;
                return Some(username);
            }
        }

        self.remaining = 0;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(case: CaseSensitivity) -> UsernameTrie {
        UsernameTrie::from_usernames(case, ["alice", "alan", "albert", "bob"]).unwrap()
    }

    #[test]
    fn autocomplete_is_lexicographic_and_limited() {
        let trie = sample(CaseSensitivity::Insensitive);
        let hits: Vec<&str> = trie.autocomplete("al", 2).collect();
        assert_eq!(hits, vec!["alan", "albert"]);

        let all: Vec<&str> = trie.autocomplete("al", 10).collect();
        assert_eq!(all, vec!["alan", "albert", "alice"]);
    }

    #[test]
    fn autocomplete_unknown_prefix_is_empty() {
        let trie = sample(CaseSensitivity::Insensitive);
        assert_eq!(trie.autocomplete("zed", 5).count(), 0);
        assert_eq!(trie.autocomplete("al", 0).count(), 0);
    }

    #[test]
    fn prefix_that_is_a_username_comes_first() {
        let trie =
            UsernameTrie::from_usernames(CaseSensitivity::Sensitive, ["anna", "ann", "annie"]).unwrap();
        let hits: Vec<&str> = trie.autocomplete("ann", 5).collect();
        assert_eq!(hits, vec!["ann", "anna", "annie"]);
    }

    #[test]
    fn insensitive_matches_any_case_and_preserves_display() {
        let mut trie = UsernameTrie::new(CaseSensitivity::Insensitive);
        trie.insert("Alice").unwrap();
        assert_eq!(
            trie.insert("alice"),
            Err(EngineError::DuplicateUsername("username alice".into()))
        );
        assert!(trie.contains("ALICE"));
        assert_eq!(trie.lookup("aLiCe"), Some("Alice"));
        assert_eq!(trie.lookup("ali"), None);
        assert_eq!(trie.autocomplete("AL", 3).collect::<Vec<_>>(), vec!["Alice"]);
    }

    #[test]
    fn sensitive_keeps_cases_apart() {
        let mut trie = UsernameTrie::new(CaseSensitivity::Sensitive);
        trie.insert("Alice").unwrap();
        trie.insert("alice").unwrap();
        assert_eq!(trie.len(), 2);
        // Uppercase sorts before lowercase
        assert_eq!(trie.autocomplete("", 5).collect::<Vec<_>>(), vec!["Alice", "alice"]);
        assert_eq!(trie.autocomplete("a", 5).collect::<Vec<_>>(), vec!["alice"]);
    }

    #[test]
    fn remove_prunes_and_reports_missing() {
        let mut trie = sample(CaseSensitivity::Insensitive);
        assert_eq!(trie.remove("ALBERT").unwrap(), "albert");
        assert!(!trie.contains("albert"));
        assert_eq!(trie.len(), 3);
        assert_eq!(trie.autocomplete("alb", 5).count(), 0);
        assert!(trie.find("alb").is_none());

        assert!(matches!(trie.remove("albert"), Err(EngineError::NotFound(_))));
        assert!(matches!(trie.remove("al"), Err(EngineError::NotFound(_))));
        assert_eq!(trie.len(), 3);
    }
}
