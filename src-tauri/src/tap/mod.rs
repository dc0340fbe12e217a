pub mod cleanup;
pub mod snapshot;

use std::time::{Duration, Instant};

pub use cleanup::clean_message_text;
pub use snapshot::TapSnapshot;

/// Read-only view over the element tree a tap landed in.
pub trait ElementTree {
    type Id: Clone;

    fn parent(&self, id: &Self::Id) -> Option<Self::Id>;
    /// Rendered text of the element and everything below it.
    fn rendered_text(&self, id: &Self::Id) -> &str;
    /// Descendants of `id` in document order, `id` itself excluded.
    fn descendants(&self, id: &Self::Id) -> Vec<Self::Id>;
    /// Identity that stays stable across snapshots of the same page.
    fn element_key(&self, id: &Self::Id) -> String;
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub debounce: Duration,
    pub repeat_window: Duration,
    pub max_ancestor_hops: usize,
    /// Exclusive bounds on the cleaned text length, in characters.
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            repeat_window: Duration::from_millis(1000),
            max_ancestor_hops: 10,
            min_len: 3,
            max_len: 1000,
        }
    }
}

/// Whether taps should be resolved at all right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapGate {
    pub listening: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    Ancestor,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome<Id> {
    NotListening,
    NotVerified,
    Debounced,
    AlreadyRead,
    NoReadableText,
    Resolved {
        element: Id,
        key: String,
        text: String,
        source: MatchSource,
    },
}

#[derive(Debug, Clone)]
struct LastMatch {
    key: String,
    at: Instant,
}

pub struct TapResolver {
    config: ResolverConfig,
    last_accepted: Option<Instant>,
    last_match: Option<LastMatch>,
}

impl TapResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            last_accepted: None,
            last_match: None,
        }
    }

    /// Forget debounce and memo state, e.g. when listening restarts.
    pub fn reset(&mut self) {
        self.last_accepted = None;
        self.last_match = None;
    }

    pub fn resolve<T: ElementTree>(
        &mut self,
        tree: &T,
        target: &T::Id,
        gate: TapGate,
        now: Instant,
    ) -> TapOutcome<T::Id> {
        if !gate.listening {
            return TapOutcome::NotListening;
        }
        if !gate.verified {
            return TapOutcome::NotVerified;
        }
        if let Some(prev) = self.last_accepted {
            if now.saturating_duration_since(prev) < self.config.debounce {
                return TapOutcome::Debounced;
            }
        }
        self.last_accepted = Some(now);

        let Some((element, text, source)) = self.find_readable(tree, target) else {
            return TapOutcome::NoReadableText;
        };

        let key = tree.element_key(&element);
        if let Some(ref last) = self.last_match {
            if last.key == key && now.saturating_duration_since(last.at) < self.config.repeat_window {
                return TapOutcome::AlreadyRead;
            }
        }
        self.last_match = Some(LastMatch { key: key.clone(), at: now });

        TapOutcome::Resolved { element, key, text, source }
    }

    fn find_readable<T: ElementTree>(&self, tree: &T, target: &T::Id) -> Option<(T::Id, String, MatchSource)> {
        let mut current = Some(target.clone());
        let mut hops = 0;
        while let Some(id) = current {
            if hops >= self.config.max_ancestor_hops {
                break;
            }
            if let Some(text) = self.readable_text(tree, &id) {
                return Some((id, text, MatchSource::Ancestor));
            }
            current = tree.parent(&id);
            hops += 1;
        }

        tree.descendants(target)
            .into_iter()
            .find_map(|id| self.readable_text(tree, &id).map(|text| (id, text, MatchSource::Descendant)))
    }

    fn readable_text<T: ElementTree>(&self, tree: &T, id: &T::Id) -> Option<String> {
        let text = clean_message_text(tree.rendered_text(id));
        let len = text.chars().count();
        (len > self.config.min_len && len < self.config.max_len).then_some(text)
    }
}

impl Default for TapResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tap::snapshot::SnapshotNode;

    const OPEN: TapGate = TapGate { listening: true, verified: true };

    fn node(key: &str, text: &str, parent: Option<usize>, children: Vec<usize>) -> SnapshotNode {
        SnapshotNode {
            key: key.to_string(),
            text: text.to_string(),
            parent,
            children,
        }
    }

    /// page > row > bubble > span(target)
    fn bubble_tree(bubble_text: &str, span_text: &str) -> TapSnapshot {
        TapSnapshot {
            target: 3,
            nodes: vec![
                node("page", &"x".repeat(5000), None, vec![1]),
                node("row", &format!("{} 10:42 AM", bubble_text), Some(0), vec![2]),
                node("bubble", bubble_text, Some(1), vec![3]),
                node("span", span_text, Some(2), vec![]),
            ],
        }
    }

    #[test]
    fn closest_ancestor_wins() {
        let tree = bubble_tree("10:42 AM ✓✓ Hello there", "Hi");
        let mut resolver = TapResolver::default();
        match resolver.resolve(&tree, &3, OPEN, Instant::now()) {
            TapOutcome::Resolved { element, key, text, source } => {
                assert_eq!(element, 2);
                assert_eq!(key, "bubble");
                assert_eq!(text, "Hello there");
                assert_eq!(source, MatchSource::Ancestor);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn target_itself_counts_as_first_ancestor() {
        let tree = bubble_tree("Hello there friend", "Hello there");
        let mut resolver = TapResolver::default();
        let outcome = resolver.resolve(&tree, &3, OPEN, Instant::now());
        assert!(matches!(outcome, TapOutcome::Resolved { element: 3, .. }));
    }

    #[test]
    fn gate_is_checked_before_anything_else() {
        let tree = bubble_tree("Hello there", "Hi");
        let mut resolver = TapResolver::default();
        let now = Instant::now();

        let off = TapGate { listening: false, verified: true };
        assert_eq!(resolver.resolve(&tree, &3, off, now), TapOutcome::NotListening);

        let unverified = TapGate { listening: true, verified: false };
        assert_eq!(resolver.resolve(&tree, &3, unverified, now), TapOutcome::NotVerified);

        // Rejected taps do not start a debounce window.
        assert!(matches!(resolver.resolve(&tree, &3, OPEN, now), TapOutcome::Resolved { .. }));
    }

    #[test]
    fn two_taps_within_debounce_speak_once() {
        let tree = bubble_tree("Hello there", "Hi");
        let mut resolver = TapResolver::default();
        let start = Instant::now();

        let outcomes = [
            resolver.resolve(&tree, &3, OPEN, start),
            resolver.resolve(&tree, &3, OPEN, start + Duration::from_millis(120)),
        ];
        let spoken = outcomes.iter().filter(|o| matches!(o, TapOutcome::Resolved { .. })).count();
        assert_eq!(spoken, 1);
        assert_eq!(outcomes[1], TapOutcome::Debounced);
    }

    #[test]
    fn same_element_inside_repeat_window_is_not_read_again() {
        let tree = bubble_tree("Hello there", "Hi");
        let mut resolver = TapResolver::default();
        let start = Instant::now();

        assert!(matches!(resolver.resolve(&tree, &3, OPEN, start), TapOutcome::Resolved { .. }));
        assert_eq!(
            resolver.resolve(&tree, &3, OPEN, start + Duration::from_millis(700)),
            TapOutcome::AlreadyRead
        );
        assert!(matches!(
            resolver.resolve(&tree, &3, OPEN, start + Duration::from_millis(1800)),
            TapOutcome::Resolved { .. }
        ));
    }

    #[test]
    fn different_element_after_debounce_is_read() {
        let first = bubble_tree("Hello there", "Hi");
        let mut second = bubble_tree("Another message", "Hi");
        second.nodes[2].key = "bubble-2".to_string();

        let mut resolver = TapResolver::default();
        let start = Instant::now();
        assert!(matches!(resolver.resolve(&first, &3, OPEN, start), TapOutcome::Resolved { .. }));
        match resolver.resolve(&second, &3, OPEN, start + Duration::from_millis(600)) {
            TapOutcome::Resolved { text, .. } => assert_eq!(text, "Another message"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn falls_back_to_first_descendant_in_scan_order() {
        // container(target) > [empty, first message, second message]
        let tree = TapSnapshot {
            target: 0,
            nodes: vec![
                node("container", &"y".repeat(1500), None, vec![1, 2, 3]),
                node("empty", "✓✓", Some(0), vec![]),
                node("first", "First message", Some(0), vec![]),
                node("second", "Second message", Some(0), vec![]),
            ],
        };
        let mut resolver = TapResolver::default();
        match resolver.resolve(&tree, &0, OPEN, Instant::now()) {
            TapOutcome::Resolved { key, source, .. } => {
                assert_eq!(key, "first");
                assert_eq!(source, MatchSource::Descendant);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn out_of_bounds_text_never_resolves() {
        let short = TapSnapshot {
            target: 0,
            nodes: vec![node("a", "Hey", None, vec![])],
        };
        let long = TapSnapshot {
            target: 0,
            nodes: vec![node("a", &"z".repeat(1000), None, vec![])],
        };
        let mut resolver = TapResolver::default();
        let start = Instant::now();
        assert_eq!(resolver.resolve(&short, &0, OPEN, start), TapOutcome::NoReadableText);
        assert_eq!(
            resolver.resolve(&long, &0, OPEN, start + Duration::from_secs(1)),
            TapOutcome::NoReadableText
        );
    }

    #[test]
    fn lengths_just_inside_the_bounds_resolve() {
        let mut resolver = TapResolver::default();
        let start = Instant::now();
        for (i, len) in [4usize, 999].into_iter().enumerate() {
            let text = "w".repeat(len);
            let tree = TapSnapshot {
                target: 0,
                nodes: vec![node(&format!("a{}", len), &text, None, vec![])],
            };
            let at = start + Duration::from_secs(i as u64 * 2);
            match resolver.resolve(&tree, &0, OPEN, at) {
                TapOutcome::Resolved { text: spoken, .. } => assert_eq!(spoken.chars().count(), len),
                other => panic!("length {} should resolve, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn length_is_measured_after_cleanup() {
        // Raw text is long enough, cleaned text is not.
        let tree = TapSnapshot {
            target: 0,
            nodes: vec![node("a", "10:42 AM ✓✓ ok", None, vec![])],
        };
        let mut resolver = TapResolver::default();
        assert_eq!(resolver.resolve(&tree, &0, OPEN, Instant::now()), TapOutcome::NoReadableText);
    }

    #[test]
    fn ancestor_walk_is_bounded() {
        // A readable element twelve levels above the target is out of reach.
        let depth = 12;
        let mut nodes = vec![node("root", "Readable but far away", None, vec![1])];
        for i in 1..=depth {
            let children = if i < depth { vec![i + 1] } else { vec![] };
            nodes.push(node(&format!("n{}", i), "", Some(i - 1), children));
        }
        let tree = TapSnapshot { target: depth, nodes };
        let mut resolver = TapResolver::default();
        assert_eq!(resolver.resolve(&tree, &depth, OPEN, Instant::now()), TapOutcome::NoReadableText);
    }
}
