//! Type registry: maps a stable tag to a behavior constructor.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::domain::behavior::{
    Behavior, CheckFlag, Pass, Placeholder, SetFlag, Wait, CHECK_FLAG_TAG, PASS_TAG,
    PLACEHOLDER_TAG, SET_FLAG_TAG, WAIT_TAG,
};

/// Constructor for a default-initialized behavior, filled in later by `load`.
pub type Constructor = Box<dyn Fn() -> Box<dyn Behavior> + Send + Sync>;

/// Populated once at startup; consulted by `Container::load`.
pub struct NodeRegistry {
    constructors: HashMap<String, Constructor>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.constructors.keys().collect();
        tags.sort();
        f.debug_struct("NodeRegistry").field("tags", &tags).finish()
    }
}

impl NodeRegistry {
    /// Registry without any tags.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with the built-in behaviors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PASS_TAG, || Box::new(Pass));
        registry.register(WAIT_TAG, || Box::new(Wait::default()));
        registry.register(SET_FLAG_TAG, || Box::new(SetFlag::default()));
        registry.register(CHECK_FLAG_TAG, || Box::new(CheckFlag::default()));
        registry
    }

    /// Registers (or replaces) the constructor for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Behavior> + Send + Sync + 'static,
    {
        let tag = tag.into();
        debug!(tag = %tag, "register behavior");
        self.constructors.insert(tag, Box::new(ctor));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn create(&self, tag: &str) -> Option<Box<dyn Behavior>> {
        self.constructors.get(tag).map(|ctor| ctor())
    }

    /// Like [`create`](Self::create), but never fails: unknown tags yield a
    /// [`Placeholder`]. The flag is `true` when substitution happened.
    pub fn create_or_placeholder(&self, tag: &str) -> (Box<dyn Behavior>, bool) {
        match self.create(tag) {
            Some(behavior) => (behavior, false),
            None => {
                warn!(tag, "unknown behavior tag, substituting {}", PLACEHOLDER_TAG);
                (Box::new(Placeholder::for_tag(tag)), true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PASS_TAG)]
    #[case(WAIT_TAG)]
    #[case(SET_FLAG_TAG)]
    #[case(CHECK_FLAG_TAG)]
    fn given_builtin_tag_when_creating_then_tag_matches(#[case] tag: &str) {
        let registry = NodeRegistry::with_builtins();
        let behavior = registry.create(tag).expect("builtin registered");
        assert_eq!(behavior.type_tag(), tag);
    }

    #[test]
    fn given_unknown_tag_when_creating_then_none() {
        let registry = NodeRegistry::with_builtins();
        assert!(registry.create("cutscene").is_none());
        assert!(!registry.contains("cutscene"));
    }

    #[test]
    fn given_unknown_tag_when_creating_or_placeholder_then_placeholder_keeps_tag() {
        let registry = NodeRegistry::new();
        let (behavior, substituted) = registry.create_or_placeholder("cutscene");
        assert!(substituted);
        assert_eq!(behavior.type_tag(), "cutscene");
    }

    #[test]
    fn given_custom_constructor_when_registering_then_it_replaces_builtin() {
        let mut registry = NodeRegistry::with_builtins();
        registry.register(PASS_TAG, || Box::new(Wait::new(1)));
        let behavior = registry.create(PASS_TAG).unwrap();
        assert_eq!(behavior.type_tag(), WAIT_TAG);
    }
}
