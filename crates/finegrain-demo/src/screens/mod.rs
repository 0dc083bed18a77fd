#![forbid(unsafe_code)]

//! The three demo examples and the section chrome around them.
//!
//! | Example | Components | Update path |
//! |---------|------------|-------------|
//! | [`compare`] | `NormalCounter`, `FineGrainedCounter` | re-render vs. slot patch |
//! | [`props`] | `Parent`, `CountChild`, `NameChild` | nodes passed down as props |
//! | [`context`] | `Provider`, `ContextChild`, `ContextTrigger` | store read from ambient context |

pub mod compare;
pub mod context;
pub mod props;

use std::str::FromStr;

use finegrain_state::{Observable, StateError, Value};

use crate::component::{Component, RenderCx};

/// Which examples to mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Example {
    #[default]
    All,
    Compare,
    Props,
    Context,
}

impl Example {
    pub const ALL: &'static [&'static str] = &["all", "compare", "props", "context"];

    fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

impl FromStr for Example {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "compare" | "1" => Ok(Self::Compare),
            "props" | "2" => Ok(Self::Props),
            "context" | "3" => Ok(Self::Context),
            _ => Err(()),
        }
    }
}

/// Stores created for the mounted examples, by name.
#[derive(Debug, Default)]
pub struct Stores {
    entries: Vec<(&'static str, Observable)>,
}

impl Stores {
    /// Create and remember a store.
    pub fn create(&mut self, name: &'static str, initial: impl Into<Value>) -> Observable {
        let store = Observable::new(initial);
        self.entries.push((name, store.clone()));
        store
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Observable> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, store)| store)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Observable)> {
        self.entries.iter().map(|(name, store)| (*name, store))
    }

    /// JSON object of every store's current value.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(name, store)| {
                (
                    (*name).to_string(),
                    serde_json::json!({
                        "value": store.root().get().to_json(),
                        "version": store.version(),
                        "subscribers": store.subscriber_count(),
                    }),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Component>>;

enum Item {
    Child(Factory),
    Rule,
}

/// A titled group of components.
///
/// Children are rebuilt from their factories on each render.
pub struct Section {
    title: &'static str,
    items: Vec<Item>,
    trailing_rule: bool,
}

impl Section {
    #[must_use]
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            items: Vec::new(),
            trailing_rule: false,
        }
    }

    /// Append a child built by `factory`.
    #[must_use]
    pub fn with<C: Component + 'static>(mut self, factory: impl Fn() -> C + 'static) -> Self {
        self.items
            .push(Item::Child(Box::new(move || Box::new(factory()))));
        self
    }

    /// Append a separator between children.
    #[must_use]
    pub fn rule(mut self) -> Self {
        self.items.push(Item::Rule);
        self
    }

    /// End the section with a separator.
    #[must_use]
    pub fn ruled(mut self) -> Self {
        self.trailing_rule = true;
        self
    }
}

impl Component for Section {
    fn name(&self) -> &'static str {
        "Section"
    }

    fn render(&mut self, cx: &mut RenderCx) -> Result<(), StateError> {
        cx.heading(1, self.title);
        for item in &self.items {
            match item {
                Item::Child(factory) => cx.child_boxed(factory()),
                Item::Rule => cx.rule(),
            }
        }
        if self.trailing_rule {
            cx.rule();
        }
        Ok(())
    }
}

/// Build the sections for `example`, registering their stores.
#[must_use]
pub fn build(example: Example, stores: &mut Stores) -> Vec<Section> {
    let mut sections = Vec::new();
    if example.includes(Example::Compare) {
        sections.push(compare::section(stores));
    }
    if example.includes(Example::Props) {
        sections.push(props::section(stores));
    }
    if example.includes(Example::Context) {
        sections.push(context::section(stores));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_example() {
        assert_eq!("compare".parse::<Example>(), Ok(Example::Compare));
        assert_eq!("PROPS".parse::<Example>(), Ok(Example::Props));
        assert_eq!("3".parse::<Example>(), Ok(Example::Context));
        assert_eq!("nope".parse::<Example>(), Err(()));
    }

    #[test]
    fn build_selects_sections() {
        let mut stores = Stores::default();
        assert_eq!(build(Example::All, &mut stores).len(), 3);
        let mut stores = Stores::default();
        assert_eq!(build(Example::Props, &mut stores).len(), 1);
        assert!(stores.get("parent.count").is_some());
        assert!(stores.get("fine_grained.count").is_none());
    }

    #[test]
    fn snapshot_lists_stores() {
        let mut stores = Stores::default();
        stores.create("a", 1);
        let snap = stores.snapshot();
        assert_eq!(snap["a"]["value"], serde_json::json!(1));
        assert_eq!(snap["a"]["version"], serde_json::json!(0));
    }
}
