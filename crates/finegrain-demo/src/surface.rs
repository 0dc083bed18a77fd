#![forbid(unsafe_code)]

//! Retained text output: lines and patchable slots.
//!
//! A rendered component produces a list of [`Line`]s. Most lines are plain
//! text fixed at render time. A [`Slot`] line holds a shared text cell that
//! can be patched later without re-running the component; each patch is
//! counted so the demo can show exactly where updates landed.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::Rc;

/// A single patchable text location.
///
/// Clones share the same cell.
#[derive(Clone, Default)]
pub struct Slot {
    text: Rc<RefCell<String>>,
    patches: Rc<Cell<u64>>,
}

impl Slot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current text.
    #[must_use]
    pub fn text(&self) -> String {
        self.text.borrow().clone()
    }

    /// Replace the text. Identical text is not counted as a patch.
    pub fn patch(&self, text: &str) {
        let mut current = self.text.borrow_mut();
        if *current != text {
            current.clear();
            current.push_str(text);
            self.patches.set(self.patches.get() + 1);
        }
    }

    /// Number of effective patches so far.
    #[must_use]
    pub fn patches(&self) -> u64 {
        self.patches.get()
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("text", &*self.text.borrow())
            .field("patches", &self.patches.get())
            .finish()
    }
}

/// One line of component output.
#[derive(Debug, Clone)]
pub enum Line {
    /// Section or component heading.
    Heading { level: u8, text: String },
    /// Text fixed at render time.
    Text(String),
    /// `label: <slot>` where the slot may change between renders.
    Slot { label: String, slot: Slot },
    /// A clickable action.
    Button(String),
    /// Horizontal separator.
    Rule,
    /// Where the n-th child component's output is spliced in.
    Outlet(usize),
}

impl Line {
    /// Write this line at `depth` levels of indentation.
    ///
    /// Outlets write nothing; the host splices child output there.
    pub fn write_to(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = match self {
            Self::Heading { level, text } => {
                let marks = "#".repeat(usize::from(*level).max(1));
                writeln!(out, "{indent}{marks} {text}")
            }
            Self::Text(text) => writeln!(out, "{indent}{text}"),
            Self::Slot { label, slot } => writeln!(out, "{indent}{label}: {}", slot.text()),
            Self::Button(label) => writeln!(out, "{indent}[{label}]"),
            Self::Rule => writeln!(out, "{indent}----"),
            Self::Outlet(_) => Ok(()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_counts_changes_only() {
        let slot = Slot::new();
        slot.patch("1");
        slot.patch("1");
        slot.patch("2");
        assert_eq!(slot.text(), "2");
        assert_eq!(slot.patches(), 2);
    }

    #[test]
    fn clones_share_text() {
        let a = Slot::new();
        let b = a.clone();
        a.patch("x");
        assert_eq!(b.text(), "x");
    }

    #[test]
    fn line_formats() {
        let slot = Slot::new();
        slot.patch("Jane");
        let mut out = String::new();
        Line::Heading {
            level: 5,
            text: "Child2".into(),
        }
        .write_to(&mut out, 0);
        Line::Slot {
            label: "Name".into(),
            slot,
        }
        .write_to(&mut out, 1);
        Line::Button("Change Name".into()).write_to(&mut out, 1);
        assert_eq!(out, "##### Child2\n  Name: Jane\n  [Change Name]\n");
    }
}
