#![forbid(unsafe_code)]

//! Fine-grained text binding.
//!
//! A [`Memo`] ties one [`Slot`] to one store [`Node`]. It writes the
//! current value once when bound, then patches the slot from the node's
//! subscription. The enclosing component is never re-run. Dropping the
//! `Memo` unsubscribes, which is how bindings are torn down when their
//! component re-renders or unmounts.
//!
//! A derived memo shows a [`Computed`] string instead of a raw node value.
//! It listens to every source node and re-reads the computed on each write.

use finegrain_state::{Computed, Node, Subscription};
use tracing::debug;

use crate::surface::Slot;

/// Live binding from a store node to a text slot.
#[derive(Debug)]
pub struct Memo {
    slot: Slot,
    subscriptions: Vec<Subscription>,
}

impl Memo {
    /// Bind `slot` to `node`, rendering the current value immediately.
    pub fn bind(node: &Node, slot: Slot) -> Self {
        slot.patch(&node.get().to_string());
        let target = slot.clone();
        let path = node.path().clone();
        let subscription = node.subscribe(move |value| {
            let text = value.to_string();
            debug!(path = %path, text = %text, "memo patched");
            target.patch(&text);
        });
        Self {
            slot,
            subscriptions: vec![subscription],
        }
    }

    /// Bind `slot` to `computed`, which must be derived from `sources`.
    ///
    /// The computed subscribed to the sources first, so its cache is already
    /// dirty when these listeners run.
    pub fn derived(sources: &[Node], computed: Computed<String>, slot: Slot) -> Self {
        slot.patch(&computed.get());
        let subscriptions = sources
            .iter()
            .map(|node| {
                let computed = computed.clone();
                let target = slot.clone();
                let path = node.path().clone();
                node.subscribe(move |_| {
                    let text = computed.get();
                    debug!(path = %path, text = %text, "derived memo patched");
                    target.patch(&text);
                })
            })
            .collect();
        Self {
            slot,
            subscriptions,
        }
    }

    /// The bound slot.
    #[must_use]
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Whether the binding still receives updates.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.subscriptions.iter().any(Subscription::is_active)
    }
}
