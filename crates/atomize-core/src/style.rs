//! Local style classes and their synthesis.

use crate::value::TypedValue;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Label of element-scoped classes.
pub const LOCAL_LABEL: &str = "local";

/// Type marker of style classes.
pub const CLASS_KIND: &str = "class";

/// Breakpoint of the single variant synthesized per class.
pub const DESKTOP: &str = "desktop";

/// Hex digits of the digest kept in a class id.
const HASH_LEN: usize = 7;

/// Breakpoint and pseudo-state a variant applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantMeta {
    pub breakpoint: String,
    /// `None` for the default state.
    pub state: Option<String>,
}

/// Property values for one breakpoint/state combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub meta: VariantMeta,
    pub props: BTreeMap<String, TypedValue>,
}

/// A named bundle of style properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleClass {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub variants: Vec<Variant>,
}

impl StyleClass {
    /// A local class with a single desktop variant.
    #[must_use]
    pub fn local(id: String, props: BTreeMap<String, TypedValue>) -> Self {
        Self {
            id,
            label: LOCAL_LABEL.to_string(),
            kind: CLASS_KIND.to_string(),
            variants: vec![Variant {
                meta: VariantMeta {
                    breakpoint: DESKTOP.to_string(),
                    state: None,
                },
                props,
            }],
        }
    }
}

/// Issues class ids for one conversion run and guarantees their uniqueness.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    issued: HashSet<String>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the local class of an element from its style-bound properties.
    ///
    /// Returns `None` when there are no properties.
    pub fn synthesize(
        &mut self,
        element_id: &str,
        props: BTreeMap<String, TypedValue>,
    ) -> Option<StyleClass> {
        if props.is_empty() {
            return None;
        }
        let id = self.class_id(element_id, &props);
        debug!(element = element_id, class = %id, props = props.len(), "synthesized style class");
        Some(StyleClass::local(id, props))
    }

    /// Issue a class id of the form `e-{element_id}-{hash}`.
    ///
    /// The hash covers the element id and the property set, so the same
    /// input yields the same id. A collision with an id issued earlier in
    /// this run salts the digest until it is unique.
    pub fn class_id(&mut self, element_id: &str, props: &BTreeMap<String, TypedValue>) -> String {
        let canonical = canonical_props(props);
        let mut salt = 0u32;
        loop {
            let id = format!("e-{element_id}-{}", short_hash(element_id, &canonical, salt));
            if self.issued.insert(id.clone()) {
                return id;
            }
            debug!(element = element_id, class = %id, salt, "class id collision");
            salt += 1;
        }
    }

    /// Returns true if `id` was issued in this run.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    /// Number of ids issued in this run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issued.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Name-sorted `name=value;` rendering of a property set.
fn canonical_props(props: &BTreeMap<String, TypedValue>) -> String {
    props
        .iter()
        .map(|(name, value)| format!("{name}={};", value.to_json()))
        .collect()
}

fn short_hash(element_id: &str, canonical: &str, salt: u32) -> String {
    let mut hasher = Md5::new();
    hasher.update(element_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    if salt > 0 {
        hasher.update(salt.to_le_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_LEN);
    digest
}
