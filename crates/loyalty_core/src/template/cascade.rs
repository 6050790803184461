//! Cascading field dependency graph and reload sequencing.
//!
//! # Responsibility
//! - Derive the parent→children map from parsed template fields.
//! - Track per-field enable/option/selection state across parent changes.
//!
//! # Invariants
//! - A dependent field stays disabled and unpopulated until its parent emits
//!   a value and the scoped reload arrives.
//! - Clearing a parent resets its dependents recursively, not just one level.
//! - Reloads carry a per-field monotonic sequence number; an arriving reload
//!   whose number is not the latest issued for that field is discarded.

use crate::model::molecule::ResolvedItem;
use crate::model::template::{FieldKind, TemplateField};
use log::debug;
use std::collections::BTreeMap;

/// Builds the parent→children map from parsed fields.
///
/// Children keep template order; recomputed from the current template, never
/// stored.
pub fn dependency_graph(fields: &[TemplateField]) -> BTreeMap<String, Vec<String>> {
    let mut graph: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for field in fields {
        if field.kind != FieldKind::Molecule {
            continue;
        }
        let (Some(parent), Some(child)) = (&field.filter_by, &field.molecule_key) else {
            continue;
        };
        graph.entry(parent.clone()).or_default().push(child.clone());
    }
    graph
}

/// One scoped option reload requested from the caller.
///
/// The caller fetches options (e.g. `values_for_parent`) and reports back via
/// [`CascadeController::apply_reload`] with the same sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTicket {
    pub field: String,
    pub parent_value: String,
    pub seq: u64,
}

#[derive(Debug, Default)]
struct FieldState {
    enabled: bool,
    options: Vec<ResolvedItem>,
    selection: Option<String>,
    latest_seq: u64,
}

/// State machine for dependent dropdowns of one rendered template.
pub struct CascadeController {
    children: BTreeMap<String, Vec<String>>,
    states: BTreeMap<String, FieldState>,
}

impl CascadeController {
    /// Creates a controller from a dependency graph. Fields that are nobody's
    /// dependent start enabled; dependents start disabled and unpopulated.
    pub fn new(children: BTreeMap<String, Vec<String>>) -> Self {
        let mut states: BTreeMap<String, FieldState> = BTreeMap::new();
        for (parent, kids) in &children {
            states.entry(parent.clone()).or_default();
            for kid in kids {
                states.entry(kid.clone()).or_default();
            }
        }

        let dependents: Vec<String> = children.values().flatten().cloned().collect();
        for (field, state) in &mut states {
            state.enabled = !dependents.contains(field);
        }

        Self { children, states }
    }

    /// Records a selection change on `field` and returns the scoped reloads
    /// to issue for its direct dependents.
    ///
    /// Clearing the selection (`None`) disables and resets every dependent
    /// transitively and issues no reloads.
    pub fn set_selection(&mut self, field: &str, value: Option<&str>) -> Vec<ReloadTicket> {
        if !self.states.contains_key(field) {
            return Vec::new();
        }

        if let Some(state) = self.states.get_mut(field) {
            state.selection = value.map(str::to_string);
        }

        let kids = self.direct_children(field);
        match value {
            Some(parent_value) => {
                let mut tickets = Vec::with_capacity(kids.len());
                for kid in kids {
                    // Descendants of the dependent lose their basis too.
                    self.reset_subtree(&kid);
                    let seq = self.bump_seq(&kid);
                    debug!(
                        "event=cascade_reload module=cascade field={} parent_value={} seq={}",
                        kid, parent_value, seq
                    );
                    tickets.push(ReloadTicket {
                        field: kid,
                        parent_value: parent_value.to_string(),
                        seq,
                    });
                }
                tickets
            }
            None => {
                for kid in kids {
                    self.reset_subtree(&kid);
                }
                Vec::new()
            }
        }
    }

    /// Applies an arrived reload. Returns `false` (and changes nothing) when
    /// the sequence number is not the latest issued for the field.
    pub fn apply_reload(&mut self, field: &str, seq: u64, options: Vec<ResolvedItem>) -> bool {
        let Some(state) = self.states.get_mut(field) else {
            return false;
        };
        if seq != state.latest_seq {
            debug!(
                "event=cascade_reload_discarded module=cascade field={} seq={} latest={}",
                field, seq, state.latest_seq
            );
            return false;
        }

        state.enabled = true;
        state.options = options;
        state.selection = None;
        true
    }

    pub fn is_enabled(&self, field: &str) -> bool {
        self.states.get(field).is_some_and(|state| state.enabled)
    }

    pub fn options(&self, field: &str) -> &[ResolvedItem] {
        self.states
            .get(field)
            .map(|state| state.options.as_slice())
            .unwrap_or(&[])
    }

    pub fn selection(&self, field: &str) -> Option<&str> {
        self.states.get(field)?.selection.as_deref()
    }

    fn direct_children(&self, field: &str) -> Vec<String> {
        self.children.get(field).cloned().unwrap_or_default()
    }

    /// Disables and resets a field and every transitive dependent. Bumping
    /// the sequence number invalidates any reload still in flight.
    fn reset_subtree(&mut self, field: &str) {
        if let Some(state) = self.states.get_mut(field) {
            state.enabled = false;
            state.options.clear();
            state.selection = None;
            state.latest_seq += 1;
        }
        for kid in self.direct_children(field) {
            self.reset_subtree(&kid);
        }
    }

    fn bump_seq(&mut self, field: &str) -> u64 {
        let state = self.states.entry(field.to_string()).or_default();
        state.latest_seq += 1;
        state.latest_seq
    }
}
