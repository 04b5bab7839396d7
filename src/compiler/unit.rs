/// Compilation units and the tables the rewriter fills in
///
/// A unit is either the root document or a nested component (a mixin
/// definition or a loop body). Nested units are owned by the unit that
/// discovered them and are compiled independently.

use std::collections::HashMap;

use crate::compiler::ast::Node;
use crate::compiler::error::{CompileError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Root,
    Component,
}

/// Compile-time lifecycle of a unit. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Unparsed,
    Rewriting,
    Rewritten,
    Emitted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    /// `None` for component parameters, which are bound at call time
    pub initializer: Option<String>,
}

impl Variable {
    pub fn declared(name: &str, initializer: &str) -> Self {
        Variable {
            name: name.to_string(),
            initializer: Some(initializer.to_string()),
        }
    }

    pub fn parameter(name: &str) -> Self {
        Variable {
            name: name.to_string(),
            initializer: None,
        }
    }

    pub fn is_parameter(&self) -> bool {
        self.initializer.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub when: bool,
    pub anchor: String,
}

/// Toggles branch anchors on the truthiness of `test`
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalEvent {
    pub id: String,
    pub test: String,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingTarget {
    Attribute(String),
    Content,
}

/// One attribute (or the content) of an anchor, recomputed from `expression`
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub anchor: String,
    pub target: BindingTarget,
    pub expression: String,
}

/// Anchor content re-rendered by mapping `source` through `component`
#[derive(Debug, Clone, PartialEq)]
pub struct LoopBinding {
    pub anchor: String,
    pub source: String,
    pub bindings: Vec<String>,
    pub component: String,
}

/// Anchor content rendered by invoking `component` with `args`
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCall {
    pub anchor: String,
    pub args: String,
    pub component: String,
    pub variable_dependent: bool,
}

/// Variable name -> event ids to run, in order, when it is reassigned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableEvents {
    events: HashMap<String, Vec<String>>,
}

impl VariableEvents {
    pub fn new() -> Self {
        VariableEvents::default()
    }

    /// Append `event` under `variable`, keeping duplicates
    pub fn record(&mut self, variable: &str, event: &str) {
        self.events
            .entry(variable.to_string())
            .or_default()
            .push(event.to_string());
    }

    pub fn events_for(&self, variable: &str) -> &[String] {
        self.events.get(variable).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any variable triggers `event`
    pub fn is_tracked(&self, event: &str) -> bool {
        self.events.values().any(|ids| ids.iter().any(|id| id == event))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone)]
pub struct ComponentUnit {
    pub name: String,
    pub kind: UnitKind,
    state: UnitState,
    pub variables: Vec<Variable>,
    pub conditionals: Vec<ConditionalEvent>,
    pub bound_values: Vec<BoundValue>,
    pub loops: Vec<LoopBinding>,
    pub calls: Vec<ComponentCall>,
    pub variable_events: VariableEvents,
    pub tree: Vec<Node>,
    components: Vec<ComponentUnit>,
}

impl ComponentUnit {
    pub fn root(name: &str) -> Self {
        ComponentUnit::new(name, UnitKind::Root, Vec::new(), Vec::new())
    }

    /// Nested unit whose variables start out as call-time parameters
    pub fn component(name: &str, params: &[String], tree: Vec<Node>) -> Self {
        let variables = params.iter().map(|p| Variable::parameter(p)).collect();
        ComponentUnit::new(name, UnitKind::Component, variables, tree)
    }

    fn new(name: &str, kind: UnitKind, variables: Vec<Variable>, tree: Vec<Node>) -> Self {
        ComponentUnit {
            name: name.to_string(),
            kind,
            state: UnitState::Unparsed,
            variables,
            conditionals: Vec::new(),
            bound_values: Vec::new(),
            loops: Vec::new(),
            calls: Vec::new(),
            variable_events: VariableEvents::new(),
            tree,
            components: Vec::new(),
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// Move to `next`, refusing anything but the single forward step
    pub(crate) fn advance(&mut self, next: UnitState) -> Result<()> {
        let allowed = matches!(
            (self.state, next),
            (UnitState::Unparsed, UnitState::Rewriting)
                | (UnitState::Rewriting, UnitState::Rewritten)
                | (UnitState::Rewritten, UnitState::Emitted)
        );
        if allowed {
            self.state = next;
            return Ok(());
        }

        let unit = self.name.clone();
        Err(match (self.state, next) {
            (UnitState::Emitted, _) => CompileError::AlreadyEmitted { unit },
            (UnitState::Rewritten, _) | (UnitState::Rewriting, UnitState::Rewriting) => {
                CompileError::AlreadyRewritten { unit }
            }
            _ => CompileError::NotRewritten { unit },
        })
    }

    pub fn register(&mut self, nested: ComponentUnit) {
        self.components.push(nested);
    }

    /// Directly nested units in discovery order
    pub fn components(&self) -> &[ComponentUnit] {
        &self.components
    }

    /// This unit followed by every nested unit, depth first, discovery order
    pub fn all_units(&self) -> Vec<&ComponentUnit> {
        let mut units = vec![self];
        for nested in &self.components {
            units.extend(nested.all_units());
        }
        units
    }

    pub(crate) fn for_each_unit_mut<F>(&mut self, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut ComponentUnit) -> Result<()>,
    {
        f(self)?;
        for nested in &mut self.components {
            nested.for_each_unit_mut(f)?;
        }
        Ok(())
    }

    /// Every event id of the unit: condition events, then anchor groups.
    pub fn event_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conditionals.iter().map(|c| c.id.clone()).collect();
        for anchor in self.anchor_groups() {
            ids.push(anchor);
        }
        ids
    }

    /// Distinct anchors written by bound values, loops and calls, first-seen order
    pub fn anchor_groups(&self) -> Vec<String> {
        let mut anchors: Vec<String> = Vec::new();
        let all = self
            .bound_values
            .iter()
            .map(|b| &b.anchor)
            .chain(self.loops.iter().map(|l| &l.anchor))
            .chain(self.calls.iter().map(|c| &c.anchor));
        for anchor in all {
            if !anchors.contains(anchor) {
                anchors.push(anchor.clone());
            }
        }
        anchors
    }
}
