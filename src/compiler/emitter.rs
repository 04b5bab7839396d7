/// JavaScript runtime generation
///
/// Turns the side tables of every rewritten unit into one script: variable
/// cells, setters that fan out to update events, component callables and a
/// startup routine run on `load`.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::compiler::anchor::js_ident;
use crate::compiler::error::{CompileError, Result};
use crate::compiler::markup;
use crate::compiler::unit::{BindingTarget, ComponentUnit, UnitState};

/// Lookups are cached so an element stays reachable after a bound `id`
/// replaces its anchor id.
const ANCHOR_LOOKUP: &[&str] = &[
    "const __anchors = {};",
    "const __anchor = (id) => __anchors[id] || (__anchors[id] = document.getElementById(id));",
];
const NESTED_ANCHOR_LOOKUP: &[&str] = &[
    "const __anchors = {};",
    "const __anchor = (id) => __anchors[id] || (__anchors[id] = __root.querySelector('[id=\"' + id + '\"]'));",
];
const ATTR_HELPER: &[&str] = &[
    "const __attr = (el, name, value) => {",
    "  if (value === false || value === null || value === undefined) el.removeAttribute(name);",
    "  else el.setAttribute(name, value === true ? '' : value);",
    "};",
];
const COMPONENT_TABLE: &str = "const __components = window.__components || {};";

/// Wrap the runtime and the root markup into the final document
pub fn document(runtime: &str, markup: &str) -> String {
    format!("\n<script>\n{}\n</script>\n{}", runtime, markup)
}

/// Emit the runtime for `root` and every unit nested under it.
///
/// `overrides` replace root variable initializers at the startup call only.
/// Every unit is moved to `Emitted`; a second call fails.
pub fn emit(root: &mut ComponentUnit, overrides: &HashMap<String, String>) -> Result<String> {
    check_component_names(root)?;
    for unit in root.all_units() {
        check_event_names(unit)?;
    }

    root.for_each_unit_mut(&mut |unit: &mut ComponentUnit| unit.advance(UnitState::Emitted))?;

    for name in overrides.keys() {
        if !root.is_known(name) {
            tracing::warn!(variable = %name, "override does not match any declared variable; ignored");
        }
    }

    let mut emitter = RuntimeEmitter::new(overrides);
    let script = emitter.generate(root);

    let mut output = String::new();
    if emitter.unresolved {
        output.push_str(COMPONENT_TABLE);
        output.push('\n');
    }
    output.push_str(&script);

    for unit in root.all_units() {
        tracing::debug!(unit = %unit.name, events = unit.event_ids().len(), "emitted unit");
    }
    Ok(output)
}

/// Nested units become `c_<name>` callables; two names must not end up as
/// the same identifier
fn check_component_names(root: &ComponentUnit) -> Result<()> {
    let mut idents = HashSet::new();
    for unit in root.all_units().into_iter().skip(1) {
        if !idents.insert(js_ident(&unit.name)) {
            return Err(CompileError::DuplicateComponent {
                name: unit.name.clone(),
            });
        }
    }
    Ok(())
}

fn check_event_names(unit: &ComponentUnit) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for id in unit.event_ids() {
        match seen.entry(js_ident(&id)) {
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
            Entry::Occupied(slot) if *slot.get() != id => {
                return Err(CompileError::DuplicateAnchor {
                    unit: unit.name.clone(),
                    first: slot.get().clone(),
                    second: id,
                });
            }
            Entry::Occupied(_) => {}
        }
    }
    Ok(())
}

struct RuntimeEmitter<'o> {
    overrides: &'o HashMap<String, String>,
    output: String,
    indent_level: usize,
    /// Component names declared by each enclosing unit, innermost last
    scopes: Vec<HashSet<String>>,
    /// Some call is left for the page's `__components` table
    unresolved: bool,
}

impl<'o> RuntimeEmitter<'o> {
    fn new(overrides: &'o HashMap<String, String>) -> Self {
        RuntimeEmitter {
            overrides,
            output: String::new(),
            indent_level: 0,
            scopes: Vec::new(),
            unresolved: false,
        }
    }

    fn enter(&mut self, unit: &ComponentUnit) {
        self.scopes
            .push(unit.components().iter().map(|c| c.name.clone()).collect());
    }

    /// The callable a call refers to from the current scope
    fn callee(&mut self, name: &str) -> String {
        if self.scopes.iter().any(|scope| scope.contains(name)) {
            format!("c_{}", js_ident(name))
        } else {
            self.unresolved = true;
            format!("__components[{}]", js_string(name))
        }
    }

    fn indent(&self) -> String {
        "  ".repeat(self.indent_level)
    }

    fn line(&mut self, text: &str) {
        let indent = self.indent();
        self.output.push_str(&indent);
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn generate(&mut self, root: &ComponentUnit) -> String {
        self.enter(root);
        for line in ANCHOR_LOOKUP.iter().chain(ATTR_HELPER) {
            self.line(line);
        }

        for name in distinct_names(root) {
            self.line(&format!("let {} = undefined;", name));
        }

        for nested in root.components() {
            self.component(nested);
        }
        self.events(root);
        self.setters(root);

        self.line("window.addEventListener('load', () => {");
        self.indent_level += 1;
        self.startup(root, true);
        self.indent_level -= 1;
        self.line("});");
        self.scopes.pop();

        let mut output = std::mem::take(&mut self.output);
        if output.ends_with('\n') {
            output.pop();
        }
        output
    }

    /// `const c_<name> = (params) => { ... }` rendering into a detached container
    fn component(&mut self, unit: &ComponentUnit) {
        let params: Vec<&str> = unit
            .variables
            .iter()
            .filter(|v| v.is_parameter())
            .map(|v| v.name.as_str())
            .collect();

        self.line(&format!(
            "const c_{} = ({}) => {{",
            js_ident(&unit.name),
            params.join(", ")
        ));
        self.indent_level += 1;

        self.line("const __root = document.createElement('div');");
        self.line(&format!(
            "__root.innerHTML = {};",
            js_string(&markup::render(&unit.tree, false))
        ));
        for line in NESTED_ANCHOR_LOOKUP {
            self.line(line);
        }

        for name in distinct_names(unit) {
            if !params.contains(&name) {
                self.line(&format!("let {} = undefined;", name));
            }
        }

        self.enter(unit);
        for nested in unit.components() {
            self.component(nested);
        }
        self.events(unit);
        self.setters(unit);
        self.startup(unit, false);
        self.line("return __root.innerHTML;");
        self.scopes.pop();

        self.indent_level -= 1;
        self.line("};");
    }

    fn events(&mut self, unit: &ComponentUnit) {
        for cond in &unit.conditionals {
            self.line(&format!("const event_{} = () => {{", js_ident(&cond.id)));
            self.indent_level += 1;
            self.line(&format!("const __test = !!({});", cond.test));
            for branch in &cond.branches {
                let (shown, hidden) = if branch.when { ("''", "'none'") } else { ("'none'", "''") };
                self.line(&format!(
                    "__anchor({}).style.display = __test ? {} : {};",
                    js_string(&branch.anchor),
                    shown,
                    hidden
                ));
            }
            self.indent_level -= 1;
            self.line("};");
        }

        for anchor in unit.anchor_groups() {
            self.line(&format!("const event_{} = () => {{", js_ident(&anchor)));
            self.indent_level += 1;
            self.line(&format!("const __el = __anchor({});", js_string(&anchor)));

            for bound in unit.bound_values.iter().filter(|b| b.anchor == anchor) {
                match &bound.target {
                    BindingTarget::Attribute(name) => self.line(&format!(
                        "__attr(__el, {}, ({}));",
                        js_string(name),
                        bound.expression
                    )),
                    BindingTarget::Content => {
                        self.line(&format!("__el.innerHTML = ({});", bound.expression))
                    }
                }
            }

            for lp in unit.loops.iter().filter(|l| l.anchor == anchor) {
                let bindings = lp.bindings.join(", ");
                self.line(&format!(
                    "__el.innerHTML = ({}).map(({}) => c_{}({})).join('');",
                    lp.source,
                    bindings,
                    js_ident(&lp.component),
                    bindings
                ));
            }

            for call in unit.calls.iter().filter(|c| c.anchor == anchor) {
                let callee = self.callee(&call.component);
                self.line(&format!("__el.innerHTML = {}({});", callee, call.args));
            }

            self.indent_level -= 1;
            self.line("};");
        }
    }

    fn setters(&mut self, unit: &ComponentUnit) {
        for name in distinct_names(unit) {
            self.line(&format!("const set_{} = (newValue) => {{", name));
            self.indent_level += 1;
            self.line(&format!("{} = newValue;", name));
            for event in unit.variable_events.events_for(name) {
                self.line(&format!("event_{}();", js_ident(event)));
            }
            self.indent_level -= 1;
            self.line("};");
        }
    }

    /// Initial setter calls in declaration order, then the events no
    /// variable triggers so they still run once.
    fn startup(&mut self, unit: &ComponentUnit, apply_overrides: bool) {
        for var in &unit.variables {
            let value = match &var.initializer {
                None => var.name.as_str(),
                Some(init) => match self.overrides.get(&var.name) {
                    Some(value) if apply_overrides => value.as_str(),
                    _ => init.as_str(),
                },
            };
            self.line(&format!("set_{}({});", var.name, value));
        }

        for id in unit.event_ids() {
            if !unit.variable_events.is_tracked(&id) {
                self.line(&format!("event_{}();", js_ident(&id)));
            }
        }
    }
}

/// Variable names in first-declaration order, each once
fn distinct_names(unit: &ComponentUnit) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for var in &unit.variables {
        if !names.contains(&var.name.as_str()) {
            names.push(&var.name);
        }
    }
    names
}

/// Double-quoted JavaScript string literal, safe inside an inline `<script>`
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            '/' if out.ends_with('<') => out.push_str("\\/"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
