/// Tree rewriting pass
///
/// Walks a unit's tree once, depth first, turning every dynamic region into
/// an anchor and recording how the runtime should refresh it. Side tables
/// are collected in a `BuildContext` and merged into the unit at the end.

use crate::compiler::anchor::{js_ident, make_anchor, IdGenerator};
use crate::compiler::ast::{literal, Attribute, Conditional, Element, Literal, Loop, Node};
use crate::compiler::emitter::js_string;
use crate::compiler::error::{CompileError, Result};
use crate::compiler::scanner;
use crate::compiler::unit::{
    BindingTarget, BoundValue, Branch, ComponentCall, ComponentUnit, ConditionalEvent,
    LoopBinding, UnitState, Variable, VariableEvents,
};

/// Mutable state of one unit's rewrite, owned by that rewrite only
pub struct BuildContext<'a> {
    ids: &'a mut dyn IdGenerator,
    variables: Vec<Variable>,
    conditionals: Vec<ConditionalEvent>,
    bound_values: Vec<BoundValue>,
    loops: Vec<LoopBinding>,
    calls: Vec<ComponentCall>,
    variable_events: VariableEvents,
    components: Vec<ComponentUnit>,
}

impl<'a> BuildContext<'a> {
    pub fn new(ids: &'a mut dyn IdGenerator, variables: Vec<Variable>) -> Self {
        BuildContext {
            ids,
            variables,
            conditionals: Vec::new(),
            bound_values: Vec::new(),
            loops: Vec::new(),
            calls: Vec::new(),
            variable_events: VariableEvents::new(),
            components: Vec::new(),
        }
    }

    fn mint(&mut self) -> String {
        self.ids.next_id()
    }

    /// Declared variables referenced by `expr`, each reported once
    fn known_references(&self, expr: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let known = self.variables.iter().map(|v| v.name.as_str());
        for name in scanner::references(expr, known) {
            if !found.contains(&name) {
                found.push(name);
            }
        }
        found
    }

    /// Register `event` under every declared variable `expr` references.
    /// Returns whether anything was registered.
    fn depend(&mut self, expr: &str, event: &str) -> bool {
        let deps = self.known_references(expr);
        for name in &deps {
            self.variable_events.record(name, event);
        }
        !deps.is_empty()
    }

    /// Hand every collected table over to `unit`
    pub fn merge_into(self, unit: &mut ComponentUnit) {
        unit.variables = self.variables;
        unit.conditionals = self.conditionals;
        unit.bound_values = self.bound_values;
        unit.loops = self.loops;
        unit.calls = self.calls;
        unit.variable_events = self.variable_events;
        for nested in self.components {
            unit.register(nested);
        }
    }
}

/// What replaces the node currently being visited
enum Step {
    /// Put the (possibly modified) node back and move past it
    Keep(Node),
    /// Replace the node with these, none of which is visited again
    Splice(Vec<Node>),
}

/// Rewrite a single unit. Nested units it discovers are registered on it,
/// not rewritten.
pub fn rewrite_unit(unit: &mut ComponentUnit, ids: &mut dyn IdGenerator) -> Result<()> {
    unit.advance(UnitState::Rewriting)?;

    let mut tree = std::mem::take(&mut unit.tree);
    let mut ctx = BuildContext::new(ids, std::mem::take(&mut unit.variables));
    rewrite_nodes(&mut ctx, &mut tree, None)?;

    unit.tree = tree;
    ctx.merge_into(unit);
    unit.advance(UnitState::Rewritten)?;

    tracing::debug!(
        unit = %unit.name,
        variables = unit.variables.len(),
        conditionals = unit.conditionals.len(),
        bound_values = unit.bound_values.len(),
        loops = unit.loops.len(),
        calls = unit.calls.len(),
        components = unit.components().len(),
        "rewrote unit"
    );
    Ok(())
}

/// Rewrite `root` and then every unit registered beneath it, parents first.
pub fn rewrite_all(root: &mut ComponentUnit, ids: &mut dyn IdGenerator) -> Result<()> {
    root.for_each_unit_mut(&mut |unit: &mut ComponentUnit| rewrite_unit(unit, &mut *ids))
}

fn rewrite_nodes(ctx: &mut BuildContext<'_>, nodes: &mut Vec<Node>, hint: Option<&str>) -> Result<()> {
    let mut i = 0;
    // Length is re-read every step: nodes get spliced in and removed
    while i < nodes.len() {
        let sole_child = nodes.len() == 1;
        let node = std::mem::replace(&mut nodes[i], Node::Text(String::new()));

        let step = match node {
            Node::Loop(lp) => rewrite_loop(ctx, lp, sole_child, hint),
            Node::ComponentDefinition(def) => {
                ctx.components
                    .push(ComponentUnit::component(&def.name, &def.params, def.body));
                Step::Splice(Vec::new())
            }
            Node::ComponentInvocation(call) => {
                let anchor = ctx.mint();
                let variable_dependent = ctx.depend(&call.args, &anchor);
                ctx.calls.push(ComponentCall {
                    anchor: anchor.clone(),
                    args: call.args,
                    component: call.name,
                    variable_dependent,
                });
                Step::Splice(vec![make_anchor(&anchor, Vec::new(), false)])
            }
            Node::Conditional(cond) => rewrite_conditional(ctx, cond)?,
            Node::InlineCode(code) => rewrite_inline_code(ctx, code),
            Node::Element(el) => rewrite_element(ctx, el)?,
            Node::Include(path) => return Err(CompileError::UnresolvedInclude { path }),
            other => Step::Keep(other),
        };

        match step {
            Step::Keep(node) => {
                nodes[i] = node;
                i += 1;
            }
            Step::Splice(replacement) => {
                let count = replacement.len();
                nodes.splice(i..=i, replacement);
                i += count;
            }
        }
    }

    Ok(())
}

fn rewrite_loop(ctx: &mut BuildContext<'_>, lp: Loop, sole_child: bool, hint: Option<&str>) -> Step {
    // A loop alone inside an addressable parent renders straight into it
    let (anchor, replacement) = match hint {
        Some(parent) if sole_child => (parent.to_string(), Vec::new()),
        _ => {
            let id = ctx.mint();
            let div = make_anchor(&id, Vec::new(), false);
            (id, vec![div])
        }
    };

    let component = format!("each_{}", js_ident(&anchor));
    ctx.depend(&lp.source, &anchor);
    ctx.loops.push(LoopBinding {
        anchor,
        source: lp.source,
        bindings: lp.bindings.clone(),
        component: component.clone(),
    });
    ctx.components
        .push(ComponentUnit::component(&component, &lp.bindings, lp.body));

    Step::Splice(replacement)
}

fn rewrite_conditional(ctx: &mut BuildContext<'_>, cond: Conditional) -> Result<Step> {
    let true_id = ctx.mint();
    let false_id = cond.alternate.as_ref().map(|_| ctx.mint());
    let event = ctx.mint();

    let mut branches = vec![Branch {
        when: true,
        anchor: true_id.clone(),
    }];
    if let Some(id) = &false_id {
        branches.push(Branch {
            when: false,
            anchor: id.clone(),
        });
    }

    ctx.depend(&cond.test, &event);
    ctx.conditionals.push(ConditionalEvent {
        id: event,
        test: cond.test,
        branches,
    });

    let mut consequent = cond.consequent;
    rewrite_nodes(ctx, &mut consequent, Some(&true_id))?;

    let mut replacement = Vec::with_capacity(2);
    if let (Some(mut alternate), Some(id)) = (cond.alternate, false_id) {
        rewrite_nodes(ctx, &mut alternate, Some(&id))?;
        replacement.push(make_anchor(&id, alternate, true));
    }
    replacement.push(make_anchor(&true_id, consequent, true));

    Ok(Step::Splice(replacement))
}

fn rewrite_inline_code(ctx: &mut BuildContext<'_>, code: String) -> Step {
    match parse_declaration(&code) {
        Declaration::Variable { name, initializer } => {
            ctx.variables.push(Variable::declared(name, initializer));
            Step::Keep(Node::InlineCode(code))
        }
        Declaration::Unsupported => {
            tracing::warn!(code = %code, "declaration does not bind a plain name; it is not reactive");
            Step::Keep(Node::InlineCode(code))
        }
        Declaration::None => {
            let anchor = ctx.mint();
            ctx.depend(&code, &anchor);
            ctx.bound_values.push(BoundValue {
                anchor: anchor.clone(),
                target: BindingTarget::Content,
                expression: code,
            });
            Step::Splice(vec![make_anchor(&anchor, Vec::new(), false)])
        }
    }
}

fn rewrite_element(ctx: &mut BuildContext<'_>, mut el: Element) -> Result<Step> {
    if el.attributes.is_empty() {
        rewrite_nodes(ctx, &mut el.children, None)?;
        return Ok(Step::Keep(Node::Element(el)));
    }

    let existing = el.static_id();
    let mut bound: Vec<(Attribute, Vec<String>)> = Vec::new();
    let mut classes = ClassBinding::default();

    for attr in &el.attributes {
        if attr.name == "id" && existing.is_some() {
            continue;
        }
        let deps = ctx.known_references(&attr.value);
        // Expressions the serializer cannot write are filled in at startup
        let dynamic = !deps.is_empty() || literal(&attr.value).is_none();

        if attr.name == "class" {
            classes.add(&attr.value, deps, dynamic, bound.len());
        } else if dynamic {
            bound.push((attr.clone(), deps));
        }
    }
    if let Some((slot, binding)) = classes.into_binding() {
        bound.insert(slot, binding);
    }

    let anchor = if bound.is_empty() {
        existing
    } else {
        let id = match existing {
            Some(id) => id,
            None => {
                // A bound `id` is written at startup; until then the element
                // answers to its anchor id
                let id = ctx.mint();
                el.attributes.retain(|a| a.name != "id");
                el.attributes.push(Attribute::string("id", &id));
                id
            }
        };

        for (attr, deps) in bound {
            ctx.bound_values.push(BoundValue {
                anchor: id.clone(),
                target: BindingTarget::Attribute(attr.name),
                expression: attr.value,
            });
            for name in &deps {
                ctx.variable_events.record(name, &id);
            }
        }
        Some(id)
    };

    rewrite_nodes(ctx, &mut el.children, anchor.as_deref())?;
    Ok(Step::Keep(Node::Element(el)))
}

/// Every `class` attribute of one element, folded into a single binding so
/// the runtime keeps the static classes the markup already carries.
#[derive(Default)]
struct ClassBinding {
    statics: Vec<String>,
    expressions: Vec<String>,
    deps: Vec<String>,
    slot: Option<usize>,
}

impl ClassBinding {
    fn add(&mut self, value: &str, deps: Vec<String>, dynamic: bool, slot: usize) {
        if !dynamic {
            if let Some(Literal::Str(class) | Literal::Number(class)) = literal(value) {
                if !class.is_empty() {
                    self.statics.push(class);
                }
            }
            return;
        }

        self.slot.get_or_insert(slot);
        self.expressions.push(value.to_string());
        for name in deps {
            if !self.deps.contains(&name) {
                self.deps.push(name);
            }
        }
    }

    fn into_binding(self) -> Option<(usize, (Attribute, Vec<String>))> {
        let slot = self.slot?;
        let expression = if self.statics.is_empty() && self.expressions.len() == 1 {
            self.expressions[0].clone()
        } else {
            let mut parts = Vec::new();
            if !self.statics.is_empty() {
                parts.push(js_string(&self.statics.join(" ")));
            }
            parts.extend(self.expressions.iter().map(|e| format!("({})", e)));
            format!("[{}].filter(Boolean).join(' ')", parts.join(", "))
        };
        Some((slot, (Attribute::new("class", &expression), self.deps)))
    }
}

enum Declaration<'c> {
    Variable { name: &'c str, initializer: &'c str },
    /// Starts like a declaration but binds a pattern, not a name
    Unsupported,
    None,
}

/// Recognise `let|const|var NAME = EXPR`
fn parse_declaration(code: &str) -> Declaration<'_> {
    let code = code.trim();
    let rest = ["let ", "const ", "var "]
        .iter()
        .find_map(|kw| code.strip_prefix(kw));
    let rest = match rest {
        Some(rest) => rest,
        None => return Declaration::None,
    };

    let equals = match rest.find('=') {
        Some(pos) => pos,
        None => return Declaration::Unsupported,
    };

    let name = rest[..equals].trim();
    let initializer = rest[equals + 1..].trim();
    let plain_name = !name.is_empty() && name.chars().all(scanner::is_token_char);
    if !plain_name || initializer.is_empty() {
        return Declaration::Unsupported;
    }

    Declaration::Variable { name, initializer }
}
