//! Structural rewrites of every `leaf` instance inside a `root` value.
//!
//! [`Traversal::compile`] searches the type graph once for the paths from
//! `root` to `leaf`. Paths are cut at named object types ("waypoints"): a
//! value's tags say at runtime whether it really is that object, so each
//! waypoint gets its own plan and the search never has to unfold recursion.
//! Other named types are walked through inline. When one of them recurses
//! into itself it gets a plan too, followed by shape alone.
//!
//! A path that crosses a union (or intersection) with more than one real
//! option cannot tell which branch produced a value. Reaching a leaf that way
//! is only allowed when the leaf is itself a named object, since its tags can
//! then be checked.

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;

use indexmap::IndexMap;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ty::{AdditionalProperties, NamedType, Type};
use crate::value::{Array, Object, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Property(String),
    /// Every element.
    Array,
    /// Every key not in `defined`.
    AdditionalProperty { defined: Vec<String> },
}

/// Plans are keyed by the named type they start from. A recursive inline
/// type entered below an ambiguous union keeps that ambiguity in its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlanKey {
    id: usize,
    ambiguous: bool,
}

impl PlanKey {
    fn of(named: &NamedType) -> Self {
        PlanKey { id: named.id(), ambiguous: false }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Leaf,
    /// Entered only when the value carries the object's tag.
    Waypoint(NamedType),
    /// A named type that is not an object and recurses into itself.
    Recurse { named: NamedType, ambiguous: bool },
}

impl Target {
    fn plan(&self) -> Option<PlanKey> {
        match self {
            Target::Leaf => None,
            Target::Waypoint(w) => Some(PlanKey::of(w)),
            Target::Recurse { named, ambiguous } => Some(PlanKey { id: named.id(), ambiguous: *ambiguous }),
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    steps: Vec<Step>,
    target: Target,
}

impl Route {
    fn same(&self, other: &Route) -> bool {
        self.steps == other.steps
            && match (&self.target, &other.target) {
                (Target::Leaf, Target::Leaf) => true,
                (Target::Waypoint(a), Target::Waypoint(b)) => a.ptr_eq(b),
                (Target::Recurse { named: a, ambiguous: x }, Target::Recurse { named: b, ambiguous: y }) => {
                    a.ptr_eq(b) && x == y
                }
                _ => false,
            }
    }
}

/// Concrete position of a value below the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Position {
    Key(String),
    Index(usize),
}

type OnLeaf<'a> = dyn FnMut(&[Position], &Value) -> Value + 'a;

fn render_steps(steps: &[Step]) -> String {
    if steps.is_empty() {
        return "(root)".to_string();
    }
    let mut out = String::new();
    for step in steps {
        match step {
            Step::Property(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
            Step::Array => out.push_str("[]"),
            Step::AdditionalProperty { .. } => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push('*');
            }
        }
    }
    out
}

/// A compiled root-to-leaf plan. Compile once, then `map`/`pmap` as often as
/// needed.
#[derive(Debug)]
pub struct Traversal {
    root: NamedType,
    leaf: NamedType,
    plans: HashMap<PlanKey, Vec<Route>>,
}

struct Compiler<'a> {
    root: &'a NamedType,
    leaf: &'a NamedType,
    plans: HashMap<PlanKey, Vec<Route>>,
    queue: VecDeque<(NamedType, Option<String>)>,
    scheduled: HashSet<PlanKey>,
    /// Named types being expanded, with the step depth they were entered at.
    inline_stack: Vec<(usize, usize)>,
}

impl Compiler<'_> {
    fn plan(&mut self, named: &NamedType, ambiguous: Option<&str>) -> Result<()> {
        let mut routes = Vec::new();
        let mut steps = Vec::new();
        self.inline_stack.push((named.id(), 0));
        let walked = self.walk(named.definition(), &mut steps, ambiguous, &mut routes);
        self.inline_stack.pop();
        walked?;
        self.plans.insert(PlanKey { id: named.id(), ambiguous: ambiguous.is_some() }, routes);
        Ok(())
    }

    fn walk(&mut self, ty: &Type, steps: &mut Vec<Step>, ambiguous: Option<&str>, routes: &mut Vec<Route>) -> Result<()> {
        match ty {
            Type::Named(n) if n.ptr_eq(self.leaf) => {
                if let Some(path) = ambiguous {
                    if !matches!(n.definition(), Type::Object(_)) {
                        return Err(Error::AmbiguousTraversal {
                            root: self.root.name().to_string(),
                            leaf: self.leaf.name().to_string(),
                            path: path.to_string(),
                        });
                    }
                }
                push_route(routes, Route { steps: steps.clone(), target: Target::Leaf });
            }
            Type::Named(n) if matches!(n.definition(), Type::Object(_)) => {
                if self.scheduled.insert(PlanKey::of(n)) {
                    self.queue.push_back((n.clone(), None));
                }
                push_route(routes, Route { steps: steps.clone(), target: Target::Waypoint(n.clone()) });
            }
            Type::Named(n) => {
                if let Some(&(_, depth)) = self.inline_stack.iter().find(|(id, _)| *id == n.id()) {
                    // Recursing without a step in between lands on the same value.
                    if steps.len() > depth {
                        let key = PlanKey { id: n.id(), ambiguous: ambiguous.is_some() };
                        if self.scheduled.insert(key) {
                            self.queue.push_back((n.clone(), ambiguous.map(str::to_string)));
                        }
                        let target = Target::Recurse { named: n.clone(), ambiguous: key.ambiguous };
                        push_route(routes, Route { steps: steps.clone(), target });
                    }
                    return Ok(());
                }
                self.inline_stack.push((n.id(), steps.len()));
                let walked = self.walk(n.definition(), steps, ambiguous, routes);
                self.inline_stack.pop();
                walked?;
            }
            Type::Object(o) => {
                for (name, prop) in &o.properties {
                    steps.push(Step::Property(name.clone()));
                    let walked = self.walk(&prop.value, steps, ambiguous, routes);
                    steps.pop();
                    walked?;
                }
                if let AdditionalProperties::Schema(extra) = &o.additional_properties {
                    steps.push(Step::AdditionalProperty { defined: o.properties.keys().cloned().collect() });
                    let walked = self.walk(extra, steps, ambiguous, routes);
                    steps.pop();
                    walked?;
                }
            }
            Type::Array(a) => {
                steps.push(Step::Array);
                let walked = self.walk(&a.items, steps, ambiguous, routes);
                steps.pop();
                walked?;
            }
            Type::Union(options) | Type::Intersection(options) => {
                let real = options
                    .iter()
                    .filter(|o| !matches!(o.resolve(), Type::Null | Type::Void))
                    .count();
                let here;
                let ambiguous = match ambiguous {
                    None if real > 1 => {
                        here = render_steps(steps);
                        Some(here.as_str())
                    }
                    other => other,
                };
                for option in options.iter() {
                    self.walk(option, steps, ambiguous, routes)?;
                }
            }
            Type::Unknown
            | Type::Void
            | Type::Null
            | Type::Boolean(_)
            | Type::Integer(_)
            | Type::Number(_)
            | Type::String(_) => {}
        }
        Ok(())
    }
}

fn push_route(routes: &mut Vec<Route>, route: Route) {
    if !routes.iter().any(|r| r.same(&route)) {
        routes.push(route);
    }
}

/// Keeps only plans that can actually reach the leaf, and only the routes
/// into them. A plan is live when it has a leaf route or a route into a live
/// plan; cycles of plans with no leaf below them die together.
fn prune(plans: &mut HashMap<PlanKey, Vec<Route>>) {
    let mut live = HashSet::new();
    loop {
        let before = live.len();
        for (&key, routes) in plans.iter() {
            let reaches = routes.iter().any(|r| r.target.plan().is_none_or(|p| live.contains(&p)));
            if reaches {
                live.insert(key);
            }
        }
        if live.len() == before {
            break;
        }
    }
    plans.retain(|key, _| live.contains(key));
    for routes in plans.values_mut() {
        routes.retain(|r| r.target.plan().is_none_or(|p| live.contains(&p)));
    }
}

impl Traversal {
    /// Fails when `leaf` cannot be reached from `root`, or can only be reached
    /// through a union whose branch cannot be identified at runtime.
    pub fn compile(root: &NamedType, leaf: &NamedType) -> Result<Traversal> {
        let mut plans = HashMap::new();
        if root.ptr_eq(leaf) {
            plans.insert(PlanKey::of(root), vec![Route { steps: Vec::new(), target: Target::Leaf }]);
            return Ok(Traversal { root: root.clone(), leaf: leaf.clone(), plans });
        }

        let mut compiler = Compiler {
            root,
            leaf,
            plans,
            queue: VecDeque::from([(root.clone(), None)]),
            scheduled: HashSet::from([PlanKey::of(root)]),
            inline_stack: Vec::new(),
        };
        while let Some((next, ambiguous)) = compiler.queue.pop_front() {
            compiler.plan(&next, ambiguous.as_deref())?;
        }
        let mut plans = compiler.plans;
        prune(&mut plans);
        if !plans.contains_key(&PlanKey::of(root)) {
            return Err(Error::UnreachableLeaf { root: root.name().to_string(), leaf: leaf.name().to_string() });
        }
        debug!(
            root = root.name(),
            leaf = leaf.name(),
            plans = plans.len(),
            routes = plans.values().map(Vec::len).sum::<usize>(),
            "compiled traversal"
        );
        Ok(Traversal { root: root.clone(), leaf: leaf.clone(), plans })
    }

    pub fn root(&self) -> &NamedType {
        &self.root
    }

    pub fn leaf(&self) -> &NamedType {
        &self.leaf
    }

    /// Applies `f` to every leaf instance and rebuilds the containers above
    /// the ones that changed. Untouched subtrees, and the root itself when
    /// nothing changed, are returned as the original shared values.
    pub fn map<F>(&self, value: &Value, mut f: F) -> Result<Value>
    where
        F: FnMut(&Value) -> Value,
    {
        self.check_root(value)?;
        let mut on_leaf = |_: &[Position], leaf: &Value| f(leaf);
        Ok(self.visit(PlanKey::of(&self.root), value, &mut Vec::new(), &mut on_leaf))
    }

    /// `map` with an async transform. One task per leaf is spawned on the
    /// current tokio runtime and results are awaited together. The first
    /// failure is returned immediately; tasks still running are detached and
    /// run to completion in the background.
    pub async fn pmap<F, Fut>(&self, value: &Value, f: F) -> Result<Value>
    where
        F: Fn(Value) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.check_root(value)?;
        let root = PlanKey::of(&self.root);

        let mut leaves: IndexMap<Vec<Position>, Value> = IndexMap::new();
        self.visit(root, value, &mut Vec::new(), &mut |at: &[Position], leaf: &Value| {
            leaves.entry(at.to_vec()).or_insert_with(|| leaf.clone());
            leaf.clone()
        });

        let mut tasks = JoinSet::new();
        for (i, leaf) in leaves.values().cloned().enumerate() {
            let fut = f(leaf);
            tasks.spawn(async move { (i, fut.await) });
        }
        let mut done: Vec<Option<Value>> = vec![None; leaves.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, Ok(out))) => done[i] = Some(out),
                Ok((_, Err(err))) => {
                    tasks.detach_all();
                    return Err(Error::Transform(err));
                }
                Err(err) => {
                    tasks.detach_all();
                    return Err(Error::TransformPanicked(err.to_string()));
                }
            }
        }

        // Results go back to the position their leaf was read from. A position
        // only reachable after an earlier replacement had no transform run.
        let results = leaves
            .into_keys()
            .zip(done)
            .filter_map(|(at, out)| out.map(|out| (at, out)))
            .collect::<HashMap<_, _>>();
        Ok(self.visit(root, value, &mut Vec::new(), &mut |at: &[Position], leaf: &Value| {
            results.get(at).cloned().unwrap_or_else(|| leaf.clone())
        }))
    }

    fn check_root(&self, value: &Value) -> Result<()> {
        if self.root.is_a(value) == Some(false) {
            return Err(Error::RootMismatch { root: self.root.name().to_string() });
        }
        Ok(())
    }

    fn visit(&self, plan: PlanKey, value: &Value, at: &mut Vec<Position>, on_leaf: &mut OnLeaf<'_>) -> Value {
        let Some(routes) = self.plans.get(&plan) else {
            return value.clone();
        };
        let mut current = value.clone();
        for route in routes {
            current = self.follow(&route.steps, &route.target, &current, at, on_leaf);
        }
        current
    }

    fn follow(
        &self,
        steps: &[Step],
        target: &Target,
        value: &Value,
        at: &mut Vec<Position>,
        on_leaf: &mut OnLeaf<'_>,
    ) -> Value {
        let Some((step, rest)) = steps.split_first() else {
            return match target {
                Target::Leaf if self.leaf.is_a(value).unwrap_or(true) => on_leaf(at, value),
                Target::Waypoint(w) if w.is_a(value) == Some(true) => self.visit(PlanKey::of(w), value, at, on_leaf),
                Target::Recurse { named, ambiguous } => {
                    self.visit(PlanKey { id: named.id(), ambiguous: *ambiguous }, value, at, on_leaf)
                }
                _ => value.clone(),
            };
        };

        match (step, value) {
            (Step::Property(name), Value::Object(o)) => {
                let Some(child) = o.get(name).filter(|c| !c.is_undefined()) else {
                    return value.clone();
                };
                at.push(Position::Key(name.clone()));
                let next = self.follow(rest, target, child, at, on_leaf);
                at.pop();
                if next.same(child) {
                    return value.clone();
                }
                let mut rebuilt = o.clone();
                rebuilt.insert(name.as_str(), next);
                Value::Object(rebuilt)
            }
            (Step::AdditionalProperty { defined }, Value::Object(o)) => {
                let mut rebuilt: Option<Object> = None;
                for (key, child) in o.iter() {
                    if defined.contains(key) || child.is_undefined() {
                        continue;
                    }
                    at.push(Position::Key(key.clone()));
                    let next = self.follow(rest, target, child, at, on_leaf);
                    at.pop();
                    if !next.same(child) {
                        rebuilt.get_or_insert_with(|| o.clone()).insert(key.as_str(), next);
                    }
                }
                rebuilt.map_or_else(|| value.clone(), Value::Object)
            }
            (Step::Array, Value::Array(a)) => {
                let mut rebuilt: Option<Array> = None;
                for (i, child) in a.iter().enumerate() {
                    at.push(Position::Index(i));
                    let next = self.follow(rest, target, child, at, on_leaf);
                    at.pop();
                    if !next.same(child) {
                        rebuilt.get_or_insert_with(|| a.clone()).set(i, next);
                    }
                }
                rebuilt.map_or_else(|| value.clone(), Value::Array)
            }
            _ => value.clone(),
        }
    }
}
