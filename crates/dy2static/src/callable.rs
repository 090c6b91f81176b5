// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Callable references as seen by the tracer.
//!
//! A [`Callable`] is a cheap, clonable handle (`Arc`) with identity: two
//! handles are equal only if they point at the same callable. Its category
//! is a closed [`CallableKind`], so classification is a `match`, not a chain
//! of runtime probes.
//!
//! # Wrapper Markers
//! A callable may wrap another one:
//! - [`CallableKind::StaticFunction`]: the user decorated it with
//!   `to_static`.
//! - a *converted-from* marker: set by conversion backends on every
//!   callable they produce.
//!
//! [`Callable::unwrap_decorators`] follows both markers down to the
//! innermost original, which is what makes conversion idempotent.

use crate::{CallError, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Host name given to anonymous function literals.
pub const LAMBDA_NAME: &str = "<lambda>";

/// An executable body: positional arguments in, one value out.
pub type Body = Arc<dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync>;

/// Conversion flags attached to a callable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConversionOptions {
    /// Never convert this callable; run it as-is.
    pub not_convert: bool,
}

/// Opaque identity of a callable, stable while any handle is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(usize);

// ── Instances ──────────────────────────────────────────────────────

/// An object instance: the receiver of a bound method or a callable object.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

struct InstanceInner {
    qualified_type: String,
}

impl Instance {
    /// `qualified_type` is the dotted type path, e.g. `"paddle.nn.Sequential"`.
    pub fn new(qualified_type: impl Into<String>) -> Self {
        Self(Arc::new(InstanceInner {
            qualified_type: qualified_type.into(),
        }))
    }

    pub fn qualified_type(&self) -> &str {
        &self.0.qualified_type
    }

    /// The type name without its module path.
    pub fn type_name(&self) -> &str {
        let t = self.qualified_type();
        t.rsplit('.').next().unwrap_or(t)
    }

    /// The module the type is defined in, if the path has one.
    pub fn module(&self) -> Option<&str> {
        self.qualified_type().rsplit_once('.').map(|(m, _)| m)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.qualified_type())
    }
}

// ── Namespaces ─────────────────────────────────────────────────────

/// A name binding inside a [`Namespace`].
#[derive(Debug, Clone)]
pub enum Binding {
    Callable(Callable),
    /// A class: only its static-method names matter for reachability.
    Class {
        name: String,
        static_methods: BTreeSet<String>,
    },
    Value(Value),
}

/// A module-level scope functions are declared in.
///
/// Functions keep a weak reference to their scope, so a namespace that
/// binds its own functions does not leak.
#[derive(Clone, Default)]
pub struct Namespace(Arc<RwLock<BTreeMap<String, Binding>>>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing any previous binding.
    pub fn bind(&self, name: impl Into<String>, binding: Binding) {
        if let Ok(mut map) = self.0.write() {
            map.insert(name.into(), binding);
        }
    }

    /// Binds a callable under its own name. Anonymous callables are skipped.
    pub fn bind_callable(&self, callable: &Callable) {
        if let Some(name) = callable.name() {
            self.bind(name.to_string(), Binding::Callable(callable.clone()));
        }
    }

    pub fn get(&self, name: &str) -> Option<Binding> {
        self.0.read().ok()?.get(name).cloned()
    }

    /// `true` if `function` is reachable here under `name`: bound directly,
    /// bound through a `to_static` wrapper, or declared as a static method
    /// of a class living in this namespace.
    pub fn reaches(&self, name: &str, function: &Callable) -> bool {
        let Ok(map) = self.0.read() else {
            return false;
        };
        if let Some(Binding::Callable(bound)) = map.get(name) {
            if bound == function || &bound.unwrap_static_function() == function {
                return true;
            }
        }
        map.values().any(|b| match b {
            Binding::Class { static_methods, .. } => static_methods.contains(name),
            _ => false,
        })
    }

    fn downgrade(&self) -> Weak<RwLock<BTreeMap<String, Binding>>> {
        Arc::downgrade(&self.0)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .0
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("Namespace").field("names", &names).finish()
    }
}

// ── Definitions ────────────────────────────────────────────────────

/// A plain function.
#[derive(Clone)]
pub struct FunctionDef {
    name: String,
    module: Option<String>,
    generator: bool,
    scope: Option<Weak<RwLock<BTreeMap<String, Binding>>>>,
    body: Option<Body>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            generator: false,
            scope: None,
            body: None,
        }
    }

    /// The dotted module path the function is defined in.
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// The enclosing scope the function is declared in.
    pub fn in_scope(mut self, scope: &Namespace) -> Self {
        self.scope = Some(scope.downgrade());
        self
    }

    /// Marks the function as producing a generator.
    pub fn generator(mut self, generator: bool) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_body<F>(mut self, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_generator(&self) -> bool {
        self.generator
    }

    pub fn is_lambda(&self) -> bool {
        self.name == LAMBDA_NAME
    }

    /// The declared scope, if it was given and is still alive.
    pub fn scope(&self) -> Option<Namespace> {
        self.scope.as_ref()?.upgrade().map(Namespace)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("generator", &self.generator)
            .field("has_scope", &self.scope.is_some())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A callable object that is neither a function nor a method.
#[derive(Debug, Clone)]
pub struct ObjectDef {
    /// The object itself.
    pub instance: Instance,
    /// The type's call entry point, an unbound function taking the
    /// instance first. `None` when it cannot be retrieved.
    pub call_entry: Option<Callable>,
    /// The `forward` entry point, an unbound function taking the instance
    /// first, for objects that expose one.
    pub forward: Option<Callable>,
    /// Whether the runtime reports the object as a layer.
    pub layer: bool,
}

impl ObjectDef {
    pub fn new(instance: Instance) -> Self {
        Self {
            instance,
            call_entry: None,
            forward: None,
            layer: false,
        }
    }

    pub fn with_call_entry(mut self, call_entry: Callable) -> Self {
        self.call_entry = Some(call_entry);
        self
    }

    /// Marks the object as a layer exposing `forward`.
    pub fn with_forward(mut self, forward: Callable) -> Self {
        self.forward = Some(forward);
        self.layer = true;
        self
    }
}

/// The closed set of callable categories.
#[derive(Clone)]
pub enum CallableKind {
    /// A host builtin function.
    Builtin { name: String, body: Option<Body> },
    Function(FunctionDef),
    /// A function bound to a receiver.
    Method {
        function: Callable,
        receiver: Instance,
    },
    Object(ObjectDef),
    /// A callable decorated with `to_static`.
    StaticFunction { function: Callable },
    /// A traceable replacement for a named builtin.
    Substitute(crate::BuiltinSubstitute),
    /// A converted function with a receiver bound as first argument.
    Partial {
        function: Callable,
        receiver: Instance,
    },
    /// A layer whose `forward` was converted. Calls go to `forward`.
    LayerWrapper { layer: Callable, forward: Callable },
    /// Something that cannot be called at all.
    NotCallable { type_name: String },
}

impl fmt::Debug for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin { name, body } => f
                .debug_struct("Builtin")
                .field("name", name)
                .field("has_body", &body.is_some())
                .finish(),
            Self::Function(def) => f.debug_tuple("Function").field(def).finish(),
            Self::Method { function, receiver } => f
                .debug_struct("Method")
                .field("function", function)
                .field("receiver", receiver)
                .finish(),
            Self::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            Self::StaticFunction { function } => f
                .debug_struct("StaticFunction")
                .field("function", function)
                .finish(),
            Self::Substitute(sub) => f.debug_tuple("Substitute").field(sub).finish(),
            Self::Partial { function, receiver } => f
                .debug_struct("Partial")
                .field("function", function)
                .field("receiver", receiver)
                .finish(),
            Self::LayerWrapper { layer, forward } => f
                .debug_struct("LayerWrapper")
                .field("layer", layer)
                .field("forward", forward)
                .finish(),
            Self::NotCallable { type_name } => f
                .debug_struct("NotCallable")
                .field("type_name", type_name)
                .finish(),
        }
    }
}

// ── Callable ───────────────────────────────────────────────────────

struct CallableInner {
    kind: CallableKind,
    not_convert: AtomicBool,
    converted_from: Option<Callable>,
}

/// A shared handle to a callable.
#[derive(Clone)]
pub struct Callable(Arc<CallableInner>);

impl Callable {
    fn from_kind(kind: CallableKind, converted_from: Option<Callable>) -> Self {
        Self(Arc::new(CallableInner {
            kind,
            not_convert: AtomicBool::new(false),
            converted_from,
        }))
    }

    /// A host builtin without an executable body.
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::from_kind(
            CallableKind::Builtin {
                name: name.into(),
                body: None,
            },
            None,
        )
    }

    /// A host builtin that can be invoked.
    pub fn builtin_with_body<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self::from_kind(
            CallableKind::Builtin {
                name: name.into(),
                body: Some(Arc::new(body)),
            },
            None,
        )
    }

    pub fn function(def: FunctionDef) -> Self {
        Self::from_kind(CallableKind::Function(def), None)
    }

    /// An anonymous function literal.
    pub fn lambda() -> Self {
        Self::function(FunctionDef::new(LAMBDA_NAME))
    }

    pub fn method(function: Callable, receiver: Instance) -> Self {
        Self::from_kind(CallableKind::Method { function, receiver }, None)
    }

    pub fn object(def: ObjectDef) -> Self {
        Self::from_kind(CallableKind::Object(def), None)
    }

    pub fn not_callable(type_name: impl Into<String>) -> Self {
        Self::from_kind(
            CallableKind::NotCallable {
                type_name: type_name.into(),
            },
            None,
        )
    }

    /// Wraps `function` in a `to_static` decoration marker.
    pub fn to_static(function: Callable) -> Self {
        Self::from_kind(CallableKind::StaticFunction { function }, None)
    }

    /// A callable produced by converting `original`. Backends must build
    /// their results with this so that re-classification finds the original.
    pub fn converted(original: &Callable, kind: CallableKind) -> Self {
        Self::from_kind(kind, Some(original.clone()))
    }

    pub(crate) fn substitute(sub: crate::BuiltinSubstitute) -> Self {
        Self::from_kind(CallableKind::Substitute(sub), None)
    }

    pub(crate) fn partial(function: Callable, receiver: Instance) -> Self {
        Self::from_kind(CallableKind::Partial { function, receiver }, None)
    }

    pub(crate) fn layer_wrapper(layer: Callable, forward: Callable) -> Self {
        Self::from_kind(CallableKind::LayerWrapper { layer, forward }, None)
    }

    pub fn kind(&self) -> &CallableKind {
        &self.0.kind
    }

    pub fn id(&self) -> CallableId {
        CallableId(Arc::as_ptr(&self.0) as usize)
    }

    /// The callable's own name, `None` for objects and derived wrappers.
    pub fn name(&self) -> Option<&str> {
        match self.kind() {
            CallableKind::Builtin { name, .. } => Some(name),
            CallableKind::Function(def) => Some(def.name()),
            CallableKind::Method { function, .. }
            | CallableKind::StaticFunction { function } => function.name(),
            CallableKind::Substitute(sub) => Some(sub.name()),
            _ => None,
        }
    }

    /// The dotted module path the callable (or its type) is defined in.
    pub fn module(&self) -> Option<&str> {
        match self.kind() {
            CallableKind::Builtin { .. } | CallableKind::Substitute(_) => Some("builtins"),
            CallableKind::Function(def) => def.module.as_deref(),
            CallableKind::Method { function, .. }
            | CallableKind::StaticFunction { function } => function.module(),
            CallableKind::Object(obj) => obj.instance.module(),
            _ => None,
        }
    }

    /// Current conversion flags.
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions {
            not_convert: self.0.not_convert.load(Ordering::Acquire),
        }
    }

    /// Replaces the conversion flags. Every handle to this callable sees
    /// the change.
    pub fn set_options(&self, options: ConversionOptions) {
        self.0.not_convert.store(options.not_convert, Ordering::Release);
    }

    /// Opts the callable out of conversion and returns it.
    pub fn not_to_static(self) -> Self {
        self.set_options(ConversionOptions { not_convert: true });
        self
    }

    /// The callable this one was converted from, if any.
    pub fn converted_from(&self) -> Option<&Callable> {
        self.0.converted_from.as_ref()
    }

    /// Strips `to_static` markers only.
    pub fn unwrap_static_function(&self) -> Callable {
        let mut current = self.clone();
        while let CallableKind::StaticFunction { function } = current.kind() {
            let next = function.clone();
            current = next;
        }
        current
    }

    /// Follows `to_static` and converted-from markers to the innermost
    /// original callable.
    pub fn unwrap_decorators(&self) -> Callable {
        let mut current = self.clone();
        loop {
            let next = match (current.kind(), current.converted_from()) {
                (CallableKind::StaticFunction { function }, _) => function.clone(),
                (_, Some(original)) => original.clone(),
                _ => return current,
            };
            current = next;
        }
    }

    /// Invokes the callable. Bound receivers are passed as the first
    /// argument.
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        match self.kind() {
            CallableKind::Builtin { body: Some(body), .. } => body(args),
            CallableKind::Function(FunctionDef {
                body: Some(body), ..
            }) => body(args),
            CallableKind::Method { function, receiver }
            | CallableKind::Partial { function, receiver } => {
                function.call(&prepend(receiver, args))
            }
            CallableKind::Object(ObjectDef {
                instance,
                call_entry: Some(entry),
                ..
            }) => entry.call(&prepend(instance, args)),
            CallableKind::StaticFunction { function } => function.call(args),
            CallableKind::LayerWrapper { forward, .. } => forward.call(args),
            CallableKind::Substitute(sub) => sub.call(args),
            _ => Err(CallError::NotInvocable(self.to_string())),
        }
    }
}

fn prepend(receiver: &Instance, args: &[Value]) -> Vec<Value> {
    let mut full = Vec::with_capacity(args.len() + 1);
    full.push(Value::Instance(receiver.clone()));
    full.extend_from_slice(args);
    full
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Callable {}

impl Hash for Callable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            CallableKind::Builtin { name, .. } => write!(f, "<built-in function {name}>"),
            CallableKind::Function(def) => match &def.module {
                Some(m) => write!(f, "<function {m}.{}>", def.name),
                None => write!(f, "<function {}>", def.name),
            },
            CallableKind::Method { function, receiver } => write!(
                f,
                "<bound method {}.{} of {}>",
                receiver.type_name(),
                function.name().unwrap_or("?"),
                receiver.qualified_type()
            ),
            CallableKind::Object(obj) => write!(f, "<{} object>", obj.instance.qualified_type()),
            CallableKind::StaticFunction { function } => write!(f, "<StaticFunction {function}>"),
            CallableKind::Substitute(sub) => write!(f, "<substitute {}>", sub.name()),
            CallableKind::Partial { function, receiver } => {
                write!(f, "functools.partial({function}, <{} object>)", receiver.qualified_type())
            }
            CallableKind::LayerWrapper { layer, .. } => write!(f, "<converted {layer}>"),
            CallableKind::NotCallable { type_name } => write!(f, "<{type_name} object>"),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_one() -> Callable {
        Callable::function(FunctionDef::new("add_one").in_module("app").with_body(|args| {
            match args {
                [Value::Int(x)] => Ok(Value::Int(x + 1)),
                _ => Err(CallError::Type("add_one expects one int".into())),
            }
        }))
    }

    #[test]
    fn test_identity_equality() {
        let f = add_one();
        let g = f.clone();
        assert_eq!(f, g);
        assert_ne!(f, add_one());
        assert_eq!(f.id(), g.id());
    }

    #[test]
    fn test_options_shared_between_handles() {
        let f = add_one();
        let alias = f.clone();
        let f = f.not_to_static();
        assert!(alias.options().not_convert);
        assert!(f.options().not_convert);
    }

    #[test]
    fn test_unwrap_decorators() {
        let f = add_one();
        let decorated = Callable::to_static(Callable::to_static(f.clone()));
        assert_eq!(decorated.unwrap_decorators(), f);

        let converted = Callable::converted(&f, CallableKind::Function(FunctionDef::new("add_one")));
        assert_eq!(converted.unwrap_decorators(), f);
        assert_eq!(Callable::to_static(converted).unwrap_decorators(), f);
    }

    #[test]
    fn test_namespace_reachability() {
        let ns = Namespace::new();
        let f = Callable::function(FunctionDef::new("f").in_scope(&ns));
        assert!(!ns.reaches("f", &f));
        ns.bind_callable(&f);
        assert!(ns.reaches("f", &f));

        // A to_static wrapper bound under the name still reaches `f`.
        ns.bind("f", Binding::Callable(Callable::to_static(f.clone())));
        assert!(ns.reaches("f", &f));

        // Rebinding the name to something else makes `f` unreachable.
        ns.bind("f", Binding::Value(Value::Int(0)));
        assert!(!ns.reaches("f", &f));

        ns.bind(
            "Helper",
            Binding::Class {
                name: "Helper".into(),
                static_methods: ["f".to_string()].into_iter().collect(),
            },
        );
        assert!(ns.reaches("f", &f));
    }

    #[test]
    fn test_scope_is_weak() {
        let ns = Namespace::new();
        let def = FunctionDef::new("f").in_scope(&ns);
        assert!(def.scope().is_some());
        drop(ns);
        assert!(def.scope().is_none());
    }

    #[test]
    fn test_call_bound_method() {
        let receiver = Instance::new("app.Model");
        let function = Callable::function(FunctionDef::new("count").with_body(|args| {
            Ok(Value::Int(args.len() as i64))
        }));
        let method = Callable::method(function, receiver.clone());
        assert_eq!(method.call(&[Value::Int(1)]).unwrap(), Value::Int(2));
        assert_eq!(method.module(), None);
        assert_eq!(receiver.type_name(), "Model");
        assert_eq!(receiver.module(), Some("app"));
    }

    #[test]
    fn test_call_without_body() {
        let err = Callable::builtin("len").call(&[]).unwrap_err();
        assert!(matches!(err, CallError::NotInvocable(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(add_one().to_string(), "<function app.add_one>");
        assert_eq!(Callable::builtin("len").to_string(), "<built-in function len>");
        let obj = Callable::object(ObjectDef::new(Instance::new("app.Net")));
        assert_eq!(obj.to_string(), "<app.Net object>");
        assert_eq!(obj.module(), Some("app"));
    }
}
