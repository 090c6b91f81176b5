// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: end-to-end trace sessions.
//!
//! These tests drive call conversion and precision scopes through a
//! [`TraceSession`], proving that `amp`, `dy2static` and `runtime`
//! compose correctly.

use amp::{
    AmpDType, AmpDispatcher, AmpLevel, DType, Layer, LayerKind, OneOrMany, OpPrecision,
    Optimizer, Place, ScopeOptions, StateDictHook,
};
use dy2static::backend::SourceInspector;
use dy2static::{
    not_to_static, to_static, Binding, BuiltinSubstitute, CallClassifier, CallError, Callable,
    CallableKind, ClassifyError, FallbackReason, FunctionDef, Instance, Namespace, ObjectDef,
    Outcome, TensorSpec, Value,
};
use runtime::{RuntimeError, SessionConfig, TraceSession};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn gpu_config() -> SessionConfig {
    SessionConfig {
        device: Place::gpu(8, 0, Some("11.2")),
        ..Default::default()
    }
}

fn session() -> TraceSession {
    TraceSession::new(gpu_config())
}

/// A user function declared and bound in `module`; returns its argument count.
fn user_fn(module: &Namespace, name: &str) -> Callable {
    let f = Callable::function(
        FunctionDef::new(name)
            .in_module("app.model")
            .in_scope(module)
            .with_body(|args: &[Value]| Ok(Value::Int(args.len() as i64))),
    );
    module.bind_callable(&f);
    f
}

/// Host `len` and `range` as the interpreter would run them.
fn host_builtin(name: &str) -> Callable {
    match name {
        "len" => Callable::builtin_with_body("len", |args: &[Value]| match args {
            [Value::List(v)] | [Value::Tuple(v)] => Ok(Value::Int(v.len() as i64)),
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            _ => Err(CallError::Type("object has no len()".into())),
        }),
        "range" => Callable::builtin_with_body("range", |args: &[Value]| {
            let ints: Vec<i64> = args
                .iter()
                .map(|a| match a {
                    Value::Int(i) => Ok(*i),
                    _ => Err(CallError::Type("expected int".into())),
                })
                .collect::<Result<_, _>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => return Err(CallError::Type("bad arity".into())),
            };
            if step == 0 {
                return Err(CallError::Value("zero step".into()));
            }
            let mut out = Vec::new();
            let mut i = start;
            while (step > 0 && i < stop) || (step < 0 && i > stop) {
                out.push(Value::Int(i));
                i += step;
            }
            Ok(Value::List(out))
        }),
        other => Callable::builtin(other),
    }
}

/// Reports source as unavailable for everything.
struct NoSource;

impl SourceInspector for NoSource {
    fn has_source(&self, _function: &Callable) -> bool {
        false
    }
}

// ── Call conversion ────────────────────────────────────────────

#[test]
fn test_conversion_is_idempotent() {
    let mut session = session();
    let module = Namespace::new();
    let f = user_fn(&module, "forward_step");

    let once = session.convert_call(&f).unwrap();
    let twice = session.convert_call(&once).unwrap();
    let decorated = session.convert_call(&to_static(f.clone())).unwrap();

    assert_ne!(once, f);
    assert_eq!(twice, once);
    assert_eq!(decorated, once);
    assert_eq!(session.classifier().cached_len(), 1);
}

#[test]
fn test_opt_out_honoured_for_generators_and_lambdas() {
    let mut session = session();
    let module = Namespace::new();
    let candidates = [
        user_fn(&module, "plain"),
        Callable::function(FunctionDef::new("gen").in_scope(&module).generator(true)),
        Callable::lambda(),
        Callable::builtin("range"),
    ];
    for c in candidates {
        let c = not_to_static(c);
        let out = session.convert_call_detailed(&c).unwrap();
        assert_eq!(out.outcome, Outcome::OptedOut, "{c}");
        assert_eq!(out.callable, c);
    }
    assert_eq!(session.metrics().count("opted_out"), 4);
}

#[test]
fn test_generator_and_lambda_run_unconverted() {
    let mut session = session();
    let module = Namespace::new();
    let gen = Callable::function(FunctionDef::new("gen").in_scope(&module).generator(true));
    module.bind_callable(&gen);

    let out = session.convert_call_detailed(&gen).unwrap();
    assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::Generator));
    assert_eq!(out.callable, gen);

    let lambda = Callable::lambda();
    let out = session.convert_call_detailed(&lambda).unwrap();
    assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::Lambda));
    assert_eq!(out.callable, lambda);
}

#[test]
fn test_named_builtin_substitutes() {
    let mut session = session();
    for sub in BuiltinSubstitute::ALL {
        let out = session
            .convert_call_detailed(&Callable::builtin(sub.name()))
            .unwrap();
        assert_eq!(out.outcome, Outcome::Substituted(sub));
        assert!(matches!(out.callable.kind(), CallableKind::Substitute(s) if *s == sub));
    }

    let sorted = Callable::builtin("sorted");
    let out = session.convert_call_detailed(&sorted).unwrap();
    assert_eq!(out.outcome.label(), "passthrough.builtin");
    assert_eq!(out.callable, sorted);
}

#[test]
fn test_substitutes_agree_with_builtins() {
    let mut session = session();
    let len = host_builtin("len");
    let range = host_builtin("range");
    let len_sub = session.convert_call(&len).unwrap();
    let range_sub = session.convert_call(&range).unwrap();

    let sequences = [
        Value::List(vec![]),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        Value::Tuple(vec![Value::None]),
        Value::from("hello"),
    ];
    for seq in &sequences {
        let args = std::slice::from_ref(seq);
        assert_eq!(len.call(args).unwrap(), len_sub.call(args).unwrap(), "{seq}");
    }

    let bounds: [&[i64]; 6] = [&[0], &[5], &[-3], &[2, 7], &[7, 2, -2], &[1, 10, 3]];
    for b in bounds {
        let args: Vec<Value> = b.iter().copied().map(Value::Int).collect();
        assert_eq!(range.call(&args).unwrap(), range_sub.call(&args).unwrap(), "{b:?}");
    }
}

#[test]
fn test_substitutes_trace_tensors() {
    let mut session = session();
    let len = session.convert_call(&Callable::builtin("len")).unwrap();
    let range = session.convert_call(&Callable::builtin("range")).unwrap();

    let x = Value::Tensor(TensorSpec::new("x", vec![None, Some(16)]));
    let n = len.call(std::slice::from_ref(&x)).unwrap();
    assert!(n.is_tensor());
    assert!(matches!(range.call(&[n]).unwrap(), Value::Loop(_)));
}

#[test]
fn test_builtin_module_passthrough() {
    let mut session = session();
    let deepcopy = Callable::function(FunctionDef::new("deepcopy").in_module("copy"));
    let out = session.convert_call_detailed(&deepcopy).unwrap();
    assert_eq!(out.outcome.label(), "passthrough.builtin_module");
    assert_eq!(out.callable, deepcopy);
}

#[test]
fn test_unsupported_callable_is_fatal() {
    let mut session = session();
    let err = session
        .convert_call(&Callable::not_callable("int"))
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Classify(ClassifyError::Unsupported { .. })
    ));
    assert_eq!(session.metrics().classify_errors, 1);
}

#[test]
fn test_source_unavailable_falls_back() {
    let classifier = CallClassifier::default().with_inspector(Arc::new(NoSource));
    let mut session = session().with_classifier(classifier);
    let module = Namespace::new();
    let f = user_fn(&module, "dynamic");

    let out = session.convert_call_detailed(&f).unwrap();
    assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::SourceUnavailable));
    assert_eq!(out.callable, f);

    let method = Callable::method(f.clone(), Instance::new("app.model.Net"));
    let out = session.convert_call_detailed(&method).unwrap();
    assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::SourceUnavailable));
    assert_eq!(out.callable, method);
}

#[test]
fn test_transformed_before_runs_as_is() {
    let mut session = session();
    let module = Namespace::new();
    let f = user_fn(&module, "helper");
    module.bind("helper", Binding::Callable(user_fn(&Namespace::new(), "helper")));

    let out = session.convert_call_detailed(&f).unwrap();
    assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::TransformedBefore));
}

#[test]
fn test_static_method_reachable_through_class() {
    let mut session = session();
    let module = Namespace::new();
    let f = Callable::function(FunctionDef::new("norm").in_scope(&module));
    module.bind(
        "Utils",
        Binding::Class {
            name: "Utils".into(),
            static_methods: ["norm".to_string()].into_iter().collect(),
        },
    );
    let out = session.convert_call_detailed(&f).unwrap();
    assert_eq!(out.outcome, Outcome::Converted);
}

#[test]
fn test_bound_method_partially_binds_receiver() {
    let mut session = session();
    let module = Namespace::new();
    let receiver = Instance::new("app.model.Net");
    let method = Callable::method(user_fn(&module, "step"), receiver.clone());

    let converted = session.convert_call(&method).unwrap();
    match converted.kind() {
        CallableKind::Partial { receiver: r, .. } => assert_eq!(r, &receiver),
        other => panic!("expected a partial binding, got {other:?}"),
    }
    // The receiver arrives as the first argument.
    let args = [Value::Int(1), Value::Int(2)];
    assert_eq!(converted.call(&args).unwrap(), method.call(&args).unwrap());
    assert_eq!(converted.call(&args).unwrap(), Value::Int(3));
}

#[test]
fn test_layer_forward_wrapper() {
    let mut session = session();
    let module = Namespace::new();
    let forward = user_fn(&module, "forward");
    let layer = Callable::object(
        ObjectDef::new(Instance::new("app.model.Encoder")).with_forward(forward.clone()),
    );

    let out = session.convert_call_detailed(&layer).unwrap();
    assert_eq!(out.outcome, Outcome::LayerForwardConverted);
    match out.callable.kind() {
        CallableKind::LayerWrapper { layer: original, forward: fwd } => {
            assert_eq!(original, &layer);
            assert!(matches!(fwd.kind(), CallableKind::Partial { .. }));
        }
        other => panic!("expected a layer wrapper, got {other:?}"),
    }
    assert_eq!(out.callable.call(&[Value::None]).unwrap(), Value::Int(2));

    // Wrapping again returns the wrapper itself.
    let again = session.convert_call(&out.callable).unwrap();
    assert_eq!(again, out.callable);
}

#[test]
fn test_callable_object_binds_instance() {
    let mut session = session();
    let module = Namespace::new();
    let entry = user_fn(&module, "__call__");
    let obj = Callable::object(
        ObjectDef::new(Instance::new("app.model.Scale")).with_call_entry(entry),
    );
    let out = session.convert_call_detailed(&obj).unwrap();
    assert_eq!(out.outcome, Outcome::BoundConverted);
    assert_eq!(out.callable.call(&[]).unwrap(), Value::Int(1));
}

#[test]
fn test_sequential_override() {
    let mut session = session();
    let module = Namespace::new();
    let forward = user_fn(&module, "forward");

    let linear = Callable::object(
        ObjectDef::new(Instance::new("paddle.nn.Linear")).with_forward(forward.clone()),
    );
    let out = session.convert_call_detailed(&linear).unwrap();
    assert_eq!(out.outcome.label(), "passthrough.framework_api");

    let seq = Callable::object(
        ObjectDef::new(Instance::new("paddle.nn.Sequential")).with_forward(forward),
    );
    let out = session.convert_call_detailed(&seq).unwrap();
    assert_eq!(out.outcome, Outcome::LayerForwardConverted);
}

// ── Precision scopes ───────────────────────────────────────────

#[test]
fn test_o1_float16_end_to_end() {
    let mut session = session();
    let opts = ScopeOptions::parse(true, vec![], vec![], "O1", "float16").unwrap();
    {
        let scope = session.enter_amp_scope(opts).unwrap();
        assert_eq!(scope.op_precision("conv2d"), OpPrecision::Allow);
        assert_eq!(scope.op_precision("softmax"), OpPrecision::Deny);
        assert_eq!(scope.op_precision("relu"), OpPrecision::Unlisted);
        assert!(scope.in_amp_guard());
    }
    assert_eq!(session.op_precision("conv2d"), OpPrecision::Disabled);
}

#[test]
fn test_nested_scopes_restore_exactly() {
    let mut session = session();
    let before = session.precision_state().clone();
    {
        let mut outer = session.amp_scope().unwrap();
        let outer_state = outer.precision_state().clone();
        {
            let mut inner = outer
                .enter_amp_scope(ScopeOptions::new(AmpLevel::O2, AmpDType::BFloat16))
                .unwrap();
            assert!(inner.in_pure_fp16_guard());
            {
                let innermost = inner
                    .enter_amp_scope(ScopeOptions::default().enabled(false))
                    .unwrap();
                assert_eq!(innermost.op_precision("conv2d"), OpPrecision::Disabled);
            }
            assert_eq!(inner.amp_state().map(|s| s.level), Some(AmpLevel::O2));
        }
        assert_eq!(outer.precision_state(), &outer_state);
    }
    assert_eq!(session.precision_state(), &before);
    assert_eq!(session.metrics().scopes_entered, 3);
}

#[test]
fn test_failing_body_restores_scope() {
    let mut session = session();
    let module = Namespace::new();
    let result: Result<(), RuntimeError> =
        session.with_amp_scope(ScopeOptions::default(), |s| {
            s.convert_call(&user_fn(&module, "ok"))?;
            s.convert_call(&Callable::not_callable("float"))?;
            Ok(())
        });
    assert!(result.is_err());
    assert!(!session.in_amp_guard());
    assert_eq!(session.metrics().count("converted"), 1);
}

#[test]
fn test_invalid_scope_leaves_state_untouched() {
    let mut session = session();
    let mut outer = session.amp_scope().unwrap();
    let snapshot = outer.precision_state().clone();
    assert!(ScopeOptions::parse(true, vec![], vec![], "O3", "float16").is_err());
    let overlapping = ScopeOptions::default()
        .with_white_list(["conv2d"])
        .with_black_list(["conv2d"]);
    assert!(outer.enter_amp_scope(overlapping).is_err());
    assert_eq!(outer.precision_state(), &snapshot);
}

#[test]
fn test_cpu_scope_degrades() {
    let mut session = TraceSession::new(SessionConfig::default());
    let scope = session.amp_scope().unwrap();
    assert!(!scope.precision_state().enabled);
    assert_eq!(scope.op_precision("conv2d"), OpPrecision::Disabled);
}

// ── Decoration ─────────────────────────────────────────────────

#[derive(Debug)]
struct Block {
    kind: LayerKind,
    dtype: DType,
    hooks: Vec<StateDictHook>,
    children: Vec<Block>,
}

impl Block {
    fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            dtype: DType::Float32,
            hooks: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Layer for Block {
    fn type_name(&self) -> &str {
        "Block"
    }
    fn kind(&self) -> LayerKind {
        self.kind
    }
    fn dtype(&self) -> DType {
        self.dtype
    }
    fn cast_parameters(&mut self, dtype: DType) {
        self.dtype = dtype;
    }
    fn children_mut(&mut self) -> Vec<&mut dyn Layer> {
        self.children.iter_mut().map(|c| c as &mut dyn Layer).collect()
    }
    fn register_state_dict_hook(&mut self, hook: StateDictHook) {
        self.hooks.push(hook);
    }
}

#[derive(Debug, Default)]
struct Sgd {
    multi_precision: bool,
}

impl Optimizer for Sgd {
    fn type_name(&self) -> &str {
        "SGD"
    }
    fn is_recognized(&self) -> bool {
        true
    }
    fn set_multi_precision(&mut self, enabled: bool) {
        self.multi_precision = enabled;
    }
}

#[test]
fn test_decorate_through_session_preserves_shape() {
    let toml = r#"
[decorate]
level = "O2"
save_dtype = "float32"
"#;
    let session = TraceSession::new(SessionConfig::from_toml(toml).unwrap());

    let mut net = Block::new(LayerKind::Other);
    net.children = vec![Block::new(LayerKind::Other), Block::new(LayerKind::LayerNorm)];
    let (models, optimizers) = session
        .decorate(OneOrMany::One(net), Some(OneOrMany::One(Sgd::default())))
        .unwrap();

    let net = models.into_one().unwrap();
    assert_eq!(net.dtype, DType::Float16);
    assert_eq!(net.children[0].dtype, DType::Float16);
    assert_eq!(net.children[1].dtype, DType::Float32);
    assert!(!net.hooks.is_empty());
    assert!(optimizers.unwrap().into_one().unwrap().multi_precision);

    let (many, _) = session
        .decorate::<Block, Sgd>(
            OneOrMany::Many(vec![Block::new(LayerKind::Other), Block::new(LayerKind::Other)]),
            None,
        )
        .unwrap();
    assert_eq!(many.into_many().map(|v| v.len()), Some(2));
}

// ── Configuration ──────────────────────────────────────────────

#[test]
fn test_session_from_file() {
    let path = std::env::temp_dir().join(format!("dy2st-session-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
[amp]
level = "O2"
custom_black_list = ["reduce_mean"]

[device]
place = "gpu"
compute_capability = [7, 5]
cuda_version = "11.2"
"#,
    )
    .unwrap();

    let mut session = TraceSession::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let scope = session.amp_scope().unwrap();
    assert!(scope.in_pure_fp16_guard());
    assert_eq!(scope.op_precision("reduce_mean"), OpPrecision::Deny);
    assert_eq!(scope.op_precision("lookup_table"), OpPrecision::Deny);
}
