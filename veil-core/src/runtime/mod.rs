//! Execution context - runs a package inside an embedded JavaScript runtime
//!
//! Each hook body is wrapped as `(function () { <body> })`, compiled, and
//! called with one argument object `{ profile, utils, data }`. A hook that
//! fails to compile or throws is recorded and logged; the remaining hooks
//! still run. Pending jobs are drained after every hook, so promise callbacks
//! queued by one hook settle before the next starts.
//!
//! `boa_engine::Context` is not `Send`; an `ExecutionContext` stays on the
//! thread that created it.

use std::sync::{Arc, Weak};
use std::time::Instant;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::vm::RuntimeLimits;
use boa_engine::{
    Context, JsArgs, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction, Script, Source,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, info_span, instrument, warn, Span};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::hooks::Hook;
use crate::package::Package;
use crate::profile::ProfileStore;
use crate::trace::generate_trace_id;

pub mod report;

pub use report::{HookOutcome, HookReport, RunReport};

const UTILS_PRELUDE: &str = include_str!("utils.js");

/// A package bound to a profile and a fresh JavaScript realm
pub struct ExecutionContext {
    context: Context,
    package: Package,
    profile: Arc<ProfileStore>,
    utils: JsObject,
}

impl ExecutionContext {
    pub fn new(package: Package, profile: Arc<ProfileStore>) -> Result<Self, RuntimeError> {
        Self::with_config(package, profile, &RuntimeConfig::default())
    }

    pub fn with_config(
        package: Package,
        profile: Arc<ProfileStore>,
        config: &RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        let mut context = Context::default();
        if let Some(limits) = runtime_limits(config) {
            context.set_runtime_limits(limits);
        }
        let utils = install_utils(&mut context)?;

        debug!(
            kind = %package.target(),
            hooks = package.len(),
            "Execution context created"
        );
        Ok(Self {
            context,
            package,
            profile,
            utils,
        })
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn profile(&self) -> &Arc<ProfileStore> {
        &self.profile
    }

    /// Evaluate embedder code in the realm, e.g. to install host globals
    /// before [`run`](Self::run) or to inspect them afterwards.
    pub fn eval_host_script(&mut self, source: &str) -> Result<Value, RuntimeError> {
        let script = Script::parse(Source::from_bytes(source), None, &mut self.context)
            .map_err(|e| RuntimeError::Compile(e.to_string()))?;
        let result = script.evaluate(&mut self.context);
        self.context.run_jobs();

        let value = result.map_err(|e| RuntimeError::Execution(describe(e, &mut self.context)))?;
        to_json_value(&value, &mut self.context)
    }

    /// Run every hook in package order
    #[instrument(
        name = "package_run",
        skip(self),
        fields(
            kind = %self.package.target(),
            hooks = self.package.len(),
            trace_id = tracing::field::Empty,
            failed = tracing::field::Empty
        )
    )]
    pub fn run(&mut self) -> RunReport {
        let trace_id = generate_trace_id();
        Span::current().record("trace_id", trace_id.as_str());

        let started_at = Utc::now();
        let handle = profile_handle(&mut self.context, Arc::downgrade(&self.profile));
        let mut outcomes = Vec::with_capacity(self.package.len());

        for hook in self.package.hooks() {
            let hook = hook.as_ref();
            let span = info_span!("hook", codename = hook.codename());
            let _enter = span.enter();

            let start = Instant::now();
            let result = run_hook(&mut self.context, &self.utils, &handle, &self.profile, hook);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let (outcome, message) = match result {
                Ok(()) => {
                    debug!(elapsed_ms, "Hook applied");
                    (HookOutcome::Applied, None)
                }
                Err(e) => {
                    error!(codename = hook.codename(), error = %e, "Hook failed");
                    let outcome = match e {
                        RuntimeError::Compile(_) => HookOutcome::CompileFailed,
                        _ => HookOutcome::Threw,
                    };
                    (outcome, Some(e.to_string()))
                }
            };

            outcomes.push(HookReport {
                codename: hook.codename().to_string(),
                outcome,
                message,
                elapsed_ms,
            });
        }

        let failed = outcomes.iter().filter(|o| o.outcome.is_failure()).count();
        Span::current().record("failed", failed);
        info!(applied = outcomes.len() - failed, failed, "Package run complete");

        RunReport {
            trace_id,
            target: self.package.target(),
            started_at,
            outcomes,
        }
    }
}

fn runtime_limits(config: &RuntimeConfig) -> Option<RuntimeLimits> {
    if config.loop_iteration_limit.is_none() && config.recursion_limit.is_none() {
        return None;
    }
    let mut limits = RuntimeLimits::default();
    if let Some(n) = config.loop_iteration_limit {
        limits.set_loop_iteration_limit(n);
    }
    if let Some(n) = config.recursion_limit {
        limits.set_recursion_limit(n);
    }
    Some(limits)
}

fn run_hook(
    context: &mut Context,
    utils: &JsObject,
    handle: &JsObject,
    profile: &ProfileStore,
    hook: &dyn Hook,
) -> Result<(), RuntimeError> {
    // Newline so a trailing line comment cannot swallow the closing brace
    let source = format!("(function () {{ {}\n}})", hook.implementation());
    let function = compile_function(context, &source)?;
    let args = hook_arguments(context, handle, utils, hook.data(profile))?;

    let this: JsValue = context.global_object().into();
    let result = function.call(&this, &[args], context);
    context.run_jobs();

    result
        .map(|_| ())
        .map_err(|e| RuntimeError::Execution(describe(e, context)))
}

fn compile_function(context: &mut Context, source: &str) -> Result<JsObject, RuntimeError> {
    let script = Script::parse(Source::from_bytes(source), None, context)
        .map_err(|e| RuntimeError::Compile(describe(e, context)))?;
    let value = script
        .evaluate(context)
        .map_err(|e| RuntimeError::Compile(describe(e, context)))?;
    value
        .as_callable()
        .cloned()
        .ok_or_else(|| RuntimeError::Compile("source did not evaluate to a function".into()))
}

fn hook_arguments(
    context: &mut Context,
    handle: &JsObject,
    utils: &JsObject,
    data: Option<Value>,
) -> Result<JsValue, RuntimeError> {
    let data = match data {
        Some(value) => JsValue::from_json(&value, context)
            .map_err(|e| RuntimeError::Marshal(e.to_string()))?,
        None => JsValue::undefined(),
    };
    let args = ObjectInitializer::new(context)
        .property(JsString::from("profile"), handle.clone(), Attribute::all())
        .property(JsString::from("utils"), utils.clone(), Attribute::all())
        .property(JsString::from("data"), data, Attribute::all())
        .build();
    Ok(args.into())
}

/// Convert a script value through the realm's own `JSON.stringify`
///
/// Functions and `undefined` become `null`, nested `undefined` follows the
/// usual JSON rules, and cyclic values fail with a marshal error.
fn to_json_value(value: &JsValue, context: &mut Context) -> Result<Value, RuntimeError> {
    if value.is_undefined() || value.is_callable() {
        return Ok(Value::Null);
    }

    let stringify = json_stringify(context)?;
    let text = stringify
        .call(&JsValue::undefined(), &[value.clone()], context)
        .map_err(|e| RuntimeError::Marshal(describe(e, context)))?;

    let Some(text) = text.as_string() else {
        // Symbols and similar values have no JSON form
        return Ok(Value::Null);
    };
    serde_json::from_str(&text.to_std_string_escaped())
        .map_err(|e| RuntimeError::Marshal(e.to_string()))
}

fn json_stringify(context: &mut Context) -> Result<JsObject, RuntimeError> {
    let marshal = |e: JsError, context: &mut Context| RuntimeError::Marshal(describe(e, context));

    let json = context
        .global_object()
        .get(JsString::from("JSON"), context)
        .map_err(|e| marshal(e, context))?;
    let stringify = match json.as_object() {
        Some(json) => json
            .get(JsString::from("stringify"), context)
            .map_err(|e| marshal(e, context))?,
        None => JsValue::undefined(),
    };
    stringify
        .as_callable()
        .cloned()
        .ok_or_else(|| RuntimeError::Marshal("JSON.stringify is not available".into()))
}

/// Prefer the native error message over the raw thrown value
fn describe(err: JsError, context: &mut Context) -> String {
    match err.try_native(context) {
        Ok(native) => native.to_string(),
        Err(_) => err.to_string(),
    }
}

fn install_utils(context: &mut Context) -> Result<JsObject, RuntimeError> {
    let native = ObjectInitializer::new(context)
        .function(NativeFunction::from_fn_ptr(script_log), JsString::from("log"), 2)
        .build();

    let factory = compile_function(context, UTILS_PRELUDE)?;
    let utils = factory
        .call(&JsValue::undefined(), &[native.into()], context)
        .map_err(|e| RuntimeError::Execution(describe(e, context)))?;

    utils
        .as_object()
        .cloned()
        .ok_or_else(|| RuntimeError::Compile("utils prelude did not return an object".into()))
}

fn script_log(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let level = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let message = args.get_or_undefined(1).to_string(context)?.to_std_string_escaped();
    match level.as_str() {
        "warn" => warn!(target: "veil::script", "{message}"),
        "debug" => debug!(target: "veil::script", "{message}"),
        _ => info!(target: "veil::script", "{message}"),
    }
    Ok(JsValue::undefined())
}

fn upgrade(profile: &Weak<ProfileStore>) -> JsResult<Arc<ProfileStore>> {
    profile.upgrade().ok_or_else(|| {
        JsNativeError::typ()
            .with_message("profile is no longer available")
            .into()
    })
}

fn path_from_args(args: &[JsValue], context: &mut Context) -> JsResult<Vec<String>> {
    args.iter()
        .map(|arg| Ok(arg.to_string(context)?.to_std_string_escaped()))
        .collect()
}

/// Read-only view of the profile for hook bodies: `get(...keys)`,
/// `has(...keys)` and `text()`
fn profile_handle(context: &mut Context, profile: Weak<ProfileStore>) -> JsObject {
    let for_get = profile.clone();
    let for_has = profile.clone();
    let for_text = profile;

    // SAFETY: the closures capture only `Weak<ProfileStore>`, which holds no
    // garbage-collected values.
    let get = unsafe {
        NativeFunction::from_closure(move |_this, args, ctx| {
            let store = upgrade(&for_get)?;
            let keys = path_from_args(args, ctx)?;
            match store.find(&keys) {
                Some(node) => JsValue::from_json(&node.to_value(), ctx),
                None => Ok(JsValue::undefined()),
            }
        })
    };
    let has = unsafe {
        NativeFunction::from_closure(move |_this, args, ctx| {
            let store = upgrade(&for_has)?;
            let keys = path_from_args(args, ctx)?;
            Ok(JsValue::from(store.contains(&keys)))
        })
    };
    let text = unsafe {
        NativeFunction::from_closure(move |_this, _args, _ctx| {
            let store = upgrade(&for_text)?;
            Ok(JsValue::from(JsString::from(store.text())))
        })
    };

    ObjectInitializer::new(context)
        .function(get, JsString::from("get"), 0)
        .function(has, JsString::from("has"), 0)
        .function(text, JsString::from("text"), 0)
        .build()
}
