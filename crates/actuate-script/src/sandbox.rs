//! Sandboxed Lua evaluation.
//!
//! # Security Model
//!
//! Every evaluation creates a fresh `Lua` state, so no interpreter state
//! is shared between evaluations or invocations. The chunk runs against a
//! **whitelist-only** environment table:
//!
//! - core language functions and the `math`, `string`, `table` libraries
//! - the request context's top-level keys, copied in as a snapshot
//! - host functions `base64_encode(bytes)` and `uuid()`
//!
//! `os`, `io`, `debug`, `require`, `load`, `loadfile` and `dofile` are not
//! present. Assigning a global raises an error.
//!
//! An instruction hook (via `mlua::Lua::set_hook`) enforces both an
//! instruction limit and a wall-clock budget. The hook cannot fire inside a
//! single library call, so `string.rep`, `find`, `match`, `gmatch` and `gsub`
//! are replaced by wrappers that reject oversized inputs, outputs and
//! backtracking patterns before calling the originals. The state's
//! allocator is capped at 32 MiB.

use crate::convert::{json_to_lua, lua_to_json};
use crate::error::LIMIT_MARKER;
use crate::ScriptError;
use base64::Engine as _;
use mlua::{Function, HookTriggers, Lua, MultiValue, Result as LuaResult, Table, Value, VmState};
use serde_json::Map;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Instructions between two limit checks.
const HOOK_INTERVAL: u32 = 1_000;

/// Builtins copied from the Lua globals into the sandbox.
const SAFE_GLOBALS: &[&str] = &[
    "tostring", "tonumber", "type", "pairs", "ipairs", "next", "select", "error", "pcall",
    "assert",
];

/// Standard libraries copied into the sandbox.
const SAFE_LIBS: &[&str] = &["math", "string", "table"];

/// Allocator cap for one Lua state.
const MAX_MEMORY: usize = 32 * 1024 * 1024;

/// Largest string a wrapped string function accepts or produces.
const MAX_STRING_BYTES: usize = 1024 * 1024;

/// Longest pattern accepted by the wrapped matchers.
const MAX_PATTERN_BYTES: usize = 256;

/// Upper bound on the estimated backtracking steps of one match call.
const MAX_MATCH_STEPS: f64 = 2.0e8;

/// Execution bounds for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Maximum VM instructions.
    pub max_instructions: u64,
    /// Maximum wall-clock time.
    pub time_budget: Duration,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            time_budget: Duration::from_millis(250),
        }
    }
}

/// Evaluates scripts in isolated, bounded Lua states.
///
/// ```
/// use actuate_script::{Sandbox, ScriptLimits};
/// use serde_json::{json, Map};
///
/// let sandbox = Sandbox::new(ScriptLimits::default());
/// let mut ctx = Map::new();
/// ctx.insert("count".into(), json!(2));
///
/// assert_eq!(sandbox.eval("count * 10", &ctx).expect("eval"), json!(20));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Sandbox {
    limits: ScriptLimits,
}

impl Sandbox {
    /// Creates a sandbox with the given limits.
    #[must_use]
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    /// The limits applied to each evaluation.
    #[must_use]
    pub fn limits(&self) -> ScriptLimits {
        self.limits
    }

    /// Evaluates `code` and returns its first result as JSON.
    ///
    /// `code` may be an expression (`1 + 1`) or a block with an explicit
    /// `return`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] for compile errors, runtime errors, limit
    /// violations and results that cannot be represented as JSON.
    pub fn eval(
        &self,
        code: &str,
        ctx: &Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ScriptError> {
        let lua = Lua::new();
        lua.set_memory_limit(MAX_MEMORY)
            .map_err(|e| ScriptError::from_lua(&e))?;
        let env = build_env(&lua, ctx).map_err(|e| ScriptError::from_lua(&e))?;

        let function = match lua
            .load(format!("return {code}"))
            .set_name("=outcome")
            .set_environment(env.clone())
            .into_function()
        {
            Ok(function) => function,
            Err(_) => lua
                .load(code)
                .set_name("=outcome")
                .set_environment(env)
                .into_function()
                .map_err(|e| ScriptError::from_lua(&e))?,
        };

        self.install_limits(&lua);
        let result: LuaResult<Value> = function.call(());
        lua.remove_hook();

        let value = result.map_err(|e| ScriptError::from_lua(&e))?;
        let json = lua_to_json(value).map_err(|e| ScriptError::Conversion(e.to_string()))?;
        trace!(code, result = %json, "script evaluated");
        Ok(json)
    }

    fn install_limits(&self, lua: &Lua) {
        let limits = self.limits;
        let deadline = Instant::now() + limits.time_budget;
        let interval = u32::try_from(limits.max_instructions.clamp(1, u64::from(HOOK_INTERVAL)))
            .unwrap_or(HOOK_INTERVAL);
        let executed = AtomicU64::new(0);

        lua.set_hook(
            HookTriggers::new().every_nth_instruction(interval),
            move |_lua, _debug| {
                let total = executed.fetch_add(u64::from(interval), Ordering::Relaxed)
                    + u64::from(interval);
                if total >= limits.max_instructions {
                    return Err(mlua::Error::RuntimeError(format!(
                        "{LIMIT_MARKER} {} instructions",
                        limits.max_instructions
                    )));
                }
                if Instant::now() >= deadline {
                    return Err(mlua::Error::RuntimeError(format!(
                        "{LIMIT_MARKER} {}ms time budget",
                        limits.time_budget.as_millis()
                    )));
                }
                Ok(VmState::Continue)
            },
        );
    }
}

/// Builds the whitelist-only environment table.
fn build_env(lua: &Lua, ctx: &Map<String, serde_json::Value>) -> LuaResult<Table> {
    let env = lua.create_table()?;
    let globals = lua.globals();
    bound_string_library(lua, &globals.get("string")?)?;

    for name in SAFE_GLOBALS.iter().chain(SAFE_LIBS) {
        let value: Value = globals.get(*name)?;
        if !value.is_nil() {
            env.set(*name, value)?;
        }
    }

    for (key, value) in ctx {
        env.set(key.as_str(), json_to_lua(lua, value)?)?;
    }

    env.set(
        "base64_encode",
        lua.create_function(|_, bytes: mlua::String| {
            Ok(base64::engine::general_purpose::STANDARD.encode(&*bytes.as_bytes()))
        })?,
    )?;
    env.set(
        "uuid",
        lua.create_function(|_, ()| Ok(uuid::Uuid::new_v4().to_string()))?,
    )?;

    let guard = lua.create_table()?;
    guard.set(
        "__newindex",
        lua.create_function(|_, (_env, key, _value): (Table, Value, Value)| -> LuaResult<()> {
            let key = key.to_string().unwrap_or_else(|_| "?".to_string());
            Err(mlua::Error::RuntimeError(format!(
                "attempt to assign global '{key}' in read-only context"
            )))
        })?,
    )?;
    env.set_metatable(Some(guard));

    Ok(env)
}

fn limit_error(what: impl std::fmt::Display) -> mlua::Error {
    mlua::Error::RuntimeError(format!("{LIMIT_MARKER} {what}"))
}

fn check_len(what: &str, len: usize, max: usize) -> LuaResult<()> {
    if len > max {
        return Err(limit_error(format_args!("{what} of {len} bytes exceeds {max}")));
    }
    Ok(())
}

fn is_truthy(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Nil | Value::Boolean(false)))
}

/// Estimated worst-case steps for matching `pattern` against `subject_len`
/// bytes: one factor of the subject length per repetition item, plus one
/// for the scan over start positions when the pattern is unanchored.
fn match_steps(pattern: &[u8], subject_len: usize, anchored: bool) -> f64 {
    let mut repeats = 0_i32;
    let mut i = usize::from(anchored && pattern.first() == Some(&b'^'));
    let scan = i32::from(i == 0);
    while i < pattern.len() {
        match pattern[i] {
            b'%' => {
                if pattern.get(i + 1) == Some(&b'b') {
                    repeats += 1;
                    i += 2;
                }
                i += 2;
                continue;
            }
            b'[' => {
                i += 1;
                if pattern.get(i) == Some(&b'^') {
                    i += 1;
                }
                // a leading ']' is a literal member of the set
                if pattern.get(i) == Some(&b']') {
                    i += 1;
                }
                while i < pattern.len() && pattern[i] != b']' {
                    i += if pattern[i] == b'%' { 2 } else { 1 };
                }
            }
            b'*' | b'+' | b'-' => repeats += 1,
            _ => {}
        }
        i += 1;
    }
    let n = subject_len.max(1) as f64;
    n.powi(repeats + scan)
}

fn check_match(subject: &mlua::String, pattern: &mlua::String, anchored: bool) -> LuaResult<()> {
    let subject_len = subject.as_bytes().len();
    let pattern = pattern.as_bytes();
    check_len("subject", subject_len, MAX_STRING_BYTES)?;
    check_len("pattern", pattern.len(), MAX_PATTERN_BYTES)?;
    if match_steps(&pattern[..], subject_len, anchored) > MAX_MATCH_STEPS {
        return Err(limit_error(format_args!(
            "pattern too expensive for a {subject_len} byte subject"
        )));
    }
    Ok(())
}

/// Replaces the unbounded functions of the `string` library in place.
///
/// Each evaluation owns its `Lua` state, so the patched library is never
/// seen outside this evaluation. String methods (`s:rep(n)`) resolve through
/// the same table and are covered too.
fn bound_string_library(lua: &Lua, string: &Table) -> LuaResult<()> {
    let rep: Function = string.get("rep")?;
    string.set(
        "rep",
        lua.create_function(move |_, (s, n, sep): (mlua::String, i64, Option<mlua::String>)| {
            let count = usize::try_from(n).unwrap_or(0);
            let sep_len = sep.as_ref().map_or(0, |sep| sep.as_bytes().len());
            let total = s
                .as_bytes()
                .len()
                .saturating_mul(count)
                .saturating_add(sep_len.saturating_mul(count.saturating_sub(1)));
            check_len("string.rep result", total, MAX_STRING_BYTES)?;
            rep.call::<mlua::String>((s, n, sep))
        })?,
    )?;

    let find: Function = string.get("find")?;
    string.set(
        "find",
        lua.create_function(move |_, (s, pattern, rest): (mlua::String, mlua::String, MultiValue)| {
            if is_truthy(rest.get(1)) {
                check_len("subject", s.as_bytes().len(), MAX_STRING_BYTES)?;
                check_len("pattern", pattern.as_bytes().len(), MAX_STRING_BYTES)?;
            } else {
                check_match(&s, &pattern, true)?;
            }
            find.call::<MultiValue>((s, pattern, rest))
        })?,
    )?;

    let matcher: Function = string.get("match")?;
    string.set(
        "match",
        lua.create_function(move |_, (s, pattern, rest): (mlua::String, mlua::String, MultiValue)| {
            check_match(&s, &pattern, true)?;
            matcher.call::<MultiValue>((s, pattern, rest))
        })?,
    )?;

    let gmatch: Function = string.get("gmatch")?;
    string.set(
        "gmatch",
        lua.create_function(move |_, (s, pattern, rest): (mlua::String, mlua::String, MultiValue)| {
            check_match(&s, &pattern, false)?;
            gmatch.call::<MultiValue>((s, pattern, rest))
        })?,
    )?;

    let gsub: Function = string.get("gsub")?;
    string.set(
        "gsub",
        lua.create_function(
            move |_, (s, pattern, repl, rest): (mlua::String, mlua::String, Value, MultiValue)| {
                check_match(&s, &pattern, true)?;
                if let Value::String(ref repl) = repl {
                    let len = s.as_bytes().len();
                    let total = len.saturating_add(
                        len.saturating_add(1).saturating_mul(repl.as_bytes().len()),
                    );
                    check_len("string.gsub result", total, MAX_STRING_BYTES)?;
                }
                gsub.call::<MultiValue>((s, pattern, repl, rest))
            },
        )?,
    )?;

    Ok(())
}
