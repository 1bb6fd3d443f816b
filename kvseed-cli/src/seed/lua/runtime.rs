//! Lua sandbox for seed expressions
//!
//! Holds the restricted Lua state and the run's sandbox bindings. Each chunk
//! runs in a fresh environment table built from the safe base library, the
//! bindings and `_this`. Table-valued globals (`string`, `math`, a bound
//! module, ...) are shallow copies, so assigning to `string.upper` or
//! `lib.guid` only affects the current chunk. Tables nested deeper than that
//! are shared with later chunks.
//!
//! Every chunk runs under an instruction budget; a chunk that exceeds it
//! fails with a runtime error.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use mlua::{HookTriggers, Lua, StdLib, Table, Value, VmState};

/// Base functions removed from the global table
const BLOCKED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

/// Memory cap for everything evaluated during one run
const MEMORY_LIMIT: usize = 256 * 1024 * 1024;

/// Instructions between budget checks
const HOOK_INTERVAL: u32 = 10_000;

/// Default instruction budget of a single chunk
pub const DEFAULT_INSTRUCTION_LIMIT: u64 = 100_000_000;

/// Nesting limit when converting Lua tables to JSON
const MAX_JSON_DEPTH: usize = 128;

/// Name under which the parent record is visible to expressions
pub const THIS_BINDING: &str = "_this";

/// A sandboxed Lua state plus the alias -> value bindings for one run
pub struct Sandbox {
    lua: Lua,
    bindings: Table,
    aliases: Vec<String>,
    /// Hook ticks used by the running chunk
    ticks: Arc<AtomicU64>,
    /// Hook ticks allowed per chunk
    max_ticks: Arc<AtomicU64>,
}

impl Sandbox {
    /// Create a sandbox with only the table, string, math and utf8 libraries
    pub fn new() -> Result<Self> {
        let lua = Lua::new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8,
            mlua::LuaOptions::default(),
        )
        .context("Failed to create Lua runtime")?;

        lua.set_memory_limit(MEMORY_LIMIT)?;

        let globals = lua.globals();
        for name in BLOCKED_GLOBALS {
            globals.raw_set(*name, Value::Nil)?;
        }

        // String methods resolve through this metatable, which every chunk shares
        lua.load(r#"getmetatable("").__metatable = false"#)
            .set_name("=sandbox")
            .exec()
            .context("Failed to lock the string metatable")?;

        let bindings = lua.create_table()?;

        let ticks = Arc::new(AtomicU64::new(0));
        let max_ticks = Arc::new(AtomicU64::new(ticks_for(DEFAULT_INSTRUCTION_LIMIT)));
        {
            let ticks = ticks.clone();
            let max_ticks = max_ticks.clone();
            lua.set_hook(
                HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
                move |_, _| {
                    let used = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                    let allowed = max_ticks.load(Ordering::Relaxed);
                    if used > allowed {
                        return Err(mlua::Error::runtime(format!(
                            "instruction limit of {} exceeded",
                            allowed * u64::from(HOOK_INTERVAL)
                        )));
                    }
                    Ok(VmState::Continue)
                },
            );
        }

        Ok(Sandbox {
            lua,
            bindings,
            aliases: Vec::new(),
            ticks,
            max_ticks,
        })
    }

    /// Change the instruction budget of each chunk
    pub fn set_instruction_limit(&self, instructions: u64) {
        self.max_ticks.store(ticks_for(instructions), Ordering::Relaxed);
    }

    /// Whether an alias is already bound
    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// Bound aliases in binding order
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Bind a value unless the alias is taken. Returns whether it was bound.
    pub fn bind(&mut self, alias: &str, value: Value) -> Result<bool> {
        if self.contains(alias) {
            return Ok(false);
        }
        self.bindings.raw_set(alias, value)?;
        self.aliases.push(alias.to_string());
        Ok(true)
    }

    /// Bind a JSON value unless the alias is taken
    pub fn bind_json(&mut self, alias: &str, value: &serde_json::Value) -> Result<bool> {
        if self.contains(alias) {
            return Ok(false);
        }
        let value = self.json_to_lua(value)?;
        self.bind(alias, value)
    }

    /// Current value of a binding, as JSON
    pub fn binding_json(&self, alias: &str) -> Result<Option<serde_json::Value>> {
        if !self.contains(alias) {
            return Ok(None);
        }
        let value: Value = self.bindings.raw_get(alias)?;
        self.lua_to_json(value).map(Some)
    }

    /// Build a fresh environment for one chunk: safe globals, then bindings,
    /// then `_this` when given
    pub fn environment(&self, this: Option<Table>) -> Result<Table> {
        let env = self.lua.create_table()?;

        for pair in self.lua.globals().pairs::<Value, Value>() {
            let (key, value) = pair?;
            if matches!(&key, Value::String(s) if s.to_string_lossy() == "_G") {
                continue;
            }
            env.raw_set(key, self.isolate(value)?)?;
        }

        for pair in self.bindings.pairs::<Value, Value>() {
            let (key, value) = pair?;
            env.raw_set(key, self.isolate(value)?)?;
        }

        if let Some(this) = this {
            env.raw_set(THIS_BINDING, self.shallow_copy(&this)?)?;
        }

        Ok(env)
    }

    fn isolate(&self, value: Value) -> Result<Value> {
        match value {
            Value::Table(table) => Ok(Value::Table(self.shallow_copy(&table)?)),
            other => Ok(other),
        }
    }

    fn shallow_copy(&self, table: &Table) -> Result<Table> {
        let copy = self.lua.create_table()?;
        for pair in table.pairs::<Value, Value>() {
            let (key, value) = pair?;
            copy.raw_set(key, value)?;
        }
        copy.set_metatable(table.metatable());
        Ok(copy)
    }

    /// Evaluate a chunk in the given environment. Expressions yield their
    /// value, statement chunks yield whatever they `return`.
    pub fn eval(&self, source: &str, name: &str, env: Table) -> mlua::Result<Value> {
        self.ticks.store(0, Ordering::Relaxed);
        self.lua
            .load(source)
            .set_name(name)
            .set_environment(env)
            .eval::<Value>()
    }

    /// Convert JSON value to Lua value
    pub fn json_to_lua(&self, value: &serde_json::Value) -> Result<Value> {
        match value {
            serde_json::Value::Null => Ok(Value::Nil),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Number(f))
                } else {
                    Ok(Value::Nil)
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(self.lua.create_string(s)?)),
            serde_json::Value::Array(arr) => {
                let table = self.lua.create_table()?;
                for (i, item) in arr.iter().enumerate() {
                    table.set(i + 1, self.json_to_lua(item)?)?;
                }
                Ok(Value::Table(table))
            }
            serde_json::Value::Object(obj) => {
                let table = self.lua.create_table()?;
                for (key, val) in obj {
                    table.set(key.as_str(), self.json_to_lua(val)?)?;
                }
                Ok(Value::Table(table))
            }
        }
    }

    /// Convert a JSON object into a Lua table
    pub fn record_to_lua(&self, record: &serde_json::Map<String, serde_json::Value>) -> Result<Table> {
        let table = self.lua.create_table()?;
        for (key, val) in record {
            table.set(key.as_str(), self.json_to_lua(val)?)?;
        }
        Ok(table)
    }

    /// Convert Lua value to JSON. Functions, threads, userdata, NaN and
    /// infinities have no JSON form and are rejected, as are self-referencing
    /// or too deeply nested tables.
    pub fn lua_to_json(&self, value: Value) -> Result<serde_json::Value> {
        self.to_json_inner(value, &mut HashSet::new())
    }

    /// `path` holds the tables on the current conversion path
    fn to_json_inner(&self, value: Value, path: &mut HashSet<usize>) -> Result<serde_json::Value> {
        match value {
            Value::Nil => Ok(serde_json::Value::Null),
            Value::Boolean(b) => Ok(serde_json::Value::Bool(b)),
            Value::Integer(i) => Ok(serde_json::Value::from(i)),
            Value::Number(n) => match serde_json::Number::from_f64(n) {
                Some(number) => Ok(serde_json::Value::Number(number)),
                None => bail!("cannot convert non-finite number {} to JSON", n),
            },
            Value::String(s) => Ok(serde_json::Value::String(s.to_str()?.to_string())),
            Value::Table(t) => {
                let id = t.to_pointer() as usize;
                if path.len() >= MAX_JSON_DEPTH {
                    bail!("table nesting exceeds {} levels", MAX_JSON_DEPTH);
                }
                if !path.insert(id) {
                    bail!("cannot convert a table that contains itself");
                }
                let converted = self.table_to_json(&t, path);
                path.remove(&id);
                converted
            }
            other => bail!("cannot convert Lua {} to JSON", other.type_name()),
        }
    }

    fn table_to_json(&self, t: &Table, path: &mut HashSet<usize>) -> Result<serde_json::Value> {
        // Sequential integer keys starting at 1 make an array
        let len = t.raw_len() as i64;
        if len > 0 && t.pairs::<Value, Value>().count() as i64 == len {
            let mut arr = Vec::with_capacity(len as usize);
            for i in 1..=len {
                arr.push(self.to_json_inner(t.raw_get::<Value>(i)?, path)?);
            }
            return Ok(serde_json::Value::Array(arr));
        }

        let mut obj = serde_json::Map::new();
        for pair in t.pairs::<Value, Value>() {
            let (k, v) = pair?;
            let key = match k {
                Value::String(s) => s.to_str()?.to_string(),
                Value::Integer(i) => i.to_string(),
                _ => continue,
            };
            obj.insert(key, self.to_json_inner(v, path)?);
        }
        Ok(serde_json::Value::Object(obj))
    }

    /// Get access to the underlying Lua instance
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

fn ticks_for(instructions: u64) -> u64 {
    instructions.div_ceil(u64::from(HOOK_INTERVAL)).max(1)
}
