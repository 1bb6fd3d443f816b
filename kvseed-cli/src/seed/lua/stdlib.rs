//! Built-in `lib` helper library
//!
//! Bound into the sandbox when a document declares a dependency on `lib`:
//!
//! ```json
//! { "_dependencies": { "lib": "lib" } }
//! ```
//!
//! | Function | Returns |
//! |---|---|
//! | `lib.guid()` | random v4 GUID |
//! | `lib.is_guid(v)` | whether `v` parses as a GUID |
//! | `lib.now()` | current UTC time, `YYYY-MM-DDTHH:MM:SSZ` |
//! | `lib.timestamp()` | current Unix time in seconds |
//! | `lib.parse_date(s)` | `s` normalised to ISO 8601, or nil |
//! | `lib.format_date(dt, fmt)` | ISO date formatted with strftime, or nil |
//! | `lib.add_days(dt, n)` | ISO date shifted by `n` days, or nil |
//! | `lib.lower/upper/trim(s)` | transformed string |
//! | `lib.split(s, delim)` | list of parts |
//! | `lib.contains/starts_with/ends_with(s, x)` | bool |
//! | `lib.is_nil/is_string/is_number/is_table/is_boolean(v)` | bool |
//! | `lib.log(msg)`, `lib.warn(msg)` | nothing, writes to the log |

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use mlua::{Lua, Result as LuaResult, Table, Value};
use uuid::Uuid;

/// Module identifier of the built-in library
pub const LIB_MODULE: &str = "lib";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Create the `lib` table
pub fn create_lib(lua: &Lua) -> LuaResult<Table> {
    let lib = lua.create_table()?;
    register_ids(lua, &lib)?;
    register_dates(lua, &lib)?;
    register_strings(lua, &lib)?;
    register_type_checks(lua, &lib)?;
    register_logging(lua, &lib)?;
    Ok(lib)
}

fn register_ids(lua: &Lua, lib: &Table) -> LuaResult<()> {
    lib.set("guid", lua.create_function(|_, ()| Ok(Uuid::new_v4().to_string()))?)?;
    lib.set(
        "is_guid",
        lua.create_function(|_, value: Value| {
            Ok(match value {
                Value::String(s) => Uuid::parse_str(&s.to_string_lossy()).is_ok(),
                _ => false,
            })
        })?,
    )?;
    Ok(())
}

fn register_dates(lua: &Lua, lib: &Table) -> LuaResult<()> {
    lib.set("now", lua.create_function(|_, ()| Ok(Utc::now().format(ISO_FORMAT).to_string()))?)?;
    lib.set("timestamp", lua.create_function(|_, ()| Ok(Utc::now().timestamp()))?)?;
    lib.set(
        "parse_date",
        lua.create_function(|_, s: String| Ok(parse_date(&s).map(|dt| dt.format(ISO_FORMAT).to_string())))?,
    )?;
    lib.set(
        "format_date",
        lua.create_function(|_, (dt, fmt): (String, String)| {
            Ok(parse_date(&dt).map(|parsed| parsed.format(&fmt).to_string()))
        })?,
    )?;
    lib.set(
        "add_days",
        lua.create_function(|_, (dt, days): (String, i64)| {
            Ok(parse_date(&dt)
                .and_then(|parsed| parsed.checked_add_signed(TimeDelta::try_days(days)?))
                .map(|shifted| shifted.format(ISO_FORMAT).to_string()))
        })?,
    )?;
    Ok(())
}

/// Accept RFC 3339, common date-time layouts and plain dates (midnight)
fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }

    const DATE_TIMES: [&str; 4] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];
    if let Some(dt) = DATE_TIMES
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), fmt).ok())
    {
        return Some(dt);
    }

    ["%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn register_strings(lua: &Lua, lib: &Table) -> LuaResult<()> {
    lib.set("lower", lua.create_function(|_, s: String| Ok(s.to_lowercase()))?)?;
    lib.set("upper", lua.create_function(|_, s: String| Ok(s.to_uppercase()))?)?;
    lib.set("trim", lua.create_function(|_, s: String| Ok(s.trim().to_string()))?)?;
    lib.set(
        "split",
        lua.create_function(|lua, (s, delim): (String, String)| {
            lua.create_sequence_from(s.split(delim.as_str()).map(str::to_string))
        })?,
    )?;
    lib.set(
        "contains",
        lua.create_function(|_, (s, x): (String, String)| Ok(s.contains(x.as_str())))?,
    )?;
    lib.set(
        "starts_with",
        lua.create_function(|_, (s, x): (String, String)| Ok(s.starts_with(x.as_str())))?,
    )?;
    lib.set(
        "ends_with",
        lua.create_function(|_, (s, x): (String, String)| Ok(s.ends_with(x.as_str())))?,
    )?;
    Ok(())
}

fn register_type_checks(lua: &Lua, lib: &Table) -> LuaResult<()> {
    let checks: [(&str, fn(&Value) -> bool); 5] = [
        ("is_nil", |v| v.is_nil()),
        ("is_string", |v| v.is_string()),
        ("is_number", |v| v.is_number() || v.is_integer()),
        ("is_table", |v| v.is_table()),
        ("is_boolean", |v| v.is_boolean()),
    ];

    for (name, check) in checks {
        lib.set(name, lua.create_function(move |_, v: Value| Ok(check(&v)))?)?;
    }
    Ok(())
}

fn register_logging(lua: &Lua, lib: &Table) -> LuaResult<()> {
    lib.set(
        "log",
        lua.create_function(|_, msg: String| {
            log::info!("[lua] {}", msg);
            Ok(())
        })?,
    )?;
    lib.set(
        "warn",
        lua.create_function(|_, msg: String| {
            log::warn!("[lua] {}", msg);
            Ok(())
        })?,
    )?;
    Ok(())
}
