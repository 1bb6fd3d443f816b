//! Dependency loading into the sandbox
//!
//! `_dependencies` maps an alias to a module identifier. `lib` names the
//! built-in helper library; any other identifier is a Lua file, relative to
//! the dependency directory, that returns the value to bind:
//!
//! ```lua
//! -- helpers/names.lua
//! local M = {}
//! function M.full(first, last) return first .. " " .. last end
//! return M
//! ```
//!
//! Aliases that are already bound are skipped, so loading the same
//! declaration twice binds nothing the second time.

use std::path::PathBuf;

use mlua::Value;

use super::lua::{LIB_MODULE, Sandbox, create_lib};

/// Error loading a dependency. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyError {
    /// No module file for the identifier
    NotFound { alias: String, module: String, path: PathBuf },
    /// Module file could not be read
    Read { alias: String, module: String, message: String },
    /// Module failed while executing
    Execution { alias: String, module: String, message: String },
    /// Module ran but returned nothing
    EmptyModule { alias: String, module: String },
    /// Value could not be stored in the sandbox
    Binding { alias: String, message: String },
}

impl std::fmt::Display for DependencyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyError::NotFound { alias, module, path } => write!(
                f,
                "dependency '{}': module '{}' not found at {}",
                alias,
                module,
                path.display()
            ),
            DependencyError::Read { alias, module, message } => {
                write!(f, "dependency '{}': failed to read module '{}': {}", alias, module, message)
            }
            DependencyError::Execution { alias, module, message } => {
                write!(f, "dependency '{}': module '{}' failed: {}", alias, module, message)
            }
            DependencyError::EmptyModule { alias, module } => {
                write!(f, "dependency '{}': module '{}' did not return a value", alias, module)
            }
            DependencyError::Binding { alias, message } => {
                write!(f, "dependency '{}': failed to bind: {}", alias, message)
            }
        }
    }
}

impl std::error::Error for DependencyError {}

/// Loads `_dependencies` declarations into a sandbox
#[derive(Debug, Clone)]
pub struct DependencyLoader {
    base_dir: PathBuf,
}

impl DependencyLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        DependencyLoader {
            base_dir: base_dir.into(),
        }
    }

    /// Bind every declared alias that is not bound yet.
    /// Returns the number of aliases newly bound.
    pub fn load_all(
        &self,
        sandbox: &mut Sandbox,
        dependencies: &[(String, String)],
    ) -> Result<usize, DependencyError> {
        let mut bound = 0;

        for (alias, module) in dependencies {
            if sandbox.contains(alias) {
                log::debug!("Dependency '{}' already bound, skipping", alias);
                continue;
            }

            let value = self.load_module(sandbox, alias, module)?;
            sandbox
                .bind(alias, value)
                .map_err(|e| DependencyError::Binding {
                    alias: alias.clone(),
                    message: e.to_string(),
                })?;

            log::debug!("Bound dependency '{}' -> '{}'", alias, module);
            bound += 1;
        }

        Ok(bound)
    }

    fn load_module(&self, sandbox: &Sandbox, alias: &str, module: &str) -> Result<Value, DependencyError> {
        if module == LIB_MODULE {
            return create_lib(sandbox.lua())
                .map(Value::Table)
                .map_err(|e| DependencyError::Execution {
                    alias: alias.to_string(),
                    module: module.to_string(),
                    message: e.to_string(),
                });
        }

        let path = self.resolve_path(module);
        if !path.is_file() {
            return Err(DependencyError::NotFound {
                alias: alias.to_string(),
                module: module.to_string(),
                path,
            });
        }

        let source = std::fs::read_to_string(&path).map_err(|e| DependencyError::Read {
            alias: alias.to_string(),
            module: module.to_string(),
            message: e.to_string(),
        })?;

        let execution_error = |message: String| DependencyError::Execution {
            alias: alias.to_string(),
            module: module.to_string(),
            message,
        };

        // Modules see the safe base library and earlier bindings
        let env = sandbox
            .environment(None)
            .map_err(|e| execution_error(e.to_string()))?;
        let value = sandbox
            .eval(&source, &format!("@{}", path.display()), env)
            .map_err(|e| execution_error(e.to_string()))?;

        if matches!(value, Value::Nil) {
            return Err(DependencyError::EmptyModule {
                alias: alias.to_string(),
                module: module.to_string(),
            });
        }

        Ok(value)
    }

    /// `helpers/names` -> `<base>/helpers/names.lua`
    fn resolve_path(&self, module: &str) -> PathBuf {
        let path = self.base_dir.join(module);
        if path.extension().is_some_and(|ext| ext == "lua") {
            path
        } else {
            self.base_dir.join(format!("{}.lua", module))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::lua::Evaluator;
    use serde_json::json;

    fn deps(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, m)| (a.to_string(), m.to_string()))
            .collect()
    }

    #[test]
    fn test_load_builtin_lib() {
        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(".");

        let bound = loader.load_all(&mut sandbox, &deps(&[("lib", "lib")])).unwrap();
        assert_eq!(bound, 1);

        let value = Evaluator::new(&sandbox).evaluate("lib.upper('ann')", None).unwrap();
        assert_eq!(value, json!("ANN"));
    }

    #[test]
    fn test_builtin_lib_under_other_alias() {
        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(".");

        loader.load_all(&mut sandbox, &deps(&[("h", "lib")])).unwrap();
        let value = Evaluator::new(&sandbox).evaluate("h.trim(' x ')", None).unwrap();
        assert_eq!(value, json!("x"));
    }

    #[test]
    fn test_load_module_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("helpers")).unwrap();
        std::fs::write(
            dir.path().join("helpers/names.lua"),
            r#"
                local M = {}
                function M.full(first, last) return first .. " " .. last end
                M.domain = "example.com"
                return M
            "#,
        )
        .unwrap();

        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(dir.path());
        loader
            .load_all(&mut sandbox, &deps(&[("names", "helpers/names")]))
            .unwrap();

        let value = Evaluator::new(&sandbox)
            .evaluate("names.full('Ann', 'Lee') .. ' <' .. names.domain .. '>'", None)
            .unwrap();
        assert_eq!(value, json!("Ann Lee <example.com>"));
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("counter.lua"), "return { value = 1 }").unwrap();

        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(dir.path());
        let declared = deps(&[("lib", "lib"), ("counter", "counter.lua")]);

        assert_eq!(loader.load_all(&mut sandbox, &declared).unwrap(), 2);
        let aliases = sandbox.aliases().to_vec();
        let counter = sandbox.binding_json("counter").unwrap();

        // Second load binds nothing and leaves bindings unchanged
        std::fs::write(dir.path().join("counter.lua"), "return { value = 2 }").unwrap();
        assert_eq!(loader.load_all(&mut sandbox, &declared).unwrap(), 0);
        assert_eq!(sandbox.aliases(), aliases.as_slice());
        assert_eq!(sandbox.binding_json("counter").unwrap(), counter);
        assert_eq!(counter, Some(json!({ "value": 1 })));
    }

    #[test]
    fn test_existing_binding_wins() {
        let mut sandbox = Sandbox::new().unwrap();
        sandbox.bind_json("lib", &json!("host value")).unwrap();

        let loader = DependencyLoader::new(".");
        assert_eq!(loader.load_all(&mut sandbox, &deps(&[("lib", "lib")])).unwrap(), 0);
        assert_eq!(sandbox.binding_json("lib").unwrap(), Some(json!("host value")));
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(dir.path());

        let err = loader
            .load_all(&mut sandbox, &deps(&[("moment", "moment")]))
            .unwrap_err();
        assert!(matches!(err, DependencyError::NotFound { ref alias, .. } if alias == "moment"));
        assert!(!sandbox.contains("moment"));
    }

    #[test]
    fn test_failing_module_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.lua"), "error('nope')").unwrap();
        std::fs::write(dir.path().join("empty.lua"), "local x = 1").unwrap();

        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(dir.path());

        assert!(matches!(
            loader.load_all(&mut sandbox, &deps(&[("b", "broken")])),
            Err(DependencyError::Execution { .. })
        ));
        assert!(matches!(
            loader.load_all(&mut sandbox, &deps(&[("e", "empty")])),
            Err(DependencyError::EmptyModule { .. })
        ));
    }

    #[test]
    fn test_modules_cannot_reach_the_file_system() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("escape.lua"), "return io.open('/etc/passwd')").unwrap();

        let mut sandbox = Sandbox::new().unwrap();
        let loader = DependencyLoader::new(dir.path());

        assert!(matches!(
            loader.load_all(&mut sandbox, &deps(&[("x", "escape")])),
            Err(DependencyError::Execution { .. })
        ));
    }
}
