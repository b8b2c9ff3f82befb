//! Directive registry: name → factory, partitioned by scope.
//!
//! Readers work against an immutable [`RegistrySnapshot`]. Writers stage
//! user directives per namespace and publish them with [`DirectiveRegistry::reload`],
//! which swaps in a new snapshot under a write lock, so an in-flight
//! compilation always sees either the old or the new registry in full.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::directive::Directive;
use crate::error::RegistryError;
use crate::usage::UsageDefinition;

pub type DirectiveFactory = Arc<dyn Fn() -> Box<dyn Directive> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Built-in directives, visible in every namespace.
    System,
    /// User-defined directives, visible only in their namespace.
    User { namespace: String },
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::System => f.write_str("system"),
            Scope::User { namespace } => write!(f, "user:{}", namespace),
        }
    }
}

/// A registered directive.
#[derive(Clone)]
pub struct DirectiveInfo {
    name: String,
    description: String,
    usage: UsageDefinition,
    factory: DirectiveFactory,
}

impl DirectiveInfo {
    /// The usage definition is taken from a probe instance.
    pub fn new<F>(description: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Directive> + Send + Sync + 'static,
    {
        let usage = factory().define();
        DirectiveInfo {
            name: usage.directive().to_owned(),
            description: description.into(),
            usage,
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn usage(&self) -> &UsageDefinition {
        &self.usage
    }

    pub fn factory(&self) -> DirectiveFactory {
        Arc::clone(&self.factory)
    }
}

impl fmt::Debug for DirectiveInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveInfo")
            .field("name", &self.name)
            .field("usage", &self.usage.to_string())
            .finish()
    }
}

/// Catalogue entry returned by [`Catalog::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectiveUsage {
    pub name: String,
    pub usage: String,
    pub description: String,
    pub scope: String,
}

/// One published version of the registry.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    version: u64,
    system: HashMap<String, DirectiveInfo>,
    user: HashMap<String, HashMap<String, DirectiveInfo>>,
}

impl RegistrySnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    /// System directives take precedence over user ones of the same name.
    pub fn lookup(&self, namespace: &str, name: &str) -> Option<(&DirectiveInfo, Scope)> {
        if let Some(info) = self.system.get(name) {
            return Some((info, Scope::System));
        }
        self.user
            .get(namespace)
            .and_then(|m| m.get(name))
            .map(|info| {
                (
                    info,
                    Scope::User {
                        namespace: namespace.to_owned(),
                    },
                )
            })
    }
}

/// Resolves directive names to usage definitions. Implemented by
/// [`Catalog`], and by any `Fn(&str) -> Option<UsageDefinition>`.
pub trait UsageLookup {
    fn usage(&self, name: &str) -> Option<UsageDefinition>;
}

impl<F> UsageLookup for F
where
    F: Fn(&str) -> Option<UsageDefinition>,
{
    fn usage(&self, name: &str) -> Option<UsageDefinition> {
        self(name)
    }
}

/// A snapshot viewed from one namespace. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Catalog {
    snapshot: Arc<RegistrySnapshot>,
    namespace: String,
}

impl Catalog {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    pub fn lookup(&self, name: &str) -> Option<(&DirectiveInfo, Scope)> {
        self.snapshot.lookup(&self.namespace, name)
    }

    /// Like [`lookup`](Self::lookup), failing with
    /// [`RegistryError::UnknownDirective`].
    pub fn resolve(&self, name: &str) -> Result<(&DirectiveInfo, Scope), RegistryError> {
        self.lookup(name).ok_or_else(|| RegistryError::UnknownDirective {
            name: name.to_owned(),
            namespace: self.namespace.clone(),
        })
    }

    pub fn scope_of(&self, name: &str) -> Option<Scope> {
        self.lookup(name).map(|(_, scope)| scope)
    }

    /// Every visible directive, sorted by name.
    pub fn list(&self) -> Vec<DirectiveUsage> {
        let mut visible: BTreeMap<&str, (&DirectiveInfo, Scope)> = BTreeMap::new();
        if let Some(user) = self.snapshot.user.get(&self.namespace) {
            for (name, info) in user {
                visible.insert(
                    name,
                    (
                        info,
                        Scope::User {
                            namespace: self.namespace.clone(),
                        },
                    ),
                );
            }
        }
        for (name, info) in &self.snapshot.system {
            visible.insert(name, (info, Scope::System));
        }
        visible
            .into_values()
            .map(|(info, scope)| DirectiveUsage {
                name: info.name.clone(),
                usage: info.usage.to_string(),
                description: info.description.clone(),
                scope: scope.to_string(),
            })
            .collect()
    }
}

impl UsageLookup for Catalog {
    fn usage(&self, name: &str) -> Option<UsageDefinition> {
        self.lookup(name).map(|(info, _)| info.usage.clone())
    }
}

pub struct DirectiveRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
    /// namespace → directives registered but not yet published.
    staged: RwLock<HashMap<String, Vec<DirectiveInfo>>>,
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("directive registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("directive registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        DirectiveRegistry {
            current: RwLock::new(Arc::new(RegistrySnapshot::default())),
            staged: RwLock::new(HashMap::new()),
        }
    }

    /// Register a built-in. Published immediately.
    pub fn register_system(&self, info: DirectiveInfo) -> Result<(), RegistryError> {
        let mut current = write_lock(&self.current);
        if current.system.contains_key(&info.name) {
            return Err(RegistryError::Duplicate {
                name: info.name,
                scope: Scope::System.to_string(),
            });
        }
        let mut system = current.system.clone();
        system.insert(info.name.clone(), info);
        *current = Arc::new(RegistrySnapshot {
            version: current.version + 1,
            system,
            user: current.user.clone(),
        });
        Ok(())
    }

    /// Stage a user-defined directive. It becomes visible in `namespace`
    /// after the next [`reload`](Self::reload); until then lookups in that
    /// namespace fail with [`RegistryError::Stale`].
    pub fn register_user(&self, namespace: &str, info: DirectiveInfo) -> Result<(), RegistryError> {
        let scope = Scope::User {
            namespace: namespace.to_owned(),
        };
        {
            let current = read_lock(&self.current);
            let published = current
                .user
                .get(namespace)
                .is_some_and(|m| m.contains_key(&info.name));
            if current.system.contains_key(&info.name) || published {
                return Err(RegistryError::Duplicate {
                    name: info.name,
                    scope: scope.to_string(),
                });
            }
        }
        let mut staged = write_lock(&self.staged);
        let pending = staged.entry(namespace.to_owned()).or_default();
        if pending.iter().any(|p| p.name == info.name) {
            return Err(RegistryError::Duplicate {
                name: info.name,
                scope: scope.to_string(),
            });
        }
        tracing::debug!(namespace, directive = %info.name, "user directive staged");
        pending.push(info);
        Ok(())
    }

    /// Publish staged directives for `namespace`. Returns the version of
    /// the snapshot now current.
    pub fn reload(&self, namespace: &str) -> u64 {
        // Lock order: current, then staged.
        let mut current = write_lock(&self.current);
        let pending = write_lock(&self.staged)
            .remove(namespace)
            .unwrap_or_default();
        if pending.is_empty() {
            return current.version;
        }
        let mut user = current.user.clone();
        let entries = user.entry(namespace.to_owned()).or_default();
        let added = pending.len();
        for info in pending {
            entries.insert(info.name.clone(), info);
        }
        *current = Arc::new(RegistrySnapshot {
            version: current.version + 1,
            system: current.system.clone(),
            user,
        });
        tracing::info!(
            namespace,
            added,
            version = current.version,
            "directive registry reloaded"
        );
        current.version
    }

    /// The current snapshot viewed from `namespace`.
    pub fn catalog(&self, namespace: &str) -> Result<Catalog, RegistryError> {
        let current = read_lock(&self.current);
        let stale = read_lock(&self.staged)
            .get(namespace)
            .is_some_and(|p| !p.is_empty());
        if stale {
            return Err(RegistryError::Stale {
                namespace: namespace.to_owned(),
            });
        }
        Ok(Catalog {
            snapshot: Arc::clone(&current),
            namespace: namespace.to_owned(),
        })
    }

    pub fn version(&self) -> u64 {
        read_lock(&self.current).version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::ExecutorContext;
    use crate::error::DirectiveError;
    use crate::row::Row;
    use crate::token::TokenKind;
    use crate::usage::Arguments;

    struct Named(&'static str);

    impl Directive for Named {
        fn define(&self) -> UsageDefinition {
            UsageDefinition::builder(self.0)
                .define("column", TokenKind::ColumnName)
                .build()
        }
        fn initialize(&mut self, _args: &Arguments) -> Result<(), DirectiveError> {
            Ok(())
        }
        fn execute(
            &mut self,
            rows: Vec<Row>,
            _ctx: &mut ExecutorContext,
        ) -> Result<Vec<Row>, DirectiveError> {
            Ok(rows)
        }
    }

    fn info(name: &'static str) -> DirectiveInfo {
        DirectiveInfo::new(format!("{} directive", name), move || Box::new(Named(name)))
    }

    #[test]
    fn system_directives_visible_everywhere() {
        let reg = DirectiveRegistry::new();
        reg.register_system(info("drop")).unwrap();
        let catalog = reg.catalog("anything").unwrap();
        let (found, scope) = catalog.lookup("drop").unwrap();
        assert_eq!(found.name(), "drop");
        assert_eq!(scope, Scope::System);
        assert!(catalog.lookup("missing").is_none());
        assert_eq!(
            catalog.resolve("missing").unwrap_err(),
            RegistryError::UnknownDirective {
                name: "missing".into(),
                namespace: "anything".into()
            }
        );
    }

    #[test]
    fn user_directives_need_reload() {
        let reg = DirectiveRegistry::new();
        reg.register_user("ns1", info("my-udd")).unwrap();
        assert_eq!(
            reg.catalog("ns1").unwrap_err(),
            RegistryError::Stale {
                namespace: "ns1".into()
            }
        );
        // Other namespaces are unaffected.
        assert!(reg.catalog("ns2").unwrap().lookup("my-udd").is_none());

        let before = reg.version();
        let after = reg.reload("ns1");
        assert_eq!(after, before + 1);
        let catalog = reg.catalog("ns1").unwrap();
        assert_eq!(
            catalog.scope_of("my-udd"),
            Some(Scope::User {
                namespace: "ns1".into()
            })
        );
        assert!(reg.catalog("ns2").unwrap().lookup("my-udd").is_none());
    }

    #[test]
    fn reload_without_changes_keeps_version() {
        let reg = DirectiveRegistry::new();
        reg.register_system(info("drop")).unwrap();
        let v = reg.version();
        assert_eq!(reg.reload("default"), v);
    }

    #[test]
    fn old_snapshot_survives_reload() {
        let reg = DirectiveRegistry::new();
        let old = reg.catalog("ns").unwrap();
        reg.register_user("ns", info("late")).unwrap();
        reg.reload("ns");
        assert!(old.lookup("late").is_none());
        assert!(reg.catalog("ns").unwrap().lookup("late").is_some());
    }

    #[test]
    fn duplicates_rejected() {
        let reg = DirectiveRegistry::new();
        reg.register_system(info("drop")).unwrap();
        assert!(matches!(
            reg.register_system(info("drop")),
            Err(RegistryError::Duplicate { .. })
        ));
        assert!(matches!(
            reg.register_user("ns", info("drop")),
            Err(RegistryError::Duplicate { .. })
        ));
        reg.register_user("ns", info("mine")).unwrap();
        assert!(matches!(
            reg.register_user("ns", info("mine")),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn list_is_sorted_with_scopes() {
        let reg = DirectiveRegistry::new();
        reg.register_system(info("rename")).unwrap();
        reg.register_system(info("drop")).unwrap();
        reg.register_user("ns", info("custom")).unwrap();
        reg.reload("ns");
        let list = reg.catalog("ns").unwrap().list();
        let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["custom", "drop", "rename"]);
        assert_eq!(list[0].scope, "user:ns");
        assert_eq!(list[1].usage, "drop :column");
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let reg = Arc::new(DirectiveRegistry::new());
        reg.register_system(info("drop")).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if let Ok(c) = reg.catalog("ns") {
                            assert!(c.lookup("drop").is_some());
                        }
                    }
                })
            })
            .collect();
        for i in 0..20 {
            let name: &'static str = Box::leak(format!("udd-{}", i).into_boxed_str());
            reg.register_user("ns", info(name)).unwrap();
            reg.reload("ns");
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.catalog("ns").unwrap().list().len(), 21);
    }
}
