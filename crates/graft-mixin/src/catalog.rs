use crate::pool::ClassPool;
use crate::role::MIXIN_ANNOTATION;
use graft_classfile::ClassFile;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// One declarative mixin configuration document.
///
/// ```json
/// { "package": "game.mixins", "mixins": ["PlayerMixin", "WorldMixin"] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct MixinConfig {
    pub package: String,
    pub mixins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid mixin config: {0}")]
    Config(#[from] serde_json::Error),
    #[error("mixin class {name} not present in the class pool")]
    MixinNotFound { name: String },
    #[error("mixin class {name} could not be decoded: {source}")]
    MixinUnreadable {
        name: String,
        #[source]
        source: graft_classfile::Error,
    },
}

/// Resolved mapping from target class name to its ordered mixin list. Built
/// once via [`MixinCatalogBuilder`] and read-only afterwards; list order is
/// the order mixins were registered, and later mixins win name collisions
/// during a transform.
#[derive(Debug, Default)]
pub struct MixinCatalog {
    targets: HashMap<String, Vec<ClassFile>>,
}

impl MixinCatalog {
    pub fn builder() -> MixinCatalogBuilder {
        MixinCatalogBuilder::default()
    }

    pub fn mixins_for(&self, target: &str) -> Option<&[ClassFile]> {
        self.targets.get(target).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target class names with at least one mixin registered.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct MixinCatalogBuilder {
    targets: HashMap<String, Vec<ClassFile>>,
}

impl MixinCatalogBuilder {
    /// Registers an already-decoded mixin for a target class.
    pub fn add_mixin(&mut self, target: impl Into<String>, mixin: ClassFile) -> &mut Self {
        self.targets.entry(target.into()).or_default().push(mixin);
        self
    }

    /// Parses one JSON config and registers every mixin it names that can be
    /// resolved through the pool. A class that is missing, unreadable, or not
    /// tagged `Mixin` does not abort the rest of the config: untagged classes
    /// are skipped silently, the other two cases are logged and returned.
    ///
    /// The outer `Err` is reserved for an unparseable config document.
    pub fn add_config_json(
        &mut self,
        json: &str,
        pool: &dyn ClassPool,
    ) -> Result<Vec<CatalogError>, CatalogError> {
        let config: MixinConfig = serde_json::from_str(json)?;
        let mut skipped = Vec::new();

        for short_name in &config.mixins {
            let name = format!("{}.{}", config.package, short_name);
            let Some(bytes) = pool.class_bytes(&name) else {
                tracing::warn!(class = %name, "mixin class missing from pool, skipping");
                skipped.push(CatalogError::MixinNotFound { name });
                continue;
            };
            let mixin = match ClassFile::parse(&bytes) {
                Ok(class) => class,
                Err(source) => {
                    tracing::warn!(class = %name, error = %source, "unreadable mixin class, skipping");
                    skipped.push(CatalogError::MixinUnreadable { name, source });
                    continue;
                }
            };
            let Some(target) = mixin_target(&mixin) else {
                tracing::debug!(class = %name, "listed class has no Mixin tag, skipping");
                continue;
            };
            self.add_mixin(target, mixin);
        }

        Ok(skipped)
    }

    pub fn build(self) -> MixinCatalog {
        MixinCatalog {
            targets: self.targets,
        }
    }
}

/// Target class named by a class-level `Mixin` tag, if present and well-formed.
pub fn mixin_target(class: &ClassFile) -> Option<String> {
    class
        .annotation(MIXIN_ANNOTATION)?
        .element("value")?
        .as_str()
        .map(str::to_string)
}
