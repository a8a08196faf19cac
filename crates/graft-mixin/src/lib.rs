#![forbid(unsafe_code)]

//! Load-time class transformation driven by mixin declarations.
//!
//! A mixin is a class whose methods and interfaces are merged into a *target*
//! class when the target is loaded; the mixin itself is never instantiated.
//! Role tags on the mixin's methods select how each one lands on the target:
//! copied in as a new method, replacing an existing body, or called from an
//! existing method at its head or return points.
//!
//! The [`MixinCatalog`] maps target class names to ordered mixin lists and is
//! built once, ahead of any transform. [`MixinEngine::transform`] then patches
//! one class image at a time, degrading per method on failure and reporting
//! what degraded through [`TransformOutcome::diagnostics`].

mod catalog;
mod classify;
mod pool;
mod rewrite;
mod role;
mod transform;

pub use crate::catalog::{mixin_target, CatalogError, MixinCatalog, MixinCatalogBuilder, MixinConfig};
pub use crate::classify::{classify, ClassifiedMixin, InjectRequest};
pub use crate::pool::{ClassPool, DirClassPool, MemoryClassPool, IMAGE_EXTENSION};
pub use crate::rewrite::{RewriteError, INJECT_PREFIX};
pub use crate::role::{
    method_role, InjectPoint, MethodRole, INJECT_ANNOTATION, MIXIN_ANNOTATION, OVERWRITE_ANNOTATION,
};
pub use crate::transform::{MixinEngine, TransformDiagnostic, TransformError, TransformOutcome};
