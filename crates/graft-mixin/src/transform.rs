use crate::catalog::MixinCatalog;
use crate::classify::classify;
use crate::pool::ClassPool;
use crate::rewrite::{self, PoolResolver, RewriteError, INJECT_PREFIX};
use crate::role::InjectPoint;
use graft_classfile::{ClassFile, MethodInfo, ACC_SYNTHETIC};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("target class {class} could not be decoded: {source}")]
    Decode {
        class: String,
        #[source]
        source: graft_classfile::Error,
    },
    #[error("class {0} not found in the class pool")]
    ClassNotFound(String),
    #[error("role tag targets unknown method {method} on {class}")]
    RoleResolution { class: String, method: String },
    #[error("method body could not be rewritten: {0}")]
    BodyCompile(#[source] RewriteError),
    #[error("failed to encode transformed class {class}: {source}")]
    Encode {
        class: String,
        #[source]
        source: graft_classfile::Error,
    },
}

impl From<RewriteError> for TransformError {
    fn from(error: RewriteError) -> Self {
        match error {
            RewriteError::ClassNotFound(name) => TransformError::ClassNotFound(name),
            other => TransformError::BodyCompile(other),
        }
    }
}

/// One recovered (or fatal) problem from a transform pass. `method` and
/// `mixin` are filled in when the problem is attributable to a single
/// contribution.
#[derive(Debug)]
pub struct TransformDiagnostic {
    pub method: Option<String>,
    pub mixin: Option<String>,
    pub error: TransformError,
}

#[derive(Debug)]
pub struct TransformOutcome<'a> {
    pub bytes: Cow<'a, [u8]>,
    pub diagnostics: Vec<TransformDiagnostic>,
}

impl TransformOutcome<'_> {
    /// False when the input bytes were passed through unchanged.
    pub fn is_transformed(&self) -> bool {
        matches!(self.bytes, Cow::Owned(_))
    }

    fn passthrough(original: &[u8], diagnostics: Vec<TransformDiagnostic>) -> TransformOutcome<'_> {
        TransformOutcome {
            bytes: Cow::Borrowed(original),
            diagnostics,
        }
    }
}

/// The class-transformation engine. Owns nothing mutable: the catalog is
/// frozen at construction and each [`transform`](Self::transform) call works
/// on a model it decodes itself, so one engine may serve concurrent class
/// loads.
pub struct MixinEngine<P> {
    catalog: MixinCatalog,
    pool: P,
}

struct Contribution<'c> {
    mixin: &'c str,
    method: &'c MethodInfo,
}

struct Injection<'c> {
    mixin: &'c str,
    method: &'c MethodInfo,
    point: InjectPoint,
}

impl<P: ClassPool> MixinEngine<P> {
    pub fn new(catalog: MixinCatalog, pool: P) -> Self {
        Self { catalog, pool }
    }

    pub fn catalog(&self) -> &MixinCatalog {
        &self.catalog
    }

    /// Applies every mixin registered for `name` to the class image in
    /// `original`. A class with no catalog entry passes through
    /// byte-identical. Per-method failures degrade that method only and are
    /// reported on the outcome; an undecodable target or a failed final
    /// encode falls back to the original bytes.
    pub fn transform<'a>(&self, name: &str, original: &'a [u8]) -> TransformOutcome<'a> {
        let Some(mixins) = self.catalog.mixins_for(name) else {
            return TransformOutcome::passthrough(original, Vec::new());
        };

        let mut target = match ClassFile::parse(original) {
            Ok(class) => class,
            Err(source) => {
                let error = TransformError::Decode {
                    class: name.to_string(),
                    source,
                };
                tracing::warn!(class = name, error = %error, "leaving class untransformed");
                return TransformOutcome::passthrough(
                    original,
                    vec![TransformDiagnostic {
                        method: None,
                        mixin: None,
                        error,
                    }],
                );
            }
        };

        tracing::debug!(class = name, mixins = mixins.len(), "applying mixins");

        let mut diagnostics: Vec<TransformDiagnostic> = Vec::new();
        let mut resolver = PoolResolver::new(&self.pool);

        // Classification merge: later mixins supersede earlier ones under the
        // same name; interfaces union.
        let mut overwrites: IndexMap<String, Contribution<'_>> = IndexMap::new();
        let mut injects: IndexMap<String, Injection<'_>> = IndexMap::new();
        let mut plain: Vec<Contribution<'_>> = Vec::new();

        for mixin in mixins {
            let classified = classify(mixin);
            for (method_name, method) in classified.overwrites {
                overwrites.insert(
                    method_name,
                    Contribution {
                        mixin: &mixin.name,
                        method,
                    },
                );
            }
            for (target_name, request) in classified.injects {
                injects.insert(
                    target_name,
                    Injection {
                        mixin: &mixin.name,
                        method: request.method,
                        point: request.point,
                    },
                );
            }
            plain.extend(classified.plain.into_iter().map(|method| Contribution {
                mixin: &mixin.name,
                method,
            }));
            for interface in &mixin.interfaces {
                target.add_interface(interface);
            }
        }

        // Copy plain methods onto the target.
        let mut added: Vec<(usize, String)> = Vec::new();
        for Contribution { mixin, method } in &plain {
            let duplicate = target
                .methods
                .iter()
                .any(|m| m.name == method.name && m.descriptor == method.descriptor);
            if duplicate {
                recover(
                    &mut diagnostics,
                    name,
                    Some(method.name.clone()),
                    Some(mixin),
                    RewriteError::DuplicateMethod {
                        name: method.name.clone(),
                        descriptor: method.descriptor.clone(),
                    }
                    .into(),
                );
                continue;
            }
            let mut copy = (*method).clone();
            copy.declared_in = target.name.clone();
            copy.code = rewrite::rebind_owners(&copy.code, mixin, &target.name);
            target.methods.push(copy);
            added.push((target.methods.len() - 1, (*mixin).to_string()));
        }

        // Synthesize one helper per inject, under the reserved mangled name.
        let mut failed_helpers: HashSet<String> = HashSet::new();
        for (target_name, Injection { mixin, method, .. }) in &injects {
            let helper_name = format!("{INJECT_PREFIX}{}", method.name);
            if target.has_method(&helper_name) {
                failed_helpers.insert(target_name.clone());
                recover(
                    &mut diagnostics,
                    name,
                    Some(helper_name.clone()),
                    Some(mixin),
                    RewriteError::HelperNameTaken(helper_name).into(),
                );
                continue;
            }
            let mut helper = (*method).clone();
            helper.name = helper_name;
            helper.declared_in = target.name.clone();
            helper.access_flags |= ACC_SYNTHETIC;
            helper.annotations.clear();
            helper.code = rewrite::rebind_owners(&helper.code, mixin, &target.name);
            target.methods.push(helper);
            added.push((target.methods.len() - 1, (*mixin).to_string()));
        }

        // Validate the copies now that the merged method table is complete;
        // a copy that does not hold up is dropped again, not left half-bound.
        let mut rejected: Vec<usize> = Vec::new();
        for (index, mixin) in &added {
            let method = &target.methods[*index];
            if let Err(error) = rewrite::validate_body(method, &target, &mut resolver) {
                let method_name = method.name.clone();
                recover(
                    &mut diagnostics,
                    name,
                    Some(method_name),
                    Some(mixin),
                    error.into(),
                );
                rejected.push(*index);
            }
        }
        for index in rejected.into_iter().rev() {
            target.methods.remove(index);
        }

        // Overwrites replace bodies wholesale, on original and copied methods
        // alike; the target method keeps its own descriptor and flags.
        let mut matched_overwrites: HashSet<String> = HashSet::new();
        for index in 0..target.methods.len() {
            let method_name = target.methods[index].name.clone();
            let Some(Contribution { mixin, method: source }) = overwrites.get(&method_name) else {
                continue;
            };
            matched_overwrites.insert(method_name.clone());

            let mut candidate = target.methods[index].clone();
            candidate.code = rewrite::rebind_owners(&source.code, mixin, &target.name);
            match rewrite::validate_body(&candidate, &target, &mut resolver) {
                Ok(()) => target.methods[index].code = candidate.code,
                Err(error) => recover(
                    &mut diagnostics,
                    name,
                    Some(method_name),
                    Some(mixin),
                    error.into(),
                ),
            }
        }

        // Wire helper calls into matching methods, after any overwrite.
        let mut matched_injects: HashSet<String> = HashSet::new();
        for index in 0..target.methods.len() {
            let method_name = target.methods[index].name.clone();
            let Some(Injection {
                mixin,
                method,
                point,
            }) = injects.get(&method_name)
            else {
                continue;
            };
            matched_injects.insert(method_name.clone());
            if failed_helpers.contains(&method_name) {
                // Helper synthesis was skipped and already reported.
                continue;
            }

            let helper_name = format!("{INJECT_PREFIX}{}", method.name);
            let Some(helper) = target.method(&helper_name) else {
                // Helper synthesis already failed and was reported.
                continue;
            };
            let call = match rewrite::helper_call(&target.name, helper) {
                Ok(call) => call,
                Err(error) => {
                    recover(
                        &mut diagnostics,
                        name,
                        Some(method_name),
                        Some(mixin),
                        error.into(),
                    );
                    continue;
                }
            };

            let mut candidate = target.methods[index].clone();
            rewrite::splice(&mut candidate.code, &call, *point);
            match rewrite::validate_body(&candidate, &target, &mut resolver) {
                Ok(()) => target.methods[index] = candidate,
                Err(error) => recover(
                    &mut diagnostics,
                    name,
                    Some(method_name),
                    Some(mixin),
                    error.into(),
                ),
            }
        }

        // Role tags that matched nothing reference methods that do not exist.
        for (method_name, Contribution { mixin, .. }) in &overwrites {
            if !matched_overwrites.contains(method_name) {
                recover(
                    &mut diagnostics,
                    name,
                    Some(method_name.clone()),
                    Some(mixin),
                    TransformError::RoleResolution {
                        class: target.name.clone(),
                        method: method_name.clone(),
                    },
                );
            }
        }
        for (method_name, Injection { mixin, .. }) in &injects {
            if !matched_injects.contains(method_name) {
                recover(
                    &mut diagnostics,
                    name,
                    Some(method_name.clone()),
                    Some(mixin),
                    TransformError::RoleResolution {
                        class: target.name.clone(),
                        method: method_name.clone(),
                    },
                );
            }
        }

        match target.encode() {
            Ok(bytes) => TransformOutcome {
                bytes: Cow::Owned(bytes),
                diagnostics,
            },
            Err(source) => {
                let error = TransformError::Encode {
                    class: name.to_string(),
                    source,
                };
                tracing::warn!(class = name, error = %error, "falling back to original bytes");
                diagnostics.push(TransformDiagnostic {
                    method: None,
                    mixin: None,
                    error,
                });
                TransformOutcome::passthrough(original, diagnostics)
            }
        }
    }
}

fn recover(
    diagnostics: &mut Vec<TransformDiagnostic>,
    class: &str,
    method: Option<String>,
    mixin: Option<&str>,
    error: TransformError,
) {
    tracing::warn!(
        class,
        method = method.as_deref().unwrap_or("<class>"),
        error = %error,
        "mixin contribution degraded"
    );
    diagnostics.push(TransformDiagnostic {
        method,
        mixin: mixin.map(str::to_string),
        error,
    });
}
