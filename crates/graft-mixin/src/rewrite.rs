use crate::pool::ClassPool;
use crate::role::InjectPoint;
use graft_classfile::{
    verify_method, ClassFile, Instruction, MethodDescriptor, MethodInfo,
};
use std::collections::HashMap;
use thiserror::Error;

/// Reserved name prefix for synthesized injection helpers. User classes must
/// not declare methods under this prefix.
pub const INJECT_PREFIX: &str = "inject$";

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("referenced class {0} not present in the class pool")]
    ClassNotFound(String),
    #[error("referenced class {name} could not be decoded: {source}")]
    ClassUnreadable {
        name: String,
        #[source]
        source: graft_classfile::Error,
    },
    #[error("no method named {method} on {class}")]
    UnknownMethod { class: String, method: String },
    #[error("method {name}{descriptor} already exists on the target")]
    DuplicateMethod { name: String, descriptor: String },
    #[error("helper name {0} is already taken on the target")]
    HelperNameTaken(String),
    #[error("helper {0} declares parameters and cannot be called at an injection point")]
    HelperHasParams(String),
    #[error(transparent)]
    Classfile(#[from] graft_classfile::Error),
    #[error("body failed verification: {0}")]
    Verify(#[from] graft_classfile::VerifyError),
}

/// Decodes pool classes on demand and caches them for the duration of one
/// transform call.
pub(crate) struct PoolResolver<'a> {
    pool: &'a dyn ClassPool,
    cache: HashMap<String, ClassFile>,
}

impl<'a> PoolResolver<'a> {
    pub fn new(pool: &'a dyn ClassPool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    fn class(&mut self, name: &str) -> Result<&ClassFile, RewriteError> {
        if !self.cache.contains_key(name) {
            let bytes = self
                .pool
                .class_bytes(name)
                .ok_or_else(|| RewriteError::ClassNotFound(name.to_string()))?;
            let class = ClassFile::parse(&bytes).map_err(|source| RewriteError::ClassUnreadable {
                name: name.to_string(),
                source,
            })?;
            self.cache.insert(name.to_string(), class);
        }
        Ok(&self.cache[name])
    }

    fn has_method(&mut self, class: &str, method: &str) -> Result<bool, RewriteError> {
        Ok(self.class(class)?.has_method(method))
    }
}

/// Re-binds self-references in a body copied out of a mixin: every owner
/// operand naming the mixin class is rewritten to name the target instead.
/// The mixin is never instantiated, so nothing may keep resolving against it.
pub(crate) fn rebind_owners(code: &[Instruction], mixin: &str, target: &str) -> Vec<Instruction> {
    let rebind = |owner: String| {
        if owner == mixin {
            target.to_string()
        } else {
            owner
        }
    };
    code.iter()
        .cloned()
        .map(|inst| match inst {
            Instruction::GetField { owner, name } => Instruction::GetField {
                owner: rebind(owner),
                name,
            },
            Instruction::PutField { owner, name } => Instruction::PutField {
                owner: rebind(owner),
                name,
            },
            Instruction::Invoke {
                owner,
                name,
                descriptor,
            } => Instruction::Invoke {
                owner: rebind(owner),
                name,
                descriptor,
            },
            Instruction::InvokeStatic {
                owner,
                name,
                descriptor,
            } => Instruction::InvokeStatic {
                owner: rebind(owner),
                name,
                descriptor,
            },
            other => other,
        })
        .collect()
}

/// Checks one rebound method against the merged target class: every callee
/// must resolve (by name) on the target or through the class pool, every
/// foreign field owner must at least decode from the pool, and the body must
/// verify under the method's own descriptor.
pub(crate) fn validate_body(
    method: &MethodInfo,
    target: &ClassFile,
    resolver: &mut PoolResolver<'_>,
) -> Result<(), RewriteError> {
    for inst in &method.code {
        match inst {
            Instruction::GetField { owner, .. } | Instruction::PutField { owner, .. } => {
                if owner != &target.name {
                    resolver.class(owner)?;
                }
            }
            Instruction::Invoke { owner, name, .. }
            | Instruction::InvokeStatic { owner, name, .. } => {
                let resolved = if owner == &target.name {
                    target.has_method(name)
                } else {
                    resolver.has_method(owner, name)?
                };
                if !resolved {
                    return Err(RewriteError::UnknownMethod {
                        class: owner.clone(),
                        method: name.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    let desc = MethodDescriptor::parse(&method.descriptor)?;
    verify_method(&desc, method.is_static(), &method.code)?;
    Ok(())
}

/// Builds the call sequence for an injection helper: load the receiver, call
/// the helper, discard its result if it has one. Helpers with parameters
/// cannot be wired since no argument values exist at the splice point.
pub(crate) fn helper_call(
    target: &str,
    helper: &MethodInfo,
) -> Result<Vec<Instruction>, RewriteError> {
    let desc = MethodDescriptor::parse(&helper.descriptor)?;
    if desc.arity() != 0 {
        return Err(RewriteError::HelperHasParams(helper.name.clone()));
    }
    let mut call = vec![
        Instruction::LoadThis,
        Instruction::Invoke {
            owner: target.to_string(),
            name: helper.name.clone(),
            descriptor: helper.descriptor.clone(),
        },
    ];
    if desc.returns_value() {
        call.push(Instruction::Pop);
    }
    Ok(call)
}

/// Splices a call sequence into a body. `Head` prepends it before any
/// original logic; `Return` inserts it immediately before every return
/// opcode, so multi-segment bodies are instrumented at each exit.
pub(crate) fn splice(code: &mut Vec<Instruction>, call: &[Instruction], point: InjectPoint) {
    match point {
        InjectPoint::Head => {
            code.splice(0..0, call.iter().cloned());
        }
        InjectPoint::Return => {
            let returns: Vec<usize> = code
                .iter()
                .enumerate()
                .filter(|(_, inst)| inst.is_return())
                .map(|(index, _)| index)
                .collect();
            // Back to front so earlier indices stay valid.
            for index in returns.into_iter().rev() {
                code.splice(index..index, call.iter().cloned());
            }
        }
    }
}
