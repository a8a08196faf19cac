use crate::role::{method_role, InjectPoint, MethodRole};
use graft_classfile::{ClassFile, MethodInfo};
use indexmap::IndexMap;

/// One inject contribution: the mixin method whose body becomes the helper,
/// and the point in the target method where the helper is called.
#[derive(Debug, Clone, Copy)]
pub struct InjectRequest<'a> {
    pub method: &'a MethodInfo,
    pub point: InjectPoint,
}

/// A mixin's methods sorted by role. `overwrites` is keyed by the mixin
/// method's own name, `injects` by the *target* method name its tag declares;
/// within one mixin a later method silently supersedes an earlier one under
/// the same key.
#[derive(Debug, Default)]
pub struct ClassifiedMixin<'a> {
    pub overwrites: IndexMap<String, &'a MethodInfo>,
    pub injects: IndexMap<String, InjectRequest<'a>>,
    pub plain: Vec<&'a MethodInfo>,
}

/// Sorts a mixin's methods into roles in one pass. Untagged methods the mixin
/// merely inherited (declared elsewhere) contribute nothing.
pub fn classify(mixin: &ClassFile) -> ClassifiedMixin<'_> {
    let mut classified = ClassifiedMixin::default();
    for method in &mixin.methods {
        match method_role(method) {
            MethodRole::Overwrite => {
                classified.overwrites.insert(method.name.clone(), method);
            }
            MethodRole::Inject {
                target_method,
                point,
            } => {
                classified
                    .injects
                    .insert(target_method, InjectRequest { method, point });
            }
            MethodRole::Plain => {
                if method.declared_in == mixin.name {
                    classified.plain.push(method);
                }
            }
        }
    }
    classified
}
