use graft_classfile::{Annotation, MethodInfo};

/// Class-level tag naming the target class a mixin applies to.
pub const MIXIN_ANNOTATION: &str = "Mixin";
/// Method-level tag: replace the body of the target method with this name.
pub const OVERWRITE_ANNOTATION: &str = "Overwrite";
/// Method-level tag: call this method from the named target method.
pub const INJECT_ANNOTATION: &str = "Inject";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectPoint {
    Head,
    Return,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodRole {
    Plain,
    Overwrite,
    Inject {
        target_method: String,
        point: InjectPoint,
    },
}

/// Resolves a mixin method's role from its tags. Untagged methods are
/// [`MethodRole::Plain`]; so is a method whose `Inject` tag is malformed —
/// classification itself never fails.
pub fn method_role(method: &MethodInfo) -> MethodRole {
    if method.has_annotation(OVERWRITE_ANNOTATION) {
        return MethodRole::Overwrite;
    }
    if let Some(tag) = method.annotation(INJECT_ANNOTATION) {
        match inject_role(tag) {
            Some(role) => return role,
            None => {
                tracing::debug!(
                    method = %method.name,
                    "malformed Inject tag, treating method as plain"
                );
            }
        }
    }
    MethodRole::Plain
}

fn inject_role(tag: &Annotation) -> Option<MethodRole> {
    let target_method = tag.element("method")?.as_str()?.to_string();
    let point = match tag.element("at")?.as_enum_const()? {
        "HEAD" => InjectPoint::Head,
        "RETURN" => InjectPoint::Return,
        _ => return None,
    };
    Some(MethodRole::Inject {
        target_method,
        point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_classfile::{ElementValue, MethodInfo};

    fn inject_tag(method: &str, at: &str) -> Annotation {
        Annotation::new(INJECT_ANNOTATION)
            .with_element("method", ElementValue::Str(method.into()))
            .with_element(
                "at",
                ElementValue::Enum {
                    type_name: "At".into(),
                    const_name: at.into(),
                },
            )
    }

    fn method_with(annotations: Vec<Annotation>) -> MethodInfo {
        MethodInfo {
            name: "onTick".into(),
            descriptor: "()V".into(),
            declared_in: "mixins.PlayerMixin".into(),
            annotations,
            ..MethodInfo::default()
        }
    }

    #[test]
    fn untagged_is_plain() {
        assert_eq!(method_role(&method_with(vec![])), MethodRole::Plain);
    }

    #[test]
    fn overwrite_tag_wins_over_inject() {
        let method = method_with(vec![
            Annotation::new(OVERWRITE_ANNOTATION),
            inject_tag("tick", "HEAD"),
        ]);
        assert_eq!(method_role(&method), MethodRole::Overwrite);
    }

    #[test]
    fn inject_tag_carries_target_and_point() {
        let method = method_with(vec![inject_tag("tick", "RETURN")]);
        assert_eq!(
            method_role(&method),
            MethodRole::Inject {
                target_method: "tick".into(),
                point: InjectPoint::Return,
            }
        );
    }

    #[test]
    fn malformed_inject_degrades_to_plain() {
        // Missing `at`.
        let missing_at = method_with(vec![Annotation::new(INJECT_ANNOTATION)
            .with_element("method", ElementValue::Str("tick".into()))]);
        assert_eq!(method_role(&missing_at), MethodRole::Plain);

        // `method` is not a string.
        let bad_method = method_with(vec![Annotation::new(INJECT_ANNOTATION)
            .with_element("method", ElementValue::Int(3))
            .with_element(
                "at",
                ElementValue::Enum {
                    type_name: "At".into(),
                    const_name: "HEAD".into(),
                },
            )]);
        assert_eq!(method_role(&bad_method), MethodRole::Plain);

        // Unknown point.
        let bad_point = method_with(vec![inject_tag("tick", "TAIL")]);
        assert_eq!(method_role(&bad_point), MethodRole::Plain);
    }
}
