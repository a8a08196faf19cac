#![allow(dead_code)]

use graft_classfile::{
    Annotation, ClassFile, Const, ElementValue, Instruction, MethodDescriptor, MethodInfo,
    ACC_STATIC,
};
use graft_mixin::{INJECT_ANNOTATION, MIXIN_ANNOTATION, OVERWRITE_ANNOTATION};
use std::collections::HashMap;

pub fn method(name: &str, descriptor: &str, declared_in: &str, code: Vec<Instruction>) -> MethodInfo {
    MethodInfo {
        name: name.into(),
        descriptor: descriptor.into(),
        declared_in: declared_in.into(),
        code,
        ..MethodInfo::default()
    }
}

pub fn class(name: &str, methods: Vec<MethodInfo>) -> ClassFile {
    ClassFile {
        name: name.into(),
        methods,
        ..ClassFile::default()
    }
}

/// A static call whose only purpose is to show up in the effect log.
pub fn probe(label: &str) -> Instruction {
    Instruction::InvokeStatic {
        owner: "test.Probe".into(),
        name: label.into(),
        descriptor: "()V".into(),
    }
}

/// The class backing [`probe`] calls, so rebind validation can resolve them.
pub fn probe_class(labels: &[&str]) -> ClassFile {
    let methods = labels
        .iter()
        .map(|label| MethodInfo {
            access_flags: ACC_STATIC,
            name: (*label).into(),
            descriptor: "()V".into(),
            declared_in: "test.Probe".into(),
            code: vec![Instruction::Return],
            ..MethodInfo::default()
        })
        .collect();
    class("test.Probe", methods)
}

pub fn tagged(mut method: MethodInfo, tag: Annotation) -> MethodInfo {
    method.annotations.push(tag);
    method
}

pub fn mixin_tag(target: &str) -> Annotation {
    Annotation::new(MIXIN_ANNOTATION).with_element("value", ElementValue::Str(target.into()))
}

pub fn overwrite_tag() -> Annotation {
    Annotation::new(OVERWRITE_ANNOTATION)
}

pub fn inject_tag(target_method: &str, at: &str) -> Annotation {
    Annotation::new(INJECT_ANNOTATION)
        .with_element("method", ElementValue::Str(target_method.into()))
        .with_element(
            "at",
            ElementValue::Enum {
                type_name: "At".into(),
                const_name: at.into(),
            },
        )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    Object(String),
}

/// Minimal executor for class images: just enough to observe call order and
/// field writes. One implicit instance per class; calls dispatch on the
/// instruction's owner operand, and calls into unknown classes are recorded
/// and yield default values.
#[derive(Default)]
pub struct Machine {
    classes: HashMap<String, ClassFile>,
    fields: HashMap<(String, String), Value>,
    pub effects: Vec<String>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, class: ClassFile) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) {
        self.load(ClassFile::parse(bytes).expect("valid class image"));
    }

    pub fn call(&mut self, class: &str, method: &str, args: Vec<Value>) -> Option<Value> {
        self.effects.push(format!("{class}.{method}"));
        let Some(found) = self.classes.get(class).and_then(|c| c.method(method)) else {
            return None;
        };
        let found = found.clone();
        self.exec(class, &found, &args)
    }

    fn exec(&mut self, class_name: &str, method: &MethodInfo, args: &[Value]) -> Option<Value> {
        let mut stack: Vec<Value> = Vec::new();
        for inst in &method.code {
            match inst {
                Instruction::LoadThis => stack.push(Value::Object(class_name.to_string())),
                Instruction::LoadArg(index) => stack.push(args[*index as usize].clone()),
                Instruction::Const(Const::Int(value)) => stack.push(Value::Int(*value)),
                Instruction::Const(Const::Utf8(text)) => stack.push(Value::Str(text.clone())),
                Instruction::GetField { name, .. } => {
                    let receiver = stack.pop().expect("receiver on stack");
                    let Value::Object(owner) = receiver else {
                        panic!("field access on non-object {receiver:?}");
                    };
                    let value = self
                        .fields
                        .get(&(owner, name.clone()))
                        .cloned()
                        .unwrap_or(Value::Int(0));
                    stack.push(value);
                }
                Instruction::PutField { name, .. } => {
                    let value = stack.pop().expect("value on stack");
                    let receiver = stack.pop().expect("receiver on stack");
                    let Value::Object(owner) = receiver else {
                        panic!("field access on non-object {receiver:?}");
                    };
                    self.effects.push(format!("put {owner}.{name}"));
                    self.fields.insert((owner, name.clone()), value);
                }
                Instruction::Invoke {
                    owner,
                    name,
                    descriptor,
                } => {
                    let desc = MethodDescriptor::parse(descriptor).expect("call descriptor");
                    let mut call_args = Vec::new();
                    for _ in 0..desc.arity() {
                        call_args.push(stack.pop().expect("argument on stack"));
                    }
                    call_args.reverse();
                    let _receiver = stack.pop().expect("receiver on stack");
                    let result = self.call(owner, name, call_args);
                    if desc.returns_value() {
                        stack.push(result.unwrap_or(Value::Int(0)));
                    }
                }
                Instruction::InvokeStatic {
                    owner,
                    name,
                    descriptor,
                } => {
                    let desc = MethodDescriptor::parse(descriptor).expect("call descriptor");
                    let mut call_args = Vec::new();
                    for _ in 0..desc.arity() {
                        call_args.push(stack.pop().expect("argument on stack"));
                    }
                    call_args.reverse();
                    let result = self.call(owner, name, call_args);
                    if desc.returns_value() {
                        stack.push(result.unwrap_or(Value::Int(0)));
                    }
                }
                Instruction::Pop => {
                    stack.pop().expect("value on stack");
                }
                Instruction::Return => return None,
                Instruction::ReturnValue => return stack.pop(),
            }
        }
        None
    }

    /// Position of an effect in the log, for ordering assertions.
    pub fn effect_index(&self, effect: &str) -> Option<usize> {
        self.effects.iter().position(|logged| logged == effect)
    }
}
