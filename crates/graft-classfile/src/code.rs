use crate::constant_pool::{Const, ConstantPool, PoolBuilder};
use crate::descriptor::MethodDescriptor;
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::Writer;
use std::fmt;

const OP_LOAD_THIS: u8 = 0x01;
const OP_LOAD_ARG: u8 = 0x02;
const OP_CONST: u8 = 0x03;
const OP_GET_FIELD: u8 = 0x10;
const OP_PUT_FIELD: u8 = 0x11;
const OP_INVOKE: u8 = 0x20;
const OP_INVOKE_STATIC: u8 = 0x21;
const OP_POP: u8 = 0x30;
const OP_RETURN: u8 = 0x40;
const OP_RETURN_VALUE: u8 = 0x41;

/// One instruction of a method body. Bodies are branch-free: a sequence of
/// linear segments, each terminated by a return opcode.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    LoadThis,
    LoadArg(u8),
    Const(Const),
    GetField { owner: String, name: String },
    PutField { owner: String, name: String },
    Invoke {
        owner: String,
        name: String,
        descriptor: String,
    },
    InvokeStatic {
        owner: String,
        name: String,
        descriptor: String,
    },
    Pop,
    Return,
    ReturnValue,
}

impl Instruction {
    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Return | Instruction::ReturnValue)
    }

    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let opcode = reader.read_u1()?;
        let inst = match opcode {
            OP_LOAD_THIS => Instruction::LoadThis,
            OP_LOAD_ARG => Instruction::LoadArg(reader.read_u1()?),
            OP_CONST => Instruction::Const(cp.get_const(reader.read_u2()?)?),
            OP_GET_FIELD => Instruction::GetField {
                owner: cp.get_utf8(reader.read_u2()?)?.to_string(),
                name: cp.get_utf8(reader.read_u2()?)?.to_string(),
            },
            OP_PUT_FIELD => Instruction::PutField {
                owner: cp.get_utf8(reader.read_u2()?)?.to_string(),
                name: cp.get_utf8(reader.read_u2()?)?.to_string(),
            },
            OP_INVOKE => Instruction::Invoke {
                owner: cp.get_utf8(reader.read_u2()?)?.to_string(),
                name: cp.get_utf8(reader.read_u2()?)?.to_string(),
                descriptor: cp.get_utf8(reader.read_u2()?)?.to_string(),
            },
            OP_INVOKE_STATIC => Instruction::InvokeStatic {
                owner: cp.get_utf8(reader.read_u2()?)?.to_string(),
                name: cp.get_utf8(reader.read_u2()?)?.to_string(),
                descriptor: cp.get_utf8(reader.read_u2()?)?.to_string(),
            },
            OP_POP => Instruction::Pop,
            OP_RETURN => Instruction::Return,
            OP_RETURN_VALUE => Instruction::ReturnValue,
            other => return Err(Error::InvalidOpcode(other)),
        };
        Ok(inst)
    }

    pub(crate) fn write(&self, pool: &mut PoolBuilder, out: &mut Writer) -> Result<()> {
        match self {
            Instruction::LoadThis => out.put_u1(OP_LOAD_THIS),
            Instruction::LoadArg(index) => {
                out.put_u1(OP_LOAD_ARG);
                out.put_u1(*index);
            }
            Instruction::Const(value) => {
                out.put_u1(OP_CONST);
                out.put_u2(pool.intern(value)?);
            }
            Instruction::GetField { owner, name } => {
                out.put_u1(OP_GET_FIELD);
                out.put_u2(pool.intern_utf8(owner)?);
                out.put_u2(pool.intern_utf8(name)?);
            }
            Instruction::PutField { owner, name } => {
                out.put_u1(OP_PUT_FIELD);
                out.put_u2(pool.intern_utf8(owner)?);
                out.put_u2(pool.intern_utf8(name)?);
            }
            Instruction::Invoke {
                owner,
                name,
                descriptor,
            } => {
                out.put_u1(OP_INVOKE);
                out.put_u2(pool.intern_utf8(owner)?);
                out.put_u2(pool.intern_utf8(name)?);
                out.put_u2(pool.intern_utf8(descriptor)?);
            }
            Instruction::InvokeStatic {
                owner,
                name,
                descriptor,
            } => {
                out.put_u1(OP_INVOKE_STATIC);
                out.put_u2(pool.intern_utf8(owner)?);
                out.put_u2(pool.intern_utf8(name)?);
                out.put_u2(pool.intern_utf8(descriptor)?);
            }
            Instruction::Pop => out.put_u1(OP_POP),
            Instruction::Return => out.put_u1(OP_RETURN),
            Instruction::ReturnValue => out.put_u1(OP_RETURN_VALUE),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    StackUnderflow { at: usize },
    ArgOutOfRange { index: u8, arity: usize },
    ThisInStatic { at: usize },
    ValueReturnInVoid { at: usize },
    VoidReturnInValued { at: usize },
    InvalidCallDescriptor { at: usize, descriptor: String },
    MissingReturn,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::StackUnderflow { at } => write!(f, "stack underflow at instruction {at}"),
            VerifyError::ArgOutOfRange { index, arity } => {
                write!(f, "argument {index} out of range for arity {arity}")
            }
            VerifyError::ThisInStatic { at } => {
                write!(f, "load of `this` in a static method at instruction {at}")
            }
            VerifyError::ValueReturnInVoid { at } => {
                write!(f, "value return in a void method at instruction {at}")
            }
            VerifyError::VoidReturnInValued { at } => {
                write!(f, "void return in a value-returning method at instruction {at}")
            }
            VerifyError::InvalidCallDescriptor { at, descriptor } => {
                write!(f, "invalid call descriptor {descriptor} at instruction {at}")
            }
            VerifyError::MissingReturn => write!(f, "body does not end with a return"),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Structural check of one method body: stack discipline, argument indices
/// within the descriptor's arity, and return opcodes agreeing with the
/// declared return type. The stack resets at each return opcode, so bodies
/// made of several return-terminated segments verify segment by segment.
pub fn verify_method(
    desc: &MethodDescriptor,
    static_method: bool,
    code: &[Instruction],
) -> std::result::Result<(), VerifyError> {
    let mut depth = 0usize;
    let need = |depth: usize, wanted: usize, at: usize| {
        if depth < wanted {
            Err(VerifyError::StackUnderflow { at })
        } else {
            Ok(())
        }
    };

    for (at, inst) in code.iter().enumerate() {
        match inst {
            Instruction::LoadThis => {
                if static_method {
                    return Err(VerifyError::ThisInStatic { at });
                }
                depth += 1;
            }
            Instruction::LoadArg(index) => {
                if *index as usize >= desc.arity() {
                    return Err(VerifyError::ArgOutOfRange {
                        index: *index,
                        arity: desc.arity(),
                    });
                }
                depth += 1;
            }
            Instruction::Const(_) => depth += 1,
            Instruction::GetField { .. } => {
                need(depth, 1, at)?;
            }
            Instruction::PutField { .. } => {
                need(depth, 2, at)?;
                depth -= 2;
            }
            Instruction::Invoke { descriptor, .. } => {
                let callee = MethodDescriptor::parse(descriptor).map_err(|_| {
                    VerifyError::InvalidCallDescriptor {
                        at,
                        descriptor: descriptor.clone(),
                    }
                })?;
                need(depth, callee.arity() + 1, at)?;
                depth -= callee.arity() + 1;
                if callee.returns_value() {
                    depth += 1;
                }
            }
            Instruction::InvokeStatic { descriptor, .. } => {
                let callee = MethodDescriptor::parse(descriptor).map_err(|_| {
                    VerifyError::InvalidCallDescriptor {
                        at,
                        descriptor: descriptor.clone(),
                    }
                })?;
                need(depth, callee.arity(), at)?;
                depth -= callee.arity();
                if callee.returns_value() {
                    depth += 1;
                }
            }
            Instruction::Pop => {
                need(depth, 1, at)?;
                depth -= 1;
            }
            Instruction::Return => {
                if desc.returns_value() {
                    return Err(VerifyError::VoidReturnInValued { at });
                }
                depth = 0;
            }
            Instruction::ReturnValue => {
                if !desc.returns_value() {
                    return Err(VerifyError::ValueReturnInVoid { at });
                }
                need(depth, 1, at)?;
                depth = 0;
            }
        }
    }

    match code.last() {
        Some(last) if last.is_return() => Ok(()),
        _ => Err(VerifyError::MissingReturn),
    }
}
