use crate::constant_pool::{Const, ConstantPool, PoolBuilder};
use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::Writer;

const TAG_STR: u8 = b's';
const TAG_INT: u8 = b'i';
const TAG_ENUM: u8 = b'e';

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_name: String,
    pub elements: Vec<(String, ElementValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Str(String),
    Int(i64),
    Enum {
        type_name: String,
        const_name: String,
    },
}

impl Annotation {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_element(mut self, name: impl Into<String>, value: ElementValue) -> Self {
        self.elements.push((name.into(), value));
        self
    }

    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(element, _)| element == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let type_name = cp.get_utf8(reader.read_u2()?)?.to_string();
        let count = reader.read_u2()? as usize;
        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            let name = cp.get_utf8(reader.read_u2()?)?.to_string();
            let value = ElementValue::parse(reader, cp)?;
            elements.push((name, value));
        }
        Ok(Self {
            type_name,
            elements,
        })
    }

    pub(crate) fn write(&self, pool: &mut PoolBuilder, out: &mut Writer) -> Result<()> {
        out.put_u2(pool.intern_utf8(&self.type_name)?);
        if self.elements.len() > u16::MAX as usize {
            return Err(Error::SectionOverflow("annotation elements"));
        }
        out.put_u2(self.elements.len() as u16);
        for (name, value) in &self.elements {
            out.put_u2(pool.intern_utf8(name)?);
            value.write(pool, out)?;
        }
        Ok(())
    }
}

impl ElementValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementValue::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_enum_const(&self) -> Option<&str> {
        match self {
            ElementValue::Enum { const_name, .. } => Some(const_name),
            _ => None,
        }
    }

    fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let tag = reader.read_u1()?;
        match tag {
            TAG_STR => {
                let index = reader.read_u2()?;
                match cp.get_const(index)? {
                    Const::Utf8(text) => Ok(ElementValue::Str(text)),
                    other => Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Utf8",
                        found: other.kind(),
                    }),
                }
            }
            TAG_INT => {
                let index = reader.read_u2()?;
                match cp.get_const(index)? {
                    Const::Int(value) => Ok(ElementValue::Int(value)),
                    other => Err(Error::PoolTypeMismatch {
                        index,
                        expected: "Int",
                        found: other.kind(),
                    }),
                }
            }
            TAG_ENUM => {
                let type_name = cp.get_utf8(reader.read_u2()?)?.to_string();
                let const_name = cp.get_utf8(reader.read_u2()?)?.to_string();
                Ok(ElementValue::Enum {
                    type_name,
                    const_name,
                })
            }
            _ => Err(Error::MalformedAnnotation("unknown element value tag")),
        }
    }

    fn write(&self, pool: &mut PoolBuilder, out: &mut Writer) -> Result<()> {
        match self {
            ElementValue::Str(text) => {
                out.put_u1(TAG_STR);
                out.put_u2(pool.intern_utf8(text)?);
            }
            ElementValue::Int(value) => {
                out.put_u1(TAG_INT);
                out.put_u2(pool.intern(&Const::Int(*value))?);
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                out.put_u1(TAG_ENUM);
                out.put_u2(pool.intern_utf8(type_name)?);
                out.put_u2(pool.intern_utf8(const_name)?);
            }
        }
        Ok(())
    }
}

/// Finds an annotation by type name. A query of `Inject` also matches a
/// qualified type name such as `graft.Inject`.
pub(crate) fn annotation_named<'a>(
    annotations: &'a [Annotation],
    name: &str,
) -> Option<&'a Annotation> {
    annotations.iter().find(|annotation| {
        annotation.type_name == name
            || annotation
                .type_name
                .rsplit('.')
                .next()
                .is_some_and(|simple| simple == name)
    })
}
