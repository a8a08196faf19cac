use crate::error::{Error, Result};

/// One parameter or return type in a method descriptor.
///
/// The grammar is `( param* ) ret` over `I` int, `S` string, `Z` bool,
/// `F` float, `L<name>;` object reference and `[` array-of; `V` is valid in
/// return position only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Int,
    Str,
    Bool,
    Float,
    Object(String),
    Array(Box<TypeDesc>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<TypeDesc>,
    pub ret: Option<TypeDesc>,
}

impl MethodDescriptor {
    pub fn parse(desc: &str) -> Result<Self> {
        let bytes = desc.as_bytes();
        let mut pos = 0usize;
        if bytes.first() != Some(&b'(') {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        pos += 1;

        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => params.push(parse_type(desc, &mut pos)?),
                None => return Err(Error::InvalidDescriptor(desc.to_string())),
            }
        }

        let ret = if bytes.get(pos) == Some(&b'V') {
            pos += 1;
            None
        } else {
            Some(parse_type(desc, &mut pos)?)
        };

        if pos != bytes.len() {
            return Err(Error::InvalidDescriptor(desc.to_string()));
        }
        Ok(Self { params, ret })
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns_value(&self) -> bool {
        self.ret.is_some()
    }
}

fn parse_type(desc: &str, pos: &mut usize) -> Result<TypeDesc> {
    let bytes = desc.as_bytes();
    let tag = *bytes
        .get(*pos)
        .ok_or_else(|| Error::InvalidDescriptor(desc.to_string()))?;
    *pos += 1;
    match tag {
        b'I' => Ok(TypeDesc::Int),
        b'S' => Ok(TypeDesc::Str),
        b'Z' => Ok(TypeDesc::Bool),
        b'F' => Ok(TypeDesc::Float),
        b'L' => {
            let rest = &desc[*pos..];
            let end = rest
                .find(';')
                .ok_or_else(|| Error::InvalidDescriptor(desc.to_string()))?;
            let name = rest[..end].to_string();
            if name.is_empty() {
                return Err(Error::InvalidDescriptor(desc.to_string()));
            }
            *pos += end + 1;
            Ok(TypeDesc::Object(name))
        }
        b'[' => {
            let element = parse_type(desc, pos)?;
            Ok(TypeDesc::Array(Box::new(element)))
        }
        _ => Err(Error::InvalidDescriptor(desc.to_string())),
    }
}
