use crate::error::{Error, Result};
use crate::reader::Reader;
use crate::writer::Writer;
use std::collections::HashMap;

const TAG_UTF8: u8 = 0x01;
const TAG_INT: u8 = 0x02;

/// A pooled constant. Index 0 is reserved for "absent" references and never
/// holds an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Const {
    Utf8(String),
    Int(i64),
}

impl Const {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Const::Utf8(_) => "Utf8",
            Const::Int(_) => "Int",
        }
    }
}

pub(crate) struct ConstantPool {
    entries: Vec<Const>,
}

impl ConstantPool {
    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = reader.read_u2()? as usize;
                    let bytes = reader.read_bytes(len)?;
                    let text = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
                    Const::Utf8(text.to_string())
                }
                TAG_INT => Const::Int(reader.read_i64()?),
                other => return Err(Error::InvalidPoolTag(other)),
            };
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Const> {
        if index == 0 {
            return Err(Error::InvalidPoolIndex(0));
        }
        self.entries
            .get(index as usize - 1)
            .ok_or(Error::InvalidPoolIndex(index))
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Const::Utf8(text) => Ok(text),
            other => Err(Error::PoolTypeMismatch {
                index,
                expected: "Utf8",
                found: other.kind(),
            }),
        }
    }

    /// Like [`get_utf8`](Self::get_utf8) but treats index 0 as "absent".
    pub fn get_utf8_opt(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            return Ok(None);
        }
        self.get_utf8(index).map(Some)
    }

    pub fn get_const(&self, index: u16) -> Result<Const> {
        self.get(index).cloned()
    }
}

/// Write-side pool: interns constants while the class body is serialized,
/// then lands in front of it.
#[derive(Default)]
pub(crate) struct PoolBuilder {
    entries: Vec<Const>,
    lookup: HashMap<Const, u16>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, value: &Const) -> Result<u16> {
        if let Some(&index) = self.lookup.get(value) {
            return Ok(index);
        }
        if self.entries.len() == u16::MAX as usize {
            return Err(Error::PoolOverflow);
        }
        self.entries.push(value.clone());
        let index = self.entries.len() as u16;
        self.lookup.insert(value.clone(), index);
        Ok(index)
    }

    pub fn intern_utf8(&mut self, text: &str) -> Result<u16> {
        self.intern(&Const::Utf8(text.to_string()))
    }

    pub fn write(&self, out: &mut Writer) -> Result<()> {
        out.put_u2(self.entries.len() as u16);
        for entry in &self.entries {
            match entry {
                Const::Utf8(text) => {
                    if text.len() > u16::MAX as usize {
                        return Err(Error::SectionOverflow("utf8 constant"));
                    }
                    out.put_u1(TAG_UTF8);
                    out.put_u2(text.len() as u16);
                    out.put_bytes(text.as_bytes());
                }
                Const::Int(value) => {
                    out.put_u1(TAG_INT);
                    out.put_i64(*value);
                }
            }
        }
        Ok(())
    }
}
