use crate::annotation::{annotation_named, Annotation};
use crate::code::Instruction;
use crate::constant_pool::ConstantPool;
use crate::error::{Error, Result};
use crate::reader::Reader;

pub const MAGIC: u32 = 0x6772_6674; // "grft"
pub const FORMAT_VERSION: u16 = 1;

pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SYNTHETIC: u16 = 0x1000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassFile {
    pub access_flags: u16,
    pub name: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub methods: Vec<MethodInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    /// Class that originally declared this method. Differs from the owning
    /// class for methods a subclass inherited rather than declared.
    pub declared_in: String,
    pub annotations: Vec<Annotation>,
    pub code: Vec<Instruction>,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        let version = reader.read_u2()?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let name = cp.get_utf8(reader.read_u2()?)?.to_string();
        let super_class = cp.get_utf8_opt(reader.read_u2()?)?.map(str::to_string);

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(cp.get_utf8(reader.read_u2()?)?.to_string());
        }

        let annotations_count = reader.read_u2()? as usize;
        let mut annotations = Vec::with_capacity(annotations_count);
        for _ in 0..annotations_count {
            annotations.push(Annotation::parse(&mut reader, &cp)?);
        }

        let methods_count = reader.read_u2()? as usize;
        let mut methods = Vec::with_capacity(methods_count);
        for _ in 0..methods_count {
            methods.push(parse_method(&mut reader, &cp)?);
        }

        reader.ensure_empty()?;

        Ok(Self {
            access_flags,
            name,
            super_class,
            interfaces,
            annotations,
            methods,
        })
    }

    /// First method with the given name. Matching is by name only; overloads
    /// that share a name are shadowed by the first entry.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut MethodInfo> {
        self.methods.iter_mut().find(|method| method.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    /// Adds an interface unless the class already implements it.
    pub fn add_interface(&mut self, name: &str) {
        if !self.interfaces.iter().any(|existing| existing == name) {
            self.interfaces.push(name.to_string());
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        annotation_named(&self.annotations, name)
    }
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags & ACC_SYNTHETIC != 0
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        annotation_named(&self.annotations, name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }
}

fn parse_method(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<MethodInfo> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    let declared_in = cp.get_utf8(reader.read_u2()?)?.to_string();

    let annotations_count = reader.read_u2()? as usize;
    let mut annotations = Vec::with_capacity(annotations_count);
    for _ in 0..annotations_count {
        annotations.push(Annotation::parse(reader, cp)?);
    }

    let code_len = reader.read_u4()? as usize;
    let mut code = Vec::with_capacity(code_len);
    for _ in 0..code_len {
        code.push(Instruction::parse(reader, cp)?);
    }

    Ok(MethodInfo {
        access_flags,
        name,
        descriptor,
        declared_in,
        annotations,
        code,
    })
}
