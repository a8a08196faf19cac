use crate::classfile::{ClassFile, ACC_STATIC, FORMAT_VERSION, MAGIC};
use crate::code::verify_method;
use crate::constant_pool::PoolBuilder;
use crate::descriptor::MethodDescriptor;
use crate::error::{Error, Result};

pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn put_u1(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u2(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u4(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn section_len(len: usize, section: &'static str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::SectionOverflow(section))
}

impl ClassFile {
    /// Serializes the class back into its binary image. Every method body is
    /// verified first; a body that does not verify fails the whole encode,
    /// since the resulting image would be unusable.
    pub fn encode(&self) -> Result<Vec<u8>> {
        for method in &self.methods {
            let desc = MethodDescriptor::parse(&method.descriptor)?;
            verify_method(&desc, method.access_flags & ACC_STATIC != 0, &method.code).map_err(
                |error| Error::Verify {
                    method: format!("{}.{}", self.name, method.name),
                    error,
                },
            )?;
        }

        let mut pool = PoolBuilder::new();
        let mut body = Writer::new();

        body.put_u2(self.access_flags);
        body.put_u2(pool.intern_utf8(&self.name)?);
        body.put_u2(match &self.super_class {
            Some(super_class) => pool.intern_utf8(super_class)?,
            None => 0,
        });

        body.put_u2(section_len(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            body.put_u2(pool.intern_utf8(interface)?);
        }

        body.put_u2(section_len(self.annotations.len(), "annotations")?);
        for annotation in &self.annotations {
            annotation.write(&mut pool, &mut body)?;
        }

        body.put_u2(section_len(self.methods.len(), "methods")?);
        for method in &self.methods {
            body.put_u2(method.access_flags);
            body.put_u2(pool.intern_utf8(&method.name)?);
            body.put_u2(pool.intern_utf8(&method.descriptor)?);
            body.put_u2(pool.intern_utf8(&method.declared_in)?);

            body.put_u2(section_len(method.annotations.len(), "annotations")?);
            for annotation in &method.annotations {
                annotation.write(&mut pool, &mut body)?;
            }

            let code_len =
                u32::try_from(method.code.len()).map_err(|_| Error::SectionOverflow("code"))?;
            body.put_u4(code_len);
            for inst in &method.code {
                inst.write(&mut pool, &mut body)?;
            }
        }

        let mut out = Writer::new();
        out.put_u4(MAGIC);
        out.put_u2(FORMAT_VERSION);
        pool.write(&mut out)?;
        out.put_bytes(&body.into_bytes());
        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::{Annotation, ElementValue};
    use crate::classfile::{ClassFile, MethodInfo, ACC_STATIC};
    use crate::code::{Instruction, VerifyError};
    use crate::constant_pool::Const;
    use crate::error::Error;

    fn sample_class() -> ClassFile {
        ClassFile {
            access_flags: 0,
            name: "game.Player".into(),
            super_class: Some("game.Entity".into()),
            interfaces: vec!["game.Tickable".into()],
            annotations: vec![Annotation::new("Mixin")
                .with_element("value", ElementValue::Str("game.Player".into()))],
            methods: vec![
                MethodInfo {
                    access_flags: 0,
                    name: "tick".into(),
                    descriptor: "()V".into(),
                    declared_in: "game.Player".into(),
                    annotations: vec![Annotation::new("Inject")
                        .with_element("method", ElementValue::Str("update".into()))
                        .with_element(
                            "at",
                            ElementValue::Enum {
                                type_name: "At".into(),
                                const_name: "HEAD".into(),
                            },
                        )],
                    code: vec![
                        Instruction::LoadThis,
                        Instruction::Const(Const::Int(5)),
                        Instruction::PutField {
                            owner: "game.Player".into(),
                            name: "health".into(),
                        },
                        Instruction::Return,
                    ],
                },
                MethodInfo {
                    access_flags: ACC_STATIC,
                    name: "max".into(),
                    descriptor: "()I".into(),
                    declared_in: "game.Player".into(),
                    annotations: vec![],
                    code: vec![
                        Instruction::Const(Const::Int(100)),
                        Instruction::ReturnValue,
                    ],
                },
            ],
        }
    }

    #[test]
    fn encode_parse_round_trip() {
        let class = sample_class();
        let bytes = class.encode().unwrap();
        let reparsed = ClassFile::parse(&bytes).unwrap();
        assert_eq!(reparsed, class);
    }

    #[test]
    fn encode_is_deterministic() {
        let class = sample_class();
        assert_eq!(class.encode().unwrap(), class.encode().unwrap());
    }

    #[test]
    fn encode_rejects_unverifiable_body() {
        let mut class = sample_class();
        class.methods[0].code = vec![Instruction::Pop, Instruction::Return];
        match class.encode() {
            Err(Error::Verify { method, error }) => {
                assert_eq!(method, "game.Player.tick");
                assert_eq!(error, VerifyError::StackUnderflow { at: 0 });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn encode_rejects_bad_descriptor() {
        let mut class = sample_class();
        class.methods[0].descriptor = "broken".into();
        assert!(matches!(
            class.encode(),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn truncated_image_is_rejected() {
        let bytes = sample_class().encode().unwrap();
        assert!(ClassFile::parse(&bytes[..bytes.len() - 3]).is_err());
    }
}
