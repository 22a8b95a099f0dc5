//! Class-file model, parser and encoder
//!
//! Only what the rewriter touches is modeled in detail: the constant pool
//! and method `Code` attributes. Every other attribute is carried as raw
//! bytes, and the encoder recomputes all counts and lengths, so parsing
//! and re-encoding an untouched class gives back the same bytes.

use super::constant_pool::*;
use crate::error::ClassFileError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

pub const MAGIC: u32 = 0xCAFE_BABE;

const CODE_ATTRIBUTE: &[u8] = b"Code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

/// A field or a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub body: AttributeBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeBody {
    Code(CodeAttribute),
    Raw(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl Member {
    /// The member's `Code` attribute, if it has one
    pub fn code(&self) -> Option<&CodeAttribute> {
        self.attributes.iter().find_map(|a| match &a.body {
            AttributeBody::Code(code) => Some(code),
            AttributeBody::Raw(_) => None,
        })
    }

    pub fn code_mut(&mut self) -> Option<&mut CodeAttribute> {
        self.attributes.iter_mut().find_map(|a| match &mut a.body {
            AttributeBody::Code(code) => Some(code),
            AttributeBody::Raw(_) => None,
        })
    }
}

impl ClassFile {
    /// Internal name of this class (`a/b/C`)
    pub fn name(&self) -> Result<String, ClassFileError> {
        let raw = self.constant_pool.class_name(self.this_class)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Parse a complete class body; trailing bytes are an error
    pub fn parse(data: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = Reader::new(data);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }

        let minor_version = r.u16()?;
        let major_version = r.u16()?;
        let constant_pool = parse_constant_pool(&mut r)?;
        let access_flags = r.u16()?;
        let this_class = r.u16()?;
        let super_class = r.u16()?;

        let interface_count = r.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| r.u16())
            .collect::<Result<Vec<_>, _>>()?;

        let fields = parse_members(&mut r, &constant_pool)?;
        let methods = parse_members(&mut r, &constant_pool)?;
        let attributes = parse_attributes(&mut r, &constant_pool, false)?;

        if r.remaining() > 0 {
            return Err(ClassFileError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Encode back to class-file bytes
    pub fn encode(&self) -> Result<Vec<u8>, ClassFileError> {
        let mut out = BytesMut::with_capacity(1024);
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);

        encode_constant_pool(&mut out, &self.constant_pool)?;

        out.put_u16(self.access_flags);
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);

        out.put_u16(count_u16(self.interfaces.len(), "interfaces")?);
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }

        encode_members(&mut out, &self.fields)?;
        encode_members(&mut out, &self.methods)?;
        encode_attributes(&mut out, &self.attributes)?;

        Ok(out.to_vec())
    }
}

/// Bounds-checked cursor over the input
struct Reader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, len: buf.len() }
    }

    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, wanted: usize) -> Result<(), ClassFileError> {
        if self.buf.remaining() < wanted {
            return Err(ClassFileError::UnexpectedEof {
                offset: self.offset(),
                wanted,
            });
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, ClassFileError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        self.need(2)?;
        Ok(self.buf.get_u16())
    }

    fn u32(&mut self) -> Result<u32, ClassFileError> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn u64(&mut self) -> Result<u64, ClassFileError> {
        self.need(8)?;
        Ok(self.buf.get_u64())
    }

    fn bytes(&mut self, n: usize) -> Result<Bytes, ClassFileError> {
        self.need(n)?;
        Ok(self.buf.copy_to_bytes(n))
    }

    /// Split off the next `n` bytes as their own reader
    fn sub(&mut self, n: usize) -> Result<Reader<'a>, ClassFileError> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(Reader::new(head))
    }
}

fn parse_constant_pool(r: &mut Reader<'_>) -> Result<ConstantPool, ClassFileError> {
    let count = r.u16()?;
    let mut pool = ConstantPool::new();

    while pool.count() < usize::from(count) {
        let index = pool.count() as u16;
        let tag = r.u8()?;
        let constant = match tag {
            TAG_UTF8 => {
                let len = r.u16()?;
                Constant::Utf8(r.bytes(usize::from(len))?)
            }
            TAG_INTEGER => Constant::Integer(r.u32()?),
            TAG_FLOAT => Constant::Float(r.u32()?),
            TAG_LONG => Constant::Long(r.u64()?),
            TAG_DOUBLE => Constant::Double(r.u64()?),
            TAG_CLASS => Constant::Class { name_index: r.u16()? },
            TAG_STRING => Constant::String { string_index: r.u16()? },
            TAG_FIELDREF => Constant::Fieldref {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            TAG_METHODREF => Constant::Methodref {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            TAG_INTERFACE_METHODREF => Constant::InterfaceMethodref {
                class_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            TAG_NAME_AND_TYPE => Constant::NameAndType {
                name_index: r.u16()?,
                descriptor_index: r.u16()?,
            },
            TAG_METHOD_HANDLE => Constant::MethodHandle {
                reference_kind: r.u8()?,
                reference_index: r.u16()?,
            },
            TAG_METHOD_TYPE => Constant::MethodType {
                descriptor_index: r.u16()?,
            },
            TAG_DYNAMIC => Constant::Dynamic {
                bootstrap_method_attr_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap_method_attr_index: r.u16()?,
                name_and_type_index: r.u16()?,
            },
            TAG_MODULE => Constant::Module { name_index: r.u16()? },
            TAG_PACKAGE => Constant::Package { name_index: r.u16()? },
            tag => return Err(ClassFileError::UnknownConstantTag { tag, index }),
        };

        // A wide constant in the last slot claims a slot past the count
        if constant.is_wide() && pool.count() + 2 > usize::from(count) {
            return Err(ClassFileError::BadConstantIndex(index));
        }
        pool.push_raw(constant)?;
    }

    Ok(pool)
}

fn parse_members(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<Vec<Member>, ClassFileError> {
    let count = r.u16()?;
    let mut members = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        members.push(Member {
            access_flags: r.u16()?,
            name_index: r.u16()?,
            descriptor_index: r.u16()?,
            attributes: parse_attributes(r, pool, true)?,
        });
    }
    Ok(members)
}

/// `code_allowed` is false where a `Code` attribute has no meaning (class
/// level, nested inside `Code`); there it is kept raw
fn parse_attributes(
    r: &mut Reader<'_>,
    pool: &ConstantPool,
    code_allowed: bool,
) -> Result<Vec<Attribute>, ClassFileError> {
    let count = r.u16()?;
    let mut attributes = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let name_index = r.u16()?;
        let len = r.u32()? as usize;
        let mut body = r.sub(len)?;

        let is_code = code_allowed && pool.utf8(name_index)? == CODE_ATTRIBUTE;
        let body = if is_code {
            let code = parse_code(&mut body, pool)?;
            if body.remaining() > 0 {
                return Err(ClassFileError::TrailingBytes(body.remaining()));
            }
            AttributeBody::Code(code)
        } else {
            AttributeBody::Raw(body.bytes(len)?)
        };

        attributes.push(Attribute { name_index, body });
    }

    Ok(attributes)
}

fn parse_code(r: &mut Reader<'_>, pool: &ConstantPool) -> Result<CodeAttribute, ClassFileError> {
    let max_stack = r.u16()?;
    let max_locals = r.u16()?;
    let code_len = r.u32()? as usize;
    let code = r.bytes(code_len)?.to_vec();

    let handler_count = r.u16()?;
    let mut exception_table = Vec::with_capacity(usize::from(handler_count));
    for _ in 0..handler_count {
        exception_table.push(ExceptionHandler {
            start_pc: r.u16()?,
            end_pc: r.u16()?,
            handler_pc: r.u16()?,
            catch_type: r.u16()?,
        });
    }

    let attributes = parse_attributes(r, pool, false)?;

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
    })
}

fn count_u16(len: usize, what: &'static str) -> Result<u16, ClassFileError> {
    u16::try_from(len).map_err(|_| ClassFileError::TooLarge { what, len })
}

fn len_u32(len: usize, what: &'static str) -> Result<u32, ClassFileError> {
    u32::try_from(len).map_err(|_| ClassFileError::TooLarge { what, len })
}

fn encode_constant_pool(out: &mut BytesMut, pool: &ConstantPool) -> Result<(), ClassFileError> {
    out.put_u16(count_u16(pool.count(), "constant pool")?);

    for (_, constant) in pool.entries() {
        let Some(tag) = constant.tag() else {
            // Second slot of a wide constant: nothing on disk
            continue;
        };
        out.put_u8(tag);

        match constant {
            Constant::Utf8(bytes) => {
                out.put_u16(count_u16(bytes.len(), "utf8 constant")?);
                out.put_slice(bytes);
            }
            Constant::Integer(v) | Constant::Float(v) => out.put_u32(*v),
            Constant::Long(v) | Constant::Double(v) => out.put_u64(*v),
            Constant::Class { name_index }
            | Constant::Module { name_index }
            | Constant::Package { name_index } => out.put_u16(*name_index),
            Constant::String { string_index } => out.put_u16(*string_index),
            Constant::MethodType { descriptor_index } => out.put_u16(*descriptor_index),
            Constant::Fieldref {
                class_index,
                name_and_type_index,
            }
            | Constant::Methodref {
                class_index,
                name_and_type_index,
            }
            | Constant::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                out.put_u16(*class_index);
                out.put_u16(*name_and_type_index);
            }
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => {
                out.put_u16(*name_index);
                out.put_u16(*descriptor_index);
            }
            Constant::MethodHandle {
                reference_kind,
                reference_index,
            } => {
                out.put_u8(*reference_kind);
                out.put_u16(*reference_index);
            }
            Constant::Dynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
            | Constant::InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                out.put_u16(*bootstrap_method_attr_index);
                out.put_u16(*name_and_type_index);
            }
            Constant::Unusable => {}
        }
    }

    Ok(())
}

fn encode_members(out: &mut BytesMut, members: &[Member]) -> Result<(), ClassFileError> {
    out.put_u16(count_u16(members.len(), "members")?);
    for member in members {
        out.put_u16(member.access_flags);
        out.put_u16(member.name_index);
        out.put_u16(member.descriptor_index);
        encode_attributes(out, &member.attributes)?;
    }
    Ok(())
}

fn encode_attributes(out: &mut BytesMut, attributes: &[Attribute]) -> Result<(), ClassFileError> {
    out.put_u16(count_u16(attributes.len(), "attributes")?);
    for attribute in attributes {
        out.put_u16(attribute.name_index);
        match &attribute.body {
            AttributeBody::Raw(bytes) => {
                out.put_u32(len_u32(bytes.len(), "attribute")?);
                out.put_slice(bytes);
            }
            AttributeBody::Code(code) => {
                let mut body = BytesMut::with_capacity(code.code.len() + 32);
                encode_code(&mut body, code)?;
                out.put_u32(len_u32(body.len(), "Code attribute")?);
                out.put_slice(&body);
            }
        }
    }
    Ok(())
}

fn encode_code(out: &mut BytesMut, code: &CodeAttribute) -> Result<(), ClassFileError> {
    out.put_u16(code.max_stack);
    out.put_u16(code.max_locals);
    out.put_u32(len_u32(code.code.len(), "code array")?);
    out.put_slice(&code.code);

    out.put_u16(count_u16(code.exception_table.len(), "exception table")?);
    for handler in &code.exception_table {
        out.put_u16(handler.start_pc);
        out.put_u16(handler.end_pc);
        out.put_u16(handler.handler_pc);
        out.put_u16(handler.catch_type);
    }

    encode_attributes(out, &code.attributes)
}
