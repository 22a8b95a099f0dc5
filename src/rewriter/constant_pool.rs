//! Constant pool model, lookups and interning
//!
//! Entries keep their on-disk form (UTF-8 payloads stay raw modified
//! UTF-8), so an untouched pool re-encodes byte for byte. New entries are
//! only ever appended; existing indices never move.

use crate::error::ClassFileError;
use bytes::Bytes;

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELDREF: u8 = 9;
pub const TAG_METHODREF: u8 = 10;
pub const TAG_INTERFACE_METHODREF: u8 = 11;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_DYNAMIC: u8 = 17;
pub const TAG_INVOKE_DYNAMIC: u8 = 18;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

/// Largest legal `constant_pool_count`
const MAX_POOL_COUNT: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Utf8(Bytes),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name_index: u16 },
    String { string_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
    /// Slot 0, and the slot after every Long or Double
    Unusable,
}

impl Constant {
    pub fn tag(&self) -> Option<u8> {
        let tag = match self {
            Constant::Utf8(_) => TAG_UTF8,
            Constant::Integer(_) => TAG_INTEGER,
            Constant::Float(_) => TAG_FLOAT,
            Constant::Long(_) => TAG_LONG,
            Constant::Double(_) => TAG_DOUBLE,
            Constant::Class { .. } => TAG_CLASS,
            Constant::String { .. } => TAG_STRING,
            Constant::Fieldref { .. } => TAG_FIELDREF,
            Constant::Methodref { .. } => TAG_METHODREF,
            Constant::InterfaceMethodref { .. } => TAG_INTERFACE_METHODREF,
            Constant::NameAndType { .. } => TAG_NAME_AND_TYPE,
            Constant::MethodHandle { .. } => TAG_METHOD_HANDLE,
            Constant::MethodType { .. } => TAG_METHOD_TYPE,
            Constant::Dynamic { .. } => TAG_DYNAMIC,
            Constant::InvokeDynamic { .. } => TAG_INVOKE_DYNAMIC,
            Constant::Module { .. } => TAG_MODULE,
            Constant::Package { .. } => TAG_PACKAGE,
            Constant::Unusable => return None,
        };
        Some(tag)
    }

    /// Long and Double take two slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A resolved `CONSTANT_Methodref`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef<'a> {
    pub owner: &'a [u8],
    pub name: &'a [u8],
    pub descriptor: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Empty pool (count 1, slot 0 reserved)
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// The `constant_pool_count` as written in the class file
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Entries from index 1, including the unusable wide-constant slots
    pub fn entries(&self) -> impl Iterator<Item = (u16, &Constant)> {
        // The pool never holds more than u16::MAX entries
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, constant)| (index as u16, constant))
    }

    /// Append an entry exactly as parsed, reserving the second slot of
    /// wide constants
    pub(crate) fn push_raw(&mut self, constant: Constant) -> Result<u16, ClassFileError> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.entries.len() + slots > MAX_POOL_COUNT {
            return Err(ClassFileError::ConstantPoolOverflow);
        }

        let index = self.entries.len() as u16;
        let wide = constant.is_wide();
        self.entries.push(constant);
        if wide {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Unusable) | None => Err(ClassFileError::BadConstantIndex(index)),
            Some(constant) => Ok(constant),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&[u8], ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(bytes) => Ok(bytes.as_ref()),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    /// Internal name of a `CONSTANT_Class`
    pub fn class_name(&self, index: u16) -> Result<&[u8], ClassFileError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&[u8], &[u8]), ClassFileError> {
        match self.get(index)? {
            Constant::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    /// Resolve a `CONSTANT_Methodref`
    ///
    /// `Ok(None)` for any other kind of entry (an interface method, say),
    /// which is not an error: the caller just has nothing to match.
    pub fn method_ref(&self, index: u16) -> Result<Option<MethodRef<'_>>, ClassFileError> {
        match self.get(index)? {
            Constant::Methodref {
                class_index,
                name_and_type_index,
            } => {
                let owner = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(Some(MethodRef {
                    owner,
                    name,
                    descriptor,
                }))
            }
            _ => Ok(None),
        }
    }

    fn find(&self, wanted: &Constant) -> Option<u16> {
        self.entries()
            .find(|(_, constant)| *constant == wanted)
            .map(|(index, _)| index)
    }

    fn intern(&mut self, constant: Constant) -> Result<u16, ClassFileError> {
        match self.find(&constant) {
            Some(index) => Ok(index),
            None => self.push_raw(constant),
        }
    }

    pub fn intern_utf8(&mut self, value: &str) -> Result<u16, ClassFileError> {
        self.intern(Constant::Utf8(Bytes::copy_from_slice(value.as_bytes())))
    }

    pub fn intern_class(&mut self, internal_name: &str) -> Result<u16, ClassFileError> {
        let name_index = self.intern_utf8(internal_name)?;
        self.intern(Constant::Class { name_index })
    }

    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let name_index = self.intern_utf8(name)?;
        let descriptor_index = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType {
            name_index,
            descriptor_index,
        })
    }

    /// Index of a `CONSTANT_Methodref` for `owner.name:descriptor`,
    /// reusing existing entries at every level
    pub fn intern_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16, ClassFileError> {
        let class_index = self.intern_class(owner)?;
        let name_and_type_index = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref {
            class_index,
            name_and_type_index,
        })
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}
