//! Lightweight implementation of a parser and decoder for JVM bytecode
//! class files.
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::rc::Rc;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Result, RuntimeError};

const MAGIC: u32 = 0xcafe_babe;

/// Constant pool entries, tagged as in the class file format.
#[derive(Debug, Clone, PartialEq)]
pub enum CPInfo {
    ConstantUtf8 {
        bytes: String,
    },
    ConstantInteger {
        bytes: i32,
    },
    ConstantFloat {
        bytes: f32,
    },
    ConstantLong {
        bytes: i64,
    },
    ConstantDouble {
        bytes: f64,
    },
    ConstantClass {
        name_index: u16,
    },
    ConstantString {
        string_index: u16,
    },
    ConstantFieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantInterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantNameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    ConstantMethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    ConstantMethodType {
        descriptor_index: u16,
    },
    ConstantDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    ConstantInvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    ConstantModule {
        name_index: u16,
    },
    ConstantPackage {
        name_index: u16,
    },
    /// Second slot taken by a long or double constant.
    Unusable,
}

/// A class's constant pool. Indexing is 1-based as in the class file, index
/// 0 is never valid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<CPInfo>,
}

impl ConstantPool {
    pub fn new(entries: Vec<CPInfo>) -> Self {
        Self { entries }
    }

    /// Returns the entry at `index`, or `None` for 0 and indices past the
    /// end.
    pub fn get(&self, index: u16) -> Option<&CPInfo> {
        let slot = usize::from(index).checked_sub(1)?;
        self.entries.get(slot)
    }

    /// Number of slots in the pool, `constant_pool_count - 1`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the string stored in a `CONSTANT_Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(CPInfo::ConstantUtf8 { bytes }) => Ok(bytes),
            _ => Err(RuntimeError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Returns the name of the class referenced by a `CONSTANT_Class` entry.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index) {
            Some(CPInfo::ConstantClass { name_index }) => self.utf8(*name_index),
            _ => Err(RuntimeError::BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Returns the name and descriptor of a `CONSTANT_NameAndType` entry.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index) {
            Some(CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            }) => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(RuntimeError::BadConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Returns `Class.name:descriptor` for a field, method or interface
    /// method reference.
    pub fn member_ref(&self, index: u16) -> Result<String> {
        match self.get(index) {
            Some(CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            })
            | Some(CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            })
            | Some(CPInfo::ConstantInterfaceMethodRef {
                class_index,
                name_and_type_index,
            }) => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(format!(
                    "{}.{}:{}",
                    self.class_name(*class_index)?,
                    name,
                    descriptor
                ))
            }
            _ => Err(RuntimeError::BadConstant {
                index,
                expected: "member reference",
            }),
        }
    }

    /// Renders the entry at `index` as a string. Classes and strings yield
    /// their text, member references yield `Class.name:descriptor`.
    ///
    /// Each kind resolves only the entry kinds it may point at, so a
    /// malformed pool that references itself fails instead of looping.
    pub fn format_entry(&self, index: u16) -> Result<String> {
        let entry = self.get(index).ok_or(RuntimeError::BadConstant {
            index,
            expected: "constant",
        })?;
        let formatted = match entry {
            CPInfo::ConstantUtf8 { bytes } => bytes.clone(),
            CPInfo::ConstantInteger { bytes } => bytes.to_string(),
            CPInfo::ConstantFloat { bytes } => bytes.to_string(),
            CPInfo::ConstantLong { bytes } => bytes.to_string(),
            CPInfo::ConstantDouble { bytes } => bytes.to_string(),
            CPInfo::ConstantClass { name_index }
            | CPInfo::ConstantModule { name_index }
            | CPInfo::ConstantPackage { name_index } => self.utf8(*name_index)?.to_string(),
            CPInfo::ConstantString { string_index } => self.utf8(*string_index)?.to_string(),
            CPInfo::ConstantMethodType { descriptor_index } => {
                self.utf8(*descriptor_index)?.to_string()
            }
            CPInfo::ConstantNameAndType { .. } => {
                let (name, descriptor) = self.name_and_type(index)?;
                format!("{name}:{descriptor}")
            }
            CPInfo::ConstantFieldRef { .. }
            | CPInfo::ConstantMethodRef { .. }
            | CPInfo::ConstantInterfaceMethodRef { .. } => self.member_ref(index)?,
            CPInfo::ConstantMethodHandle {
                reference_kind,
                reference_index,
            } => format!("{}:{}", reference_kind, self.member_ref(*reference_index)?),
            CPInfo::ConstantDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            }
            | CPInfo::ConstantInvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => {
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                format!("#{bootstrap_method_attr_index}:{name}:{descriptor}")
            }
            CPInfo::Unusable => {
                return Err(RuntimeError::BadConstant {
                    index,
                    expected: "constant",
                })
            }
        };
        Ok(formatted)
    }
}

/// Entry of a `Code` attribute's exception table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Body of a method's `Code` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn code_length(&self) -> u32 {
        // `code_length` is a u4 in the class file so this never truncates.
        self.code.len() as u32
    }
}

/// Body of a method's `Exceptions` attribute: the checked exceptions it
/// declares, as `CONSTANT_Class` indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionsAttribute {
    pub exception_index_table: Vec<u16>,
}

/// Decoded attribute bodies. Attributes the runtime has no use for are kept
/// as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Code(Rc<CodeAttribute>),
    Exceptions(Rc<ExceptionsAttribute>),
    ConstantValue { constant_value_index: u16 },
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub attribute_name_index: u16,
    pub info: Attribute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

/// A parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct JVMClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

/// Reads a class file from disk.
pub fn read_class_file(path: &Path) -> Result<Vec<u8>> {
    Ok(fs::read(path)?)
}

/// Class file parser, consumes a byte slice in big-endian order.
pub struct JVMParser<'a> {
    reader: Cursor<&'a [u8]>,
}

impl<'a> JVMParser<'a> {
    /// Parse a complete class file.
    pub fn parse(bytes: &'a [u8]) -> Result<JVMClassFile> {
        let mut parser = JVMParser {
            reader: Cursor::new(bytes),
        };
        let class_file = parser.class_file()?;
        if parser.reader.position() != bytes.len() as u64 {
            return Err(RuntimeError::class_format("trailing bytes after class file"));
        }
        Ok(class_file)
    }

    fn class_file(&mut self) -> Result<JVMClassFile> {
        let magic = self.u4()?;
        if magic != MAGIC {
            return Err(RuntimeError::class_format(format!(
                "bad magic 0x{magic:08x}"
            )));
        }
        let minor_version = self.u2()?;
        let major_version = self.u2()?;
        let constant_pool = self.constant_pool()?;
        let access_flags = self.u2()?;
        let this_class = self.u2()?;
        let super_class = self.u2()?;
        let interfaces_count = self.u2()?;
        let interfaces = (0..interfaces_count)
            .map(|_| self.u2())
            .collect::<Result<Vec<_>>>()?;

        let fields_count = self.u2()?;
        let mut fields = Vec::with_capacity(fields_count.into());
        for _ in 0..fields_count {
            fields.push(FieldInfo {
                access_flags: self.u2()?,
                name_index: self.u2()?,
                descriptor_index: self.u2()?,
                attributes: self.attributes(&constant_pool)?,
            });
        }

        let methods_count = self.u2()?;
        let mut methods = Vec::with_capacity(methods_count.into());
        for _ in 0..methods_count {
            methods.push(MethodInfo {
                access_flags: self.u2()?,
                name_index: self.u2()?,
                descriptor_index: self.u2()?,
                attributes: self.attributes(&constant_pool)?,
            });
        }

        let attributes = self.attributes(&constant_pool)?;
        Ok(JVMClassFile {
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

    fn constant_pool(&mut self) -> Result<ConstantPool> {
        let count = self.u2()?;
        let mut entries = Vec::with_capacity(usize::from(count).saturating_sub(1));
        while entries.len() + 1 < usize::from(count) {
            let tag = self.u1()?;
            let entry = match tag {
                1 => {
                    let length = self.u2()?;
                    let bytes = self.bytes(length.into())?;
                    CPInfo::ConstantUtf8 {
                        bytes: decode_modified_utf8(&bytes)?,
                    }
                }
                3 => CPInfo::ConstantInteger {
                    bytes: self.read(|r| r.read_i32::<BigEndian>())?,
                },
                4 => CPInfo::ConstantFloat {
                    bytes: self.read(|r| r.read_f32::<BigEndian>())?,
                },
                5 => CPInfo::ConstantLong {
                    bytes: self.read(|r| r.read_i64::<BigEndian>())?,
                },
                6 => CPInfo::ConstantDouble {
                    bytes: self.read(|r| r.read_f64::<BigEndian>())?,
                },
                7 => CPInfo::ConstantClass {
                    name_index: self.u2()?,
                },
                8 => CPInfo::ConstantString {
                    string_index: self.u2()?,
                },
                9 => CPInfo::ConstantFieldRef {
                    class_index: self.u2()?,
                    name_and_type_index: self.u2()?,
                },
                10 => CPInfo::ConstantMethodRef {
                    class_index: self.u2()?,
                    name_and_type_index: self.u2()?,
                },
                11 => CPInfo::ConstantInterfaceMethodRef {
                    class_index: self.u2()?,
                    name_and_type_index: self.u2()?,
                },
                12 => CPInfo::ConstantNameAndType {
                    name_index: self.u2()?,
                    descriptor_index: self.u2()?,
                },
                15 => CPInfo::ConstantMethodHandle {
                    reference_kind: self.u1()?,
                    reference_index: self.u2()?,
                },
                16 => CPInfo::ConstantMethodType {
                    descriptor_index: self.u2()?,
                },
                17 => CPInfo::ConstantDynamic {
                    bootstrap_method_attr_index: self.u2()?,
                    name_and_type_index: self.u2()?,
                },
                18 => CPInfo::ConstantInvokeDynamic {
                    bootstrap_method_attr_index: self.u2()?,
                    name_and_type_index: self.u2()?,
                },
                19 => CPInfo::ConstantModule {
                    name_index: self.u2()?,
                },
                20 => CPInfo::ConstantPackage {
                    name_index: self.u2()?,
                },
                _ => {
                    return Err(RuntimeError::class_format(format!(
                        "unknown constant pool tag {tag}"
                    )))
                }
            };
            let wide = matches!(
                entry,
                CPInfo::ConstantLong { .. } | CPInfo::ConstantDouble { .. }
            );
            entries.push(entry);
            if wide {
                entries.push(CPInfo::Unusable);
            }
        }
        if entries.len() + 1 != usize::from(count).max(1) {
            return Err(RuntimeError::class_format(
                "wide constant overflows the constant pool",
            ));
        }
        Ok(ConstantPool::new(entries))
    }

    fn attributes(&mut self, pool: &ConstantPool) -> Result<Vec<AttributeInfo>> {
        let count = self.u2()?;
        let mut attributes = Vec::with_capacity(count.into());
        for _ in 0..count {
            attributes.push(self.attribute(pool)?);
        }
        Ok(attributes)
    }

    fn attribute(&mut self, pool: &ConstantPool) -> Result<AttributeInfo> {
        let attribute_name_index = self.u2()?;
        let length = self.u4()? as usize;
        let body = self.bytes(length)?;
        let info = match pool.utf8(attribute_name_index)? {
            name @ ("Code" | "Exceptions" | "ConstantValue") => {
                Self::attribute_body(name, &body, pool)?
            }
            _ => Attribute::Raw(body),
        };
        Ok(AttributeInfo {
            attribute_name_index,
            info,
        })
    }

    fn attribute_body(name: &str, body: &[u8], pool: &ConstantPool) -> Result<Attribute> {
        let mut inner = JVMParser {
            reader: Cursor::new(body),
        };
        let info = match name {
            "Code" => Attribute::Code(Rc::new(inner.code(pool)?)),
            "Exceptions" => {
                let count = inner.u2()?;
                let exception_index_table = (0..count)
                    .map(|_| inner.u2())
                    .collect::<Result<Vec<_>>>()?;
                Attribute::Exceptions(Rc::new(ExceptionsAttribute {
                    exception_index_table,
                }))
            }
            _ => Attribute::ConstantValue {
                constant_value_index: inner.u2()?,
            },
        };
        if inner.reader.position() != body.len() as u64 {
            return Err(RuntimeError::class_format(format!(
                "{name} attribute length mismatch"
            )));
        }
        Ok(info)
    }

    fn code(&mut self, pool: &ConstantPool) -> Result<CodeAttribute> {
        let max_stack = self.u2()?;
        let max_locals = self.u2()?;
        let code_length = self.u4()? as usize;
        let code = self.bytes(code_length)?;
        let exception_table_length = self.u2()?;
        let mut exception_table = Vec::with_capacity(exception_table_length.into());
        for _ in 0..exception_table_length {
            exception_table.push(ExceptionTableEntry {
                start_pc: self.u2()?,
                end_pc: self.u2()?,
                handler_pc: self.u2()?,
                catch_type: self.u2()?,
            });
        }
        let attributes = self.attributes(pool)?;
        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn read<T>(
        &mut self,
        f: impl FnOnce(&mut Cursor<&'a [u8]>) -> std::io::Result<T>,
    ) -> Result<T> {
        f(&mut self.reader).map_err(|_| RuntimeError::class_format("unexpected end of class file"))
    }

    fn u1(&mut self) -> Result<u8> {
        self.read(|r| r.read_u8())
    }

    fn u2(&mut self) -> Result<u16> {
        self.read(|r| r.read_u16::<BigEndian>())
    }

    fn u4(&mut self) -> Result<u32> {
        self.read(|r| r.read_u32::<BigEndian>())
    }

    fn bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let remaining = self.reader.get_ref().len() as u64 - self.reader.position();
        if length as u64 > remaining {
            return Err(RuntimeError::class_format(format!(
                "length {length} runs past the end of the class file"
            )));
        }
        let mut buffer = vec![0; length];
        self.read(|r| r.read_exact(&mut buffer))?;
        Ok(buffer)
    }
}

/// Decodes the modified UTF-8 used by `CONSTANT_Utf8` entries: NUL is
/// written as `C0 80` and supplementary characters as two encoded
/// surrogates. Four byte forms never appear.
fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let invalid = || RuntimeError::class_format("malformed modified UTF-8 constant");
    let mut units = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    while let Some(first) = iter.next() {
        let mut continuation = || match iter.next() {
            Some(byte) if byte & 0xc0 == 0x80 => Ok(u16::from(byte & 0x3f)),
            _ => Err(invalid()),
        };
        let unit = match first {
            0x01..=0x7f => u16::from(first),
            0xc0..=0xdf => (u16::from(first & 0x1f) << 6) | continuation()?,
            0xe0..=0xef => {
                let high = (u16::from(first & 0x0f) << 12) | (continuation()? << 6);
                high | continuation()?
            }
            _ => return Err(invalid()),
        };
        units.push(unit);
    }
    String::from_utf16(&units).map_err(|_| invalid())
}
