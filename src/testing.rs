//! Class file assembler for tests. Fixtures are emitted as real class file
//! bytes so they go through `JVMParser` like anything read from disk.
use byteorder::{BigEndian, WriteBytesExt};

use crate::class::access_flags::{ACC_PUBLIC, ACC_SUPER};
use crate::class::StaticClass;
use crate::jvm::JVMParser;

enum Entry {
    Utf8(String),
    Class(u16),
    Long(i64),
}

struct Member {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    code: Option<(u16, Vec<u8>)>,
    exceptions: Vec<u16>,
}

pub(crate) struct ClassBuilder {
    pool: Vec<Entry>,
    next_index: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    fields: Vec<Member>,
    methods: Vec<Member>,
}

impl ClassBuilder {
    pub(crate) fn new(name: &str) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            next_index: 1,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    pub(crate) fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub(crate) fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.class(name);
        self
    }

    pub(crate) fn no_super_class(mut self) -> Self {
        self.super_class = 0;
        self
    }

    pub(crate) fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        let member = self.member(access_flags, name, descriptor, None, &[]);
        self.fields.push(member);
        self
    }

    pub(crate) fn method(
        self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        max_locals: u16,
        code: &[u8],
    ) -> Self {
        self.method_throwing(access_flags, name, descriptor, max_locals, code, &[])
    }

    pub(crate) fn method_throwing(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        max_locals: u16,
        code: &[u8],
        exceptions: &[&str],
    ) -> Self {
        let code = Some((max_locals, code.to_vec()));
        let member = self.member(access_flags, name, descriptor, code, exceptions);
        self.methods.push(member);
        self
    }

    /// A method without a `Code` attribute, as for native or abstract ones.
    pub(crate) fn bodiless_method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
    ) -> Self {
        let member = self.member(access_flags, name, descriptor, None, &[]);
        self.methods.push(member);
        self
    }

    pub(crate) fn long_constant(mut self, value: i64) -> Self {
        self.push(Entry::Long(value));
        self
    }

    pub(crate) fn build(mut self) -> Vec<u8> {
        let code_name = self.utf8("Code");
        let exceptions_name = self.utf8("Exceptions");

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xcafe_babe).unwrap();
        out.write_u16::<BigEndian>(0).unwrap();
        out.write_u16::<BigEndian>(52).unwrap();
        out.write_u16::<BigEndian>(self.next_index).unwrap();
        for entry in &self.pool {
            match entry {
                Entry::Utf8(s) => {
                    let bytes = encode_modified_utf8(s);
                    out.write_u8(1).unwrap();
                    out.write_u16::<BigEndian>(bytes.len() as u16).unwrap();
                    out.extend_from_slice(&bytes);
                }
                Entry::Class(name_index) => {
                    out.write_u8(7).unwrap();
                    out.write_u16::<BigEndian>(*name_index).unwrap();
                }
                Entry::Long(value) => {
                    out.write_u8(5).unwrap();
                    out.write_i64::<BigEndian>(*value).unwrap();
                }
            }
        }
        out.write_u16::<BigEndian>(self.access_flags).unwrap();
        out.write_u16::<BigEndian>(self.this_class).unwrap();
        out.write_u16::<BigEndian>(self.super_class).unwrap();
        out.write_u16::<BigEndian>(0).unwrap();
        for members in [&self.fields, &self.methods] {
            out.write_u16::<BigEndian>(members.len() as u16).unwrap();
            for member in members {
                write_member(&mut out, member, code_name, exceptions_name);
            }
        }
        out.write_u16::<BigEndian>(0).unwrap();
        out
    }

    pub(crate) fn static_class(self) -> StaticClass {
        let bytes = self.build();
        StaticClass::new(JVMParser::parse(&bytes).unwrap()).unwrap()
    }

    fn member(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: Option<(u16, Vec<u8>)>,
        exceptions: &[&str],
    ) -> Member {
        Member {
            access_flags,
            name_index: self.utf8(name),
            descriptor_index: self.utf8(descriptor),
            code,
            exceptions: exceptions.iter().map(|e| self.class(e)).collect(),
        }
    }

    fn utf8(&mut self, s: &str) -> u16 {
        let mut index = 1;
        for entry in &self.pool {
            match entry {
                Entry::Utf8(existing) if existing == s => return index,
                Entry::Long(_) => index += 2,
                _ => index += 1,
            }
        }
        self.push(Entry::Utf8(s.to_string()))
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.push(Entry::Class(name_index))
    }

    fn push(&mut self, entry: Entry) -> u16 {
        let index = self.next_index;
        self.next_index += if matches!(entry, Entry::Long(_)) { 2 } else { 1 };
        self.pool.push(entry);
        index
    }
}

/// NUL becomes `C0 80` and characters outside the BMP are written as two
/// three byte surrogates.
fn encode_modified_utf8(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x01..=0x7f => out.push(unit as u8),
            0x00 | 0x80..=0x7ff => {
                out.push(0xc0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    out
}

fn write_member(out: &mut Vec<u8>, member: &Member, code_name: u16, exceptions_name: u16) {
    out.write_u16::<BigEndian>(member.access_flags).unwrap();
    out.write_u16::<BigEndian>(member.name_index).unwrap();
    out.write_u16::<BigEndian>(member.descriptor_index).unwrap();

    let mut attributes = Vec::new();
    if !member.exceptions.is_empty() {
        let mut body = Vec::new();
        body.write_u16::<BigEndian>(member.exceptions.len() as u16).unwrap();
        for index in &member.exceptions {
            body.write_u16::<BigEndian>(*index).unwrap();
        }
        attributes.push((exceptions_name, body));
    }
    if let Some((max_locals, code)) = &member.code {
        let mut body = Vec::new();
        body.write_u16::<BigEndian>(4).unwrap();
        body.write_u16::<BigEndian>(*max_locals).unwrap();
        body.write_u32::<BigEndian>(code.len() as u32).unwrap();
        body.extend_from_slice(code);
        body.write_u16::<BigEndian>(0).unwrap();
        body.write_u16::<BigEndian>(0).unwrap();
        attributes.push((code_name, body));
    }

    out.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
    for (name_index, body) in attributes {
        out.write_u16::<BigEndian>(name_index).unwrap();
        out.write_u32::<BigEndian>(body.len() as u32).unwrap();
        out.extend_from_slice(&body);
    }
}
