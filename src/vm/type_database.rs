use crate::util::Address;

/// Where a field of a described type lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// A per-instance field at a byte offset from the start of the instance.
    Instance { offset: usize },
    /// A static field at a fixed address in the image.
    Static { address: Address },
}

/// One field of a [`TypeInfo`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldInfo {
    pub fn instance(name: impl Into<String>, offset: usize) -> Self {
        FieldInfo {
            name: name.into(),
            kind: FieldKind::Instance { offset },
        }
    }

    pub fn static_at(name: impl Into<String>, address: Address) -> Self {
        FieldInfo {
            name: name.into(),
            kind: FieldKind::Static { address },
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self.kind {
            FieldKind::Instance { offset } => Some(offset),
            FieldKind::Static { .. } => None,
        }
    }

    pub fn static_address(&self) -> Option<Address> {
        match self.kind {
            FieldKind::Static { address } => Some(address),
            FieldKind::Instance { .. } => None,
        }
    }
}

/// The layout of a native type in the image, as exported by the VM's
/// structure tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    /// `sizeof` the type, in bytes.
    pub size: usize,
    pub fields: Vec<FieldInfo>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        TypeInfo {
            name: name.into(),
            size,
            fields: vec![],
        }
    }

    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Byte offset of an instance field.
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.field(name).and_then(FieldInfo::offset)
    }

    /// Address of a static field.
    pub fn static_field_address(&self, name: &str) -> Option<Address> {
        self.field(name).and_then(FieldInfo::static_address)
    }
}

/// The layout database of the inspected process: types and integer
/// constants, looked up by the names the VM exports them under
/// (e.g. `ObjectMonitor`, `ObjectSynchronizer::_BLOCKSIZE`).
///
/// Lookups return `None` when a symbol is absent. Older or stripped images
/// legitimately lack symbols, so absence is not an error at this level.
pub trait TypeDatabase {
    fn lookup_type(&self, name: &str) -> Option<TypeInfo>;
    fn lookup_int_constant(&self, name: &str) -> Option<i64>;
}

impl<T: TypeDatabase + ?Sized> TypeDatabase for &T {
    fn lookup_type(&self, name: &str) -> Option<TypeInfo> {
        (**self).lookup_type(name)
    }
    fn lookup_int_constant(&self, name: &str) -> Option<i64> {
        (**self).lookup_int_constant(name)
    }
}
