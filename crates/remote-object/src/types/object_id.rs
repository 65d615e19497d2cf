//! Object identifier
//!
//! An [`ObjectId`] names one exported object: a 64-bit object number within
//! an address space. Generated ids either pair the process-wide address
//! space with a sequential number, or (when random ids are enabled) a fresh
//! address space with a random number. Well-known ids pair a small fixed
//! number with the canonical local address space and are reserved for
//! system roles.

use super::address_space::AddressSpaceId;
use super::error::Result;
use bytes::{Buf, BufMut};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::LazyLock;

/// Environment variable enabling random object numbers
pub const RANDOM_IDS_ENV: &str = "REMOTE_OBJECT_RANDOM_IDS";

/// Address space shared by every sequential id generated in this process
static LOCAL_SPACE: LazyLock<AddressSpaceId> = LazyLock::new(AddressSpaceId::generate);

static NEXT_OBJECT_NUMBER: AtomicI64 = AtomicI64::new(0);

static RANDOM_IDS: LazyLock<bool> = LazyLock::new(|| {
    std::env::var(RANDOM_IDS_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
});

/// Whether random object ids were requested for this process.
/// The environment is read once.
pub fn random_ids_enabled() -> bool {
    *RANDOM_IDS
}

/// Object Identifier (22 bytes on the wire)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    object_number: i64,
    space: AddressSpaceId,
}

impl ObjectId {
    /// Size of an encoded ObjectId in bytes
    pub const SIZE: usize = 8 + AddressSpaceId::SIZE;

    /// Object number of the registry
    pub const REGISTRY_ID: i64 = 0;
    /// Object number of the activator
    pub const ACTIVATOR_ID: i64 = 1;
    /// Object number of the distributed garbage collector
    pub const DGC_ID: i64 = 2;

    /// Generate a unique id according to the process configuration
    pub fn generate() -> Self {
        Self::generate_with(random_ids_enabled())
    }

    /// Generate a unique id, random or sequential
    pub fn generate_with(random: bool) -> Self {
        if random {
            Self {
                object_number: OsRng.next_u64() as i64,
                space: AddressSpaceId::generate(),
            }
        } else {
            Self {
                object_number: NEXT_OBJECT_NUMBER.fetch_add(1, Ordering::SeqCst),
                space: *LOCAL_SPACE,
            }
        }
    }

    /// A well-known id in the canonical local address space
    pub const fn well_known(object_number: i64) -> Self {
        Self {
            object_number,
            space: AddressSpaceId::well_known(0),
        }
    }

    /// Create from raw parts
    pub const fn from_parts(object_number: i64, space: AddressSpaceId) -> Self {
        Self {
            object_number,
            space,
        }
    }

    pub fn object_number(&self) -> i64 {
        self.object_number
    }

    pub fn space(&self) -> AddressSpaceId {
        self.space
    }

    /// Whether this id lives in this process's shared address space
    pub fn is_local_space(&self) -> bool {
        self.space == *LOCAL_SPACE
    }

    /// Identity hash: the low 32 bits of the object number
    pub fn hash_code(&self) -> i32 {
        self.object_number as i32
    }

    /// Encode to buffer: object number, then address space
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.object_number);
        self.space.encode(buf);
    }

    /// Decode from buffer
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(super::error::RemoteError::BufferUnderflow {
                needed: Self::SIZE,
                have: buf.remaining(),
            });
        }
        let object_number = buf.get_i64();
        let space = AddressSpaceId::decode(buf)?;
        Ok(Self {
            object_number,
            space,
        })
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId{}", self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local_space() {
            write!(f, "[{}]", self.object_number)
        } else {
            write!(f, "[{}, {}]", self.space, self.object_number)
        }
    }
}
