//! Address space identifier
//!
//! An [`AddressSpaceId`] is unique to the process and boot epoch that
//! generated it. It combines a host-unique random number, drawn once per
//! process from the OS random source, with a millisecond timestamp and a
//! 16-bit sequence number distinguishing ids generated in the same
//! millisecond.

use super::error::{RemoteError, Result};
use bytes::{Buf, BufMut};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Generator state shared by the whole process
struct GeneratorState {
    host_unique: Option<i32>,
    last_time: i64,
    last_count: i16,
}

static GENERATOR: LazyLock<Mutex<GeneratorState>> = LazyLock::new(|| {
    Mutex::new(GeneratorState {
        host_unique: None,
        last_time: current_millis(),
        last_count: i16::MIN,
    })
});

fn current_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Address space identifier (14 bytes on the wire)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressSpaceId {
    unique: i32,
    time: i64,
    count: i16,
}

impl AddressSpaceId {
    /// Size of an encoded AddressSpaceId in bytes
    pub const SIZE: usize = 4 + 8 + 2;

    /// Generate an id that is unique within this process and, with high
    /// probability, across restarts of this host.
    ///
    /// Blocks in 1ms steps when more than 65535 ids are requested within
    /// one millisecond. If the wall clock went backwards the recorded time
    /// is advanced by 1ms instead of following the clock.
    pub fn generate() -> Self {
        let mut state = GENERATOR.lock();
        let unique = *state
            .host_unique
            .get_or_insert_with(|| OsRng.next_u32() as i32);

        if state.last_count == i16::MAX {
            loop {
                let now = current_millis();
                if now == state.last_time {
                    // Blocks the calling thread with the generator held;
                    // async callers generate on the blocking pool
                    std::thread::sleep(Duration::from_millis(1));
                } else {
                    state.last_time = if now < state.last_time {
                        state.last_time + 1
                    } else {
                        now
                    };
                    state.last_count = i16::MIN;
                    break;
                }
            }
        }

        let time = state.last_time;
        let count = state.last_count;
        state.last_count += 1;

        Self {
            unique,
            time,
            count,
        }
    }

    /// A well-known id: unique and time fixed at zero, sequence `num`
    pub const fn well_known(num: i16) -> Self {
        Self {
            unique: 0,
            time: 0,
            count: num,
        }
    }

    /// Create from raw parts
    pub const fn from_parts(unique: i32, time: i64, count: i16) -> Self {
        Self {
            unique,
            time,
            count,
        }
    }

    pub fn unique(&self) -> i32 {
        self.unique
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn count(&self) -> i16 {
        self.count
    }

    /// Whether this id was built by [`AddressSpaceId::well_known`]
    pub fn is_well_known(&self) -> bool {
        self.unique == 0 && self.time == 0
    }

    /// Identity hash compatible with other implementations of this scheme
    pub fn hash_code(&self) -> i32 {
        (self.time as i32).wrapping_add(self.count as i32)
    }

    /// Encode to buffer: unique, time, count
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32(self.unique);
        buf.put_i64(self.time);
        buf.put_i16(self.count);
    }

    /// Decode from buffer
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(RemoteError::BufferUnderflow {
                needed: Self::SIZE,
                have: buf.remaining(),
            });
        }
        let unique = buf.get_i32();
        let time = buf.get_i64();
        let count = buf.get_i16();
        Ok(Self {
            unique,
            time,
            count,
        })
    }
}

impl fmt::Debug for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressSpaceId({})", self)
    }
}

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}:{:x}:{:x}", self.unique, self.time, self.count)
    }
}
