//! Application faults
//!
//! A remote method fails with a [`Fault`]: a named failure type that may be
//! assignable to broader failure types. Checked faults must be declared by
//! the method that raises them; unchecked faults may escape any method.

use super::error::{RemoteError, Result};
use crate::marshal::{get_string, put_string};
use bytes::{Buf, BufMut};
use std::fmt;

/// Failure raised by a remote method
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fault {
    type_name: String,
    supertypes: Vec<String>,
    message: String,
    checked: bool,
}

impl Fault {
    /// A checked fault: callers only see it if the method declares it
    pub fn checked(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            supertypes: Vec::new(),
            message: message.into(),
            checked: true,
        }
    }

    /// An unchecked fault: passes through any method unchanged
    pub fn unchecked(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            supertypes: Vec::new(),
            message: message.into(),
            checked: false,
        }
    }

    /// Make this fault assignable to `supertype`
    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Whether this fault is of type `type_name` or one of its subtypes
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.supertypes.iter().any(|s| s == type_name)
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        put_string(buf, &self.type_name)?;
        buf.put_u8(self.checked as u8);
        buf.put_u16(self.supertypes.len() as u16);
        for supertype in &self.supertypes {
            put_string(buf, supertype)?;
        }
        put_string(buf, &self.message)?;
        Ok(())
    }

    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let type_name = get_string(buf)?;
        if buf.remaining() < 3 {
            return Err(RemoteError::BufferUnderflow {
                needed: 3,
                have: buf.remaining(),
            });
        }
        let checked = buf.get_u8() != 0;
        let count = buf.get_u16() as usize;
        let mut supertypes = Vec::with_capacity(count);
        for _ in 0..count {
            supertypes.push(get_string(buf)?);
        }
        let message = get_string(buf)?;
        Ok(Self {
            type_name,
            supertypes,
            message,
            checked,
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for Fault {}

impl From<Fault> for RemoteError {
    fn from(fault: Fault) -> Self {
        RemoteError::Application(fault)
    }
}
