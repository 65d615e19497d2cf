//! Interface and method descriptors
//!
//! Remote interfaces are described statically: each interface names the
//! interfaces it extends and the methods it declares. An interface is
//! remote-capable when it is, or extends, [`REMOTE`].

use std::fmt;

/// Name of the remote marker interface
pub const REMOTE_INTERFACE_NAME: &str = "remote.Remote";

/// Fault type every remote method implicitly declares
pub const REMOTE_FAULT: &str = "remote.RemoteFault";

/// The remote marker interface
pub static REMOTE: InterfaceDescriptor = InterfaceDescriptor::new(REMOTE_INTERFACE_NAME, &[], &[]);

/// Static description of one remote method
pub struct MethodDescriptor {
    /// Name of the declaring interface
    pub interface: &'static str,
    pub name: &'static str,
    /// Parameter and return types, e.g. `(J)J`
    pub signature: &'static str,
    /// Fault type names the method may raise
    pub declared_faults: &'static [&'static str],
}

impl MethodDescriptor {
    pub const fn new(
        interface: &'static str,
        name: &'static str,
        signature: &'static str,
        declared_faults: &'static [&'static str],
    ) -> Self {
        Self {
            interface,
            name,
            signature,
            declared_faults,
        }
    }

    /// `name(signature)`, the string the method hash is computed over
    pub fn name_and_signature(&self) -> String {
        format!("{}{}", self.name, self.signature)
    }

    /// Whether this method and `other` have the same name and signature
    pub fn same_signature(&self, other: &MethodDescriptor) -> bool {
        self.name == other.name && self.signature == other.signature
    }

    /// Zero-argument end-of-life cleanup method
    pub fn is_finalizer(&self) -> bool {
        self.name == "finalize" && self.signature.starts_with("()")
    }

    /// Whether a fault of some type is covered by the declared list
    pub fn declares(&self, fault: &crate::types::Fault) -> bool {
        self.declared_faults
            .iter()
            .any(|declared| fault.is_assignable_to(declared))
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.interface, self.name, self.signature)
    }
}

/// Static description of a remote interface
pub struct InterfaceDescriptor {
    /// Fully qualified name, e.g. `demo.Counter`
    pub name: &'static str,
    pub extends: &'static [&'static InterfaceDescriptor],
    pub methods: &'static [&'static MethodDescriptor],
}

impl InterfaceDescriptor {
    pub const fn new(
        name: &'static str,
        extends: &'static [&'static InterfaceDescriptor],
        methods: &'static [&'static MethodDescriptor],
    ) -> Self {
        Self {
            name,
            extends,
            methods,
        }
    }

    /// Name without its namespace
    pub fn simple_name(&self) -> &'static str {
        let name = self.name;
        let start = name
            .rfind(|c: char| c == '.' || c == ':')
            .map(|i| i + 1)
            .unwrap_or(0);
        &name[start..]
    }

    /// Whether this is the remote marker interface
    pub fn is_marker(&self) -> bool {
        self.name == REMOTE_INTERFACE_NAME
    }

    /// Whether this interface is, or extends, the remote marker
    pub fn is_remote(&self) -> bool {
        self.is_marker() || self.extends.iter().any(|parent| parent.is_remote())
    }

    /// Whether this interface is `name` or extends it
    pub fn is_or_extends(&self, name: &str) -> bool {
        self.name == name || self.extends.iter().any(|parent| parent.is_or_extends(name))
    }

    /// Methods declared here and on every extended interface
    pub fn all_methods(&self) -> Vec<&'static MethodDescriptor> {
        let mut methods: Vec<&'static MethodDescriptor> = self.methods.to_vec();
        for parent in self.extends {
            for method in parent.all_methods() {
                if !methods.iter().any(|m| m.same_signature(method)) {
                    methods.push(method);
                }
            }
        }
        methods
    }

    /// Find a method declared on this interface or its parents
    pub fn find_method(&self, name: &str, signature: &str) -> Option<&'static MethodDescriptor> {
        self.all_methods()
            .into_iter()
            .find(|m| m.name == name && m.signature == signature)
    }

    /// The interface in this hierarchy called `name`
    pub fn find_interface(&'static self, name: &str) -> Option<&'static InterfaceDescriptor> {
        if self.name == name {
            return Some(self);
        }
        self.extends
            .iter()
            .find_map(|parent| parent.find_interface(name))
    }
}

impl fmt::Debug for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for InterfaceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for InterfaceDescriptor {}
