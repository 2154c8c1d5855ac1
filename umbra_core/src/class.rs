//! Platform class model.
//!
//! A `ClassDescriptor` is the identity of a platform API class or interface:
//! its name, its place in the hierarchy and the methods it declares. The
//! descriptors are immutable once built and shared as `Arc`.

use crate::error::ShadowError;
use crate::value::{Value, ValueType};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Shared pointer to a class descriptor.
pub type ClassRef = Arc<ClassDescriptor>;

/// A method declared on a platform class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<ValueType>,
    pub returns: ValueType,
    pub is_static: bool,
}

impl MethodDecl {
    /// Returns true if `args` fit this method's parameter list.
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| param.admits(arg))
    }

    /// `name(Int, Str)` style signature for messages.
    pub fn signature(&self) -> String {
        describe(&self.name, &self.params)
    }
}

pub(crate) fn describe(name: &str, params: &[ValueType]) -> String {
    let params: Vec<String> = params.iter().map(|p| format!("{p:?}")).collect();
    format!("{}({})", name, params.join(", "))
}

pub(crate) fn describe_call(name: &str, args: &[Value]) -> String {
    let args: Vec<String> = args
        .iter()
        .map(|arg| match arg.value_type() {
            Some(ty) => format!("{ty:?}"),
            None => "null".to_string(),
        })
        .collect();
    format!("{}({})", name, args.join(", "))
}

/// Identity of a platform class or interface.
#[derive(Debug)]
pub struct ClassDescriptor {
    name: String,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    is_interface: bool,
    data_holder: bool,
    methods: Vec<MethodDecl>,
}

impl ClassDescriptor {
    /// Starts building a class.
    pub fn class(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), false)
    }

    /// Starts building an interface.
    pub fn interface(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into(), true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the package prefix.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[ClassRef] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    /// Plain data holders may be constructed without a registered shadow.
    pub fn is_data_holder(&self) -> bool {
        self.data_holder
    }

    /// Methods declared directly on this class.
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    /// The resolution order: this class, each superclass in order, then
    /// every implemented interface (this class's first, then each
    /// superclass's, then super-interfaces breadth-first). No duplicates.
    pub fn ancestors(&self) -> Vec<&ClassDescriptor> {
        let mut chain: Vec<&ClassDescriptor> = Vec::new();
        let mut current = Some(self);
        while let Some(class) = current {
            chain.push(class);
            current = class.superclass.as_deref();
        }

        let mut seen: HashSet<&str> = chain.iter().map(|c| c.name()).collect();
        let mut queue: VecDeque<&ClassDescriptor> = chain
            .iter()
            .flat_map(|c| c.interfaces.iter().map(|i| i.as_ref()))
            .collect();

        while let Some(interface) = queue.pop_front() {
            if seen.insert(interface.name()) {
                chain.push(interface);
                queue.extend(interface.interfaces.iter().map(|i| i.as_ref()));
            }
        }

        chain
    }

    /// `instanceof`: true if this class or any ancestor has this name.
    pub fn is_assignable_to(&self, class_name: &str) -> bool {
        self.ancestors().iter().any(|c| c.name() == class_name)
    }

    /// Finds the declaration a call with `args` binds to, searching the
    /// ancestor chain.
    pub fn find_method(&self, name: &str, args: &[Value], is_static: bool) -> Option<&MethodDecl> {
        self.ancestors().into_iter().find_map(|class| {
            class
                .methods
                .iter()
                .find(|m| m.name == name && m.is_static == is_static && m.accepts(args))
        })
    }
}

/// Builder for `ClassDescriptor`.
pub struct ClassBuilder {
    name: String,
    superclass: Option<ClassRef>,
    interfaces: Vec<ClassRef>,
    is_interface: bool,
    data_holder: bool,
    methods: Vec<MethodDecl>,
}

impl ClassBuilder {
    fn new(name: String, is_interface: bool) -> Self {
        Self {
            name,
            superclass: None,
            interfaces: Vec::new(),
            is_interface,
            data_holder: false,
            methods: Vec::new(),
        }
    }

    /// Sets the superclass.
    pub fn extends(mut self, superclass: &ClassRef) -> Self {
        self.superclass = Some(Arc::clone(superclass));
        self
    }

    /// Adds an implemented (or, for interfaces, extended) interface.
    pub fn implements(mut self, interface: &ClassRef) -> Self {
        self.interfaces.push(Arc::clone(interface));
        self
    }

    /// Marks the class as a plain data holder.
    pub fn data_holder(mut self) -> Self {
        self.data_holder = true;
        self
    }

    /// Declares an instance method.
    pub fn method(mut self, name: &str, params: &[ValueType], returns: ValueType) -> Self {
        self.methods.push(MethodDecl {
            name: name.to_string(),
            params: params.to_vec(),
            returns,
            is_static: false,
        });
        self
    }

    /// Declares a static method.
    pub fn static_method(mut self, name: &str, params: &[ValueType], returns: ValueType) -> Self {
        self.methods.push(MethodDecl {
            name: name.to_string(),
            params: params.to_vec(),
            returns,
            is_static: true,
        });
        self
    }

    pub fn build(self) -> ClassRef {
        Arc::new(ClassDescriptor {
            name: self.name,
            superclass: self.superclass,
            interfaces: self.interfaces,
            is_interface: self.is_interface,
            data_holder: self.data_holder,
            methods: self.methods,
        })
    }
}

/// The set of loaded platform classes, by name.
#[derive(Default)]
pub struct ClassPath {
    classes: HashMap<String, ClassRef>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a class together with every ancestor it references.
    pub fn load(&mut self, class: &ClassRef) {
        if self.classes.contains_key(class.name()) {
            return;
        }
        self.classes.insert(class.name().to_string(), Arc::clone(class));
        if let Some(superclass) = class.superclass() {
            self.load(superclass);
        }
        for interface in class.interfaces() {
            self.load(interface);
        }
    }

    pub fn get(&self, name: &str) -> Option<ClassRef> {
        self.classes.get(name).cloned()
    }

    /// Like `get`, failing with `UnknownClass`.
    pub fn require(&self, name: &str) -> Result<ClassRef, ShadowError> {
        self.get(name)
            .ok_or_else(|| ShadowError::UnknownClass(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
