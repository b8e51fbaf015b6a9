//! Runtime table describing a contract: its service and declared methods.

use std::collections::BTreeMap;

use courier_client::{Error, Result};

use crate::descriptor::{MethodDescriptor, ReturnShape, ServiceDescriptor};

/// One declared method of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSlot {
    /// How the method hands back its result.
    pub shape: ReturnShape,
    /// Number of positional arguments.
    pub arity: usize,
    /// Invocation behavior; a call fails if absent.
    pub descriptor: Option<MethodDescriptor>,
}

/// A contract's metadata, keyed by declared method name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceContract {
    name: String,
    service: Option<ServiceDescriptor>,
    methods: BTreeMap<String, MethodSlot>,
}

impl ServiceContract {
    /// Start an empty contract called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service: None,
            methods: BTreeMap::new(),
        }
    }

    /// Attach the service descriptor.
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.service = Some(service);
        self
    }

    /// Declare a method. Redeclaring a name replaces it.
    pub fn declare(
        mut self,
        method: impl Into<String>,
        shape: ReturnShape,
        arity: usize,
        descriptor: Option<MethodDescriptor>,
    ) -> Self {
        self.methods.insert(
            method.into(),
            MethodSlot {
                shape,
                arity,
                descriptor,
            },
        );
        self
    }

    /// Contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service descriptor, if declared.
    pub fn service(&self) -> Option<&ServiceDescriptor> {
        self.service.as_ref()
    }

    /// Look up a declared method.
    pub fn method(&self, method: &str) -> Option<&MethodSlot> {
        self.methods.get(method)
    }

    /// Declared method names, in order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Number of declared methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if no methods are declared.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Check the contract can be synthesized.
    ///
    /// Methods without a descriptor pass here and fail when called.
    pub fn validate(&self) -> Result<&ServiceDescriptor> {
        let service = self.service.as_ref().ok_or_else(|| {
            Error::config(format!("contract '{}' has no service descriptor", self.name))
        })?;
        service.validate()?;

        if self.methods.is_empty() {
            return Err(Error::config(format!(
                "contract '{}' declares no methods",
                self.name
            )));
        }

        for (name, slot) in &self.methods {
            if let Some(descriptor) = &slot.descriptor {
                descriptor.validate(name, slot.arity)?;
            }
        }
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> ServiceContract {
        ServiceContract::new("Orders")
            .with_service(ServiceDescriptor::new("orders"))
            .declare("get", ReturnShape::Blocking, 1, Some(MethodDescriptor::new()))
            .declare("undescribed", ReturnShape::Future, 0, None)
    }

    #[test]
    fn test_lookup() {
        let contract = contract();
        assert_eq!(contract.len(), 2);
        assert_eq!(contract.method("get").unwrap().arity, 1);
        assert!(contract.method("undescribed").unwrap().descriptor.is_none());
        assert!(contract.method("missing").is_none());
        assert_eq!(contract.method_names().collect::<Vec<_>>(), vec!["get", "undescribed"]);
    }

    #[test]
    fn test_validate_ok_with_missing_method_descriptor() {
        let contract = contract();
        assert_eq!(contract.validate().unwrap().service_id, "orders");
    }

    #[test]
    fn test_validate_rejects() {
        let no_service = ServiceContract::new("X").declare("m", ReturnShape::Blocking, 0, None);
        assert!(matches!(no_service.validate(), Err(Error::Config(_))));

        let empty_id = ServiceContract::new("X")
            .with_service(ServiceDescriptor::new(""))
            .declare("m", ReturnShape::Blocking, 0, None);
        assert!(empty_id.validate().is_err());

        let empty = ServiceContract::new("X").with_service(ServiceDescriptor::new("x"));
        assert!(empty.validate().is_err());

        let bad_mapping = ServiceContract::new("X")
            .with_service(ServiceDescriptor::new("x"))
            .declare(
                "m",
                ReturnShape::Blocking,
                0,
                Some(MethodDescriptor::new().with_params(["a"])),
            );
        assert!(bad_mapping.validate().is_err());
    }
}
