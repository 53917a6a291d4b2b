//! Supplier catalog consulted by the lifecycle.
//!
//! Read-only from the engine's perspective; registration exists so tests and
//! the HTTP surface can seed it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use shopledger_core::{DomainError, TenantId};
use shopledger_purchasing::SupplierId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: SupplierId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub supplier_id: Option<SupplierId>,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Tenant-isolated supplier lookup.
pub trait SupplierDirectory: Send + Sync {
    fn register(&self, tenant_id: TenantId, supplier: NewSupplier) -> Result<Supplier, DomainError>;

    fn get(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier>;

    fn list(&self, tenant_id: TenantId) -> Vec<Supplier>;
}

impl<D> SupplierDirectory for Arc<D>
where
    D: SupplierDirectory + ?Sized,
{
    fn register(&self, tenant_id: TenantId, supplier: NewSupplier) -> Result<Supplier, DomainError> {
        (**self).register(tenant_id, supplier)
    }

    fn get(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier> {
        (**self).get(tenant_id, supplier_id)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<Supplier> {
        (**self).list(tenant_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemorySupplierDirectory {
    inner: RwLock<HashMap<(TenantId, SupplierId), Supplier>>,
}

impl InMemorySupplierDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SupplierDirectory for InMemorySupplierDirectory {
    fn register(&self, tenant_id: TenantId, new: NewSupplier) -> Result<Supplier, DomainError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        let supplier = Supplier {
            supplier_id: new.supplier_id.unwrap_or_else(SupplierId::generate),
            name: name.to_string(),
            phone: non_blank(new.phone),
            email: non_blank(new.email),
        };

        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("supplier directory lock poisoned"))?;
        let key = (tenant_id, supplier.supplier_id);
        if let Some(existing) = map.get(&key) {
            // Re-registering the same supplier is idempotent.
            if *existing == supplier {
                return Ok(supplier);
            }
            return Err(DomainError::conflict(format!(
                "supplier {} already registered",
                supplier.supplier_id
            )));
        }
        map.insert(key, supplier.clone());
        Ok(supplier)
    }

    fn get(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, supplier_id)).cloned()
    }

    fn list(&self, tenant_id: TenantId) -> Vec<Supplier> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let mut suppliers: Vec<Supplier> = map
            .iter()
            .filter_map(|((t, _), s)| if *t == tenant_id { Some(s.clone()) } else { None })
            .collect();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        suppliers
    }
}
