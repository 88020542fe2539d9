use stockledger_core::TenantId;

/// Company scope of a request.
///
/// Immutable and present on every ledger route; handlers never take the company
/// from the body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompanyContext {
    tenant_id: TenantId,
}

impl CompanyContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
