use kitchenops_core::{DomainError, DomainResult, OrganizationId};

/// Marks types that belong to exactly one organization.
///
/// Stores and services use this to refuse writes that would cross the
/// organization boundary.
pub trait OrganizationScoped {
    fn organization_id(&self) -> OrganizationId;
}

/// Fails with `InvariantViolation` when `scoped` belongs to another organization.
pub fn ensure_same_organization<T: OrganizationScoped + ?Sized>(
    expected: OrganizationId,
    scoped: &T,
) -> DomainResult<()> {
    if scoped.organization_id() != expected {
        return Err(DomainError::invariant(format!(
            "organization mismatch (expected {expected}, found {})",
            scoped.organization_id()
        )));
    }
    Ok(())
}
