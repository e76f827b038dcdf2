//! `kitchenops-core` — domain building blocks shared by the review workflow.
//!
//! Pure domain primitives only: identifiers, the domain error model and the
//! aggregate/entity/value-object traits. No IO lives here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, IngredientId, OrganizationId, UserId};
pub use value_object::ValueObject;
