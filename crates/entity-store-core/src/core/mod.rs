// crates/entity-store-core/src/core/mod.rs
// ============================================================================
// Module: Entity Store Core Types
// Description: Identifiers, principals, records, descriptors, and time.
// Purpose: Provide the stable data model shared by engines and stores.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Core types describe what is stored and who acts on it. They carry no
//! storage logic; engines and stores build on them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod descriptor;
pub mod identifiers;
pub mod principal;
pub mod record;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use descriptor::CollectionShape;
pub use descriptor::DescriptorError;
pub use descriptor::DescriptorRegistry;
pub use descriptor::EntityDescriptor;
pub use descriptor::TagRelation;
pub use descriptor::Transform;
pub use descriptor::is_valid_identifier;
pub use identifiers::CategoryId;
pub use identifiers::EntityId;
pub use identifiers::PrincipalId;
pub use identifiers::TagId;
pub use identifiers::ViewPath;
pub use principal::GUEST_PRINCIPAL_ID;
pub use principal::Principal;
pub use record::BaseEntity;
pub use record::Category;
pub use record::Patch;
pub use record::RawRecord;
pub use record::Tag;
pub use record::TransformError;
pub use record::decode_record;
pub use record::encode_record;
pub use time::Clock;
pub use time::SteppingClock;
pub use time::SystemClock;
