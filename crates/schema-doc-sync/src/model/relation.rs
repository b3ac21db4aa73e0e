//! Generic-aware "is a" test over the registered type model.
//!
//! Used to decide which aggregate members are entity collections: a member
//! typed `DbSet<Order>`, or a subclass of it, or anything implementing a
//! target generic interface, is matched against the open definition.

use super::{TypeRef, TypeRegistry};

/// Whether `candidate` is, derives from, or implements the generic
/// definition of `target`.
///
/// `target` may be given as the open definition (`DbSet`) or as any closed
/// instantiation (`DbSet<Order>`); only its definition is compared.
pub fn inherits_or_implements_generic(
    registry: &TypeRegistry,
    candidate: &TypeRef,
    target: &TypeRef,
) -> bool {
    find_generic_instantiation(registry, candidate, target).is_some()
}

/// Walk `candidate`'s base chain up to the root type and return the first
/// ancestor, or interface directly implemented by an ancestor, whose open
/// definition equals that of `target`.
///
/// The returned reference carries the generic arguments as seen from
/// `candidate`: for `class OrderSet : DbSet<Order>` and target `DbSet`, the
/// result is `DbSet<Order>`.
pub fn find_generic_instantiation(
    registry: &TypeRegistry,
    candidate: &TypeRef,
    target: &TypeRef,
) -> Option<TypeRef> {
    let target = target.open_definition();
    let root = TypeRef::Type(registry.object());

    let mut current = Some(candidate.clone());
    while let Some(ancestor) = current {
        let open = ancestor.open_definition();
        if open == root {
            return None;
        }
        if open == target {
            return Some(ancestor);
        }

        if let Some(interface) = registry
            .interfaces_of(&ancestor)
            .into_iter()
            .find(|i| i.open_definition() == target)
        {
            return Some(interface);
        }

        current = registry.base_of(&ancestor);
    }

    None
}
