//! Service identity types for the container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a service or implementation type.
///
/// Wraps the `TypeId` used for lookups together with the `type_name` used in
/// diagnostics. Both sized types and trait objects (`dyn Trait`) can be
/// described, which is what lets interfaces act as service types.
///
/// Equality and hashing only look at the `TypeId`; the name is carried for
/// error messages and is never compared.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::ServiceType;
///
/// trait Logger: Send + Sync {}
///
/// let a = ServiceType::of::<dyn Logger>();
/// let b = ServiceType::of::<dyn Logger>();
/// assert_eq!(a, b);
/// assert!(a.name().contains("Logger"));
/// assert_ne!(a, ServiceType::of::<u32>());
/// ```
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    /// Describes the type `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` this service type is looked up by.
    #[inline(always)]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name, as returned by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, used to keep cycle chains readable.
    ///
    /// ```rust
    /// use ferrous_ioc::ServiceType;
    ///
    /// assert_eq!(ServiceType::of::<String>().short_name(), "String");
    /// ```
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment_start = 0;
        for (index, ch) in self.name.char_indices() {
            match ch {
                ':' => segment_start = index + 1,
                '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                    out.push_str(&self.name[segment_start..index]);
                    out.push(ch);
                    segment_start = index + 1;
                }
                _ => {}
            }
        }
        out.push_str(&self.name[segment_start..]);
        out
    }
}

impl PartialEq for ServiceType {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key for registration storage and lookup.
///
/// A key is a service type plus an optional registration name. Names are
/// compared case-insensitively, so `"Primary"` and `"primary"` address
/// the same registration. Two unnamed keys for the same type are equal.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::ServiceKey;
/// use std::collections::HashSet;
///
/// let upper = ServiceKey::named::<u32>("Database_Port");
/// let lower = ServiceKey::named::<u32>("database_port");
/// assert_eq!(upper, lower);
///
/// let mut keys = HashSet::new();
/// keys.insert(upper);
/// assert!(keys.contains(&lower));
/// assert!(!keys.contains(&ServiceKey::of::<u32>()));
/// ```
#[derive(Clone)]
pub struct ServiceKey {
    service_type: ServiceType,
    name: Option<Arc<str>>,
}

impl ServiceKey {
    /// Creates a key from a service type and optional name.
    pub fn new(service_type: ServiceType, name: Option<&str>) -> Self {
        Self {
            service_type,
            name: name.map(Arc::from),
        }
    }

    /// Unnamed key for `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            service_type: ServiceType::of::<T>(),
            name: None,
        }
    }

    /// Named key for `T`.
    pub fn named<T: ?Sized + 'static>(name: &str) -> Self {
        Self::new(ServiceType::of::<T>(), Some(name))
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Registration name, `None` for unnamed registrations.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

// Simple one-to-one uppercase mapping. Characters whose uppercase form is
// several characters (`ß`) are kept as they are.
fn fold_case(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

fn folded(name: &str) -> impl Iterator<Item = char> + '_ {
    name.chars().map(fold_case)
}

impl PartialEq for ServiceKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        if self.service_type != other.service_type {
            return false;
        }
        match (&self.name, &other.name) {
            (None, None) => true,
            (Some(a), Some(b)) if a.is_ascii() && b.is_ascii() => a.eq_ignore_ascii_case(b),
            (Some(a), Some(b)) => folded(a).eq(folded(b)),
            _ => false,
        }
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.service_type.hash(state);
        match &self.name {
            None => 0u8.hash(state),
            Some(name) => {
                1u8.hash(state);
                // Must agree with the case-insensitive `eq`.
                for c in folded(name) {
                    state.write_u32(c as u32);
                }
                state.write_u32(u32::MAX);
            }
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}[{}]", self.service_type.name(), name),
            None => f.write_str(self.service_type.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(key: &ServiceKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn unnamed_keys_for_same_type_are_equal() {
        assert_eq!(ServiceKey::of::<String>(), ServiceKey::of::<String>());
        assert_eq!(hash_of(&ServiceKey::of::<String>()), hash_of(&ServiceKey::of::<String>()));
    }

    #[test]
    fn named_and_unnamed_differ() {
        assert_ne!(ServiceKey::of::<u8>(), ServiceKey::named::<u8>("x"));
        assert_ne!(ServiceKey::named::<u8>("x"), ServiceKey::of::<u8>());
    }

    #[test]
    fn names_ignore_case_in_eq_and_hash() {
        let a = ServiceKey::named::<u8>("MixedCase");
        let b = ServiceKey::named::<u8>("mixedcase");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn names_ignore_case_beyond_ascii() {
        let pairs = [("Éclair", "éCLAIR"), ("ΟΔΟΣ", "οδος"), ("οδοσ", "ΟΔΟς"), ("Straße", "STRAßE")];
        for (a, b) in pairs {
            let a = ServiceKey::named::<u8>(a);
            let b = ServiceKey::named::<u8>(b);
            assert_eq!(a, b);
            assert_eq!(hash_of(&a), hash_of(&b));
        }

        // Multi-character uppercase forms are not expanded.
        assert_ne!(ServiceKey::named::<u8>("straße"), ServiceKey::named::<u8>("STRASSE"));
        assert_ne!(ServiceKey::named::<u8>("e"), ServiceKey::named::<u8>("é"));
    }

    #[test]
    fn same_name_different_type_differ() {
        assert_ne!(ServiceKey::named::<u8>("n"), ServiceKey::named::<u16>("n"));
    }

    #[test]
    fn display_includes_name() {
        assert_eq!(ServiceKey::named::<u8>("port").to_string(), "u8[port]");
        assert_eq!(ServiceKey::of::<u8>().to_string(), "u8");
    }

    #[test]
    fn short_name_strips_paths() {
        struct Local;
        assert_eq!(ServiceType::of::<Local>().short_name(), "Local");
        assert_eq!(ServiceType::of::<Vec<String>>().short_name(), "Vec<String>");
    }
}
