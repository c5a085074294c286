//! Key normalization.
//!
//! Every key handed to a [`ConcurrentRegistry`](crate::ConcurrentRegistry) is projected onto a
//! plain comparable identity before it touches the map. Two key families are supported:
//!
//! - native comparable types (strings, integers, chars, bools, ...) which are used as-is;
//! - types exposing a [`Unique`] projection, wrapped in [`ByUnique`]. A projection equal to
//!   the `Default` value of its identity type means "no identity" and is rejected as a nil key.
//!
//! `Option<K>` is a key as well: `None` is the nil key.

use std::hash::Hash;
use std::sync::Arc;

use crate::RegistryError;

/// A value that can be projected onto a map identity.
pub trait RegistryKey {
    /// The comparable identity used internally for map indexing.
    type Normalized: Eq + Hash + Clone + Send + Sync + 'static;

    /// Project the key onto its normalized identity.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NilKey`] when the key carries no identity
    /// - [`RegistryError::KeyConversion`] when the key cannot be projected
    fn normalize(&self) -> Result<Self::Normalized, RegistryError>;
}

/// Capability for keys that are not comparable themselves but can name their identity.
///
/// The `Default` value of [`Unique::Id`] is reserved for "no identity".
pub trait Unique {
    type Id: Eq + Hash + Clone + Default + Send + Sync + 'static;

    fn unique(&self) -> Self::Id;
}

/// Adapter turning any [`Unique`] type into a [`RegistryKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByUnique<T>(pub T);

impl<T: Unique> RegistryKey for ByUnique<T> {
    type Normalized = T::Id;

    fn normalize(&self) -> Result<Self::Normalized, RegistryError> {
        let id = self.0.unique();
        if id == T::Id::default() {
            return Err(RegistryError::NilKey);
        }
        Ok(id)
    }
}

/// Pointer identity: two `Arc`s are the same key only if they share an allocation.
impl<T: ?Sized> Unique for Arc<T> {
    type Id = usize;

    fn unique(&self) -> usize {
        Arc::as_ptr(self) as *const () as usize
    }
}

impl<K: RegistryKey> RegistryKey for Option<K> {
    type Normalized = K::Normalized;

    fn normalize(&self) -> Result<Self::Normalized, RegistryError> {
        match self {
            Some(key) => key.normalize(),
            None => Err(RegistryError::NilKey),
        }
    }
}

impl<K: RegistryKey + ?Sized> RegistryKey for &K {
    type Normalized = K::Normalized;

    fn normalize(&self) -> Result<Self::Normalized, RegistryError> {
        (**self).normalize()
    }
}

impl RegistryKey for str {
    type Normalized = String;

    fn normalize(&self) -> Result<String, RegistryError> {
        Ok(self.to_owned())
    }
}

macro_rules! native_keys {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RegistryKey for $ty {
                type Normalized = $ty;

                fn normalize(&self) -> Result<$ty, RegistryError> {
                    Ok(self.clone())
                }
            }
        )*
    };
}

native_keys!(
    String,
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    std::any::TypeId,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    enum Slot {
        #[default]
        Empty,
        Primary,
        Replica,
    }

    struct Handle {
        slot: Slot,
    }

    impl Unique for Handle {
        type Id = Slot;

        fn unique(&self) -> Slot {
            self.slot
        }
    }

    #[test]
    fn test_native_keys_are_used_directly() {
        assert_eq!("db".normalize().unwrap(), "db".to_string());
        assert_eq!("db".to_string().normalize().unwrap(), "db".to_string());
        assert_eq!(7u32.normalize().unwrap(), 7);
        assert_eq!('x'.normalize().unwrap(), 'x');
    }

    #[test]
    fn test_unique_projection() {
        let key = ByUnique(Handle {
            slot: Slot::Primary,
        });
        assert_eq!(key.normalize().unwrap(), Slot::Primary);

        let other = ByUnique(Handle {
            slot: Slot::Replica,
        });
        assert_ne!(key.normalize().unwrap(), other.normalize().unwrap());
    }

    #[test]
    fn test_default_projection_is_nil_key() {
        let key = ByUnique(Handle { slot: Slot::Empty });
        assert_eq!(key.normalize(), Err(RegistryError::NilKey));
    }

    #[test]
    fn test_none_is_nil_key() {
        let key: Option<&str> = None;
        assert_eq!(key.normalize(), Err(RegistryError::NilKey));
        assert_eq!(Some("a").normalize().unwrap(), "a".to_string());
    }

    #[test]
    fn test_arc_pointer_identity() {
        let a = Arc::new(1u8);
        let b = Arc::new(1u8);
        let a2 = a.clone();

        assert_eq!(
            ByUnique(a.clone()).normalize().unwrap(),
            ByUnique(a2).normalize().unwrap()
        );
        assert_ne!(
            ByUnique(a).normalize().unwrap(),
            ByUnique(b).normalize().unwrap()
        );
    }
}
