//! Coercion of type-erased values into statically expected types.
//!
//! A [`ServiceValue`] is turned into a `T` by trying, in order:
//!
//! 1. direct assignability: the wrapped value is a `T` (it is cloned out);
//! 2. conversion: a small closed set of runtime conversions (numeric casts, text/byte
//!    conversions). A successful conversion is written to the destination but does not end
//!    the attempt;
//! 3. the value's own [`Adapt`](crate::Adapt) capability. `true` ends the attempt successfully.
//!
//! Anything else is [`RegistryError::TransformationFailed`], including a conversion from
//! step 2 that was not confirmed by step 3. [`coerce_into`] leaves such a converted value in
//! the destination while still reporting the failure.
//!
//! When the source type is known statically, [`convert`] goes through `TryFrom` instead.

use std::any::{type_name, Any};

use crate::{RegistryError, Result, ServiceValue};

/// Coerce `input` into a `T`.
///
/// # Errors
///
/// - [`RegistryError::InvalidInput`] when `input` is `None`
/// - [`RegistryError::TransformationFailed`] when no strategy produced a `T`
///
/// # Examples
///
/// ```
/// use service_registry::{coerce, RegistryError, ServiceValue};
///
/// let value = ServiceValue::new(7u16);
/// assert_eq!(coerce::<u16>(&value), Ok(7));
/// assert!(matches!(
///     coerce::<String>(&value),
///     Err(RegistryError::TransformationFailed { .. })
/// ));
/// ```
pub fn coerce<'a, T: Clone + 'static>(input: impl Into<Option<&'a ServiceValue>>) -> Result<T> {
    let input = input.into().ok_or(RegistryError::InvalidInput)?;

    let mut slot: Option<T> = None;
    coerce_slot(input, &mut slot)?;

    // The adapter may confirm without filling the slot.
    slot.ok_or(RegistryError::TransformationFailed {
        from: input.type_name(),
        to: type_name::<T>(),
    })
}

/// Coerce `input` into an existing destination.
///
/// The destination is only overwritten when some strategy produced a value, which can happen
/// even when an error is returned (see the module documentation).
///
/// # Errors
///
/// - [`RegistryError::InvalidInput`] when `input` is `None`
/// - [`RegistryError::InvalidOutput`] when `output` is `None`
/// - [`RegistryError::TransformationFailed`] when no strategy succeeded
pub fn coerce_into<'a, T: Clone + 'static>(
    input: impl Into<Option<&'a ServiceValue>>,
    output: Option<&mut T>,
) -> Result<()> {
    let input = input.into().ok_or(RegistryError::InvalidInput)?;
    let output = output.ok_or(RegistryError::InvalidOutput)?;

    let mut slot: Option<T> = None;
    let result = coerce_slot(input, &mut slot);
    if let Some(value) = slot {
        *output = value;
    }
    result
}

/// Like [`coerce`], but panics on failure.
///
/// # Panics
///
/// Panics with the coercion error when `input` cannot be turned into a `T`.
pub fn must_coerce<'a, T: Clone + 'static>(input: impl Into<Option<&'a ServiceValue>>) -> T {
    match coerce(input) {
        Ok(value) => value,
        Err(err) => panic!("{err}"),
    }
}

/// Like [`coerce`], returning `None` instead of an error.
pub fn try_coerce<'a, T: Clone + 'static>(input: impl Into<Option<&'a ServiceValue>>) -> Option<T> {
    coerce(input).ok()
}

/// Statically typed conversion through `TryFrom`.
///
/// # Examples
///
/// ```
/// use service_registry::convert;
///
/// assert_eq!(convert::<u32, u8>(200), Ok(200u8));
/// assert!(convert::<u32, u8>(300).is_err());
/// ```
pub fn convert<IN, OUT: TryFrom<IN>>(input: IN) -> Result<OUT> {
    OUT::try_from(input).map_err(|_| RegistryError::TransformationFailed {
        from: type_name::<IN>(),
        to: type_name::<OUT>(),
    })
}

fn coerce_slot<T: Clone + 'static>(input: &ServiceValue, slot: &mut Option<T>) -> Result<()> {
    if let Some(value) = input.downcast_ref::<T>() {
        *slot = Some(value.clone());
        return Ok(());
    }

    let source = input.as_any() as &dyn Any;
    if convert_numeric(source, slot) || convert_text(source, slot) {
        tracing::trace!(
            from = input.type_name(),
            to = type_name::<T>(),
            "converted service value"
        );
    }

    if input.adapt_into(slot) == Some(true) {
        return Ok(());
    }

    Err(RegistryError::TransformationFailed {
        from: input.type_name(),
        to: type_name::<T>(),
    })
}

macro_rules! cast_into_slot {
    (@targets $value:expr, $slot:expr; $($target:ty),*) => {{
        $(
            if let Some(out) = $slot.downcast_mut::<Option<$target>>() {
                *out = Some($value as $target);
                return true;
            }
        )*
        return false;
    }};
    ($value:expr, $slot:expr) => {
        cast_into_slot!(
            @targets $value, $slot;
            u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64
        )
    };
}

macro_rules! numeric_conversions {
    ($($source:ty),* $(,)?) => {
        /// Numeric-to-numeric casts with `as` semantics.
        fn convert_numeric(input: &dyn Any, slot: &mut dyn Any) -> bool {
            $(
                if let Some(value) = input.downcast_ref::<$source>() {
                    let value = *value;
                    cast_into_slot!(value, slot);
                }
            )*
            false
        }
    };
}

numeric_conversions!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

/// Conversions between the string and byte representations.
fn convert_text(input: &dyn Any, slot: &mut dyn Any) -> bool {
    let bytes: Option<Vec<u8>> = if let Some(text) = input.downcast_ref::<&'static str>() {
        Some(text.as_bytes().to_vec())
    } else if let Some(text) = input.downcast_ref::<String>() {
        Some(text.as_bytes().to_vec())
    } else {
        input.downcast_ref::<Vec<u8>>().cloned()
    };
    let Some(bytes) = bytes else {
        return false;
    };

    if let Some(out) = slot.downcast_mut::<Option<String>>() {
        *out = Some(String::from_utf8_lossy(&bytes).into_owned());
        return true;
    }
    if let Some(out) = slot.downcast_mut::<Option<Vec<u8>>>() {
        *out = Some(bytes);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fill, Adapt};

    #[derive(Debug, Clone, PartialEq)]
    struct Label(String);

    #[derive(Debug, Clone, PartialEq)]
    struct Port(u16);

    impl Adapt for Port {
        fn adapt(&self, output: &mut dyn Any) -> bool {
            fill(output, Label(format!(":{}", self.0)))
        }
    }

    /// Confirms whatever the conversion step already wrote.
    struct Confirming;

    impl Adapt for Confirming {
        fn adapt(&self, _output: &mut dyn Any) -> bool {
            true
        }
    }

    #[test]
    fn test_assignable_value() {
        let value = ServiceValue::new(5i32);
        assert_eq!(coerce::<i32>(&value), Ok(5));
    }

    #[test]
    fn test_unrelated_type_fails() {
        let value = ServiceValue::new(5i32);
        assert_eq!(
            coerce::<Label>(&value),
            Err(RegistryError::TransformationFailed {
                from: "i32",
                to: type_name::<Label>(),
            })
        );
    }

    #[test]
    fn test_adapter_succeeds_regardless_of_assignability() {
        let value = ServiceValue::adaptable(Port(8080));
        assert_eq!(coerce::<Label>(&value), Ok(Label(":8080".to_string())));
    }

    #[test]
    fn test_adapter_confirming_without_filling_is_a_failure() {
        let value = ServiceValue::adaptable(Confirming);
        assert!(matches!(
            coerce::<Label>(&value),
            Err(RegistryError::TransformationFailed { .. })
        ));
    }

    #[test]
    fn test_invalid_input_and_output() {
        assert_eq!(coerce::<i32>(None), Err(RegistryError::InvalidInput));

        let value = ServiceValue::new(1i32);
        assert_eq!(
            coerce_into::<i32>(&value, None),
            Err(RegistryError::InvalidOutput)
        );
        let mut out = 0i32;
        assert_eq!(
            coerce_into(None, Some(&mut out)),
            Err(RegistryError::InvalidInput)
        );
    }

    // A plain conversion is written out but still reported as a failure because the value has
    // no adapter to confirm it.
    #[test]
    fn test_conversion_without_adapter_overwritten_by_failure() {
        let value = ServiceValue::new(300u16);

        let mut out = 0u64;
        let result = coerce_into(&value, Some(&mut out));

        assert_eq!(out, 300);
        assert_eq!(
            result,
            Err(RegistryError::TransformationFailed {
                from: "u16",
                to: "u64",
            })
        );
        assert!(coerce::<u64>(&value).is_err());
    }

    #[test]
    fn test_adapter_confirmation_leaves_destination_untouched() {
        let value = ServiceValue::adaptable(Confirming);
        let mut out = 1u8;
        assert_eq!(coerce_into(&value, Some(&mut out)), Ok(()));
        assert_eq!(out, 1);
    }

    #[test]
    fn test_text_conversions_are_written() {
        let value = ServiceValue::new("héllo");
        let mut bytes: Vec<u8> = Vec::new();
        let _ = coerce_into(&value, Some(&mut bytes));
        assert_eq!(bytes, "héllo".as_bytes());

        let value = ServiceValue::new(vec![104u8, 105]);
        let mut text = String::new();
        let _ = coerce_into(&value, Some(&mut text));
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_try_and_must_variants() {
        let value = ServiceValue::new("x".to_string());
        assert_eq!(try_coerce::<String>(&value), Some("x".to_string()));
        assert_eq!(try_coerce::<u8>(&value), None);
        assert_eq!(must_coerce::<String>(&value), "x");
    }

    #[test]
    #[should_panic(expected = "Cannot transform")]
    fn test_must_coerce_panics() {
        let value = ServiceValue::new(1u8);
        let _: Label = must_coerce(&value);
    }

    #[test]
    fn test_static_conversion() {
        assert_eq!(convert::<i64, i32>(-4), Ok(-4));
        assert_eq!(
            convert::<i64, u8>(-4),
            Err(RegistryError::TransformationFailed { from: "i64", to: "u8" })
        );
    }
}
