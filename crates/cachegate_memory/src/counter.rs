// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Values a [`MemoryClient`](crate::MemoryClient) can increment and decrement.
///
/// Both methods default to `None`, so a value type without a numeric form only needs an empty
/// implementation; incrementing such a value is reported as invalid usage.
///
/// # Examples
///
/// ```
/// use cachegate_memory::Counter;
///
/// #[derive(Clone)]
/// struct Profile {
///     name: String,
/// }
///
/// impl Counter for Profile {}
///
/// assert_eq!(Profile { name: "ada".into() }.to_counter(), None);
/// assert_eq!("41".to_string().to_counter(), Some(41));
/// ```
pub trait Counter: Sized {
    /// Returns the integer this value represents, if any.
    fn to_counter(&self) -> Option<i64> {
        None
    }

    /// Builds a value representing `counter`, if this type can hold it.
    fn from_counter(_counter: i64) -> Option<Self> {
        None
    }
}

macro_rules! integer_counter {
    ($($ty:ty),*) => {
        $(
            impl Counter for $ty {
                fn to_counter(&self) -> Option<i64> {
                    i64::try_from(*self).ok()
                }

                fn from_counter(counter: i64) -> Option<Self> {
                    Self::try_from(counter).ok()
                }
            }
        )*
    };
}

integer_counter!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Counter for String {
    fn to_counter(&self) -> Option<i64> {
        self.trim().parse().ok()
    }

    fn from_counter(counter: i64) -> Option<Self> {
        Some(counter.to_string())
    }
}

impl Counter for Vec<u8> {
    fn to_counter(&self) -> Option<i64> {
        std::str::from_utf8(self).ok()?.trim().parse().ok()
    }

    fn from_counter(counter: i64) -> Option<Self> {
        Some(counter.to_string().into_bytes())
    }
}
