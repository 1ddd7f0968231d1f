#![forbid(unsafe_code)]

//! Binding inheritance.
//!
//! A level's binding enum wraps its parent's enum in an `Inherited` case.
//! [`inherit_bindings!`] generates the `From` conversions that lift any
//! ancestor's case into the leaf, so a heterogeneous list can be written
//! with [`bindings!`]:
//!
//! ```ignore
//! inherit_bindings!(ButtonBinding => ControlBinding => ViewBinding => BaseBinding);
//!
//! let list: Vec<ButtonBinding> = bindings![
//!     ButtonBinding::title("OK"),
//!     ViewBinding::is_hidden(false),
//! ];
//! ```

/// Generate `From` conversions from every ancestor binding type into a leaf.
///
/// The first type after the leaf is its direct parent; the rest are listed
/// nearest first. The leaf must have an `Inherited(Parent)` case and every
/// level must already convert from the levels above it.
#[macro_export]
macro_rules! inherit_bindings {
    ($leaf:ty => $parent:ty $(=> $ancestor:ty)* $(,)?) => {
        impl ::core::convert::From<$parent> for $leaf {
            fn from(binding: $parent) -> Self {
                Self::Inherited(binding)
            }
        }
        $(
            impl ::core::convert::From<$ancestor> for $leaf {
                fn from(binding: $ancestor) -> Self {
                    Self::Inherited(<$parent as ::core::convert::From<$ancestor>>::from(binding))
                }
            }
        )*
    };
}

/// Build a binding list, lifting each element into the target binding type.
#[macro_export]
macro_rules! bindings {
    () => {
        ::std::vec::Vec::new()
    };
    ($($binding:expr),+ $(,)?) => {
        ::std::vec![$(::core::convert::Into::into($binding)),+]
    };
}
