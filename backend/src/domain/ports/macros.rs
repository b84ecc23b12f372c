//! Helper macro for generating domain port error enums.
//!
//! Every port declares its failure modes through [`define_port_error`] so the
//! enums share one shape: `thiserror`-derived variants with snake_case
//! constructor functions accepting `impl Into<T>` for each field.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    define_port_error! {
        pub enum ExamplePortError {
            Upstream { message: String } => "upstream: {message}",
            Attempts { count: u32 } => "attempts exhausted: {count}",
            Quota { message: String, count: u32 } => "quota: {message} ({count})",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExamplePortError::upstream("registrar unreachable");
        assert_eq!(err.to_string(), "upstream: registrar unreachable");
    }

    #[test]
    fn constructors_preserve_non_string_types() {
        let err = ExamplePortError::attempts(3_u32);
        assert_eq!(err.to_string(), "attempts exhausted: 3");
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = ExamplePortError::quota("daily cap", 2_u32);
        assert_eq!(err.to_string(), "quota: daily cap (2)");
    }
}
