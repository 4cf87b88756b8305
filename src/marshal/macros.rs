/// Declare a record struct together with its [`PropertyRecord`](crate::marshal::PropertyRecord)
/// field table.
///
/// Every field starts with `#[property("PeerName")]` or `#[property("PeerName", "<tag>")]`,
/// followed by its other attributes (docs included). The field type must convert into a
/// [`Variant`](crate::variant::Variant) and implement
/// [`FromVariant`](crate::variant::FromVariant).
///
/// ```rust
/// docbind_core::property_record! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Transport {
///         #[property("State")]
///         /// Streaming state
///         pub state: String,
///         #[property("Volume", "omitEmpty, writable")]
///         pub volume: u16,
///     }
/// }
/// assert_eq!(docbind_core::marshal::writable_fields::<Transport>(), vec!["Volume"]);
/// ```
#[macro_export]
macro_rules! property_record {
    (@tag) => {
        ""
    };
    (@tag $tag:literal) => {
        $tag
    };
    (
        $(#[$smeta:meta])*
        $svis:vis struct $name:ident {
            $(
                #[property($prop:literal $(, $tag:literal)?)]
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$smeta])*
        $svis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::marshal::PropertyRecord for $name {
            fn fields() -> ::std::vec::Vec<$crate::marshal::FieldDef<Self>> {
                ::std::vec![
                    $(
                        $crate::marshal::FieldDef::new(
                            $prop,
                            $crate::property_record!(@tag $($tag)?),
                            |record: &$name| {
                                $crate::variant::Variant::from(
                                    ::std::clone::Clone::clone(&record.$field),
                                )
                            },
                            |record: &mut $name, value: $crate::variant::Variant| {
                                record.$field =
                                    <$fty as $crate::variant::FromVariant>::from_variant(value)?;
                                ::std::result::Result::Ok(())
                            },
                        ),
                    )*
                ]
            }
        }
    };
}
