use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;

use serde::de;

/// Deserializes an unsigned integer from either a native integer or a string.
///
/// Environment overrides always arrive as strings, and TOML cannot represent
/// integers above `i64::MAX` (eg. funding amounts in the smallest unit).
pub fn uint_from_anything<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr + TryFrom<u64> + TryFrom<i64>,
    <T as FromStr>::Err: fmt::Display,
{
    struct UintVisitor<T>(PhantomData<T>);

    impl<T> de::Visitor<'_> for UintVisitor<T>
    where
        T: FromStr + TryFrom<u64> + TryFrom<i64>,
        <T as FromStr>::Err: fmt::Display,
    {
        type Value = T;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "an unsigned integer or a string holding one")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            T::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            T::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.trim()
                .replace('_', "")
                .parse()
                .map_err(|e| E::custom(format!("invalid integer `{v}`: {e}")))
        }
    }

    deserializer.deserialize_any(UintVisitor(PhantomData))
}
