use serde::{Deserialize, Deserializer};

/// Deserializes a value, treating empty strings as None.
/// Useful for FreshBooks fields that return "" instead of null.
pub fn empty_string_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrValue<T> {
        String(String),
        Value(T),
    }

    match Option::<StringOrValue<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrValue::String(s)) if s.is_empty() => Ok(None),
        Some(StringOrValue::String(s)) => T::deserialize(serde::de::value::StringDeserializer::<
            D::Error,
        >::new(s))
        .map(Some),
        Some(StringOrValue::Value(v)) => Ok(Some(v)),
    }
}

/// Deserializes `null` as the type's default value.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts ids that arrive either as JSON strings or numbers.
pub fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(serde_json::Number),
    }

    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}
