// src/lenient.rs
//
// Deserializers for API fields whose JSON type varies between endpoints or
// tenants. A value of the wrong shape becomes `None` instead of failing the
// whole payload.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// String, number or null -> `Option<String>`. Empty strings count as absent.
pub fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Number, numeric string or null -> `Option<f64>`.
pub fn de_opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// `null` -> `T::default()`, so nested objects and lists can be read without
/// wrapping every access in `Option`.
pub fn de_null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Truncates toward zero, as minute counts are loaded as integers.
pub fn minutes(value: Option<f64>) -> i64 {
    value.map(|v| v.trunc() as i64).unwrap_or(0)
}
