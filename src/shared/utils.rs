//! Small serde helpers shared across the wire entities.

use serde::{Deserialize, Deserializer};

/// Deserialize a field the engine may emit as JSON `null` (it writes empty
/// collections as `null`, not `[]`) into its `Default` value.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let value = Option::<T>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
