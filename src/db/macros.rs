//! Declarative macros for building parameter sets.
//!
//! The macros expand at compile time to plain `Parameters` builder calls.

/// Build a `Parameters` set from `name => value` pairs.
///
/// Values go through `Into<Value>`, so literals, strings, options and date-times
/// can be mixed freely. A leading `:` on a name is accepted and dropped.
///
/// # Example
///
/// ```
/// use shard_db::params;
/// use shard_db::models::Value;
///
/// let params = params! { "id" => 7, ":name" => "ada", "deleted_at" => None::<i64> };
/// assert_eq!(params.get("id"), Some(&Value::Int(7)));
/// assert_eq!(params.get("name"), Some(&Value::from("ada")));
/// assert_eq!(params.get("deleted_at"), Some(&Value::Null));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::models::Parameters::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::models::Parameters::new();
        $(
            params.insert($name, $value);
        )+
        params
    }};
}
