/// Wire scalar stored in the backing store.
///
/// Every field value, set member and list element is encoded to exactly one
/// of these before it crosses the store boundary. Numbers and booleans carry
/// their JSON text form, strings pass through untouched; see
/// [`crate::model::serialize::ScalarValue`].
pub type RedisValue = String;
