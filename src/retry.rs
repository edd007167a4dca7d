use std::fmt;

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

/// The polymorphic `retry` field of a job payload.
///
/// On the wire it is `false` (do not retry), `true` (retry with the
/// default count) or a positive integer (retry that many times). In
/// memory it keeps the two observations separate: `ok` says whether to
/// retry at all, `times == 0` means "use the default count".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RetryValue {
    pub ok: bool,
    pub times: i64,
}

impl Serialize for RetryValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.ok {
            serializer.serialize_bool(false)
        } else if self.times > 0 {
            serializer.serialize_i64(self.times)
        } else {
            serializer.serialize_bool(true)
        }
    }
}

struct RetryValueVisitor;

impl<'de> Visitor<'de> for RetryValueVisitor {
    type Value = RetryValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a boolean or an integer retry count")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RetryValue, E> {
        Ok(RetryValue { ok: v, times: 0 })
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<RetryValue, E> {
        // An explicit 0 on the wire means "do not retry".
        Ok(RetryValue { ok: n > 0, times: n })
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<RetryValue, E> {
        self.visit_i64(n as i64)
    }
}

impl<'de> Deserialize<'de> for RetryValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<RetryValue, D::Error> {
        deserializer.deserialize_any(RetryValueVisitor)
    }
}
