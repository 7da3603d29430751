use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for sensitive pilgrim data (phone numbers, ID document numbers)
/// that masks its value in Debug output and can be customized for Serialization.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // In logs we mask, but API responses and event payloads need the real
        // value. The wrapper exists to prevent accidental leakage through log
        // macros like tracing::info!("{:?}", pilgrim).
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_masked() {
        let phone = Masked("+91 98765 43210".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(format!("{}", phone), "********");
    }

    #[test]
    fn serialization_keeps_real_value() {
        let phone = Masked("+91 98765 43210".to_string());
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+91 98765 43210\"");
    }
}
