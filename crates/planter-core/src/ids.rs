//! Branded identifier newtypes.
//!
//! UUID v7 everywhere so IDs sort by creation time, which keeps session
//! directories and replay records naturally ordered on disk.

use serde::{Deserialize, Serialize};

macro_rules! branded_id {
    ($(#[doc = $doc:literal])* $name:ident, $prefix:literal) => {
        $(#[doc = $doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh time-ordered ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, uuid::Uuid::now_v7()))
            }

            /// Wrap an existing ID string (e.g. read back from disk).
            #[must_use]
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The underlying string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

branded_id!(
    /// A persisted session under `.openplanter/sessions/`.
    SessionId,
    "sess"
);

branded_id!(
    /// One LLM call recorded in the replay log.
    CallId,
    "call"
);

branded_id!(
    /// A background shell job.
    JobId,
    "job"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_carry_prefix() {
        assert!(SessionId::generate().as_str().starts_with("sess_"));
        assert!(CallId::generate().as_str().starts_with("call_"));
        assert!(JobId::generate().as_str().starts_with("job_"));
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let a = CallId::generate();
        let b = CallId::generate();
        assert!(a.as_str() <= b.as_str());
    }

    #[test]
    fn serde_is_transparent() {
        let id = JobId::from_string("job_fixed");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""job_fixed""#);
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
