use std::fmt;

/// Opaque token identifying one successful write of a node.
///
/// The tag records which backend family minted the token, so versions
/// from different backends never compare equal, and an adapter handed
/// a foreign-tagged token in a conditional operation fails it with
/// [`BadVersion`](crate::StoreError::BadVersion) instead of coercing.
///
/// Within one backend the payload is monotonically distinguishable:
/// two tokens are equal iff they denote the identical write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    /// Modify index minted by a transactional-CAS backend.
    Txn(u64),

    /// Mod revision minted by a revision-stream backend.
    Stream(i64),
}

impl fmt::Display for Version {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Version::Txn(index) => write!(f, "txn:{index}"),
            Version::Stream(revision) => write!(f, "stream:{revision}"),
        }
    }
}
