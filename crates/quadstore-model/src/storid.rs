use std::fmt;

/// Internal integer identifier for an IRI or a blank node.
///
/// Positive ids identify named resources, negative ids identify blank nodes. Zero is never a
/// valid storid (it is reserved as a "no value" sentinel in the compiler's binding plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Storid(pub i64);

impl Storid {
    #[must_use]
    pub const fn is_blank_node(self) -> bool {
        self.0 < 0
    }

    #[must_use]
    pub const fn is_resource(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Storid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Storid {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

/// Sentinel datatype-id encoding for language-tagged strings, and for the "no datatype" case.
///
/// A plain (untyped) literal has datatype `0`. A literal typed with an XSD/user datatype IRI has
/// the datatype IRI's own (positive) storid. A language-tagged string encodes the language tag
/// as a distinct, disjoint id space far below any real blank-node storid, so it can never
/// collide with an ordinary resource or blank node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatatypeId(pub i64);

/// Lower bound of the region reserved for language-tag sentinels. Chosen far away from both the
/// positive resource range and the small negative blank-node range so no real allocation can
/// ever land here.
pub const LANG_SENTINEL_BASE: i64 = i64::MIN / 2;

impl DatatypeId {
    pub const PLAIN: Self = Self(0);

    #[must_use]
    pub const fn xsd(storid: Storid) -> Self {
        Self(storid.0)
    }

    /// Encodes a language tag, identified by its own small interned id (`tag_id >= 1`), as a
    /// datatype-id sentinel.
    #[must_use]
    pub const fn lang(tag_id: i64) -> Self {
        Self(LANG_SENTINEL_BASE - tag_id)
    }

    #[must_use]
    pub const fn is_lang(self) -> bool {
        self.0 <= LANG_SENTINEL_BASE
    }

    #[must_use]
    pub const fn is_plain(self) -> bool {
        self.0 == 0
    }

    /// Recovers the interned language-tag id, if this datatype-id is a language sentinel.
    #[must_use]
    pub const fn lang_tag_id(self) -> Option<i64> {
        if self.is_lang() {
            Some(LANG_SENTINEL_BASE - self.0)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn xsd_storid(self) -> Option<Storid> {
        if self.is_plain() || self.is_lang() {
            None
        } else {
            Some(Storid(self.0))
        }
    }
}
