//! Status query parameters.

/// Query parameter carrying the device identity.
pub const IMEI_PARAM: &str = "imei";

/// A status query for a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    imei: String,
}

impl StatusQuery {
    /// Creates a query for the given device identity.
    pub fn new(imei: impl Into<String>) -> Self {
        Self { imei: imei.into() }
    }

    /// Returns the device identity being queried.
    pub fn imei(&self) -> &str {
        &self.imei
    }

    /// Returns the query string pairs, unencoded.
    ///
    /// Callers are expected to percent-encode these when building the URL.
    pub fn pairs(&self) -> [(&'static str, &str); 1] {
        [(IMEI_PARAM, self.imei.as_str())]
    }
}
