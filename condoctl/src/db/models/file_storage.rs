/// Request to store attachment content
#[derive(Debug, Clone)]
pub struct FileStorageRequest {
    pub content: Vec<u8>,
    pub content_type: String,
}

/// Response from storing attachment content
#[derive(Debug, Clone)]
pub struct FileStorageResponse {
    /// Key saved alongside the attachment metadata, relative to the storage root
    /// (e.g. "ab/ab12cd34-....dat")
    pub storage_key: String,
}
