use crate::error::WalCoreError;

/// An opaque, byte-serializable mutation request.
///
/// The WAL never interprets the contents of a request; it only needs to
/// stamp a monotonically increasing `request_num` into it before
/// persisting, and to be able to turn it into bytes and back. The query
/// engine defines the concrete payload and its encoding (the original
/// system uses a schema-described encoding); the WAL only needs
/// `encode`/`decode`.
pub trait Request: Sized {
    /// Read the request number previously stamped by the WAL, if any.
    fn request_num(&self) -> u32;

    /// Stamp the request number the WAL assigned to this request.
    ///
    /// Called exactly once, before the request is serialized for the
    /// first time.
    fn set_request_num(&mut self, request_num: u32);

    /// Serialize this request to its stable on-disk encoding.
    fn encode(&self) -> Result<Vec<u8>, WalCoreError>;

    /// Deserialize a request from bytes produced by `encode`.
    fn decode(bytes: &[u8]) -> Result<Self, WalCoreError>;
}
