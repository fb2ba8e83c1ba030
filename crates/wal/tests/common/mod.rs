//! Shared test harness: a minimal fake request and an in-memory apply
//! recorder, used across this crate's integration tests.

use std::sync::{Arc, Mutex};

use tsdb_wal::{Request, WalCoreError};

/// A fake mutation request carrying one `u32` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeRequest {
    request_num: u32,
    pub value: u32,
}

/// Build a not-yet-stamped `FakeRequest` carrying `value`.
pub fn fake_request(value: u32) -> FakeRequest {
    FakeRequest {
        request_num: 0,
        value,
    }
}

impl Request for FakeRequest {
    fn request_num(&self) -> u32 {
        self.request_num
    }

    fn set_request_num(&mut self, request_num: u32) {
        self.request_num = request_num;
    }

    fn encode(&self) -> Result<Vec<u8>, WalCoreError> {
        Ok(self.value.to_be_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, WalCoreError> {
        if bytes.len() != 4 {
            return Err(WalCoreError::Decode(format!(
                "expected 4 bytes, got {}",
                bytes.len()
            )));
        }
        let value = u32::from_be_bytes(bytes.try_into().unwrap());
        Ok(FakeRequest {
            request_num: 0,
            value,
        })
    }
}

/// Records the request number of every `FakeRequest` handed to `apply`
/// during recovery, so a test can assert on it afterward.
#[derive(Clone, Default)]
pub struct AppliedLog(Arc<Mutex<Vec<u32>>>);

impl AppliedLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A closure suitable for `Wal::recover_from_last_commit`.
    pub fn recorder(&self) -> impl FnMut(FakeRequest) -> Result<(), WalCoreError> + Send + 'static {
        let log = self.0.clone();
        move |req: FakeRequest| {
            log.lock().unwrap().push(req.request_num());
            Ok(())
        }
    }

    /// Request numbers recorded so far, in the order `apply` saw them.
    pub fn seen(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}
