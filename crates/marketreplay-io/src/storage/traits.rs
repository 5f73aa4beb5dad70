//! The storage seam shared by the Checkpoint Manager and the Run Archive
//! Writer. Kept narrow and synchronous — callers that need async (the cloud
//! adapters) own their own runtime internally.

use crate::error::Result;

pub trait Storage: Send + Sync {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;
    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>>;
    fn delete(&self, path: &str) -> Result<()>;
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
    fn size(&self, path: &str) -> Result<u64>;
    fn etag(&self, path: &str) -> Result<Option<String>>;

    fn read_all(&self, path: &str) -> Result<Vec<u8>> {
        let len = self.size(path)?;
        self.read_range(path, 0, len as usize)
    }
}
