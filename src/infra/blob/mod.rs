mod fs;
mod memory;

pub use fs::FilesystemBlobStore;
pub use memory::MemoryBlobStore;
