pub mod adapter;
pub mod engine;
pub mod error;
pub mod fs;
pub mod meta;
pub mod path;
pub mod registry;
pub mod store;
pub mod stream;

mod actor;

pub use adapter::{
    supported_operations, versioning_supported, Adapter, CheckpointVersioning, Operation,
    SnapshotVersioning, VersioningClass,
};
pub use error::{ErrorClass, FsError, FsResult};
pub use fs::Filesystem;
pub use meta::{
    Checkpoint, DirectoryDeleteOptions, EntryInfo, EntryKind, Metadata, Visibility,
    VersionRecord, WriteOptions,
};
pub use path::{normalize, NormalizedPath};
pub use store::{MemoryAdapter, StoreConfig, TableAdapter};
pub use stream::{ChunkMode, MissingStreamBehavior, ReadStream, WriteStream};
