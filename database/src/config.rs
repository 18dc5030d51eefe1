use std::path::PathBuf;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_SIZE: ByteSize = ByteSize::gib(16);

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DatabaseConfig {
    #[default]
    InMemory,
    Persistent {
        name: String,
        directory: PathBuf,
        #[serde(default = "default_max_size")]
        max_size: ByteSize,
        #[serde(default)]
        read_only: bool,
    },
}

const fn default_max_size() -> ByteSize {
    DEFAULT_MAX_SIZE
}
