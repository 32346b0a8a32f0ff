// SPDX-License-Identifier: Apache-2.0

//! Durable progress state: the identity of the file being tailed and the byte
//! offset read so far.

mod json_file;
mod lock;
mod schema;

pub use json_file::{LoadOutcome, StateFile};
pub use lock::StateLock;
pub use schema::{
    PERSISTED_STATE_VERSION, PersistedState, PersistedStateLegacy, PersistedStateV1,
    ProgressState,
};
