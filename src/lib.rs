// SPDX-License-Identifier: Apache-2.0

pub mod ingest;
pub mod init;
pub mod store;
