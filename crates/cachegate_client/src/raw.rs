// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::sync::Arc;

use crate::Result;

/// A client-specific connection object, downcast by the caller to the concrete type it expects.
pub type RawConnection = Arc<dyn Any + Send + Sync>;

/// Optional capability: hand out the connection underlying a client.
///
/// Clients that support it return themselves from
/// [`CacheClient::raw_connection_provider`](crate::CacheClient::raw_connection_provider).
/// Callers using the raw connection bypass the facade entirely, including failure absorption.
pub trait RawConnectionProvider: Send + Sync {
    /// Returns a connection suitable for writes when `write` is set, otherwise one suitable for reads.
    fn raw_connection(&self, write: bool) -> Result<RawConnection>;
}
