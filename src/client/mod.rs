mod files;
mod impls;

use crate::request_context::ApiContext;

/// Resilient client for the files backend. Cheap to clone; clones share the
/// same endpoint cache and wake-up state.
#[derive(Clone)]
pub struct ResilientClient {
    ctx: ApiContext,
}
