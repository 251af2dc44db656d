//! Request-id middleware for the document API.
//!
//! Ids are assigned before they are propagated, so a response always echoes
//! either the caller's `x-request-id` or the UUID generated for it. Job logs pick
//! the id up from the request span.

use tower::layer::util::Stack;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request id on requests and responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Set-then-propagate request-id layers, outermost first.
pub type RequestIdLayers = Stack<PropagateRequestIdLayer, SetRequestIdLayer<MakeRequestUuid>>;

/// Layers that assign a UUID to requests arriving without an id and copy the
/// id onto the response.
#[must_use]
pub fn request_id_layers() -> RequestIdLayers {
    Stack::new(
        PropagateRequestIdLayer::x_request_id(),
        SetRequestIdLayer::x_request_id(MakeRequestUuid),
    )
}
