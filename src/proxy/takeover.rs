//! Connection takeover capability.
//!
//! hyper hands out a connection only through the `OnUpgrade` request
//! extension, which exists when the connection is served with upgrades
//! enabled (HTTP/1.1). Anything else (HTTP/2, a request built in a test, a
//! layer that rebuilt the request) cannot be taken over.

use axum::http::Request;
use hyper::upgrade::OnUpgrade;

use crate::proxy::TunnelError;

/// Narrow interface: claim the underlying client connection.
pub trait ConnectionTakeover {
    /// Claim the connection. Resolves to the raw stream once the response
    /// head has been written.
    fn take_over(&mut self) -> Result<OnUpgrade, TunnelError>;
}

impl<B> ConnectionTakeover for Request<B> {
    fn take_over(&mut self) -> Result<OnUpgrade, TunnelError> {
        self.extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(TunnelError::TakeoverUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_without_connection_cannot_be_taken_over() {
        let mut request = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        assert!(matches!(
            request.take_over(),
            Err(TunnelError::TakeoverUnsupported)
        ));
    }
}
