//! Runtime service dispatch over a caller-supplied transport.

use bytes::Bytes;
use tracing::debug;

use crate::error::Error;
use crate::runtime::DynamicMessage;
use crate::schema::ServiceRef;

/// The transport contract: ship the encoded request to the named method and
/// return the raw response bytes. Timeouts and cancellation live here, not
/// in the dispatcher.
pub type TransportFn = dyn Fn(&str, Bytes) -> Result<Bytes, Error> + Send + Sync;

/// A built service dispatcher.
pub struct Dispatcher {
    service: ServiceRef,
    transport: Box<TransportFn>,
}

impl ServiceRef {
    /// Build a dispatcher for this service around `transport`.
    pub fn dispatcher<T>(&self, transport: T) -> Dispatcher
    where
        T: Fn(&str, Bytes) -> Result<Bytes, Error> + Send + Sync + 'static,
    {
        Dispatcher {
            service: self.clone(),
            transport: Box::new(transport),
        }
    }
}

impl Dispatcher {
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Invoke `method` with `request`.
    ///
    /// The request must be an instance of the method's resolved request
    /// type. The transport is handed the method's fully-qualified name and
    /// the encoded request; its response bytes are decoded with the
    /// resolved response type, and any failure on that path is reported as
    /// an rpc error naming the method.
    pub fn call(&self, method: &str, request: &DynamicMessage) -> Result<DynamicMessage, Error> {
        let rpc = self
            .service
            .rpc_by_name(method)
            .ok_or_else(|| Error::NameResolution {
                reference: method.to_owned(),
                context: self.service.fqn(),
            })?;

        let request_type = rpc.request()?;
        if request.descriptor() != request_type {
            return Err(Error::illegal_value(
                rpc.fqn(),
                format!("request is not a {}", request_type.fqn()),
            ));
        }

        let fqn = rpc.fqn();
        let payload = request.encode_to_bytes()?;
        debug!(method = %fqn, request_len = payload.len(), "dispatching rpc");

        let reply = (self.transport)(&fqn, payload).map_err(|e| Error::Rpc {
            method: fqn.clone(),
            detail: e.to_string(),
        })?;

        let response_type = rpc.response()?;
        response_type.decode(&reply).map_err(|e| Error::Rpc {
            method: fqn,
            detail: format!("invalid response: {e}"),
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("service", &self.service)
            .finish()
    }
}
