// Job Handler Port
// The contract a registered worker fulfils: payload in, result or error out.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::domain::JobPayload;

/// Handler failure carrying a caller-visible message
#[derive(Error, Debug)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub type HandlerResult = std::result::Result<serde_json::Value, HandlerError>;

/// In-process job handler.
///
/// Handlers are stateless with respect to the queue: given a payload they
/// produce a serializable result or fail with a descriptive error. They never
/// see queue internals. Arbitrary external I/O inside `run` is fine.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, payload: &JobPayload) -> HandlerResult;
}

/// Adapt a typed async function into a [`JobHandler`].
///
/// The payload is decoded into `Req` before the function runs; a payload that
/// does not decode fails that job with an invalid-payload message. The
/// response is serialized back into the job result. This is the seam where
/// each job kind declares its payload and result schema.
///
/// # Example
///
/// ```
/// use casework_core::port::{handler_fn, HandlerError};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Deserialize)]
/// struct VinLookup {
///     vin: String,
/// }
///
/// #[derive(Serialize)]
/// struct VinDetails {
///     make: String,
/// }
///
/// let handler = handler_fn(|req: VinLookup| async move {
///     if req.vin.len() != 17 {
///         return Err(HandlerError::new("malformed VIN"));
///     }
///     Ok(VinDetails { make: "Ford".to_string() })
/// });
/// ```
pub fn handler_fn<Req, Resp, F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = std::result::Result<Resp, HandlerError>> + Send + 'static,
{
    struct FnHandler<F, Req, Fut> {
        f: F,
        _marker: PhantomData<fn(Req) -> Fut>,
    }

    #[async_trait]
    impl<Req, Resp, F, Fut> JobHandler for FnHandler<F, Req, Fut>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = std::result::Result<Resp, HandlerError>> + Send + 'static,
    {
        async fn run(&self, payload: &JobPayload) -> HandlerResult {
            let req: Req = payload
                .decode()
                .map_err(|e| HandlerError::new(format!("invalid payload: {}", e)))?;
            let resp = (self.f)(req).await?;
            serde_json::to_value(resp)
                .map_err(|e| HandlerError::new(format!("unserializable result: {}", e)))
        }
    }

    Arc::new(FnHandler {
        f,
        _marker: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Deserialize)]
    struct Doubler {
        value: i64,
    }

    #[derive(Serialize)]
    struct Doubled {
        value: i64,
    }

    #[tokio::test]
    async fn typed_handler_round_trip() {
        let handler = handler_fn(|req: Doubler| async move {
            Ok(Doubled {
                value: req.value * 2,
            })
        });

        let result = handler
            .run(&JobPayload::new(json!({"value": 21})))
            .await
            .unwrap();
        assert_eq!(result, json!({"value": 42}));
    }

    #[tokio::test]
    async fn typed_handler_rejects_bad_payload() {
        let handler = handler_fn(|req: Doubler| async move {
            Ok(Doubled {
                value: req.value * 2,
            })
        });

        let err = handler
            .run(&JobPayload::new(json!({"value": "not a number"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid payload"));
    }

    #[tokio::test]
    async fn typed_handler_propagates_handler_errors() {
        let handler = handler_fn(|_req: Doubler| async move {
            Err::<Doubled, _>(HandlerError::new("upstream unavailable"))
        });

        let err = handler
            .run(&JobPayload::new(json!({"value": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "upstream unavailable");
    }
}
