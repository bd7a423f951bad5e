//! The middleware layer chain

use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed next function for middleware chains
pub type BoxedNext =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> + Send + Sync>;

/// Trait for request middleware
///
/// A layer receives the request and the rest of the chain. It may answer the
/// request itself (e.g. a 401 from an authentication layer) or call `next`
/// and inspect or replace the response it returns.
pub trait MiddlewareLayer: Send + Sync + 'static {
    /// Apply this middleware to a request, calling `next` to continue the chain
    fn call(
        &self,
        req: Request,
        next: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

    /// Clone this middleware into a boxed trait object
    fn clone_box(&self) -> Box<dyn MiddlewareLayer>;
}

impl Clone for Box<dyn MiddlewareLayer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A stack of middleware layers
#[derive(Clone, Default)]
pub struct LayerStack {
    layers: Vec<Box<dyn MiddlewareLayer>>,
}

impl LayerStack {
    /// Create a new empty layer stack
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a middleware layer to the stack
    ///
    /// Layers are executed in the order they are added (outermost first).
    pub fn push(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.push(layer);
    }

    /// Add a middleware layer to the beginning of the stack
    ///
    /// This layer will be executed first (outermost).
    pub fn prepend(&mut self, layer: Box<dyn MiddlewareLayer>) {
        self.layers.insert(0, layer);
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Get the number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Execute the middleware stack with a final handler
    pub fn execute(
        &self,
        req: Request,
        handler: BoxedNext,
    ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
        if self.layers.is_empty() {
            return handler(req);
        }

        // Build the chain from inside out so the first layer ends up outermost
        let mut next = handler;

        for layer in self.layers.iter().rev() {
            let layer = layer.clone_box();
            let current_next = next;
            next = Arc::new(move |req: Request| {
                let layer = layer.clone_box();
                let next = current_next.clone();
                Box::pin(async move { layer.call(req, next).await })
                    as Pin<Box<dyn Future<Output = Response> + Send + 'static>>
            });
        }

        next(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Method, StatusCode};
    use proptest::prelude::*;
    use proptest::test_runner::TestCaseError;
    use std::sync::Mutex;

    fn create_test_request(method: Method, path: &str) -> Request {
        let req = http::Request::builder()
            .method(method)
            .uri(path)
            .body(())
            .unwrap();
        Request::from_http_request(req, Bytes::new())
    }

    fn status_handler(status: StatusCode) -> BoxedNext {
        Arc::new(move |_req: Request| {
            Box::pin(async move {
                http::Response::builder()
                    .status(status)
                    .body(http_body_util::Full::new(Bytes::from("test")))
                    .unwrap()
            }) as Pin<Box<dyn Future<Output = Response> + Send + 'static>>
        })
    }

    type Order = Arc<Mutex<Vec<(usize, &'static str)>>>;

    #[derive(Clone)]
    struct OrderTrackingMiddleware {
        id: usize,
        order: Order,
    }

    impl MiddlewareLayer for OrderTrackingMiddleware {
        fn call(
            &self,
            req: Request,
            next: BoxedNext,
        ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
            let id = self.id;
            let order = self.order.clone();

            Box::pin(async move {
                order.lock().unwrap().push((id, "pre"));
                let response = next(req).await;
                order.lock().unwrap().push((id, "post"));
                response
            })
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    /// Answers every request itself without calling the rest of the chain
    #[derive(Clone)]
    struct ShortCircuit;

    impl MiddlewareLayer for ShortCircuit {
        fn call(
            &self,
            _req: Request,
            _next: BoxedNext,
        ) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>> {
            Box::pin(async {
                http::Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .body(http_body_util::Full::new(Bytes::new()))
                    .unwrap()
            })
        }

        fn clone_box(&self) -> Box<dyn MiddlewareLayer> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn test_empty_layer_stack_calls_handler_directly() {
        let stack = LayerStack::new();
        let response = stack
            .execute(
                create_test_request(Method::GET, "/test"),
                status_handler(StatusCode::OK),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_inner_layers() {
        let order: Order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.push(Box::new(ShortCircuit));
        stack.push(Box::new(OrderTrackingMiddleware {
            id: 1,
            order: order.clone(),
        }));

        let response = stack
            .execute(
                create_test_request(Method::PUT, "/api/widgets/1"),
                status_handler(StatusCode::OK),
            )
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepend_runs_first() {
        let order: Order = Arc::new(Mutex::new(Vec::new()));
        let mut stack = LayerStack::new();
        stack.push(Box::new(OrderTrackingMiddleware {
            id: 1,
            order: order.clone(),
        }));
        stack.prepend(Box::new(OrderTrackingMiddleware {
            id: 0,
            order: order.clone(),
        }));
        assert_eq!(stack.len(), 2);

        stack
            .execute(
                create_test_request(Method::GET, "/"),
                status_handler(StatusCode::OK),
            )
            .await;

        assert_eq!(
            *order.lock().unwrap(),
            vec![(0, "pre"), (1, "pre"), (1, "post"), (0, "post")]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_layers_nest_in_registration_order(
            num_layers in 1usize..8usize,
            handler_status in 200u16..600u16,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let order: Order = Arc::new(Mutex::new(Vec::new()));
                let mut stack = LayerStack::new();
                for id in 0..num_layers {
                    stack.push(Box::new(OrderTrackingMiddleware { id, order: order.clone() }));
                }

                let status = StatusCode::from_u16(handler_status).unwrap_or(StatusCode::OK);
                let response = stack
                    .execute(create_test_request(Method::GET, "/test"), status_handler(status))
                    .await;
                prop_assert_eq!(response.status(), status);

                let order = order.lock().unwrap();
                prop_assert_eq!(order.len(), num_layers * 2);
                for i in 0..num_layers {
                    prop_assert_eq!(order[i], (i, "pre"));
                    prop_assert_eq!(order[num_layers + i], (num_layers - 1 - i, "post"));
                }
                Ok(())
            });
            result?;
        }
    }
}
