use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::{
    Error as GenericJsError,
    RangeError as JsRangeError,
    ReferenceError as JsReferenceError,
    SyntaxError as JsSyntaxError,
    TypeError as JsTypeError,
    UriError as JsUriError,
};
use worker_core::WorkerError;

/// A thrown JS value, classified by its constructor
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("GenericJs Error: {0}")]
    GenericJs(String),
    #[error("JsRange Error: {0}")]
    JsRange(String),
    #[error("JsReference Error: {0}")]
    JsReference(String),
    #[error("JsSyntax Error: {0}")]
    JsSyntax(String),
    #[error("JsType Error: {0}")]
    JsType(String),
    #[error("JsUri Error: {0}")]
    JsUri(String),
    #[error("UnknownJsValue Error: {0}")]
    UnknownJsValue(String),
}

fn message(err: &JsValue) -> String {
    String::from(err.unchecked_ref::<GenericJsError>().message())
}

impl From<JsValue> for JsError {
    fn from(err: JsValue) -> JsError {
        if err.is_instance_of::<JsRangeError>() {
            return JsError::JsRange(message(&err));
        }
        if err.is_instance_of::<JsReferenceError>() {
            return JsError::JsReference(message(&err));
        }
        if err.is_instance_of::<JsSyntaxError>() {
            return JsError::JsSyntax(message(&err));
        }
        // fetch() rejects with a TypeError when the network is down
        if err.is_instance_of::<JsTypeError>() {
            return JsError::JsType(message(&err));
        }
        if err.is_instance_of::<JsUriError>() {
            return JsError::JsUri(message(&err));
        }
        if err.is_instance_of::<GenericJsError>() {
            return JsError::GenericJs(message(&err));
        }
        JsError::UnknownJsValue(format!("{:?}", err))
    }
}

/// Converts the `Err(JsValue)` of a web-sys call into the matching
/// `WorkerError`
pub trait JsResultExt<T> {
    fn network(self, url: &str) -> Result<T, WorkerError>;
    fn cache(self, cache: &str) -> Result<T, WorkerError>;
    fn clients(self) -> Result<T, WorkerError>;
    fn notification(self) -> Result<T, WorkerError>;
}

impl<T> JsResultExt<T> for Result<T, JsValue> {
    fn network(self, url: &str) -> Result<T, WorkerError> {
        self.map_err(|e| WorkerError::network(url, JsError::from(e)))
    }

    fn cache(self, cache: &str) -> Result<T, WorkerError> {
        self.map_err(|e| WorkerError::cache(cache, JsError::from(e)))
    }

    fn clients(self) -> Result<T, WorkerError> {
        self.map_err(|e| WorkerError::Clients(JsError::from(e).to_string()))
    }

    fn notification(self) -> Result<T, WorkerError> {
        self.map_err(|e| WorkerError::Notification(JsError::from(e).to_string()))
    }
}

/// Rejection value handed back to the JS bootstrap
pub fn to_js(err: WorkerError) -> JsValue {
    GenericJsError::new(&err.to_string()).into()
}
