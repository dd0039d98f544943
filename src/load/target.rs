use std::fmt;

use crate::hub::CallbackHandler;

pub(crate) const CALLBACK_HANDLER_MISSING: &str =
    "A callback handler should be provided if a callback method name is provided";
pub(crate) const CALLBACK_METHOD_MISSING: &str =
    "A callback method name should be provided if a callback handler is provided";

/// What every connection talks to: endpoint, hub, method and arguments
#[derive(Clone)]
pub struct HubTarget {
    /// Hub endpoint URL, e.g. `http://localhost:3932/`
    pub endpoint: String,
    /// Hub name appended to the endpoint
    pub hub: String,
    /// Hub method invoked by every connection
    pub method: String,
    /// Argument templates; see [`resolve_parameters`](super::resolve_parameters)
    pub parameters: Vec<String>,
    /// Server push to listen for
    pub callback_method: Option<String>,
    pub callback_handler: Option<CallbackHandler>,
}

impl HubTarget {
    pub fn new(
        endpoint: impl Into<String>,
        hub: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            hub: hub.into(),
            method: method.into(),
            parameters: Vec::new(),
            callback_method: None,
            callback_handler: None,
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_callback(self, method: impl Into<String>, handler: CallbackHandler) -> Self {
        self.with_callback_method(method).with_callback_handler(handler)
    }

    /// An empty name counts as no callback
    pub fn with_callback_method(mut self, method: impl Into<String>) -> Self {
        let method = method.into();
        self.callback_method = (!method.is_empty()).then_some(method);
        self
    }

    pub fn with_callback_handler(mut self, handler: CallbackHandler) -> Self {
        self.callback_handler = Some(handler);
        self
    }

    /// Endpoint, hub and method are all set
    pub fn is_complete(&self) -> bool {
        !self.endpoint.is_empty() && !self.hub.is_empty() && !self.method.is_empty()
    }

    /// Callback name and handler must come together
    pub fn callback_violations(&self) -> Vec<&'static str> {
        match (&self.callback_method, &self.callback_handler) {
            (Some(_), None) => vec![CALLBACK_HANDLER_MISSING],
            (None, Some(_)) => vec![CALLBACK_METHOD_MISSING],
            _ => Vec::new(),
        }
    }

    /// Registered callback, if both halves are present
    pub fn callback(&self) -> Option<(&str, &CallbackHandler)> {
        match (&self.callback_method, &self.callback_handler) {
            (Some(method), Some(handler)) => Some((method.as_str(), handler)),
            _ => None,
        }
    }
}

impl fmt::Debug for HubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubTarget")
            .field("endpoint", &self.endpoint)
            .field("hub", &self.hub)
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .field("callback_method", &self.callback_method)
            .field("callback_handler", &self.callback_handler.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handler() -> CallbackHandler {
        Arc::new(|_| {})
    }

    #[test]
    fn test_complete_target() {
        let target = HubTarget::new("http://localhost:3932/", "timeHub", "broadCastTime");
        assert!(target.is_complete());
        assert!(target.callback_violations().is_empty());
        assert!(target.callback().is_none());
    }

    #[test]
    fn test_incomplete_target() {
        assert!(!HubTarget::new("", "timeHub", "broadCastTime").is_complete());
        assert!(!HubTarget::new("http://x/", "", "broadCastTime").is_complete());
        assert!(!HubTarget::new("http://x/", "timeHub", "").is_complete());
    }

    #[test]
    fn test_callback_name_without_handler() {
        let target = HubTarget::new("http://x/", "h", "m").with_callback_method("timeTick");
        assert_eq!(target.callback_violations(), vec![CALLBACK_HANDLER_MISSING]);
    }

    #[test]
    fn test_handler_without_callback_name() {
        let target = HubTarget::new("http://x/", "h", "m").with_callback_handler(handler());
        assert_eq!(target.callback_violations(), vec![CALLBACK_METHOD_MISSING]);
    }

    #[test]
    fn test_empty_callback_name_is_ignored() {
        let target = HubTarget::new("http://x/", "h", "m").with_callback_method("");
        assert!(target.callback_method.is_none());
        assert!(target.callback_violations().is_empty());
    }

    #[test]
    fn test_paired_callback() {
        let target = HubTarget::new("http://x/", "h", "m").with_callback("timeTick", handler());
        let (method, _) = target.callback().unwrap();
        assert_eq!(method, "timeTick");
    }

    #[test]
    fn test_debug_hides_handler() {
        let target = HubTarget::new("http://x/", "h", "m").with_callback("timeTick", handler());
        let printed = format!("{:?}", target);
        assert!(printed.contains("<handler>"));
    }
}
