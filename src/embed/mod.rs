//! Embedded static resources.
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{CLIENT_JS, ClientVars};
//!
//! let js = CLIENT_JS.render(&ClientVars { ws_port: 5174 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// URL of the dev client module.
    pub const CLIENT_PATH: &str = "/@weft/client.js";

    /// URL of the dev module registry.
    pub const REGISTRY_PATH: &str = "/@weft/registry.json";

    /// Inline stub injected into documents that opt out of HMR.
    pub const MODULES_STUB: &str = "window.__weft_modules = {}";

    /// Variables for client.js.
    pub struct ClientVars {
        pub ws_port: u16,
    }

    impl TemplateVars for ClientVars {
        fn pairs(&self) -> Vec<(&'static str, String)> {
            vec![("__WEFT_WS_PORT__", self.ws_port.to_string())]
        }
    }

    /// Dev client with WebSocket port injection.
    pub const CLIENT_JS: Template<ClientVars> =
        Template::new(include_str!(concat!(env!("OUT_DIR"), "/client.min.js")));
}
