use std::cell::RefCell;

use boa_engine::{
    Context, JsNativeError, JsResult, JsString, Module,
    module::{ModuleLoader, Referrer},
};

use crate::bridge::BRIDGE_MODULE_SPECIFIER;

/// Module loader for probe scripts.
///
/// Resolves only the bridge module. Every other specifier is refused.
#[derive(Default)]
pub struct BridgeModuleLoader {
    bridge: RefCell<Option<Module>>,
}

impl std::fmt::Debug for BridgeModuleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeModuleLoader")
            .field("installed", &self.bridge.borrow().is_some())
            .finish()
    }
}

impl BridgeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_bridge(&self, module: Module) {
        self.bridge.replace(Some(module));
    }

    fn resolve(&self, specifier: &str) -> JsResult<Module> {
        if specifier != BRIDGE_MODULE_SPECIFIER {
            let message =
                format!("importing foreign modules is not supported in probe scripts: {specifier}");
            return Err(JsNativeError::typ().with_message(message).into());
        }

        self.bridge.borrow().clone().ok_or_else(|| {
            JsNativeError::error()
                .with_message("probe bridge has not been installed")
                .into()
        })
    }
}

impl ModuleLoader for BridgeModuleLoader {
    fn load_imported_module(
        &self,
        _referrer: Referrer,
        specifier: JsString,
        finish_load: Box<dyn FnOnce(JsResult<Module>, &mut Context)>,
        context: &mut Context,
    ) {
        let specifier = specifier.to_std_string_escaped();
        let result = self.resolve(&specifier);
        if result.is_err() {
            tracing::debug!(%specifier, "rejected module import");
        }
        finish_load(result, context);
    }
}
