//! Rule-based expression validator engine.
//!
//! Classifies a captured user value (plus the variable bag around it) into
//! one of an ordered set of named routes. Each route combines regex, tag,
//! rule, guard-expression and external-hook modes; the first route whose
//! modes all pass wins, otherwise the default output applies.
//!
//! # Example
//! ```
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! use flowcert_validator::ValidatorEngine;
//! use serde_json::json;
//!
//! let engine = ValidatorEngine::from_json(r#"{
//!     "routes": [{"go": "yes", "modes": {"tags": [
//!         {"field": "answer", "match": ["sim", "yes"], "strategy": "contains"}
//!     ]}}],
//!     "default_output": "no"
//! }"#).unwrap();
//! let vars = json!({"answer": "Sim, pode ser"}).as_object().cloned().unwrap();
//! assert_eq!(engine.evaluate(&vars).await.unwrap().output(), "yes");
//! # });
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod hook;
pub mod normalize;
pub mod rules;
pub mod supervise;
pub mod tags;

pub use config::{
    EngineConfig, HookMode, Logic, ModesConfig, RegexMode, RouteConfig, Rule, RuleOp, RuleSet, TagMode,
    TagStrategy,
};
pub use engine::{Decision, ValidatorEngine};
pub use hook::{
    HookClient, HookReply, HookRequest, HookResponse, HookTransport, ReqwestTransport, DEFAULT_HOOK_TIMEOUT,
};
pub use normalize::Normalize;
pub use supervise::{supervise, DEFAULT_REGEX_TIMEOUT};
