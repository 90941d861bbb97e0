//! # Policy Graph
//!
//! Policies reference each other symbolically inside their assertion XML: include
//! assertions name another policy by path, encapsulated assertions name an encass
//! definition. This module resolves those references against the bundle (and its
//! dependency bundles), rewrites them into gateway identifiers, and orders policies so
//! that every policy is emitted after the policies it depends on.

pub mod ordering;
pub mod preparer;

pub use ordering::policy_order;
pub use preparer::{prepare_policies, PreparedPolicies, PreparedPolicy};

/// Assertion and attribute names rewritten by the preparer
pub mod vocabulary {
    pub const INCLUDE: &str = "L7p:Include";
    pub const POLICY_GUID: &str = "L7p:PolicyGuid";
    pub const ENCAPSULATED: &str = "L7p:Encapsulated";
    pub const ENCASS_PATH: &str = "encassPath";
    pub const ENCASS_CONFIG_GUID: &str = "L7p:EncapsulatedAssertionConfigGuid";
    pub const ENCASS_CONFIG_NAME: &str = "L7p:EncapsulatedAssertionConfigName";
    pub const SET_VARIABLE: &str = "L7p:SetVariable";
    pub const EXPRESSION: &str = "L7p:Expression";
    pub const BASE64_EXPRESSION: &str = "L7p:Base64Expression";
    pub const VARIABLE_TO_SET: &str = "L7p:VariableToSet";
    pub const HARDCODED_RESPONSE: &str = "L7p:HardcodedResponse";
    pub const RESPONSE_BODY: &str = "L7p:ResponseBody";
    pub const BASE64_RESPONSE_BODY: &str = "L7p:Base64ResponseBody";
    pub const STRING_VALUE: &str = "stringValue";
    pub const ENV_PARAM_NAME: &str = "ENV_PARAM_NAME";
}
