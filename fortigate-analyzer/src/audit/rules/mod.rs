mod groups;
mod policy;
mod references;
mod shadowing;

pub use groups::{DeepGroupNesting, EmptyGroup, GroupCycle};
pub use policy::{AnyInterface, DisabledPolicy, LoggingDisabled, OverlyPermissive};
pub use references::{UnresolvedReference, UnusedObject};
pub use shadowing::ShadowedPolicy;

#[cfg(test)]
pub(crate) mod fixture {
    use crate::audit::{AuditConfig, AuditRule, Finding};
    use crate::load::{load_config, LoadOptions};
    use crate::model::ObjectModel;

    pub fn basic() -> ObjectModel {
        model(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../fixtures/fortigate-basic.conf"
        )))
    }

    pub fn model(text: &str) -> ObjectModel {
        load_config(text, &LoadOptions::default())
            .expect("load")
            .model
    }

    pub fn run(rule: &dyn AuditRule, model: &ObjectModel) -> Vec<Finding> {
        rule.evaluate(model, &AuditConfig::default())
    }

    pub fn entities(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.entity.name.as_str()).collect()
    }
}
