//! Configuration loading: text to resolved [`ObjectModel`].
//!
//! Structural problems are fatal and come back as [`LoadError::Parse`] with the
//! line and token from the parser. Everything else (unknown keys, bad values,
//! duplicates, dangling references) becomes a [`Diagnostic`] next to a usable
//! model.

use std::path::Path;

use forticonf_core::{parse, parse_file, ConfigBlock, ConfigTree, ParseError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticLevel};
use crate::model::{ModelBuilder, ObjectModel};
use crate::resolve::resolve;
use crate::sections::{
    is_modeled_nested, read_address, read_address_group, read_central_nat, read_central_snat,
    read_hostname, read_interface, read_ip_pool, read_policy, read_route, read_secondary_ips,
    read_service, read_service_group, read_vip, read_vip_group, read_zone, spec_for, FieldReader,
};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// VDOM to analyze in a multi-VDOM dump. Defaults to `root`, else the first VDOM.
    pub vdom: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("vdom `{requested}` not found (available: {})", available.join(", "))]
    UnknownVdom {
        requested: String,
        available: Vec<String>,
    },
}

/// A parsed tree, its resolved model and every non-fatal diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedConfig {
    #[serde(skip)]
    pub tree: ConfigTree,
    pub model: ObjectModel,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadedConfig {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level() == DiagnosticLevel::Warning)
    }
}

/// Load configuration text.
pub fn load_config(text: &str, options: &LoadOptions) -> Result<LoadedConfig, LoadError> {
    load_tree(parse(text)?, options)
}

/// Load a configuration file.
pub fn load_config_file(path: &Path, options: &LoadOptions) -> Result<LoadedConfig, LoadError> {
    load_tree(parse_file(path)?, options)
}

/// Build the model from an already parsed tree.
pub fn load_tree(tree: ConfigTree, options: &LoadOptions) -> Result<LoadedConfig, LoadError> {
    let mut diagnostics: Vec<Diagnostic> = tree
        .notes
        .iter()
        .map(|note| Diagnostic::UnknownDirective {
            line: note.line,
            directive: note.directive.clone(),
        })
        .collect();

    let builder = {
        let scope = select_scope(&tree, options)?;
        let mut builder = ModelBuilder {
            version: tree.fortios_version(),
            vdom: scope.vdom.clone(),
            ..ModelBuilder::default()
        };
        for block in &scope.blocks {
            load_block(block, scope.vdom.as_deref(), &mut builder, &mut diagnostics);
        }
        builder
    };

    let (model, resolution) = resolve(builder);
    diagnostics.extend(resolution);
    debug!(
        policies = model.policies().len(),
        diagnostics = diagnostics.len(),
        "configuration loaded"
    );

    Ok(LoadedConfig {
        tree,
        model,
        diagnostics,
    })
}

struct Scope<'a> {
    vdom: Option<String>,
    blocks: Vec<&'a ConfigBlock>,
}

/// Pick the blocks that make up the analyzed VDOM.
///
/// A multi-VDOM dump nests each VDOM's sections under `config vdom` > `edit <name>`
/// and keeps shared sections (interfaces, global settings) under `config global`.
fn select_scope<'a>(tree: &'a ConfigTree, options: &LoadOptions) -> Result<Scope<'a>, LoadError> {
    let mut vdoms: Vec<(&str, Vec<&'a ConfigBlock>)> = Vec::new();
    for block in tree.blocks.iter().filter(|b| b.section == "vdom") {
        for entry in block.entries.iter().filter(|e| !e.blocks.is_empty()) {
            match vdoms.iter_mut().find(|(name, _)| *name == entry.name) {
                Some((_, blocks)) => blocks.extend(entry.blocks.iter()),
                None => vdoms.push((entry.name.as_str(), entry.blocks.iter().collect())),
            }
        }
    }

    if vdoms.is_empty() {
        if let Some(requested) = options.vdom.as_deref().filter(|v| *v != "root") {
            return Err(LoadError::UnknownVdom {
                requested: requested.to_string(),
                available: vec!["root".to_string()],
            });
        }
        return Ok(Scope {
            vdom: None,
            blocks: tree
                .blocks
                .iter()
                .filter(|b| b.section != "vdom" && b.section != "global")
                .collect(),
        });
    }

    let available: Vec<String> = vdoms.iter().map(|(name, _)| name.to_string()).collect();
    let selected = match options.vdom.as_deref() {
        Some(requested) => vdoms
            .iter()
            .position(|(name, _)| *name == requested)
            .ok_or_else(|| LoadError::UnknownVdom {
                requested: requested.to_string(),
                available: available.clone(),
            })?,
        None => vdoms
            .iter()
            .position(|(name, _)| *name == "root")
            .unwrap_or(0),
    };

    let (name, vdom_blocks) = vdoms.swap_remove(selected);
    debug!(vdom = name, available = ?available, "selected vdom");
    let mut blocks: Vec<&'a ConfigBlock> = tree
        .block("global")
        .map(|g| g.blocks.iter().collect())
        .unwrap_or_default();
    blocks.extend(vdom_blocks);
    Ok(Scope {
        vdom: Some(name.to_string()),
        blocks,
    })
}

fn load_block(
    block: &ConfigBlock,
    vdom: Option<&str>,
    builder: &mut ModelBuilder,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(spec) = spec_for(&block.section) else {
        debug!(section = %block.section, line = block.line, "skipping unmodeled section");
        diagnostics.push(Diagnostic::SkippedSection {
            line: block.line,
            section: block.section.clone(),
        });
        return;
    };
    debug!(section = spec.path, entries = block.entries.len(), "loading section");

    if spec.known_keys.is_some() {
        for setting in &block.settings {
            diagnostics.push(Diagnostic::UnknownKey {
                line: setting.line,
                section: block.section.clone(),
                entry: String::new(),
                key: setting.key.clone(),
            });
        }
    }
    for nested in &block.blocks {
        diagnostics.push(Diagnostic::SkippedBlock {
            line: nested.line,
            section: block.section.clone(),
            entry: String::new(),
            block: nested.section.clone(),
        });
    }

    match spec.path {
        "system global" => {
            if let Some(hostname) = read_hostname(block) {
                builder.hostname = Some(hostname);
            }
            return;
        }
        "system settings" => {
            builder.central_nat = read_central_nat(block);
            return;
        }
        _ => {}
    }

    for entry in &block.entries {
        let mut reader = FieldReader::new(&block.section, entry, diagnostics);
        reader.check_keys(spec);
        match spec.path {
            "system interface" => {
                let mut iface = read_interface(&mut reader);
                if let (Some(scope), Some(owner)) = (vdom, iface.vdom.as_deref()) {
                    if scope != owner {
                        debug!(interface = %iface.name, owner, "interface belongs to another vdom");
                        continue;
                    }
                }
                iface.secondary = read_secondary_ips(entry, diagnostics);
                builder.insert(iface, diagnostics);
            }
            "system zone" => builder.insert(read_zone(&mut reader), diagnostics),
            "firewall address" => builder.insert(read_address(&mut reader), diagnostics),
            "firewall addrgrp" => builder.insert(read_address_group(&mut reader), diagnostics),
            "firewall service custom" => builder.insert(read_service(&mut reader), diagnostics),
            "firewall service group" => {
                builder.insert(read_service_group(&mut reader), diagnostics)
            }
            "firewall policy" => builder.insert(read_policy(&mut reader), diagnostics),
            "router static" => builder.insert(read_route(&mut reader), diagnostics),
            "firewall vip" => builder.insert(read_vip(&mut reader), diagnostics),
            "firewall vipgrp" => builder.insert(read_vip_group(&mut reader), diagnostics),
            "firewall ippool" => builder.insert(read_ip_pool(&mut reader), diagnostics),
            "firewall central-snat-map" => {
                builder.insert(read_central_snat(&mut reader), diagnostics)
            }
            _ => {}
        }
        for nested in entry
            .blocks
            .iter()
            .filter(|b| !is_modeled_nested(spec.path, &b.section))
        {
            diagnostics.push(Diagnostic::SkippedBlock {
                line: nested.line,
                section: block.section.clone(),
                entry: entry.name.clone(),
                block: nested.section.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::{load_config, LoadError, LoadOptions};
    use crate::diagnostics::Diagnostic;
    use crate::model::{AddressKind, ObjectKind};
    use crate::trace::lookup_route;

    const SAMPLE: &str = r#"config system global
    set hostname "fw-lab"
end
config firewall address
    edit "web"
        set subnet 10.0.0.10 255.255.255.255
    next
    edit "db"
        set subnet 10.0.0.20 255.255.255.255
    next
    edit "web"
        set subnet 10.0.0.11 255.255.255.255
    next
end
config firewall addrgrp
    edit "servers"
        set member "web" "db"
    next
end
config firewall policy
    edit 1
        set srcintf "any"
        set dstintf "any"
        set srcaddr "all"
        set dstaddr "servers"
        set action accept
        set service "ALL"
    next
end
config system dns
    set primary 1.1.1.1
end
"#;

    #[test]
    fn loads_entities_in_declaration_order_with_diagnostics() {
        let loaded = load_config(SAMPLE, &LoadOptions::default()).expect("load");
        let model = &loaded.model;

        assert_eq!(model.hostname(), Some("fw-lab"));
        let names: Vec<&str> = model.addresses().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["web", "db", "servers"]);
        let web = model.find::<crate::model::Address>("web").expect("web");
        assert!(matches!(
            web.kind,
            AddressKind::Subnet(net) if net.ip() == Ipv4Addr::new(10, 0, 0, 11)
        ));

        assert!(loaded.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::DuplicateName { kind: ObjectKind::Address, name, first_line: 5, line: 11 } if name == "web"
        )));
        assert!(loaded.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::SkippedSection { section, .. } if section == "system dns"
        )));
    }

    #[test]
    fn address_and_group_share_one_namespace() {
        let text = "config firewall address\nedit dup\nset subnet 10.0.0.1/32\nnext\nend\nconfig firewall addrgrp\nedit dup\nset member x\nnext\nend\n";
        let loaded = load_config(text, &LoadOptions::default()).expect("load");
        assert_eq!(loaded.model.addresses().len(), 1);
        assert!(loaded.model.addresses()[0].is_group());
    }

    #[test]
    fn fatal_parse_errors_pass_through() {
        let err = load_config("config firewall policy\nedit 1\nend\n", &LoadOptions::default())
            .expect_err("must fail");
        assert!(matches!(err, LoadError::Parse(_)));
        assert!(err.to_string().starts_with("line 3:"));
    }

    const NESTED: &str = r#"config system interface
    edit "port1"
        set ip 10.1.0.1 255.255.255.0
        config secondaryip
            edit 1
                set ip 10.9.0.1 255.255.255.0
                set allowaccess ping
            next
        end
        config ipv6
            set ip6-mode static
        end
    next
end
config firewall policy
    set default-action deny
    config extra
    end
    edit 1
        set srcintf "port1"
        set dstintf "port1"
        set srcaddr "all"
        set dstaddr "all"
        set service "ALL"
        set action accept
    next
end
"#;

    #[test]
    fn secondary_ips_become_connected_subnets() {
        let loaded = load_config(NESTED, &LoadOptions::default()).expect("load");
        let port1 = loaded
            .model
            .find::<crate::model::Interface>("port1")
            .expect("port1");
        assert_eq!(port1.secondary.len(), 1);

        let route = lookup_route(&loaded.model, Ipv4Addr::new(10, 9, 0, 5)).expect("route");
        assert_eq!(route.name, "connected port1");
        assert!(!loaded.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::SkippedBlock { block, .. } if block == "secondaryip"
        )));
    }

    #[test]
    fn unmodeled_nested_block_in_an_entry_is_reported() {
        let loaded = load_config(NESTED, &LoadOptions::default()).expect("load");
        assert!(loaded.diagnostics.contains(&Diagnostic::SkippedBlock {
            line: 10,
            section: "system interface".to_string(),
            entry: "port1".to_string(),
            block: "ipv6".to_string(),
        }));
    }

    #[test]
    fn section_level_settings_and_blocks_are_reported() {
        let loaded = load_config(NESTED, &LoadOptions::default()).expect("load");
        assert!(loaded.diagnostics.contains(&Diagnostic::UnknownKey {
            line: 16,
            section: "firewall policy".to_string(),
            entry: String::new(),
            key: "default-action".to_string(),
        }));
        assert!(loaded.diagnostics.contains(&Diagnostic::SkippedBlock {
            line: 17,
            section: "firewall policy".to_string(),
            entry: String::new(),
            block: "extra".to_string(),
        }));
        assert_eq!(loaded.model.policies().len(), 1);
    }

    #[test]
    fn unknown_vdom_is_an_error_for_flat_configs() {
        let err = load_config(
            SAMPLE,
            &LoadOptions {
                vdom: Some("tenant".to_string()),
            },
        )
        .expect_err("must fail");
        assert!(matches!(err, LoadError::UnknownVdom { .. }));
    }
}
