use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::diagnostics::Diagnostic;
use crate::model::{
    Address, AddressKind, Entity, Expansion, Handle, ModelBuilder, ObjectKind, ObjectModel,
    Reference, Service, ServiceKind, Target,
};

/// Which reserved wildcard tokens a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wildcard {
    None,
    Interface,
    Address,
    Service,
}

/// True for names that FortiOS treats as "match everything" for the kind.
pub fn is_reserved_name(kind: ObjectKind, name: &str) -> bool {
    let wildcard = match kind {
        ObjectKind::Interface | ObjectKind::Zone => Wildcard::Interface,
        ObjectKind::Address => Wildcard::Address,
        ObjectKind::Service => Wildcard::Service,
        _ => Wildcard::None,
    };
    is_wildcard(wildcard, name)
}

fn is_wildcard(wildcard: Wildcard, name: &str) -> bool {
    match wildcard {
        Wildcard::None => false,
        Wildcard::Interface => name.eq_ignore_ascii_case("any"),
        Wildcard::Address => name.eq_ignore_ascii_case("all") || name.eq_ignore_ascii_case("any"),
        Wildcard::Service => name.eq_ignore_ascii_case("ALL") || name.eq_ignore_ascii_case("any"),
    }
}

struct Resolver {
    index: HashMap<(ObjectKind, String), usize>,
    unresolved: usize,
}

impl Resolver {
    fn lookup(&self, kinds: &[ObjectKind], name: &str) -> Option<Handle> {
        kinds.iter().find_map(|&kind| {
            self.index
                .get(&(kind, name.to_string()))
                .map(|&index| Handle { kind, index })
        })
    }

    /// Bind one reference. Wildcards win over same-named objects.
    fn bind(&self, reference: &mut Reference, wildcard: Wildcard, kinds: &[ObjectKind]) {
        reference.target = if is_wildcard(wildcard, &reference.name) {
            Target::Any
        } else {
            self.lookup(kinds, &reference.name)
                .map_or(Target::Unresolved, Target::Object)
        };
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_all(
        &mut self,
        owner_kind: ObjectKind,
        owner: &str,
        field: &str,
        references: &mut [Reference],
        wildcard: Wildcard,
        kinds: &[ObjectKind],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for reference in references {
            self.bind(reference, wildcard, kinds);
            if reference.is_unresolved() {
                self.unresolved += 1;
                diagnostics.push(Diagnostic::UnresolvedReference {
                    kind: owner_kind,
                    owner: owner.to_string(),
                    field: field.to_string(),
                    name: reference.name.clone(),
                });
            }
        }
    }
}

const INTERFACE_OR_ZONE: &[ObjectKind] = &[ObjectKind::Zone, ObjectKind::Interface];
const ADDRESS: &[ObjectKind] = &[ObjectKind::Address];
const DESTINATION: &[ObjectKind] = &[ObjectKind::Address, ObjectKind::Vip, ObjectKind::VipGroup];
const SERVICE: &[ObjectKind] = &[ObjectKind::Service];
const POOL: &[ObjectKind] = &[ObjectKind::IpPool];
const INTERFACE: &[ObjectKind] = &[ObjectKind::Interface];
const VIP: &[ObjectKind] = &[ObjectKind::Vip];

/// Resolve every reference and freeze the builder into an [`ObjectModel`].
///
/// Group expansion walks explicit stacks, never the call stack.
pub fn resolve(builder: ModelBuilder) -> (ObjectModel, Vec<Diagnostic>) {
    let mut model = ObjectModel {
        hostname: builder.hostname,
        version: builder.version,
        vdom: builder.vdom,
        central_nat: builder.central_nat,
        interfaces: builder.interfaces,
        zones: builder.zones,
        addresses: builder.addresses,
        services: builder.services,
        policies: builder.policies,
        routes: builder.routes,
        vips: builder.vips,
        vip_groups: builder.vip_groups,
        ip_pools: builder.ip_pools,
        central_snat: builder.central_snat,
        ..ObjectModel::default()
    };
    let mut resolver = Resolver {
        index: build_index(&model),
        unresolved: 0,
    };
    let mut diagnostics = Vec::new();

    bind_zones(&mut model, &mut resolver, &mut diagnostics);
    bind_groups(&mut model, &mut resolver, &mut diagnostics);
    bind_policies(&mut model, &mut resolver, &mut diagnostics);
    bind_nat_objects(&mut model, &mut resolver, &mut diagnostics);

    let address_names: Vec<&str> = model.addresses.iter().map(Entity::name).collect();
    let address_members: Vec<Option<&[Reference]>> = model
        .addresses
        .iter()
        .map(|a| a.is_group().then(|| a.members()))
        .collect();
    let address_expansions = expand_groups(
        ObjectKind::Address,
        &address_names,
        &address_members,
        &mut diagnostics,
    );

    let service_names: Vec<&str> = model.services.iter().map(Entity::name).collect();
    let service_members: Vec<Option<&[Reference]>> = model
        .services
        .iter()
        .map(|s| s.is_group().then(|| s.members()))
        .collect();
    let service_expansions = expand_groups(
        ObjectKind::Service,
        &service_names,
        &service_members,
        &mut diagnostics,
    );

    debug!(
        unresolved = resolver.unresolved,
        address_groups = address_expansions.len(),
        service_groups = service_expansions.len(),
        "references resolved"
    );
    model.address_expansions = address_expansions;
    model.service_expansions = service_expansions;
    model.index = resolver.index;
    (model, diagnostics)
}

fn build_index(model: &ObjectModel) -> HashMap<(ObjectKind, String), usize> {
    fn add<T: Entity>(index: &mut HashMap<(ObjectKind, String), usize>, items: &[T]) {
        for (i, item) in items.iter().enumerate() {
            index.insert((T::KIND, item.name().to_string()), i);
        }
    }

    let mut index = HashMap::new();
    add(&mut index, &model.interfaces);
    add(&mut index, &model.zones);
    add(&mut index, &model.addresses);
    add(&mut index, &model.services);
    add(&mut index, &model.policies);
    add(&mut index, &model.routes);
    add(&mut index, &model.vips);
    add(&mut index, &model.vip_groups);
    add(&mut index, &model.ip_pools);
    add(&mut index, &model.central_snat);
    index
}

/// Bind zone members and claim interfaces. The first zone listing an interface keeps it.
fn bind_zones(model: &mut ObjectModel, resolver: &mut Resolver, diagnostics: &mut Vec<Diagnostic>) {
    let mut claims: BTreeMap<usize, usize> = BTreeMap::new();
    for (zone_index, zone) in model.zones.iter_mut().enumerate() {
        resolver.bind_all(
            ObjectKind::Zone,
            &zone.name,
            "interface",
            &mut zone.members,
            Wildcard::None,
            INTERFACE,
            diagnostics,
        );
        for member in &zone.members {
            let Some(handle) = member.handle() else {
                continue;
            };
            match claims.get(&handle.index) {
                Some(&owner) if owner != zone_index => {
                    diagnostics.push(Diagnostic::ZoneConflict {
                        interface: member.name.clone(),
                        zone: zone.name.clone(),
                        claimed_by: String::new(),
                    });
                }
                Some(_) => {}
                None => {
                    claims.insert(handle.index, zone_index);
                }
            }
        }
    }

    for diagnostic in diagnostics.iter_mut() {
        if let Diagnostic::ZoneConflict {
            interface,
            claimed_by,
            ..
        } = diagnostic
        {
            if !claimed_by.is_empty() {
                continue;
            }
            let owner = resolver
                .lookup(INTERFACE, interface)
                .and_then(|h| claims.get(&h.index))
                .and_then(|&z| model.zones.get(z));
            if let Some(owner) = owner {
                warn!(interface = %interface, zone = %owner.name, "interface claimed by two zones");
                claimed_by.clone_from(&owner.name);
            }
        }
    }

    for (interface_index, zone_index) in claims {
        if let Some(iface) = model.interfaces.get_mut(interface_index) {
            iface.zone = Some(Handle {
                kind: ObjectKind::Zone,
                index: zone_index,
            });
        }
    }
}

fn bind_groups(
    model: &mut ObjectModel,
    resolver: &mut Resolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for address in &mut model.addresses {
        let Address { name, kind, .. } = address;
        if let AddressKind::Group(members) = kind {
            resolver.bind_all(
                ObjectKind::Address,
                name,
                "member",
                members,
                Wildcard::Address,
                ADDRESS,
                diagnostics,
            );
        }
    }
    for service in &mut model.services {
        let Service { name, kind, .. } = service;
        if let ServiceKind::Group(members) = kind {
            resolver.bind_all(
                ObjectKind::Service,
                name,
                "member",
                members,
                Wildcard::Service,
                SERVICE,
                diagnostics,
            );
        }
    }
    for group in &mut model.vip_groups {
        resolver.bind(&mut group.interface, Wildcard::Interface, INTERFACE_OR_ZONE);
        resolver.bind_all(
            ObjectKind::VipGroup,
            &group.name,
            "member",
            &mut group.members,
            Wildcard::None,
            VIP,
            diagnostics,
        );
    }
}

fn bind_policies(
    model: &mut ObjectModel,
    resolver: &mut Resolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let kind = ObjectKind::Policy;
    for policy in &mut model.policies {
        let owner = policy.name.as_str();
        let fields: [(&str, &mut Vec<Reference>, Wildcard, &[ObjectKind]); 6] = [
            ("srcintf", &mut policy.srcintf, Wildcard::Interface, INTERFACE_OR_ZONE),
            ("dstintf", &mut policy.dstintf, Wildcard::Interface, INTERFACE_OR_ZONE),
            ("srcaddr", &mut policy.srcaddr, Wildcard::Address, ADDRESS),
            ("dstaddr", &mut policy.dstaddr, Wildcard::Address, DESTINATION),
            ("service", &mut policy.service, Wildcard::Service, SERVICE),
            ("poolname", &mut policy.poolname, Wildcard::None, POOL),
        ];
        for (field, references, wildcard, kinds) in fields {
            resolver.bind_all(kind, owner, field, references, wildcard, kinds, diagnostics);
        }
    }
}

fn bind_nat_objects(
    model: &mut ObjectModel,
    resolver: &mut Resolver,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for route in &mut model.routes {
        if let Some(device) = route.device.as_mut() {
            resolver.bind_all(
                ObjectKind::Route,
                &route.name,
                "device",
                std::slice::from_mut(device),
                Wildcard::None,
                INTERFACE,
                diagnostics,
            );
        }
    }
    for vip in &mut model.vips {
        resolver.bind_all(
            ObjectKind::Vip,
            &vip.name,
            "extintf",
            std::slice::from_mut(&mut vip.ext_intf),
            Wildcard::Interface,
            INTERFACE_OR_ZONE,
            diagnostics,
        );
    }
    let kind = ObjectKind::CentralSnat;
    for rule in &mut model.central_snat {
        let owner = rule.name.as_str();
        let fields: [(&str, &mut Vec<Reference>, Wildcard, &[ObjectKind]); 5] = [
            ("srcintf", &mut rule.srcintf, Wildcard::Interface, INTERFACE_OR_ZONE),
            ("dstintf", &mut rule.dstintf, Wildcard::Interface, INTERFACE_OR_ZONE),
            ("orig-addr", &mut rule.orig_addr, Wildcard::Address, ADDRESS),
            ("dst-addr", &mut rule.dst_addr, Wildcard::Address, ADDRESS),
            ("nat-ippool", &mut rule.nat_ippool, Wildcard::None, POOL),
        ];
        for (field, references, wildcard, kinds) in fields {
            resolver.bind_all(kind, owner, field, references, wildcard, kinds, diagnostics);
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Child group indices of a group, in member order.
fn child_groups<'a>(
    members: &'a [Option<&'a [Reference]>],
    node: usize,
) -> impl Iterator<Item = usize> + 'a {
    members[node]
        .unwrap_or(&[])
        .iter()
        .filter_map(Reference::handle)
        .map(|h| h.index)
        .filter(|&i| members.get(i).is_some_and(Option::is_some))
}

/// Report cycles, find every group that can reach itself, and flatten the rest.
///
/// `members[i]` is `Some` for group entries and `None` for plain objects.
fn expand_groups(
    kind: ObjectKind,
    names: &[&str],
    members: &[Option<&[Reference]>],
    diagnostics: &mut Vec<Diagnostic>,
) -> BTreeMap<usize, Expansion> {
    report_cycles(kind, names, members, diagnostics);

    let groups: Vec<usize> = (0..members.len())
        .filter(|&i| members[i].is_some())
        .collect();
    let cyclic: Vec<bool> = (0..members.len())
        .map(|i| members[i].is_some() && reaches_itself(members, i))
        .collect();

    let mut memo: Vec<Option<Expansion>> = vec![None; members.len()];
    for &group in &groups {
        if cyclic[group] {
            memo[group] = Some(Expansion {
                cyclic: true,
                ..Expansion::default()
            });
        }
    }

    for &group in &groups {
        let mut stack = vec![(group, false)];
        while let Some((node, ready)) = stack.pop() {
            if memo[node].is_some() {
                continue;
            }
            if !ready {
                stack.push((node, true));
                stack.extend(
                    child_groups(members, node)
                        .filter(|&c| memo[c].is_none())
                        .map(|c| (c, false)),
                );
                continue;
            }

            let mut expansion = Expansion {
                depth: 1,
                ..Expansion::default()
            };
            for reference in members[node].unwrap_or(&[]) {
                match reference.target {
                    Target::Any => expansion.any = true,
                    Target::Unresolved => push_unique(&mut expansion.unresolved, &reference.name),
                    Target::Object(handle) => {
                        if members[handle.index].is_none() {
                            if !expansion.leaves.contains(&handle) {
                                expansion.leaves.push(handle);
                            }
                        } else if cyclic[handle.index] {
                            push_unique(&mut expansion.cyclic_members, &reference.name);
                        } else if let Some(child) = memo[handle.index].as_ref() {
                            merge_child(&mut expansion, child);
                        }
                    }
                }
            }
            memo[node] = Some(expansion);
        }
    }

    groups
        .into_iter()
        .filter_map(|g| memo[g].take().map(|e| (g, e)))
        .collect()
}

fn merge_child(parent: &mut Expansion, child: &Expansion) {
    parent.any |= child.any;
    for leaf in &child.leaves {
        if !parent.leaves.contains(leaf) {
            parent.leaves.push(*leaf);
        }
    }
    for name in &child.unresolved {
        push_unique(&mut parent.unresolved, name);
    }
    for name in &child.cyclic_members {
        push_unique(&mut parent.cyclic_members, name);
    }
    parent.depth = parent.depth.max(child.depth + 1);
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Depth-first walk with a gray/black coloring; every back edge is one cycle.
fn report_cycles(
    kind: ObjectKind,
    names: &[&str],
    members: &[Option<&[Reference]>],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut color = vec![Color::White; members.len()];
    for start in 0..members.len() {
        if members[start].is_none() || color[start] != Color::White {
            continue;
        }
        color[start] = Color::Gray;
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(top) = stack.len().checked_sub(1) {
            let (node, next) = stack[top];
            let refs = members[node].unwrap_or(&[]);
            if next >= refs.len() {
                color[node] = Color::Black;
                stack.pop();
                continue;
            }
            stack[top].1 += 1;

            let Some(child) = refs[next].handle().map(|h| h.index) else {
                continue;
            };
            if members.get(child).map_or(true, Option::is_none) {
                continue;
            }
            match color[child] {
                Color::White => {
                    color[child] = Color::Gray;
                    stack.push((child, 0));
                }
                Color::Gray => {
                    let from = stack.iter().position(|&(n, _)| n == child).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[from..].iter().map(|&(n, _)| names[n].to_string()).collect();
                    path.push(names[child].to_string());
                    warn!(kind = %kind, path = ?path, "group cycle");
                    diagnostics.push(Diagnostic::GroupCycle { kind, path });
                }
                Color::Black => {}
            }
        }
    }
}

fn reaches_itself(members: &[Option<&[Reference]>], group: usize) -> bool {
    let mut seen = vec![false; members.len()];
    let mut stack: Vec<usize> = child_groups(members, group).collect();
    while let Some(node) = stack.pop() {
        if node == group {
            return true;
        }
        if std::mem::replace(&mut seen[node], true) {
            continue;
        }
        stack.extend(child_groups(members, node));
    }
    false
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::diagnostics::Diagnostic;
    use crate::load::{load_config, LoadOptions};
    use crate::model::{Address, ObjectKind, Service, Target};

    #[test]
    fn cycle_is_reported_with_full_path_and_expands_to_nothing() {
        let text = "config firewall addrgrp\nedit A\nset member B\nnext\nedit B\nset member A\nnext\nend\n";
        let loaded = load_config(text, &LoadOptions::default()).expect("load");
        let cycles: Vec<&Diagnostic> = loaded
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::GroupCycle { .. }))
            .collect();
        assert_eq!(
            cycles,
            [&Diagnostic::GroupCycle {
                kind: ObjectKind::Address,
                path: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            }]
        );

        let model = &loaded.model;
        let a = model.lookup(ObjectKind::Address, "A").expect("A");
        let expansion = model.address_expansion(a).expect("expansion");
        assert!(expansion.cyclic);
        assert!(expansion.is_empty());
    }

    #[test]
    fn group_pointing_at_a_cycle_treats_it_as_empty() {
        let loaded = load_config(
            &std::fs::read_to_string(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/../fixtures/group-cycle.conf"
            ))
            .expect("fixture"),
            &LoadOptions::default(),
        )
        .expect("load");
        let model = &loaded.model;
        let c = model.lookup(ObjectKind::Address, "C").expect("C");
        let expansion = model.address_expansion(c).expect("expansion");
        assert!(!expansion.cyclic);
        assert!(expansion.is_empty());
        assert_eq!(expansion.cyclic_members, ["A"]);
    }

    #[test]
    fn nested_groups_flatten_in_member_order() {
        let text = r#"config firewall address
edit h1
set subnet 10.0.0.1/32
next
edit h2
set subnet 10.0.0.2/32
next
end
config firewall addrgrp
edit inner
set member h2 h1
next
edit outer
set member h1 inner ghost
next
end
"#;
        let loaded = load_config(text, &LoadOptions::default()).expect("load");
        let model = &loaded.model;
        let outer = model.lookup(ObjectKind::Address, "outer").expect("outer");
        let expansion = model.address_expansion(outer).expect("expansion");
        let leaves: Vec<&str> = expansion
            .leaves
            .iter()
            .filter_map(|h| model.get::<Address>(*h))
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(leaves, ["h1", "h2"]);
        assert_eq!(expansion.unresolved, ["ghost"]);
        assert_eq!(expansion.depth, 2);
        assert!(loaded.diagnostics.iter().any(|d| matches!(
            d,
            Diagnostic::UnresolvedReference { owner, name, .. } if owner == "outer" && name == "ghost"
        )));
    }

    #[test]
    fn reserved_tokens_resolve_to_any() {
        let text = "config firewall service custom\nedit ALL\nset protocol IP\nnext\nend\nconfig firewall service group\nedit g\nset member ALL\nnext\nend\n";
        let loaded = load_config(text, &LoadOptions::default()).expect("load");
        let group = loaded.model.find::<Service>("g").expect("g");
        assert_eq!(group.members()[0].target, Target::Any);
    }

    #[test]
    fn second_zone_claim_is_a_conflict() {
        let text = "config system interface\nedit port1\nnext\nend\nconfig system zone\nedit z1\nset interface port1\nnext\nedit z2\nset interface port1\nnext\nend\n";
        let loaded = load_config(text, &LoadOptions::default()).expect("load");
        assert!(loaded.diagnostics.contains(&Diagnostic::ZoneConflict {
            interface: "port1".to_string(),
            zone: "z2".to_string(),
            claimed_by: "z1".to_string(),
        }));
        let port1 = loaded.model.lookup(ObjectKind::Interface, "port1").expect("port1");
        assert_eq!(
            loaded.model.zone_of(port1).map(|z| z.name.as_str()),
            Some("z1")
        );
    }
}
