//! Declarations read from a namespace fixture, the way the cluster store
//! hands them to the engine.

use rbacsync_core::declaration::{declarations, GROUP_NAME_ANNOTATION};
use rbacsync_core::{BindingDefaults, BindingKey, Namespace, RoleName};
use rstest::rstest;

const FIXTURE: &str = r#"
- name: team-a
  annotations:
    rbac-sync.nais.io/group-name: team-a@example.com
    rbac-sync.nais.io/roles: admin,view
    rbac-sync.nais.io/rolebinding-prefix: team
- name: team-b
  annotations:
    rbac-sync.nais.io/group-name: team-b@example.com
- name: default
- name: legacy
  annotations:
    rbac-sync.nais.io/group-name: ""
    rbac-sync.nais.io/roles: admin
"#;

fn namespaces() -> Vec<Namespace> {
    serde_yaml::from_str(FIXTURE).expect("fixture parses")
}

#[test]
fn only_annotated_namespaces_declare_access() {
    let decls = declarations(&namespaces(), &BindingDefaults::default());
    let names: Vec<_> = decls.iter().map(|d| d.namespace.0.as_str()).collect();
    assert_eq!(names, vec!["team-a", "team-b"]);
}

#[test]
fn fixture_expands_to_expected_binding_keys() {
    let defaults = BindingDefaults::from_csv("nais:developer", "nais:teammember");
    let members = vec!["alice@example.com".to_string()];

    let keys: Vec<BindingKey> = declarations(&namespaces(), &defaults)
        .iter()
        .flat_map(|d| d.desired_bindings(&members))
        .map(|b| b.key)
        .collect();

    assert_eq!(
        keys,
        vec![
            BindingKey::new("team-a", "team-admin"),
            BindingKey::new("team-a", "team-view"),
            BindingKey::new("team-b", "nais:teammember-nais:developer"),
        ]
    );
}

#[rstest]
#[case("rbacsync-default", "rbacsync-default", "rbacsync-default-rbacsync-default")]
#[case("edit", "squad", "squad-edit")]
fn defaults_shape_binding_names(#[case] roles: &str, #[case] prefix: &str, #[case] expected: &str) {
    let ns = Namespace::new("ns1").with_annotation(GROUP_NAME_ANNOTATION, "g@example.com");
    let decls = declarations(&[ns], &BindingDefaults::from_csv(roles, prefix));
    let decl = decls.first().expect("one declaration");
    let role = RoleName::from(roles);
    assert_eq!(decl.binding_name(&role), expected);
}
