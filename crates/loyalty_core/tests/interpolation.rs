use loyalty_core::db::open_db_in_memory;
use loyalty_core::{
    AtomEngine, EvalContext, LinkContext, MoleculeCache, MoleculeResolver, NewDefinition,
    SqliteCatalogRepository, SqliteLinkRepository, TenantId, ValueKind,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seeded_member(conn: &Connection, tenant: TenantId, first_name: &str) -> i64 {
    let links = SqliteLinkRepository::new(conn, LinkContext::default());
    links
        .create_member(tenant, "M-1001", first_name, "Smith")
        .unwrap()
}

fn constant_scalar(conn: &Connection, tenant: TenantId, key: &str, value: &str) {
    let admin = SqliteCatalogRepository::try_new(conn).unwrap();
    let mut definition = NewDefinition::new(tenant, key, key, ValueKind::Scalar);
    definition.constant_value = Some(value.to_string());
    admin.create_definition(&definition).unwrap();
}

#[test]
fn table_atom_truncates_without_padding() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "William");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: None,
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("{{T,member,first_name,3}}"), "Wil");
}

#[test]
fn short_values_pass_through_the_length_limit() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "Al");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: None,
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("{{T,member,first_name,3}}"), "Al");
}

#[test]
fn truncation_is_applied_before_the_case_transform() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "William");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: None,
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("{{T,member,first_name,4,U}}"), "WILL");
}

#[test]
fn failed_atoms_empty_their_own_span_only() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    constant_scalar(&conn, tenant, "greeting", "Hello");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(&conn, LinkContext::default());
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    let output = engine.resolve_atoms(
        "{{M,greeting,value}} Ann, you have {{M,no_such_molecule,value}} items",
    );
    assert_eq!(output, "Hello Ann, you have  items");
}

#[test]
fn valid_atoms_resolve_next_to_malformed_ones() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "Ann");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: None,
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    let output =
        engine.resolve_atoms("Hello {{T,member,first_name}}, you have {{bad}} items");
    assert_eq!(output, "Hello Ann, you have {{bad}} items");
}

#[test]
fn malformed_atoms_are_left_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(&conn, LinkContext::default());
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("keep {{bad}} as-is"), "keep {{bad}} as-is");
    assert_eq!(
        engine.resolve_atoms("and {{X,member,first_name}} too"),
        "and {{X,member,first_name}} too"
    );
}

#[test]
fn molecule_atom_selects_the_requested_field() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let admin = SqliteCatalogRepository::try_new(&conn).unwrap();
    let molecule_id = admin
        .create_definition(&NewDefinition::new(tenant, "tier", "Tier", ValueKind::List))
        .unwrap();
    admin
        .create_value(molecule_id, &loyalty_core::NewValue::new("gold", "Gold"))
        .unwrap();

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(&conn, LinkContext::default());
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(
        engine.resolve_atoms("{{M,tier,label}} ({{M,tier,code,2,U}})"),
        "Gold (GO)"
    );
}

#[test]
fn unlisted_entity_or_column_resolves_to_empty() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "Ann");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: None,
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("<{{T,invoice,total}}>"), "<>");
    assert_eq!(engine.resolve_atoms("<{{T,member,password_hash}}>"), "<>");
}

#[test]
fn missing_link_context_resolves_to_empty() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    seeded_member(&conn, tenant, "Ann");

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(&conn, LinkContext::default());
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(engine.resolve_atoms("<{{T,member,first_name}}>"), "<>");
}

#[test]
fn activity_atoms_read_through_their_own_context() {
    let conn = open_db_in_memory().unwrap();
    let tenant = Uuid::new_v4();
    let member_id = seeded_member(&conn, tenant, "Ann");
    let authoring = SqliteLinkRepository::new(&conn, LinkContext::default());
    let activity_id = authoring
        .create_activity(tenant, member_id, "purchase", "2026-08-01", 120)
        .unwrap();

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut resolver = MoleculeResolver::new(repo, MoleculeCache::new(16));
    let links = SqliteLinkRepository::new(
        &conn,
        LinkContext {
            member_id: Some(member_id),
            activity_id: Some(activity_id),
        },
    );
    let mut engine = AtomEngine::new(&mut resolver, &links, tenant, EvalContext::default());

    assert_eq!(
        engine.resolve_atoms("{{T,activity,points}} pts from {{T,activity,activity_type}}"),
        "120 pts from purchase"
    );
}
