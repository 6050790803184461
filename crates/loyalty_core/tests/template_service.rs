use loyalty_core::db::open_db;
use loyalty_core::{
    NewDefinition, SqliteCatalogRepository, SqliteTemplateRepository, TemplateField,
    TemplateService, ValueKind,
};
use uuid::Uuid;

#[test]
fn list_scopes_by_tenant_and_activity_type() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("catalog.db")).unwrap();
    let tenant = Uuid::new_v4();
    let other_tenant = Uuid::new_v4();

    let repo = SqliteTemplateRepository::new(&conn);
    repo.create(tenant, "Enrollment", None, "{region:half:R:Region}")
        .unwrap();
    repo.create(tenant, "Purchase entry", Some("purchase"), "{store:half:R:Store}")
        .unwrap();
    repo.create(tenant, "Refund entry", Some("refund"), "{store:half:R:Store}")
        .unwrap();
    repo.create(other_tenant, "Enrollment", None, "{city:half:O:City}")
        .unwrap();

    let service = TemplateService::new(SqliteTemplateRepository::new(&conn));

    let all = service.list(tenant, None).unwrap();
    assert_eq!(all.len(), 3);

    // Scoped listing keeps unscoped templates visible.
    let purchase = service.list(tenant, Some("purchase")).unwrap();
    let names: Vec<&str> = purchase.iter().map(|record| record.name.as_str()).collect();
    assert_eq!(names, vec!["Enrollment", "Purchase entry"]);
}

#[test]
fn get_rejects_other_tenants_templates() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("catalog.db")).unwrap();
    let tenant = Uuid::new_v4();

    let repo = SqliteTemplateRepository::new(&conn);
    let id = repo
        .create(tenant, "Enrollment", None, "{region:half:R:Region}")
        .unwrap();

    let service = TemplateService::new(SqliteTemplateRepository::new(&conn));
    assert!(service.get(tenant, id).unwrap().is_some());
    assert!(service.get(Uuid::new_v4(), id).unwrap().is_none());
}

#[test]
fn parse_fields_prefetches_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("catalog.db")).unwrap();
    let tenant = Uuid::new_v4();

    let admin = SqliteCatalogRepository::try_new(&conn).unwrap();
    admin
        .create_definition(&NewDefinition::new(tenant, "region", "Region", ValueKind::List))
        .unwrap();
    let mut store = NewDefinition::new(tenant, "store", "Store", ValueKind::List);
    store.filter_by = Some("region".to_string());
    admin.create_definition(&store).unwrap();

    let repo = SqliteTemplateRepository::new(&conn);
    let id = repo
        .create(
            tenant,
            "Enrollment",
            None,
            r#"[M,region,"half","R",""][M,store,"half","",""]"#,
        )
        .unwrap();

    let service = TemplateService::new(SqliteTemplateRepository::new(&conn));
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();
    let fields = service.parse_fields(tenant, id, &catalog).unwrap().unwrap();

    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].prompt, "Region");
    assert_eq!(fields[1].filter_by.as_deref(), Some("region"));

    // Parsed descriptors are what the request surface serializes.
    let json = serde_json::to_value(&fields).unwrap();
    assert_eq!(json[0]["kind"], "molecule");
    assert_eq!(json[0]["grid_span"], 6);
}

#[test]
fn parse_fields_handles_missing_and_unparseable_templates() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("catalog.db")).unwrap();
    let tenant = Uuid::new_v4();

    let repo = SqliteTemplateRepository::new(&conn);
    let id = repo.create(tenant, "Notes", None, "free text only").unwrap();

    let service = TemplateService::new(SqliteTemplateRepository::new(&conn));
    let catalog = SqliteCatalogRepository::try_new(&conn).unwrap();

    assert_eq!(service.parse_fields(tenant, id, &catalog).unwrap(), Some(Vec::new()));
    assert_eq!(service.parse_fields(tenant, id + 99, &catalog).unwrap(), None);
}

#[test]
fn fields_of_kind_text_serialize_with_snake_case_discriminator() {
    let field = TemplateField::section("Member details");
    let json = serde_json::to_value(&field).unwrap();
    assert_eq!(json["kind"], "text");
    assert_eq!(json["grid_span"], 12);
}
