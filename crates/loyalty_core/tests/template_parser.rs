use loyalty_core::{
    parse_template, referenced_keys, FieldKind, MoleculeDefinition, NoCatalog, TenantId, ValueKind,
};
use std::collections::BTreeMap;
use uuid::Uuid;

fn definition(
    tenant: TenantId,
    id: i64,
    key: &str,
    label: &str,
    filter_by: Option<&str>,
) -> MoleculeDefinition {
    MoleculeDefinition {
        id,
        tenant_id: tenant,
        molecule_key: key.to_string(),
        label: label.to_string(),
        value_kind: ValueKind::List,
        scalar_type: None,
        constant_value: None,
        generator: None,
        input_type: None,
        display_width: Some(50),
        contextual: false,
        historized: false,
        filter_by: filter_by.map(str::to_string),
    }
}

fn catalog(defs: &[(&str, &str, Option<&str>)]) -> BTreeMap<String, MoleculeDefinition> {
    let tenant = Uuid::new_v4();
    defs.iter()
        .enumerate()
        .map(|(idx, (key, label, filter_by))| {
            (
                key.to_string(),
                definition(tenant, idx as i64 + 1, key, label, *filter_by),
            )
        })
        .collect()
}

#[test]
fn new_dialect_parses_flags_and_prompts() {
    let body = r#"[M,region,"half","R","Region"][M,postcode,"quarter","RUN",""]"#;
    let catalog = catalog(&[("region", "Region", None), ("postcode", "Postcode", None)]);

    let fields = parse_template(body, &catalog);
    assert_eq!(fields.len(), 2);

    assert_eq!(fields[0].molecule_key.as_deref(), Some("region"));
    assert!(fields[0].required);
    assert!(!fields[0].force_upper);
    assert_eq!(fields[0].grid_span, 6);

    // Empty prompt falls back to the catalog label.
    assert_eq!(fields[1].prompt, "Postcode");
    assert!(fields[1].required);
    assert!(fields[1].force_upper);
    assert!(fields[1].numeric_only);
    assert_eq!(fields[1].grid_span, 3);
}

#[test]
fn legacy_dialect_parses_single_letter_flag() {
    let body = r#"[M,region,"half",R,"Region"][M,store,"half",O,"Store"]"#;
    let fields = parse_template(body, &NoCatalog);

    assert_eq!(fields.len(), 2);
    assert!(fields[0].required);
    assert!(!fields[1].required);
    assert!(!fields[0].force_upper);
}

#[test]
fn brace_dialect_parses_required_segment() {
    let body = "{region:half:R:Region} {store:50:N:Store}";
    let fields = parse_template(body, &NoCatalog);

    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].grid_span, 6);
    assert!(fields[0].required);
    assert_eq!(fields[1].grid_span, 6);
    assert!(!fields[1].required);
}

#[test]
fn dialects_are_exclusive_and_never_double_fire() {
    let body = r#"[M,region,"half","R","Region"]"#;
    let fields = parse_template(body, &NoCatalog);
    // One token, one field: no legacy/brace duplicates.
    assert_eq!(fields.len(), 1);
}

#[test]
fn width_buckets_and_percentages_yield_equal_spans() {
    let body = r#"[M,a,"half","",""][M,b,"50","",""][M,c,"50%","",""]"#;
    let fields = parse_template(body, &NoCatalog);
    assert!(fields.iter().all(|field| field.grid_span == 6));
}

#[test]
fn section_labels_and_displays_interleave_in_document_order() {
    let body = r#"[T,"Member details"][M,region,"half","R","Region"][L,tier][M,store,"half","","Store"]"#;
    let catalog = catalog(&[
        ("region", "Region", None),
        ("store", "Store", None),
        ("tier", "Tier", None),
    ]);

    let fields = parse_template(body, &catalog);
    assert_eq!(fields.len(), 4);
    assert_eq!(fields[0].kind, FieldKind::Text);
    assert_eq!(fields[0].prompt, "Member details");
    assert_eq!(fields[1].kind, FieldKind::Molecule);
    assert_eq!(fields[2].kind, FieldKind::Label);
    assert_eq!(fields[2].prompt, "Tier");
    assert_eq!(fields[3].kind, FieldKind::Molecule);

    // The section owns its row; the inputs flow onto the next one.
    assert_eq!(fields[0].row_number, 1);
    assert_eq!(fields[1].row_number, 2);
    assert!(fields
        .windows(2)
        .all(|pair| pair[0].sort_order < pair[1].sort_order));
}

#[test]
fn fields_wrap_to_a_new_row_past_twelve_units() {
    let body = r#"[M,a,"half","",""][M,b,"half","",""][M,c,"half","",""]"#;
    let fields = parse_template(body, &NoCatalog);
    assert_eq!(fields[0].row_number, fields[1].row_number);
    assert_eq!(fields[2].row_number, fields[1].row_number + 1);
}

#[test]
fn filter_by_is_copied_from_the_catalog() {
    let body = r#"[M,region,"half","R","Region"][M,store,"half","","Store"]"#;
    let catalog = catalog(&[("region", "Region", None), ("store", "Store", Some("region"))]);

    let fields = parse_template(body, &catalog);
    assert_eq!(fields[0].filter_by, None);
    assert_eq!(fields[1].filter_by.as_deref(), Some("region"));
}

#[test]
fn unparseable_template_yields_empty_field_list() {
    assert!(parse_template("just plain prose, no grammar", &NoCatalog).is_empty());
    assert!(parse_template("", &NoCatalog).is_empty());
}

#[test]
fn referenced_keys_collects_across_grammars() {
    let body = r#"[M,region,"half","R","Region"][L,tier]"#;
    assert_eq!(referenced_keys(body), vec!["region", "tier"]);

    let brace = "{region:half:R:Region}{region:half:R:Again}";
    assert_eq!(referenced_keys(brace), vec!["region"]);
}
