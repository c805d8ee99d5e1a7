//! Integration tests for the generation pipeline.
//!
//! Each test declares a small application, plans against an in-memory
//! catalog, applies the plan to it and plans again, the way a developer
//! would alternate between editing declarations and running migrations.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use migrant_core::prelude::*;

fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, minute, 0)
        .unwrap()
}

// =============================================================================
// Fixture: a small directory application
// =============================================================================

fn user() -> EntityDeclaration {
    EntityDeclaration::new("User")
        .field("name", "Kelvin")
        .field("email", Example::Email("somebody@somewhere.com".into()))
        .timestamps()
}

fn customer() -> EntityDeclaration {
    EntityDeclaration::new("Customer")
        .inherits("User")
        .field("average_rating", Decimal::new(500, 2))
        .field("money_spent", SemanticType::Currency)
}

fn business() -> EntityDeclaration {
    EntityDeclaration::new("Business")
        .field("name", "Kitchen")
        .field("website", "www.google.com")
        .field("address", "1 Infinite Loop\nCupertino, CA")
        .field("landline", ColumnType::String)
        .field("operating_days", 0_i64..=6)
        .field("date_established", NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
        .field("verified", false)
        .field("rating", 4.5)
        .field_with(
            "location",
            ColumnType::String,
            FieldOptions::new().limit(127),
        )
        .belongs_to("user")
        .belongs_to_polymorphic("owner")
        .timestamps()
}

fn category() -> EntityDeclaration {
    EntityDeclaration::new("Category")
        .field_with("title", "Restaurants", FieldOptions::new().indexed())
        .field("summary", ColumnType::Text)
}

fn business_category() -> EntityDeclaration {
    EntityDeclaration::new("BusinessCategory")
        .belongs_to("business")
        .belongs_to("category")
}

fn review() -> EntityDeclaration {
    EntityDeclaration::new("Review")
        .field("stars", 5)
        .field("body", "word ".repeat(80))
        .belongs_to("business")
        .belongs_to_polymorphic("reviewer")
}

fn app() -> DeclarationSet {
    DeclarationSet::new()
        .with(review())
        .with(business_category())
        .with(business())
        .with(category())
        .with(customer())
        .with(user())
}

/// Plans, applies to `state`, and records the steps in `ledger`.
fn migrate(
    declarations: &DeclarationSet,
    state: &mut SchemaState,
    ledger: &mut MemoryLedger,
    config: GeneratorConfig,
    now: NaiveDateTime,
) -> MigrationPlan {
    let plan = MigrationGenerator::new(declarations, config)
        .generate_plan_at(state, ledger, now)
        .unwrap();
    state.apply(&plan).unwrap();
    ledger.record_plan(&plan);
    plan
}

// =============================================================================
// Fresh database
// =============================================================================

#[test]
fn test_business_scenario_creates_one_table() {
    let declarations = DeclarationSet::new().with(
        EntityDeclaration::new("Business")
            .field("name", "Acme")
            .field("rating", 4.5)
            .field("verified", true),
    );
    let plan = MigrationGenerator::new(&declarations, GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap();

    assert_eq!(plan.len(), 1);
    let step = &plan.steps[0];
    assert_eq!(step.entity, "Business");
    assert_eq!(step.body.up.len(), 1);
    match &step.body.up[0] {
        MigrationOp::CreateTable { table, columns } => {
            assert_eq!(table, "businesses");
            assert_eq!(
                columns,
                &vec![
                    ColumnSpec::new("name", ColumnType::String),
                    ColumnSpec::new("rating", ColumnType::Double),
                    ColumnSpec::new("verified", ColumnType::Boolean),
                ]
            );
        }
        other => panic!("Expected CreateTable, got {other:?}"),
    }
    assert!(matches!(step.body.down[0], MigrationOp::DropTable { .. }));
}

#[test]
fn test_referenced_tables_come_first() {
    let plan = MigrationGenerator::new(&app(), GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap();

    let entities: Vec<_> = plan.iter().map(|s| s.entity.as_str()).collect();
    assert_eq!(
        entities,
        vec!["Category", "User", "Business", "BusinessCategory", "Review"]
    );

    let identifiers: Vec<_> = plan.iter().map(|s| s.identifier.value()).collect();
    assert!(identifiers.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_inferred_business_columns() {
    let declarations = app();
    let schema = SchemaBuilder::new(&declarations)
        .build_table("Business")
        .unwrap()
        .schema;

    let column = |name: &str| schema.column(name).unwrap().clone();
    assert_eq!(column("name").column_type, ColumnType::String);
    assert_eq!(column("address").column_type, ColumnType::Text);
    assert_eq!(column("operating_days").limit, Some(1));
    assert_eq!(column("date_established").column_type, ColumnType::DateTime);
    assert_eq!(column("verified").column_type, ColumnType::Boolean);
    assert_eq!(column("location").limit, Some(127));
    assert_eq!(column("user_id").column_type, ColumnType::Integer);
    assert_eq!(column("owner_type").column_type, ColumnType::String);
    assert_eq!(column("owner_id").column_type, ColumnType::Integer);
    assert!(schema.indexes.contains(&IndexSpec::single("user_id")));
    assert!(schema
        .indexes
        .contains(&IndexSpec::new(["owner_type", "owner_id"])));
}

#[test]
fn test_sti_table_holds_every_entity() {
    let plan = MigrationGenerator::new(&app(), GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap();

    assert!(plan.step("Customer").is_none());
    let users = plan.step("User").unwrap();
    match &users.body.up[0] {
        MigrationOp::CreateTable { table, columns } => {
            assert_eq!(table, "users");
            let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
            assert_eq!(
                names,
                vec![
                    "name",
                    "email",
                    "created_at",
                    "updated_at",
                    "type",
                    "average_rating",
                    "money_spent"
                ]
            );
        }
        other => panic!("Expected CreateTable, got {other:?}"),
    }
}

// =============================================================================
// Reruns
// =============================================================================

#[test]
fn test_rerun_without_changes_is_empty() {
    let declarations = app();
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();

    let first = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(0),
    );
    assert_eq!(first.len(), 5);

    let second = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(0),
    );
    assert!(second.is_empty());
}

#[test]
fn test_new_field_adds_one_step() {
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();
    let first = migrate(
        &app(),
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(0),
    );

    let declarations = app().with(business().field("estimated_value_notes", "word ".repeat(70)));
    let second = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(0),
    );

    assert_eq!(second.len(), 1);
    let step = &second.steps[0];
    assert_eq!(step.name, "add_businesses_estimated_value_notes");
    match &step.body.up[0] {
        MigrationOp::AddColumn { table, column } => {
            assert_eq!(table, "businesses");
            assert_eq!(column.column_type, ColumnType::Text);
        }
        other => panic!("Expected AddColumn, got {other:?}"),
    }

    let latest = first.iter().map(|s| s.identifier.value()).max().unwrap();
    assert!(step.identifier.value() > latest);
}

#[test]
fn test_new_association_adds_column_and_index() {
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();
    migrate(&app(), &mut state, &mut ledger, GeneratorConfig::default(), at(0));

    let declarations = app().with(review().belongs_to("user"));
    let plan = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(5),
    );

    assert_eq!(plan.len(), 1);
    let up = &plan.steps[0].body.up;
    assert!(matches!(&up[0], MigrationOp::AddColumn { column, .. } if column.name == "user_id"));
    assert!(matches!(
        &up[1],
        MigrationOp::CreateIndex { name, .. } if name == "index_reviews_on_user_id"
    ));
}

#[test]
fn test_rollback_restores_previous_state() {
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();
    migrate(&app(), &mut state, &mut ledger, GeneratorConfig::default(), at(0));
    let before = state.clone();

    let declarations = app()
        .with(business().field("estimated_value_notes", "notes"))
        .with(category().field("position", 3));
    let plan = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(1),
    );
    assert_eq!(plan.len(), 2);
    assert_ne!(state, before);

    state.rollback(&plan).unwrap();
    assert_eq!(state, before);
}

#[test]
fn test_sequential_identifiers_never_repeat() {
    let config = GeneratorConfig::default().convention(IdentifierConvention::Sequential);
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();

    let first = migrate(&app(), &mut state, &mut ledger, config.clone(), at(0));
    let ids: Vec<_> = first.iter().map(|s| s.identifier.to_string()).collect();
    assert_eq!(ids, vec!["001", "002", "003", "004", "005"]);

    let declarations = app().with(user().field("nickname", "kel"));
    let second = migrate(&declarations, &mut state, &mut ledger, config, at(0));
    assert_eq!(second.steps[0].identifier.to_string(), "006");
    assert_eq!(second.steps[0].file_name, "006_add_users_nickname.sql");
}

#[test]
fn test_same_instant_reruns_bump_timestamps() {
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();
    let first = migrate(&app(), &mut state, &mut ledger, GeneratorConfig::default(), at(0));
    assert_eq!(first.steps[0].identifier.to_string(), "20240601120000");

    let declarations = app().with(user().field("nickname", "kel"));
    let second = migrate(
        &declarations,
        &mut state,
        &mut ledger,
        GeneratorConfig::default(),
        at(0),
    );
    assert_eq!(second.steps[0].identifier.to_string(), "20240601120005");
}

// =============================================================================
// Safety
// =============================================================================

fn live_business(landline: ExistingColumn) -> SchemaState {
    SchemaState::new().with_table(TableState::new(
        "businesses",
        vec![
            ExistingColumn::new("id", ColumnType::Integer),
            ExistingColumn::new("name", ColumnType::String).limit(255),
            landline,
            ExistingColumn::new("mobile", ColumnType::String),
        ],
    ))
}

fn phone_book(landline: ColumnType, mobile: ColumnType) -> DeclarationSet {
    DeclarationSet::new().with(
        EntityDeclaration::new("Business")
            .field("name", "Kitchen")
            .field("landline", landline)
            .field("mobile", mobile),
    )
}

#[test]
fn test_string_to_text_is_a_safe_alter() {
    let state = live_business(ExistingColumn::new("landline", ColumnType::String));
    let plan = MigrationGenerator::new(
        &phone_book(ColumnType::Text, ColumnType::String),
        GeneratorConfig::default(),
    )
    .generate_plan_at(&state, &MemoryLedger::new(), at(0))
    .unwrap();

    assert_eq!(plan.len(), 1);
    let step = &plan.steps[0];
    assert_eq!(step.name, "change_businesses_landline");
    match &step.body.up[0] {
        MigrationOp::ChangeColumn {
            column, previous, ..
        } => {
            assert_eq!(column.column_type, ColumnType::Text);
            assert_eq!(previous.column_type, ColumnType::String);
        }
        other => panic!("Expected ChangeColumn, got {other:?}"),
    }
}

#[test]
fn test_lossy_alter_fails_closed() {
    let state = live_business(ExistingColumn::new("landline", ColumnType::Text));
    let err = MigrationGenerator::new(
        &phone_book(ColumnType::Integer, ColumnType::Text),
        GeneratorConfig::default(),
    )
    .generate_plan_at(&state, &MemoryLedger::new(), at(0))
    .unwrap_err();

    match err {
        GenerationError::LossyAlter(changes) => {
            assert_eq!(changes.len(), 1);
            assert_eq!(changes[0].table, "businesses");
            assert_eq!(changes[0].column, "landline");
        }
        other => panic!("Expected LossyAlter, got {other:?}"),
    }
}

#[test]
fn test_lossy_alter_names_every_column() {
    let state = live_business(ExistingColumn::new("landline", ColumnType::Text));
    let err = MigrationGenerator::new(
        &phone_book(ColumnType::Integer, ColumnType::Boolean),
        GeneratorConfig::default(),
    )
    .generate_plan_at(&state, &MemoryLedger::new(), at(0))
    .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("businesses.landline"));
    assert!(message.contains("businesses.mobile"));
}

#[test]
fn test_force_emits_lossy_change() {
    let state = live_business(ExistingColumn::new("landline", ColumnType::Text));
    let plan = MigrationGenerator::new(
        &phone_book(ColumnType::Integer, ColumnType::Text),
        GeneratorConfig::default().force(true),
    )
    .generate_plan_at(&state, &MemoryLedger::new(), at(0))
    .unwrap();

    assert_eq!(plan.len(), 1);
    let up = &plan.steps[0].body.up;
    assert_eq!(up.len(), 2);
    assert!(up
        .iter()
        .all(|op| matches!(op, MigrationOp::ChangeColumn { .. })));
}

#[test]
fn test_pending_migrations_block_generation() {
    let ledger = MemoryLedger::new()
        .with_applied("20240101000000")
        .with_pending("20240102000000");
    let err = MigrationGenerator::new(&app(), GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &ledger, at(0))
        .unwrap_err();
    match err {
        GenerationError::PendingMigrationsExist(pending) => {
            assert_eq!(pending, vec!["20240102000000".to_string()]);
        }
        other => panic!("Expected PendingMigrationsExist, got {other:?}"),
    }
}

// =============================================================================
// Declaration errors
// =============================================================================

#[test]
fn test_unknown_association_target() {
    let declarations = DeclarationSet::new().with(review());
    let err = MigrationGenerator::new(&declarations, GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap_err();
    assert!(matches!(
        err,
        GenerationError::UnknownAssociationTarget { ref target, .. } if target == "business"
    ));
}

#[test]
fn test_unknown_parent_entity() {
    let declarations = DeclarationSet::new().with(customer());
    let err = MigrationGenerator::new(&declarations, GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap_err();
    assert!(matches!(err, GenerationError::UnknownParentEntity { .. }));
}

#[test]
fn test_reference_cycle_is_fatal() {
    let declarations = DeclarationSet::new()
        .with(EntityDeclaration::new("Author").belongs_to("book"))
        .with(EntityDeclaration::new("Book").belongs_to("author"));
    let err = MigrationGenerator::new(&declarations, GeneratorConfig::default())
        .generate_plan_at(&SchemaState::new(), &MemoryLedger::new(), at(0))
        .unwrap_err();
    match err {
        GenerationError::DependencyCycle(entities) => {
            assert_eq!(entities, vec!["Author".to_string(), "Book".to_string()]);
        }
        other => panic!("Expected DependencyCycle, got {other:?}"),
    }
}

// =============================================================================
// File names
// =============================================================================

#[test]
fn test_long_polymorphic_names_fit_the_limit() {
    let mut entity = EntityDeclaration::new("Business").field("name", "Kitchen");
    let mut declarations = DeclarationSet::new().with(entity.clone());
    let mut state = SchemaState::new();
    let mut ledger = MemoryLedger::new();
    migrate(&declarations, &mut state, &mut ledger, GeneratorConfig::default(), at(0));

    for i in 0..12 {
        entity = entity.belongs_to_polymorphic(format!(
            "a_really_long_polymorphic_association_name_number_{i}"
        ));
    }
    declarations = declarations.with(entity);
    let config = GeneratorConfig::default().max_file_name_len(100);
    let plan = migrate(&declarations, &mut state, &mut ledger, config, at(1));

    assert_eq!(plan.len(), 1);
    let step = &plan.steps[0];
    assert!(step.file_name.len() <= 100, "{}", step.file_name);
    assert!(step
        .name
        .starts_with("add_businesses_a_really_long_polymorphic_association_name_number_0"));
    assert!(step.file_name.starts_with("20240601120100_"));
}

// =============================================================================
// Mock rows
// =============================================================================

#[test]
fn test_mock_row_for_sti_child() {
    let row = mock_row(&app(), "Customer").unwrap();

    assert_eq!(row["average_rating"], MockValue::Decimal(Decimal::new(500, 2)));
    assert_eq!(
        row["email"],
        MockValue::Text("somebody@somewhere.com".into())
    );
    assert_eq!(row["type"], MockValue::Text("Customer".into()));
    match &row["money_spent"] {
        MockValue::Decimal(amount) => assert_eq!(amount.scale(), 2),
        other => panic!("Expected Decimal, got {other:?}"),
    }
}

#[test]
fn test_mock_row_covers_every_column() {
    let declarations = app();
    let schema = SchemaBuilder::new(&declarations).build("Business").unwrap();
    let row = mock_row(&declarations, "Business").unwrap();
    let keys: Vec<_> = row.keys().map(String::as_str).collect();
    let columns: Vec<_> = schema.column_names().collect();
    assert_eq!(keys, columns);
    assert_eq!(row["name"], MockValue::Text("Kitchen".into()));
    assert_eq!(row["verified"], MockValue::Boolean(false));
    assert_eq!(row["operating_days"], MockValue::Integer(0));
    assert_eq!(row["rating"], MockValue::Float(4.5));
    assert!(matches!(row["landline"], MockValue::Text(_)));
    assert!(matches!(row["user_id"], MockValue::Integer(_)));
}
