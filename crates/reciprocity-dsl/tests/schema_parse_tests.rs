use reciprocity_dsl::classify::{classify_fields, relation_fields, Cardinality};
use reciprocity_dsl::schema::{extract_models, BlockClose, SchemaDocument};

const SHOP: &str = r#"generator client {
  provider = "prisma-client-js"
}

// Catalog
model Brand {
  id       String    @id @default(cuid())
  name     String    @unique
  products Product[]
}

model Category {
  id   String @id
  slug String @unique // url slug, e.g. "shoes/{kind}"
}

model Product {
  id         String   @id
  brandId    String
  brand      Brand    @relation(fields: [brandId], references: [id], onDelete: Cascade)
  categoryId String?
  category   Category? @relation("ProductCategory", fields: [categoryId], references: [id])
  tags       String[]

  @@index([brandId])
}
"#;

#[test]
fn extracts_every_model_body() {
    let models = extract_models(SHOP);
    assert_eq!(
        models.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Brand", "Category", "Product"]
    );
    assert!(models["Category"].contains("url slug"));
    assert!(models["Product"].contains("@@index([brandId])"));
}

#[test]
fn zero_models_is_not_an_error() {
    assert!(extract_models("").is_empty());
    assert!(extract_models("enum Role {\n  A\n}\n").is_empty());
    assert!(relation_fields(&SchemaDocument::parse("// nothing here\n")).is_empty());
}

#[test]
fn comment_braces_do_not_confuse_block_tracking() {
    let document = SchemaDocument::parse(SHOP);
    let category = document.model("Category").expect("Category");
    assert_eq!(category.fields.len(), 2);
    assert!(matches!(category.close, BlockClose::Line(_)));
}

#[test]
fn classifies_key_mapped_relations_in_discovery_order() {
    let document = SchemaDocument::parse(SHOP);
    let fields = relation_fields(&document);
    assert_eq!(fields.len(), 2);

    assert_eq!(fields[0].field, "brand");
    assert_eq!(fields[0].target, "Brand");
    assert_eq!(fields[0].identity, None);
    assert_eq!(fields[0].cardinality, Cardinality::Single);

    assert_eq!(fields[1].field, "category");
    assert_eq!(fields[1].identity.as_deref(), Some("ProductCategory"));
    assert_eq!(fields[1].cardinality, Cardinality::Nullable);
}

#[test]
fn body_classifier_requires_known_targets() {
    let mut models = extract_models(SHOP);
    let body = models["Product"].clone();
    models.remove("Brand");
    let fields = classify_fields("Product", &body, &models);
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].target, "Category");
}

#[test]
fn collects_declared_identities() {
    let document = SchemaDocument::parse(SHOP);
    let identities = document.relation_identities();
    assert_eq!(identities.len(), 1);
    assert!(identities.contains("ProductCategory"));
}
