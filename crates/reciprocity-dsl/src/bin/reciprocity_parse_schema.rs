use std::{env, fs};

use reciprocity_dsl::{classify::relation_fields, schema::SchemaDocument};

fn main() {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: reciprocity_parse_schema <schema.prisma>");
        std::process::exit(2);
    };
    if args.next().is_some() {
        eprintln!("usage: reciprocity_parse_schema <schema.prisma>");
        std::process::exit(2);
    }

    let text = match fs::read_to_string(&path) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("failed to read `{path}`: {err}");
            std::process::exit(2);
        }
    };

    let document = SchemaDocument::parse(&text);
    let relations = relation_fields(&document);
    println!(
        "ok: models={} relation_fields={} identities={}",
        document.effective_models().count(),
        relations.len(),
        document.relation_identities().len()
    );
    for field in &relations {
        println!(
            "  {}.{} -> {} ({})",
            field.source,
            field.field,
            field.target,
            field.identity.as_deref().unwrap_or("anonymous")
        );
    }
}
