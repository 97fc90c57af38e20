//! End-to-end pipeline runs: a request plus an on-disk source tree in,
//! an edited source tree out.

use std::fs;

use pretty_assertions::assert_eq;
use prost_types::compiler::CodeGeneratorRequest;
use prost_types::{DescriptorProto, FileDescriptorProto};
use tempfile::TempDir;

use protoforge::{
    Cardinality, Comments, Field, FieldType, InsertionPoint, InsertionPointPrinter, Pipeline,
    Plugin, PrimitiveType, Projection, ProjectionContext, Renderer, Result, SourceSet, TypeName,
};

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let absolute = dir.path().join(path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(absolute, content).unwrap();
    }
    dir
}

fn scalar_field(name: &str, number: i32) -> prost_types::FieldDescriptorProto {
    use prost_types::field_descriptor_proto::{Label, Type as WireType};
    prost_types::FieldDescriptorProto {
        name: Some(name.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(WireType::Int32 as i32),
        ..Default::default()
    }
}

fn request_with_one_message(file_name: &str, package: &str, message: &str, field: &str) -> CodeGeneratorRequest {
    let descriptor = DescriptorProto {
        name: Some(message.into()),
        field: vec![scalar_field(field, 1)],
        ..Default::default()
    };
    let file = FileDescriptorProto {
        name: Some(file_name.into()),
        package: Some(package.into()),
        message_type: vec![descriptor],
        ..Default::default()
    };
    CodeGeneratorRequest {
        file_to_generate: vec![file_name.to_string()],
        proto_file: vec![file],
        ..Default::default()
    }
}

/// A projection counting how many fields each message declared, the
/// minimal stand-in for the kind of state a real renderer would query.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldCount {
    r#type: TypeName,
    count: usize,
}

impl Projection for FieldCount {
    type Key = TypeName;

    fn route(event: &protoforge::Event) -> Option<TypeName> {
        match event {
            protoforge::Event::FieldEntered(field) => Some(field.declaring_type.clone()),
            _ => None,
        }
    }

    fn apply(current: Option<Self>, event: &protoforge::Event) -> Self {
        let protoforge::Event::FieldEntered(field) = event else {
            unreachable!("route only yields a key for FieldEntered");
        };
        match current {
            Some(existing) => FieldCount { count: existing.count + 1, ..existing },
            None => FieldCount { r#type: field.declaring_type.clone(), count: 1 },
        }
    }
}

struct CountFieldsPlugin;

impl Plugin for CountFieldsPlugin {
    fn register(&self, context: &mut ProjectionContext) {
        context.register::<FieldCount>();
    }
}

/// Appends a trailing comment to every generated file naming how many
/// fields its top-level message declared -- exercises "renderer reads a
/// projection and edits an existing file" end to end.
struct AnnotateFieldCounts;

impl Renderer for AnnotateFieldCounts {
    fn render(&self, context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
        for record in context.select::<FieldCount>().all() {
            let path = format!("{}.java", record.r#type.simple_name());
            if source_set.contains(&path) {
                let mut handle = source_set.file(&path)?;
                let existing = handle.code().to_string();
                handle.overwrite(format!("{existing}\n// fields: {}", record.count));
            }
        }
        Ok(())
    }
}

#[test]
fn enhances_existing_file_content() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder().plugin(CountFieldsPlugin).renderer(AnnotateFieldCounts).build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Greeting.java")).unwrap(),
        "class Greeting {}\n// fields: 1"
    );
}

struct CreateCompanionFile;

impl Renderer for CreateCompanionFile {
    fn render(&self, _context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
        source_set.create_file("Greeting.Builder.java", "class Builder {}");
        Ok(())
    }
}

#[test]
fn creates_a_new_file_alongside_generated_output() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder().renderer(CreateCompanionFile).build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("Greeting.java")).unwrap(), "class Greeting {}");
    assert_eq!(fs::read_to_string(dir.path().join("Greeting.Builder.java")).unwrap(), "class Builder {}");
}

struct DeleteUnwantedFile;

impl Renderer for DeleteUnwantedFile {
    fn render(&self, _context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
        source_set.delete("Unwanted.java")?;
        Ok(())
    }
}

#[test]
fn deletes_a_file_from_the_generated_tree() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {}"), ("Unwanted.java", "class Unwanted {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder().renderer(DeleteUnwantedFile).build();
    pipeline.run(&request, dir.path()).unwrap();

    assert!(dir.path().join("Greeting.java").exists());
    assert!(!dir.path().join("Unwanted.java").exists());
}

struct InjectAtInsertionPoint;

impl Renderer for InjectAtInsertionPoint {
    fn render(&self, _context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
        source_set
            .file("Greeting.java")?
            .at(InsertionPoint::new("class_scope"))
            .add(["private final String extra = \"injected\";"]);
        Ok(())
    }
}

#[test]
fn inserts_at_a_marker_printed_by_another_renderer() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {\n}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder()
        .renderer(
            InsertionPointPrinter::new("//")
                .leading(InsertionPoint::new("class_scope"))
                .for_files(|p| p.has_extension("java")),
        )
        .renderer(InjectAtInsertionPoint)
        .build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Greeting.java")).unwrap(),
        "// INSERT:'class_scope'\nprivate final String extra = \"injected\";\nclass Greeting {\n}"
    );
}

#[test]
fn per_language_dispatch_leaves_other_languages_untouched() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {}"), ("greeting.js", "class Greeting {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder()
        .renderer(
            InsertionPointPrinter::new("//")
                .leading(InsertionPoint::new("file_start"))
                .for_files(|p| p.has_extension("java")),
        )
        .build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Greeting.java")).unwrap(),
        "// INSERT:'file_start'\nclass Greeting {}"
    );
    assert_eq!(fs::read_to_string(dir.path().join("greeting.js")).unwrap(), "class Greeting {}");
}

#[test]
fn marker_is_never_materialized_when_nothing_reads_the_file() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Untouched.java", "class Untouched {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    // Greeting.java does not exist in this tree; the printer still
    // registers its lazy hook against Untouched.java, but nothing ever
    // calls .code()/.at() on it, so the marker must never appear on disk.
    let pipeline = Pipeline::builder()
        .renderer(
            InsertionPointPrinter::new("//")
                .leading(InsertionPoint::new("file_start"))
                .for_files(|p| p.has_extension("java")),
        )
        .build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("Untouched.java")).unwrap(), "class Untouched {}");
}

#[test]
fn an_empty_pipeline_leaves_the_tree_byte_identical() {
    let _ = env_logger::try_init();
    let dir = tree(&[("Greeting.java", "class Greeting {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    let pipeline = Pipeline::builder().build();
    pipeline.run(&request, dir.path()).unwrap();

    assert_eq!(fs::read_to_string(dir.path().join("Greeting.java")).unwrap(), "class Greeting {}");
}

#[test]
fn run_request_decodes_bytes_the_same_way_as_run() {
    use prost::Message;

    let _ = env_logger::try_init();

    let dir = tree(&[("Greeting.java", "class Greeting {}")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");
    let bytes = request.encode_to_vec();

    let pipeline = Pipeline::builder().plugin(CountFieldsPlugin).renderer(AnnotateFieldCounts).build();
    pipeline.run_request(&bytes, dir.path()).unwrap();

    assert_eq!(
        fs::read_to_string(dir.path().join("Greeting.java")).unwrap(),
        "class Greeting {}\n// fields: 1"
    );
}

#[test]
fn ambiguous_suffix_lookup_surfaces_as_an_error() {
    let _ = env_logger::try_init();
    let dir = tree(&[("a/Greeting.java", "one"), ("b/Greeting.java", "two")]);
    let request = request_with_one_message("a.proto", "pkg", "Greeting", "text");

    struct LookUpBySuffix;
    impl Renderer for LookUpBySuffix {
        fn render(&self, _context: &ProjectionContext, source_set: &mut SourceSet) -> Result<()> {
            source_set.file("Greeting.java").map(|_| ())
        }
    }

    let pipeline = Pipeline::builder().renderer(LookUpBySuffix).build();
    let err = pipeline.run(&request, dir.path()).unwrap_err();
    assert!(matches!(err, protoforge::PipelineError::AmbiguousPath { .. }));
}

#[test]
fn descriptor_and_field_types_are_reachable_from_the_public_api() {
    let _ = env_logger::try_init();
    // A smoke test that the descriptor model's public surface lines up
    // with what a renderer actually needs to inspect a field.
    let field = Field {
        name: "text".into(),
        declaring_type: TypeName::new("pkg", vec![], "Greeting"),
        number: 1,
        r#type: FieldType::Primitive(PrimitiveType::Int32),
        cardinality: Cardinality::Optional,
        oneof_name: None,
        options: vec![],
        doc: Comments::default(),
    };
    assert_eq!(field.declaring_type.qualified_name(), "pkg.Greeting");
}
