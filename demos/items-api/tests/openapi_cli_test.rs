use apiary::apiary_openapi::cli::{run, CliError, Format, OpenApiCommand};
use apiary::prelude::*;

fn registry() -> ApiRegistry {
    items_api::registry(&AppConfig::empty()).unwrap()
}

fn output(command: OpenApiCommand) -> String {
    let mut out = Vec::new();
    run(&command, &registry(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn list_config_prefixes() {
    assert_eq!(output(OpenApiCommand::ListConfigPrefixes), "\"\"\n\"V2_\"\n");
}

#[test]
fn print_matches_the_served_document() {
    let printed = output(OpenApiCommand::Print {
        format: Format::Json,
        config_prefix: "v2".into(),
    });
    let registry = registry();
    let api = registry.get("V2_").unwrap();
    assert_eq!(printed, format!("{}\n", api.spec().to_json_string().unwrap()));
    let doc: Value = serde_json::from_str(&printed).unwrap();
    assert_eq!(doc["swagger"], "2.0");
}

#[test]
fn print_yaml() {
    let printed = output(OpenApiCommand::Print {
        format: Format::Yaml,
        config_prefix: String::new(),
    });
    assert!(printed.contains("openapi: 3.0.2"));
    assert!(printed.ends_with('\n'));
}

#[test]
fn write_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_file = dir.path().join("openapi.json");
    let mut out = Vec::new();
    run(
        &OpenApiCommand::Write {
            format: Format::Json,
            config_prefix: String::new(),
            output_file: output_file.clone(),
        },
        &registry(),
        &mut out,
    )
    .unwrap();
    assert!(out.is_empty());
    let written = std::fs::read_to_string(&output_file).unwrap();
    let doc: Value = serde_json::from_str(&written).unwrap();
    assert_eq!(doc["info"]["title"], "Items API");
    assert!(doc["paths"]["/items"]["post"].is_object());
}

#[test]
fn unknown_prefix() {
    let mut out = Vec::new();
    let err = run(
        &OpenApiCommand::Print {
            format: Format::Json,
            config_prefix: "v3".into(),
        },
        &registry(),
        &mut out,
    )
    .unwrap_err();
    assert!(matches!(err, CliError::UnknownConfigPrefix { ref prefix, .. } if prefix == "v3"));
    assert_eq!(
        err.to_string(),
        "config prefix \"v3\" not available. Use one of:\n    \"\"\n    \"V2_\""
    );
}

#[test]
fn config_overrides_defaults() {
    let config = AppConfig::empty()
        .with("API_TITLE", "Inventory")
        .with("V2_API_VERSION", "2.1.0");
    let registry = items_api::registry(&config).unwrap();
    assert_eq!(registry.get("").unwrap().spec().title(), "Inventory");
    assert_eq!(registry.get("V2").unwrap().spec().title(), "Items API");
    let doc = registry.get("V2").unwrap().spec().to_value();
    assert_eq!(doc["info"]["version"], "2.1.0");
}
