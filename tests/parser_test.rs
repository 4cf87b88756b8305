//! Corpus-level parsing: fixture documents through splitting, block parsing and assembly.

use docbind_core::{
    compiler::ApiCompiler,
    error::{AssembleError, DocbindError, ParseError},
    model::{DataType, Flag},
    parser::{split_units, BlockKind, ParseDiagnostic, ParsePolicy},
};

mod common;
use common::{docs_dir, init_logging, read_doc};

#[test]
fn test_media_corpus() {
    init_logging();
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("media-api.txt", read_doc("media-api.txt"));
    let result = compiler.finish().unwrap();
    assert_eq!(
        result.api.names(),
        vec!["org.bluez.Media1", "org.bluez.MediaTransport1"]
    );
    assert_eq!(result.skipped(), 0);

    let media = result.api.get("org.bluez.Media1").unwrap();
    assert_eq!(media.title, "Media hierarchy");
    assert!(media.scoped_to_adapter());
    assert!(media.roots_hierarchy());
    let register = &media.methods[0];
    assert_eq!(register.name, "RegisterEndpoint");
    assert_eq!(register.args.len(), 2);
    assert_eq!(register.args[1].name, "properties");
    assert!(register.returns.is_empty());
    assert_eq!(
        register.errors.iter().cloned().collect::<Vec<String>>(),
        vec![
            "org.bluez.Error.InvalidArguments".to_string(),
            "org.bluez.Error.NotSupported".to_string()
        ]
    );
    assert_eq!(
        media.properties["SupportedUUIDs"].data_type(),
        DataType::Array(Box::new(DataType::String))
    );

    let transport = result.api.get("org.bluez.MediaTransport1").unwrap();
    assert!(!transport.scoped_to_adapter());
    assert!(!transport.roots_hierarchy());
    let acquire = &transport.methods[0];
    assert_eq!(acquire.returns, vec!["fd", "uint16", "uint16"]);
    assert_eq!(acquire.errors.len(), 2);
    assert_eq!(
        transport.methods.iter().map(|m| m.name.as_str()).collect::<Vec<&str>>(),
        vec!["Acquire", "TryAcquire", "Release"]
    );

    let names: Vec<&str> = transport.properties.keys().map(|k| k.as_str()).collect();
    assert_eq!(
        names,
        vec!["Device", "UUID", "Codec", "Configuration", "State", "Delay", "Volume", "Endpoint"]
    );
    assert!(transport.properties["Volume"].is_writable());
    assert!(transport.properties["Device"].is_readonly());
    assert!(transport.properties["State"].docs.contains("\"idle\": not streaming"));

    let endpoint = &transport.properties["Endpoint"];
    assert_eq!(endpoint.flags, Flag::ReadOnly | Flag::Experimental);
    assert!(endpoint.is_optional());
    assert!(endpoint.docs.starts_with("(optional) Endpoint object"));
}

#[test]
fn test_malformed_block_is_skipped_or_fatal() {
    init_logging();
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("thermometer-api.txt", read_doc("thermometer-api.txt"));
    let result = compiler.finish().unwrap();
    assert_eq!(result.skipped(), 1);
    let (interface, kind, line) = result.diagnostics[0].as_skipped().unwrap();
    assert_eq!(interface, "org.bluez.Thermometer1");
    assert_eq!(kind, BlockKind::Property);
    assert_eq!(line, 43);

    let thermometer = result.api.get("org.bluez.Thermometer1").unwrap();
    assert_eq!(thermometer.properties.len(), 3);
    assert_eq!(thermometer.properties["Intermediate"].data_type(), DataType::Bool);
    assert!(thermometer.properties["Interval"].is_writable());
    assert!(thermometer.properties["Maximum"].is_optional());

    let manager = result.api.get("org.bluez.ThermometerManager1").unwrap();
    assert_eq!(manager.methods.len(), 2);
    assert_eq!(manager.methods[0].args[0].ty, "object");

    let mut compiler = ApiCompiler::new(ParsePolicy::Abort).unwrap();
    compiler.add_source("thermometer-api.txt", read_doc("thermometer-api.txt"));
    match compiler.finish().unwrap_err() {
        DocbindError::Parse(ParseError::NoMatch { kind, line, snippet }) => {
            assert_eq!(kind, BlockKind::Property);
            assert_eq!(line, 43);
            assert_eq!(snippet, "This line is not a property at all");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unknown_flag_spellings_are_dropped() {
    init_logging();
    let units = split_units("gatt-api.txt", &read_doc("gatt-api.txt")).unwrap();
    assert_eq!(units.len(), 2);
    assert!(units[0].docs.is_empty());

    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("gatt-api.txt", read_doc("gatt-api.txt"));
    let result = compiler.finish().unwrap();
    let service = result.api.get("org.bluez.GattService1").unwrap();
    // `read-only` is not one of the recognized flag tokens.
    assert!(service.properties.values().all(|p| p.flags.is_empty()));
    assert_eq!(service.properties["Includes"].name, "Includes");

    let characteristic = result.api.get("org.bluez.GattCharacteristic1").unwrap();
    let read = &characteristic.methods[0];
    assert_eq!(read.return_types(), vec![DataType::Array(Box::new(DataType::Byte))]);
    assert_eq!(read.errors.len(), 3);
    assert!(characteristic.properties.contains_key("Notifying"));
    assert!(!characteristic.properties["Value"].is_optional());
}

#[test]
fn test_directory_corpus_and_duplicates() {
    init_logging();
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    assert_eq!(compiler.add_dir(docs_dir()).unwrap(), 3);
    let result = compiler.finish().unwrap();
    // Files are read in name order.
    assert_eq!(
        result.api.names(),
        vec![
            "org.bluez.GattService1",
            "org.bluez.GattCharacteristic1",
            "org.bluez.Media1",
            "org.bluez.MediaTransport1",
            "org.bluez.ThermometerManager1",
            "org.bluez.Thermometer1",
        ]
    );

    let json = result.api.to_json().unwrap();
    let reloaded = docbind_core::model::Api::from_json(&json).unwrap();
    assert_eq!(reloaded, result.api);

    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("media-api.txt", read_doc("media-api.txt"));
    compiler.add_source("media-api-copy.txt", read_doc("media-api.txt"));
    assert!(matches!(
        compiler.finish(),
        Err(DocbindError::Assemble(AssembleError::DuplicateInterface { .. }))
    ));
}

#[test]
fn test_duplicate_property_conflicts() {
    init_logging();
    let doc = "Interface\torg.example.Widget1\n\nProperties\tstring Name [readonly]\n\n\t\tstring Name [readwrite]\n";
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("widget.txt", doc);
    match compiler.finish().unwrap_err() {
        DocbindError::Assemble(AssembleError::DuplicateProperty {
            interface,
            property,
        }) => {
            assert_eq!(interface, "org.example.Widget1");
            assert_eq!(property, "Name");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unit_without_interface() {
    init_logging();
    let doc = "Widget hierarchy\n================\n\nService\torg.example\n";
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("widget.txt", doc);
    let result = compiler.finish().unwrap();
    assert!(result.api.is_empty());
    assert!(matches!(result.diagnostics[0], ParseDiagnostic::Warning(_)));

    let mut compiler = ApiCompiler::new(ParsePolicy::Abort).unwrap();
    compiler.add_source("widget.txt", doc);
    assert!(matches!(
        compiler.finish(),
        Err(DocbindError::Parse(ParseError::MalformedUnit { .. }))
    ));
}

const MESH_DOC: &str = "BlueZ D-Bus Mesh API description
********************************

Mesh Network Hierarchy
======================
Service\t\torg.bluez.mesh
Interface\torg.bluez.mesh.Network1
Object path\t/org/bluez/mesh

Methods:
\tvoid Join(object app_root, array{byte}[16] uuid)

\t\tThis is the first method that an application has to call to
\t\tbecome a provisioned node on a mesh network.

\t\tPossible errors:
\t\t\torg.bluez.mesh.Error.InvalidArguments
\t\t\torg.bluez.mesh.Error.AlreadyExists

Mesh Node Hierarchy
===================
Service\t\torg.bluez.mesh
Interface\torg.bluez.mesh.Node1
Object path\t/org/bluez/mesh/node<uuid>

Methods:
\tvoid Send(object element_path, object destination, uint16 key_index,
\t\t\t\t\tdict options, array{byte} data)

\t\tThis method is used to send a message originated by a local
\t\tmodel.

Properties:
\tboolean Beacon [read-only]

\t\tThis property indicates whether the periodic beacon is
\t\tenabled.
";

#[test]
fn test_capitalised_titles_keep_interfaces_apart() {
    init_logging();
    let mut compiler = ApiCompiler::new(ParsePolicy::Abort).unwrap();
    compiler.add_source("mesh-api.txt", MESH_DOC);
    let result = compiler.finish().unwrap();
    assert_eq!(
        result.api.names(),
        vec!["org.bluez.mesh.Network1", "org.bluez.mesh.Node1"]
    );
    assert_eq!(result.skipped(), 0);

    let network = result.api.get("org.bluez.mesh.Network1").unwrap();
    assert_eq!(network.title, "Mesh Network Hierarchy");
    assert_eq!(network.methods.len(), 1);
    assert_eq!(network.methods[0].errors.len(), 2);
    assert!(network.properties.is_empty());

    let node = result.api.get("org.bluez.mesh.Node1").unwrap();
    assert!(node.properties.contains_key("Beacon"));
    let send = &node.methods[0];
    assert_eq!(send.name, "Send");
    assert_eq!(
        send.args.iter().map(|a| a.name.as_str()).collect::<Vec<&str>>(),
        vec!["element_path", "destination", "key_index", "options", "data"]
    );
}

#[test]
fn test_interfaces_without_titles_between_are_malformed() {
    init_logging();
    let doc = "Interface\torg.example.Foo1\n\nMethods\t\tvoid Ping()\n\nInterface\torg.example.Bar1\n\nMethods\t\tvoid Pong()\n";
    let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
    compiler.add_source("pingpong.txt", doc);
    let result = compiler.finish().unwrap();
    assert!(result.api.is_empty());
    match &result.diagnostics[0] {
        ParseDiagnostic::Warning(message) => assert!(message.contains("org.example.Bar1")),
        other => panic!("unexpected {other:?}"),
    }
}
